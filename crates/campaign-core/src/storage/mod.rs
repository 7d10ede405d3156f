//! Session storage: the only state shared between turns.

mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::schema::CampaignSchema;
use crate::state::{CampaignState, FieldMap};

pub use memory::{MemorySessionStore, DEFAULT_IDLE_TTL};

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Keyed store of partially filled campaign records.
///
/// Callers only ever receive copies of a state; mutation goes through `merge`.
/// Implementations must apply one `merge` atomically so that concurrent merges of
/// different fields on the same session never lose each other's writes.
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn schema(&self) -> &CampaignSchema;

    /// Current state, creating an empty one on first reference. Refreshes the idle
    /// horizon.
    async fn get(&self, session_id: &str) -> Result<CampaignState>;

    /// Current state of a live session, without creating it or refreshing its idle
    /// horizon. `None` for unknown or expired sessions.
    async fn peek(&self, session_id: &str) -> Result<Option<CampaignState>>;

    /// Overwrite every schema field present in `partial`; other names are ignored.
    async fn merge(&self, session_id: &str, partial: &FieldMap) -> Result<CampaignState>;

    async fn is_complete(&self, session_id: &str) -> Result<bool> {
        Ok(self.get(session_id).await?.is_complete())
    }

    /// Absent schema fields, in schema order.
    async fn missing_fields(&self, session_id: &str) -> Result<Vec<String>> {
        Ok(self.get(session_id).await?.missing_fields())
    }

    /// Remove the session. Deleting an unknown session is not an error.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Remove and return the session if every field is present.
    ///
    /// This is the hand-off point: of several turns racing on one session at most
    /// one gets `Some`. The default is only correct for stores with a single writer
    /// and should be overridden.
    async fn take_complete(&self, session_id: &str) -> Result<Option<CampaignState>> {
        let state = self.get(session_id).await?;
        if !state.is_complete() {
            return Ok(None);
        }
        self.delete(session_id).await?;
        Ok(Some(state))
    }
}
