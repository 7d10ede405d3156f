use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Result, SessionStore};
use crate::schema::CampaignSchema;
use crate::state::{CampaignState, FieldMap};

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

struct Entry {
    state: CampaignState,
    touched: Instant,
}

impl Entry {
    fn fresh(schema: &CampaignSchema, now: Instant) -> Self {
        Self {
            state: CampaignState::empty(schema),
            touched: now,
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.touched) > ttl
    }
}

/// In-process session store with an idle-expiry horizon.
///
/// Every operation runs under the map's per-key lock and never awaits while
/// holding it.
pub struct MemorySessionStore {
    schema: CampaignSchema,
    sessions: DashMap<String, Entry>,
    idle_ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(schema: CampaignSchema) -> Self {
        Self {
            schema,
            sessions: DashMap::new(),
            idle_ttl: DEFAULT_IDLE_TTL,
        }
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Evict every session idle for longer than the TTL. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let ttl = self.idle_ttl;
        let mut purged = 0;
        self.sessions.retain(|session_id, entry| {
            let keep = !entry.is_expired(now, ttl);
            if !keep {
                log::debug!("[{}] Session expired after {:?} idle", session_id, ttl);
                purged += 1;
            }
            keep
        });
        purged
    }

    fn with_entry<R>(&self, session_id: &str, f: impl FnOnce(&mut CampaignState) -> R) -> R {
        let now = Instant::now();
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                log::debug!("[{}] Creating empty campaign state", session_id);
                Entry::fresh(&self.schema, now)
            });

        if entry.is_expired(now, self.idle_ttl) {
            log::info!("[{}] Session idle past TTL, starting fresh", session_id);
            *entry = Entry::fresh(&self.schema, now);
        }
        entry.touched = now;
        f(&mut entry.state)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn schema(&self) -> &CampaignSchema {
        &self.schema
    }

    async fn get(&self, session_id: &str) -> Result<CampaignState> {
        Ok(self.with_entry(session_id, |state| state.clone()))
    }

    async fn peek(&self, session_id: &str) -> Result<Option<CampaignState>> {
        let now = Instant::now();
        Ok(self
            .sessions
            .get(session_id)
            .filter(|entry| !entry.is_expired(now, self.idle_ttl))
            .map(|entry| entry.state.clone()))
    }

    async fn merge(&self, session_id: &str, partial: &FieldMap) -> Result<CampaignState> {
        Ok(self.with_entry(session_id, |state| {
            let written = state.apply(partial);
            if written.len() < partial.len() {
                log::debug!(
                    "[{}] Ignored {} field(s) outside the schema",
                    session_id,
                    partial.len() - written.len()
                );
            }
            state.clone()
        }))
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        if self.sessions.remove(session_id).is_some() {
            log::debug!("[{}] Session deleted", session_id);
        }
        Ok(())
    }

    async fn take_complete(&self, session_id: &str) -> Result<Option<CampaignState>> {
        let taken = self
            .sessions
            .remove_if(session_id, |_, entry| entry.state.is_complete())
            .map(|(_, entry)| entry.state);
        if taken.is_some() {
            log::debug!("[{}] Complete session handed off", session_id);
        }
        Ok(taken)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::FieldSpec;
    use crate::state::FieldValue;

    fn schema() -> CampaignSchema {
        CampaignSchema::new([
            FieldSpec::new("valueProp", "value", "x"),
            FieldSpec::new("painPoints", "pains", "[]"),
            FieldSpec::new("cta", "cta", "y"),
        ])
    }

    fn partial(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::from(*v)))
            .collect()
    }

    #[tokio::test]
    async fn get_creates_empty_state_on_first_reference() {
        let store = MemorySessionStore::new(schema());

        let state = store.get("s1").await.unwrap();

        assert_eq!(state.collected_count(), 0);
        assert!(store.contains("s1"));
        assert_eq!(
            store.missing_fields("s1").await.unwrap(),
            vec!["valueProp", "painPoints", "cta"]
        );
    }

    #[tokio::test]
    async fn peek_never_creates_a_session() {
        let store = MemorySessionStore::new(schema());

        assert!(store.peek("s1").await.unwrap().is_none());
        assert!(!store.contains("s1"));

        store.merge("s1", &partial(&[("cta", "Go")])).await.unwrap();
        let state = store.peek("s1").await.unwrap().expect("live session");
        assert_eq!(state.get("cta"), Some(&FieldValue::from("Go")));
    }

    #[tokio::test]
    async fn merge_ignores_unknown_fields() {
        let store = MemorySessionStore::new(schema());

        let state = store
            .merge("s1", &partial(&[("cta", "Go"), ("budget", "10k")]))
            .await
            .unwrap();

        assert_eq!(state.get("cta"), Some(&FieldValue::from("Go")));
        assert_eq!(
            store.missing_fields("s1").await.unwrap(),
            vec!["valueProp", "painPoints"]
        );
    }

    #[tokio::test]
    async fn repeated_merge_is_idempotent() {
        let store = MemorySessionStore::new(schema());
        let update = partial(&[("valueProp", "Fast")]);

        let first = store.merge("s1", &update).await.unwrap();
        let missing_after_first = store.missing_fields("s1").await.unwrap();
        let second = store.merge("s1", &update).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.missing_fields("s1").await.unwrap(), missing_after_first);
    }

    #[tokio::test]
    async fn completeness_is_monotonic_until_delete() {
        let store = MemorySessionStore::new(schema());
        store
            .merge(
                "s1",
                &partial(&[("valueProp", "Fast"), ("painPoints", "slow"), ("cta", "Go")]),
            )
            .await
            .unwrap();
        assert!(store.is_complete("s1").await.unwrap());

        store
            .merge("s1", &partial(&[("cta", "Buy now")]))
            .await
            .unwrap();
        assert!(store.is_complete("s1").await.unwrap());

        store.delete("s1").await.unwrap();
        assert!(!store.contains("s1"));
        assert!(!store.is_complete("s1").await.unwrap());
    }

    #[tokio::test]
    async fn take_complete_hands_off_exactly_once() {
        let store = MemorySessionStore::new(schema());
        store.merge("s1", &partial(&[("valueProp", "Fast")])).await.unwrap();
        assert!(store.take_complete("s1").await.unwrap().is_none());
        assert!(store.contains("s1"));

        store
            .merge("s1", &partial(&[("painPoints", "slow"), ("cta", "Go")]))
            .await
            .unwrap();

        let taken = store.take_complete("s1").await.unwrap().expect("complete");
        assert_eq!(taken.get("cta"), Some(&FieldValue::from("Go")));
        assert!(!store.contains("s1"));
        assert!(store.take_complete("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemorySessionStore::new(schema());
        store.get("s1").await.unwrap();

        store.delete("s1").await.unwrap();
        store.delete("s1").await.unwrap();
        store.delete("never-existed").await.unwrap();

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = MemorySessionStore::new(schema());
        store.merge("a", &partial(&[("cta", "Go")])).await.unwrap();

        assert!(store.get("b").await.unwrap().get("cta").is_none());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_merges_on_one_session_keep_every_field() {
        let store = Arc::new(MemorySessionStore::new(schema()));

        for round in 0..50 {
            let session_id = format!("s{round}");
            let handles: Vec<_> = ["valueProp", "painPoints", "cta"]
                .into_iter()
                .map(|field| {
                    let store = store.clone();
                    let session_id = session_id.clone();
                    tokio::spawn(async move {
                        store
                            .merge(&session_id, &partial(&[(field, "v")]))
                            .await
                            .unwrap();
                    })
                })
                .collect();
            for result in futures::future::join_all(handles).await {
                result.unwrap();
            }

            assert!(store.is_complete(&session_id).await.unwrap(), "round {round}");
        }
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let store = MemorySessionStore::new(schema()).with_idle_ttl(Duration::from_millis(20));
        store.merge("old", &partial(&[("cta", "Go")])).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        store.get("new").await.unwrap();

        assert_eq!(store.purge_expired(), 1);
        assert!(!store.contains("old"));
        assert!(store.contains("new"));
    }

    #[tokio::test]
    async fn peek_hides_expired_sessions_without_touching_them() {
        let store = MemorySessionStore::new(schema()).with_idle_ttl(Duration::from_millis(20));
        store.merge("s1", &partial(&[("cta", "Go")])).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.peek("s1").await.unwrap().is_none());
        assert_eq!(store.purge_expired(), 1);
    }

    #[tokio::test]
    async fn expired_session_is_reset_on_access() {
        let store = MemorySessionStore::new(schema()).with_idle_ttl(Duration::from_millis(20));
        store.merge("s1", &partial(&[("cta", "Go")])).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get("s1").await.unwrap().get("cta").is_none());
    }
}
