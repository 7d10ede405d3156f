pub mod error;
pub mod events;
pub mod extractor;
pub mod message;
pub mod scanner;
pub mod schema;
pub mod state;
pub mod storage;

pub use error::TurnError;
pub use events::CampaignEvent;
pub use extractor::decode;
pub use message::{ChatMessage, Role};
pub use scanner::{extract_markers, Marker, MarkerScanner, ScanItem, MARKER_TAG};
pub use schema::{CampaignSchema, FieldSpec};
pub use state::{CampaignState, FieldMap, FieldValue};
pub use storage::{MemorySessionStore, SessionStore, StoreError};
