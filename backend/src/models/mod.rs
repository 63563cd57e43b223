pub mod contract_events;

pub use contract_events::{DecodedEvent, RawLog, SyncCursor, SyncStatus};
