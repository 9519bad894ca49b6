//! Storage contracts shared by the vault and the concrete stores.

mod record_store;

pub use record_store::{InMemoryRecordStore, RecordStore, RecordStoreError};
