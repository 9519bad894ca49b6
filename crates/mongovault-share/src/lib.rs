//! Serverless connection sharing: an encrypted envelope per connection, and a
//! bulk wrapper that carries many envelopes under one shared key.

pub mod codec;
pub mod orchestrator;

pub use codec::{ShareBundle, ShareKey};
pub use orchestrator::{
    BulkEntry, BulkExport, BulkShareBundle, ImportOutcome, ItemOutcome, KeySpec, ShareOrchestrator,
    ShareReport, SingleExport,
};
