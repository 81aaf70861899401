pub mod codec;
pub mod consensus;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod identity;
pub mod node;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_util;

pub use codec::WireLayout;
pub use engine::{CycleReport, EngineConfig, ReconciliationEngine};
pub use error::CoreError;
pub use node::{NodeClient, NodeConfig};
pub use store::{SchemaMigrator, Store};
