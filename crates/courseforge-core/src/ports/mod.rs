//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define what the engine expects from the network and from storage.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP client types in any signature
//! - Push and pull transports are separate ports so either can be faked
//! - Storage is a plain string key-value store; layout lives in `store`

pub mod event_source;
pub mod key_value;
pub mod task_status;

pub use event_source::{EventSourcePort, MessageStream};
pub use key_value::{KeyValueStore, MemoryKeyValueStore};
pub use task_status::TaskStatusPort;
