//! Durable [`KeyValueStore`](courseforge_core::KeyValueStore) backends.

mod file;

pub use file::FileKeyValueStore;
