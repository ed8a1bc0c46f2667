//! Storage modules for Relica
//!
//! Node-private data objects plus their JSON sidecar records.

pub mod content_store;
pub mod metadata_store;

pub use content_store::{ContentStore, STREAM_CHUNK_SIZE, stored_name_for};
pub use metadata_store::{MetadataStore, StoredObject};
