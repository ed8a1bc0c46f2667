//! Relica Core - storage node engine for a small replicated blob cluster
//!
//! Each node:
//! - streams uploads to a node-private directory, hashing with SHA256 on the way
//! - fans original uploads out to every peer, tagging them as replicas
//! - reports placement (and failed peers) to an external naming service
//! - resolves identifiers to data objects for download and delete

pub mod error;
pub mod identity;
pub mod media_type;
pub mod naming;
pub mod operations;
pub mod placement;
pub mod replication;
pub mod storage;
pub mod topology;
pub mod transport;

pub use error::{RelicaError, Result};
pub use identity::{ContentDigest, FileId, assign_identity, compute_hash};
pub use media_type::{DEFAULT_MEDIA_TYPE, media_type_for};
pub use naming::{
    DEFAULT_NAMING_TIMEOUT, FileRegistration, HttpNamingClient, LocationRegistration,
    NamingService,
};
pub use operations::*;
pub use placement::{PlacementReport, PlacementReporter, PlacementSummary};
pub use replication::{DEFAULT_PEER_TIMEOUT, ReplicationCoordinator, ReplicationOutcome};
pub use storage::{ContentStore, MetadataStore, STREAM_CHUNK_SIZE, StoredObject, stored_name_for};
pub use topology::{NodeInfo, NodeTopology};
pub use transport::{ClusterClient, PeerTransport, ReplicaPush};
