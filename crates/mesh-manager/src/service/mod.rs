//! Mesh orchestration service

mod manager;

pub use manager::{
    ApplyOutcome, AttachedPeer, CreateConnectionRequest, CreatePeerRequest, ManagerStatus,
    MeshManager, PeerSummary, Preamble, ROOT_PEER_NAME,
};
