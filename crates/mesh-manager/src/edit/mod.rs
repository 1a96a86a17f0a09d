//! Edit-diff/apply protocol
//!
//! A client edits a working copy of one peer and its connections; the copy
//! is diffed against the authoritative network into validated field changes
//! (changed / added / removed) that the manager then applies in order.

mod diff;
mod session;
pub mod validate;

pub use diff::{
    compute_diff, AddedConnection, ConnectionChange, ConnectionEdit, ConnectionFieldChange,
    EditDiff, PeerEdit, PeerFieldChange,
};
pub use session::{EditSession, EditState};
