//! # syncline-document
//!
//! Content synchronization engine for Syncline. Keeps one editable
//! document eventually consistent with the remote authority while
//! editing is in progress:
//!
//! - Debounced propagation of local edits over the channel
//! - Application of remote updates with conflict detection
//! - Pluggable conflict-resolution policy (server/client/merge/manual)
//! - HTTP fallback for the initial fetch and offline saves

pub mod conflict;
pub mod debounce;
pub mod engine;
pub mod fallback;
pub mod state;

pub use conflict::{Conflict, ConflictResolution, ConflictView};
pub use engine::SyncEngine;
pub use fallback::{AuthorityClient, RemoteDocument};
pub use state::{DocumentSnapshot, SaveStatus};
