//! Remote synchronization shared by every gate component.
//!
//! Each component (chart engine, detector facade, controller facades) owns a
//! [`Namespace`] with a `status`, `command`, `heartbeat` and, for the
//! controller, `config` child. The discipline is the same everywhere:
//!
//! - publish the exported view only when it differs from the stored value
//! - refresh the heartbeat at a fixed cadence
//! - pull at most one command per poll and always clear the slot

mod command;
mod status;
mod store;

pub use command::{Command, CommandChannel, CommandTable, Dispatch, Handler};
pub use status::{Heartbeat, StatusPublisher};
pub use store::{Change, MemoryStore, Namespace, RemoteStore, StoreError};
