//! Core chart types.
//!
//! - State identifiers via the `State` trait
//! - The active `StateSnapshot` of a chart
//! - Bounded transition history
//! - Injectable clocks
//!
//! Nothing in this module touches the remote store or the gate hardware.

mod clock;
mod history;
mod snapshot;
mod state;

pub use clock::{display, Clock, ManualClock, SystemClock, DISPLAY_FORMAT};
pub use history::{StateHistory, StateTransition};
pub use snapshot::{Info, StateSnapshot};
pub use state::State;
