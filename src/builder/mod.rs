//! Builder API for chart construction.
//!
//! This module provides the fluent [`ChartBuilder`] and the [`state_enum!`]
//! macro for declaring state identifiers with minimal boilerplate while
//! keeping the state set closed and checked at build time.
//!
//! [`state_enum!`]: crate::state_enum

pub mod chart;
pub mod error;
pub mod macros;

pub use chart::{ChartBuilder, ENGINE_COMPONENT};
pub use error::{BuildError, ChartViolation};
