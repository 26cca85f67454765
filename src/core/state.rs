//! State identifiers for gate charts.
//!
//! Every chart names its states with a plain enum implementing [`State`].
//! The engine keys its hook table by these values, so the set of states is
//! closed and known when the chart is built.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Trait for chart state identifiers.
///
/// All methods are pure. A state is a small copyable tag; the data that
/// belongs to a visit lives in the engine's [`StateSnapshot`](super::StateSnapshot).
///
/// # Example
///
/// ```rust
/// use parkgate::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Lamp {
///     Off,
///     On,
///     Broken,
/// }
///
/// impl State for Lamp {
///     const ALL: &'static [Self] = &[Self::Off, Self::On, Self::Broken];
///
///     fn name(&self) -> &str {
///         match self {
///             Self::Off => "off",
///             Self::On => "on",
///             Self::Broken => "broken",
///         }
///     }
///
///     fn is_error(&self) -> bool {
///         matches!(self, Self::Broken)
///     }
/// }
///
/// assert_eq!(Lamp::from_name("on"), Some(Lamp::On));
/// ```
pub trait State:
    Copy + Eq + Hash + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Every variant, in declaration order.
    const ALL: &'static [Self];

    /// Name used in logs and in the exported status view.
    fn name(&self) -> &str;

    /// Check if this is an error state. The engine logs entries into error
    /// states at `warn`.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }

    /// Look up a variant by its exported name.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|state| state.name() == name)
    }
}
