//! Macros for ergonomic chart construction.

/// Generate a state identifier enum and its `State` implementation.
///
/// Each variant is paired with the name it is exported under. The enum
/// derives everything the engine needs to key its hook table by it.
///
/// # Example
///
/// ```
/// use parkgate::core::State;
/// use parkgate::state_enum;
///
/// state_enum! {
///     pub enum Barrier {
///         Down => "down",
///         Up => "up",
///         Jammed => "jammed",
///     }
///     error: [Jammed]
/// }
///
/// assert_eq!(Barrier::Up.name(), "up");
/// assert_eq!(Barrier::from_name("jammed"), Some(Barrier::Jammed));
/// assert!(Barrier::Jammed.is_error());
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $label:literal
            ),* $(,)?
        }

        $(error: [$($error:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize,
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                #[serde(rename = $label)]
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),*];

            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => $label),*
                }
            }

            fn is_error(&self) -> bool {
                match self {
                    $($(Self::$error => true,)*)?
                    #[allow(unreachable_patterns)]
                    _ => false,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::core::State::name(self))
            }
        }
    };
}
