//! Named state enumerations.
//!
//! A [`NamedState`] carries a static name table so states can be addressed by
//! string, e.g. from a config file or a REPL. [`define_states!`] declares an
//! enum together with that table.

use crate::error::{IndexError, Result};
use crate::types::State;

/// A state type with a fixed, fully known set of named values.
pub trait NamedState: State + 'static {
    /// Every value, in declaration order. The first one is the default.
    const ALL: &'static [Self];

    /// Canonical name of this value.
    fn name(self) -> &'static str;

    /// Look a value up by its canonical name.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// Like [`from_name`](Self::from_name) but reports unknown names.
    fn parse_name(name: &str) -> Result<Self> {
        Self::from_name(name).ok_or_else(|| IndexError::UnknownState(name.to_string()))
    }
}

/// Declare a state enum with a name table.
///
/// The first variant is the default, which the index reports for untracked
/// objects.
///
/// ```
/// state_partition::define_states! {
///     pub enum Color { White, Gray, Black }
/// }
///
/// use state_partition::NamedState;
/// assert_eq!(Color::default(), Color::White);
/// assert_eq!(Color::from_name("Gray"), Some(Color::Gray));
/// assert_eq!(Color::Black.to_string(), "Black");
/// ```
#[macro_export]
macro_rules! define_states {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $($variant:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($variant,)+
        }

        impl ::std::default::Default for $name {
            fn default() -> Self {
                <$name as $crate::NamedState>::ALL[0]
            }
        }

        impl $crate::NamedState for $name {
            const ALL: &'static [Self] = &[$($name::$variant,)+];

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::NamedState::name(*self))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::IndexError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                <$name as $crate::NamedState>::parse_name(s)
            }
        }
    };
}
