use core::fmt;
use core::num::NonZeroU32;

/// Declare a compact engine handle.
///
/// Handles store `index + 1` in a `NonZeroU32`, so `Option<Handle>` costs
/// nothing extra. Each handle is its own type: a connector id cannot be
/// passed where a reactor id is expected.
macro_rules! engine_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Handle for the object created at position `index`.
            ///
            /// Saturates at `u32::MAX - 1`.
            pub fn from_index(index: u32) -> Self {
                Self(NonZeroU32::new(index.saturating_add(1)).unwrap_or(NonZeroU32::MAX))
            }

            /// Creation position of the object.
            pub fn index(self) -> u32 {
                self.0.get() - 1
            }

            /// [`Self::index`] as a `usize`, for slice addressing.
            pub fn slot(self) -> usize {
                self.index() as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.index())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.index())
            }
        }
    };
}

engine_handle!(
    /// Reactor or reservoir, in engine creation order.
    ReactorId,
    "reactor"
);

engine_handle!(
    /// Flow connector, in engine creation order.
    ConnectorId,
    "connector"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_survives_the_offset() {
        for i in [0_u32, 1, 2, 42, 10_000] {
            let id = ReactorId::from_index(i);
            assert_eq!(id.index(), i);
            assert_eq!(id.slot(), i as usize);
        }
    }

    #[test]
    fn option_handle_is_free() {
        assert_eq!(
            core::mem::size_of::<ConnectorId>(),
            core::mem::size_of::<Option<ConnectorId>>()
        );
    }

    #[test]
    fn from_index_saturates() {
        assert_eq!(ReactorId::from_index(u32::MAX).index(), u32::MAX - 1);
    }

    #[test]
    fn debug_names_the_kind() {
        assert_eq!(format!("{:?}", ReactorId::from_index(3)), "reactor#3");
        assert_eq!(format!("{:?}", ConnectorId::from_index(0)), "connector#0");
        assert_eq!(ConnectorId::from_index(7).to_string(), "7");
    }
}
