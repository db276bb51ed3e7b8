//! Console size for the pseudo console

use crate::error::{ConPtyError, Result};

/// Console dimensions in character cells.
///
/// The pseudo console calls take the size as a `COORD` passed by value, which the
/// platform ABI moves around as a single 32-bit word: rows in the high half,
/// columns in the low half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsoleSize {
    pub columns: i16,
    pub rows: i16,
}

impl ConsoleSize {
    pub const fn new(columns: i16, rows: i16) -> Self {
        Self { columns, rows }
    }

    /// Build a size for device creation or resize, rejecting non-positive dimensions
    pub fn validated(columns: i16, rows: i16) -> Result<Self> {
        if columns <= 0 || rows <= 0 {
            return Err(ConPtyError::InvalidArgument(format!(
                "console size must be positive, got {}x{}",
                columns, rows
            )));
        }
        Ok(Self::new(columns, rows))
    }

    /// Pack into the `COORD` word layout
    pub const fn pack(self) -> u32 {
        ((self.rows as u16 as u32) << 16) | (self.columns as u16 as u32)
    }

    /// Inverse of [`ConsoleSize::pack`]
    pub const fn unpack(word: u32) -> Self {
        Self {
            columns: word as u16 as i16,
            rows: (word >> 16) as u16 as i16,
        }
    }
}

impl Default for ConsoleSize {
    fn default() -> Self {
        Self::new(80, 25)
    }
}

impl From<ConsoleSize> for u32 {
    fn from(size: ConsoleSize) -> Self {
        size.pack()
    }
}

impl std::fmt::Display for ConsoleSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_layout() {
        assert_eq!(ConsoleSize::new(80, 25).pack(), 0x0019_0050);
        assert_eq!(ConsoleSize::new(0x1234, 0x5678).pack(), 0x5678_1234);
    }

    #[test]
    fn test_pack_negative_columns_stay_in_low_half() {
        // sign bits of the low half must not spill into the rows
        assert_eq!(ConsoleSize::new(-1, 0).pack(), 0x0000_FFFF);
        assert_eq!(ConsoleSize::new(0, -1).pack(), 0xFFFF_0000);
        assert_eq!(ConsoleSize::new(i16::MIN, i16::MIN).pack(), 0x8000_8000);
    }

    #[test]
    fn test_unpack_extremes() {
        for &(c, r) in &[
            (i16::MIN, i16::MIN),
            (i16::MIN, i16::MAX),
            (i16::MAX, i16::MIN),
            (i16::MAX, i16::MAX),
            (0, 0),
            (-1, -1),
        ] {
            let size = ConsoleSize::new(c, r);
            assert_eq!(ConsoleSize::unpack(size.pack()), size);
        }
    }

    #[test]
    fn test_validated() {
        assert_eq!(ConsoleSize::validated(80, 25).unwrap(), ConsoleSize::new(80, 25));
        assert!(matches!(
            ConsoleSize::validated(0, 25),
            Err(ConPtyError::InvalidArgument(_))
        ));
        assert!(matches!(
            ConsoleSize::validated(80, -3),
            Err(ConPtyError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_default_and_display() {
        let size = ConsoleSize::default();
        assert_eq!(size.to_string(), "80x25");
        assert_eq!(u32::from(size), size.pack());
    }

    proptest! {
        #[test]
        fn prop_pack_round_trips(columns in any::<i16>(), rows in any::<i16>()) {
            let size = ConsoleSize::new(columns, rows);
            prop_assert_eq!(ConsoleSize::unpack(size.pack()), size);
        }

        #[test]
        fn prop_halves_are_independent(columns in any::<i16>(), rows in any::<i16>()) {
            let word = ConsoleSize::new(columns, rows).pack();
            prop_assert_eq!((word & 0xFFFF) as u16, columns as u16);
            prop_assert_eq!((word >> 16) as u16, rows as u16);
        }
    }
}
