//! Condition codes carried in bits 15..13 of every instruction header.
//!
//! The three bits decompose as `(ztest, signed, invert)`: the base predicate
//! is built from the Z/N/V flags and the result is XORed with the invert bit.
//! This is why every condition has a complement three rows away in the table.

use core::fmt;

use crate::Flags;

/// Conditional-execution predicate attached to an instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Cond {
    /// Execute unconditionally.
    #[default]
    Always = 0b000,
    /// Not equal (Z clear).
    Ne = 0b001,
    /// Signed greater-or-equal (N = V).
    Ge = 0b010,
    /// Signed greater-than (Z clear and N = V).
    Gt = 0b011,
    /// Never execute.
    Never = 0b100,
    /// Equal (Z set).
    Eq = 0b101,
    /// Signed less-than (N ≠ V).
    Lt = 0b110,
    /// Signed less-or-equal (Z set or N ≠ V).
    Le = 0b111,
}

impl Cond {
    /// Decode from the low three bits.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Self::Always,
            0b001 => Self::Ne,
            0b010 => Self::Ge,
            0b011 => Self::Gt,
            0b100 => Self::Never,
            0b101 => Self::Eq,
            0b110 => Self::Lt,
            _ => Self::Le,
        }
    }

    /// The three encoding bits.
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Evaluate the predicate against the current flag word.
    pub fn eval(self, flags: Flags) -> bool {
        let bits = self as u8;
        let ztest = bits & 0b001 != 0;
        let signed = bits & 0b010 != 0;
        let invert = bits & 0b100 != 0;

        let base = match (ztest, signed) {
            (true, true) => !flags.z() && flags.n() == flags.v(),
            (true, false) => !flags.z(),
            (false, true) => flags.n() == flags.v(),
            (false, false) => true,
        };

        base != invert
    }

    /// Mnemonic suffix used in `if<cond>` prefixes; empty for [`Cond::Always`].
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Always => "",
            Self::Ne => "ne",
            Self::Ge => "ge",
            Self::Gt => "gt",
            Self::Never => "never",
            Self::Eq => "eq",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }

    /// Look up a prefix suffix, accepting the `z`/`nz` spellings.
    pub fn from_suffix(s: &str) -> Option<Self> {
        let cond = match s {
            "" | "always" => Self::Always,
            "ne" | "nz" => Self::Ne,
            "ge" => Self::Ge,
            "gt" => Self::Gt,
            "never" => Self::Never,
            "eq" | "z" => Self::Eq,
            "lt" => Self::Lt,
            "le" => Self::Le,
            _ => return None,
        };
        Some(cond)
    }
}

impl From<u8> for Cond {
    fn from(bits: u8) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl fmt::Display for Cond {
    /// Canonical textual prefix: empty for ALWAYS, `if<suffix>` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => Ok(()),
            _ => write!(f, "if{}", self.suffix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[test]
    fn bits_round_trip() {
        for cond in Cond::iter() {
            assert_eq!(Cond::from_bits_truncate(cond.bits()), cond);
        }
    }

    #[test]
    fn complement_pairs_invert() {
        // bit 2 flips the predicate for every flag combination
        for bits in 0..8u8 {
            let cond = Cond::from_bits_truncate(bits);
            let inv = Cond::from_bits_truncate(bits ^ 0b100);
            for raw in 0..16u8 {
                let flags = Flags::from_bits_truncate(raw);
                assert_ne!(cond.eval(flags), inv.eval(flags));
            }
        }
    }

    #[test]
    fn eval_matches_comparison_semantics() {
        // flags as CMP a, b would leave them
        let eq = Flags::Z;
        let lt = Flags::N; // N != V
        let gt = Flags::empty();

        assert!(Cond::Eq.eval(eq) && !Cond::Eq.eval(lt) && !Cond::Eq.eval(gt));
        assert!(!Cond::Ne.eval(eq) && Cond::Ne.eval(lt) && Cond::Ne.eval(gt));
        assert!(!Cond::Lt.eval(eq) && Cond::Lt.eval(lt) && !Cond::Lt.eval(gt));
        assert!(Cond::Le.eval(eq) && Cond::Le.eval(lt) && !Cond::Le.eval(gt));
        assert!(!Cond::Gt.eval(eq) && !Cond::Gt.eval(lt) && Cond::Gt.eval(gt));
        assert!(Cond::Ge.eval(eq) && !Cond::Ge.eval(lt) && Cond::Ge.eval(gt));

        for raw in 0..16u8 {
            let flags = Flags::from_bits_truncate(raw);
            assert!(Cond::Always.eval(flags));
            assert!(!Cond::Never.eval(flags));
        }
    }

    #[rstest]
    #[case("eq", Some(Cond::Eq))]
    #[case("z", Some(Cond::Eq))]
    #[case("ne", Some(Cond::Ne))]
    #[case("nz", Some(Cond::Ne))]
    #[case("lt", Some(Cond::Lt))]
    #[case("le", Some(Cond::Le))]
    #[case("gt", Some(Cond::Gt))]
    #[case("ge", Some(Cond::Ge))]
    #[case("never", Some(Cond::Never))]
    #[case("always", Some(Cond::Always))]
    #[case("", Some(Cond::Always))]
    #[case("xx", None)]
    #[case("EQ", None)]
    fn suffix_lookup(#[case] suffix: &str, #[case] expected: Option<Cond>) {
        assert_eq!(Cond::from_suffix(suffix), expected);
    }
}
