//! # The `impl_opcodes!` macro
//!
//! The opcode table is declared exactly once, in [`crate::opcode`], and this
//! macro derives everything that must agree with it: the [`Opcode`] enum and
//! its byte values, the `TryFrom<u8>` decoding, the operand [`Layout`] (from
//! which instruction size is computed), and the mnemonic mapping used by the
//! assembler and disassembler.
//!
//! Interpreter, assembler and disassembler all consume this table; there is
//! deliberately no second copy of instruction sizing anywhere in the tree.
//!
//! Each row of the table is:
//!
//! ```rust,ignore
//! impl_opcodes! {
//!     "Integer addition."
//!     0x10 ADD "add" ThreeReg
//!     // ...
//! }
//! ```
//!
//! - A short docstring.
//! - The opcode byte value.
//! - The enum variant identifier.
//! - The assembly mnemonic.
//! - The operand layout variant.
//!
//! [`Opcode`]: crate::Opcode
//! [`Layout`]: crate::Layout

macro_rules! impl_opcodes {
    (
        $(
            $doc:literal
            $value:literal $Op:ident $mnemonic:literal $Layout:ident
        )*
    ) => {
        /// Solely the opcode portion of an instruction, as a single byte.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        pub enum Opcode {
            $(
                #[doc = $doc]
                $Op = $value,
            )*
        }

        impl Opcode {
            /// Operand layout of this opcode.
            pub const fn layout(self) -> Layout {
                match self {
                    $( Self::$Op => Layout::$Layout, )*
                }
            }

            /// Total instruction size in bytes, header included.
            pub const fn size(self) -> u32 {
                self.layout().size()
            }

            /// Canonical assembly mnemonic.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( Self::$Op => $mnemonic, )*
                }
            }

            /// Look up a base mnemonic. Legacy aliases and condition
            /// prefixes are an assembler concern and are not found here.
            pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
                match mnemonic {
                    $( $mnemonic => Some(Self::$Op), )*
                    _ => None,
                }
            }
        }

        impl TryFrom<u8> for Opcode {
            type Error = InvalidOpcode;

            fn try_from(byte: u8) -> Result<Self, InvalidOpcode> {
                match byte {
                    $( $value => Ok(Self::$Op), )*
                    _ => Err(InvalidOpcode(byte)),
                }
            }
        }
    };
}
