//! The four-bit condition flag word.

bitflags::bitflags! {
    /// VM status flags updated by flag-writing instructions and consulted
    /// by conditional execution.
    ///
    /// Only the low four bits of the flag byte have meaning.
    #[derive(Default)]
    pub struct Flags: u8 {
        /// Result was zero.
        const Z = 0b0001;
        /// Bit 31 of the result was set.
        const N = 0b0010;
        /// Unsigned carry or borrow out of bit 31.
        const C = 0b0100;
        /// Signed overflow.
        const V = 0b1000;
    }
}

impl Flags {
    /// Zero flag.
    pub fn z(self) -> bool {
        self.contains(Self::Z)
    }

    /// Negative flag.
    pub fn n(self) -> bool {
        self.contains(Self::N)
    }

    /// Carry flag.
    pub fn c(self) -> bool {
        self.contains(Self::C)
    }

    /// Overflow flag.
    pub fn v(self) -> bool {
        self.contains(Self::V)
    }

    /// Set Z and N from a result word, leaving C and V untouched.
    pub fn set_zn(&mut self, result: u32) {
        self.set(Self::Z, result == 0);
        self.set(Self::N, result & 0x8000_0000 != 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zn_from_result() {
        let mut f = Flags::C | Flags::V;
        f.set_zn(0);
        assert!(f.z() && !f.n());
        assert!(f.c() && f.v());

        f.set_zn(0x8000_0000);
        assert!(!f.z() && f.n());
    }
}
