use std::ops::RangeInclusive;

/// Bit-field helpers shared by every decoder in the crate.
/// Bit indices go from lsb to msb (right to left).
pub trait Bits: Copy {
    const WIDTH: u8;

    fn get_bit(self, bit_idx: u8) -> bool;

    fn set_bit(&mut self, bit_idx: u8, value: bool);

    /// Extracts `bits_range` and moves it down to bit 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;

    fn get_byte(self, byte_nth: u8) -> u8;

    fn set_byte(&mut self, byte_nth: u8, value: u8);

    /// Returns a sign-extended copy of the lowest `number_of_bits` bits.
    fn sign_extended(self, number_of_bits: u8) -> Self;
}

macro_rules! impl_bits {
    ($($ty:ty),*) => {
        $(
            impl Bits for $ty {
                #[allow(clippy::cast_possible_truncation)]
                const WIDTH: u8 = <$ty>::BITS as u8;

                fn get_bit(self, bit_idx: u8) -> bool {
                    debug_assert!(bit_idx < Self::WIDTH);
                    (self >> bit_idx) & 1 != 0
                }

                fn set_bit(&mut self, bit_idx: u8, value: bool) {
                    debug_assert!(bit_idx < Self::WIDTH);
                    if value {
                        *self |= 1 << bit_idx;
                    } else {
                        *self &= !(1 << bit_idx);
                    }
                }

                fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                    let start = *bits_range.start();
                    let end = *bits_range.end();
                    debug_assert!(start <= end && end < Self::WIDTH);

                    // `length` ones, built without overflowing when the range
                    // covers the whole value.
                    let length = end - start + 1;
                    let mask = <$ty>::MAX >> (Self::WIDTH - length);
                    (self >> start) & mask
                }

                #[allow(clippy::cast_possible_truncation)]
                fn get_byte(self, byte_nth: u8) -> u8 {
                    debug_assert!(byte_nth < Self::WIDTH / 8);
                    (self >> (byte_nth * 8)) as u8
                }

                fn set_byte(&mut self, byte_nth: u8, value: u8) {
                    debug_assert!(byte_nth < Self::WIDTH / 8);
                    let shift = byte_nth * 8;
                    *self = (*self & !(0xFF << shift)) | (Self::from(value) << shift);
                }

                fn sign_extended(self, number_of_bits: u8) -> Self {
                    debug_assert!(number_of_bits > 0 && number_of_bits <= Self::WIDTH);
                    // Park the sign bit at the top, then let the arithmetic
                    // shift drag it back down.
                    let unused = Self::WIDTH - number_of_bits;
                    (((self << unused) as <$ty as Signed>::Type) >> unused) as $ty
                }
            }
        )*
    };
}

trait Signed {
    type Type;
}

impl Signed for u8 {
    type Type = i8;
}

impl Signed for u16 {
    type Type = i16;
}

impl Signed for u32 {
    type Type = i32;
}

impl Signed for u64 {
    type Type = i64;
}

impl_bits!(u8, u16, u32, u64);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    #[test]
    fn get_bit() {
        let b = 0b10_1100_1110_u32;
        assert!(b.get_bit(1));
        assert!(!b.get_bit(0));
        assert!(b.get_bit(2));
        assert!(!b.get_bit(31));
    }

    #[test]
    fn set_bit() {
        let mut b = 0b110_0110_u32;
        b.set_bit(0, true);
        b.set_bit(1, true);
        b.set_bit(2, false);
        b.set_bit(3, false);
        assert_eq!(b, 0b110_0011);
    }

    #[test]
    fn set_bit_twice_is_stable() {
        let original = rand::thread_rng().gen_range(1..u32::MAX);
        let mut value = original;
        for i in 0..32 {
            let bit = value.get_bit(i);
            value.set_bit(i, !bit);
            value.set_bit(i, bit);
        }
        assert_eq!(value, original);
    }

    #[test]
    fn get_bits() {
        let b = 0b10_1100_1110_u32;
        assert_eq!(b.get_bits(0..=3), 0b1110);
        assert_eq!(b.get_bits(1..=1), 0b1);
        assert_eq!(b.get_bits(4..=7), 0b1100);
        assert_eq!(b.get_bits(8..=9), 0b10);
        assert_eq!(b.get_bits(0..=31), 0b10_1100_1110);
        assert_eq!(b.get_bits(28..=31), 0);
        assert_eq!(0xF800_0000_u32.get_bits(27..=31), 0x1F);
    }

    #[test]
    fn get_byte() {
        let b: u32 = 0x0122_0448;

        assert_eq!(b.get_byte(0), 0x48);
        assert_eq!(b.get_byte(1), 0x04);
        assert_eq!(b.get_byte(2), 0x22);
        assert_eq!(b.get_byte(3), 0x01);
    }

    #[test]
    #[should_panic]
    fn get_byte_panic() {
        let b: u16 = 0x1234;
        b.get_byte(2);
    }

    #[test]
    fn set_byte() {
        let mut b: u32 = 0xFFFF_FFFF;
        b.set_byte(2, 0xAA);
        assert_eq!(b, 0xFFAA_FFFF);

        let mut h: u16 = 0;
        h.set_byte(1, 0x12);
        h.set_byte(0, 0x34);
        assert_eq!(h, 0x1234);
    }

    #[test]
    fn check_sign_extended() {
        assert_eq!(0b1001_u32.sign_extended(4), 0xFFFF_FFF9);
        assert_eq!(0b0111_u32.sign_extended(4), 7);
        assert_eq!(0x20_0000_u32.sign_extended(22), 0xFFE0_0000);
        assert_eq!(0x80_u16.sign_extended(8), 0xFF80);
    }
}
