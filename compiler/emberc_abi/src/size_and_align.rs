#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
/// Size of a type in bytes.
pub struct Size(u64);

impl Size {
    pub const ZERO: Size = Size(0);

    /// Rounds `bits` up to the next-higher byte boundary, if `bits` is
    /// not a multiple of 8.
    pub fn from_bits(bits: impl TryInto<u64>) -> Size {
        let bits = bits.try_into().ok().unwrap_or(0);
        // Avoid potential overflow from `bits + 7`.
        Size(bits / 8 + (bits % 8).div_ceil(8))
    }

    #[inline]
    pub const fn from_bytes(bytes: u64) -> Size {
        Size(bytes)
    }

    /// Returns the size in bytes.
    #[inline]
    pub const fn bytes(&self) -> u64 {
        self.0
    }

    /// Rounds this size up to a multiple of `align`.
    ///
    /// Returns `None` on arithmetic overflow; aggregate layout treats that
    /// as a fatal sizing error rather than wrapping silently.
    pub fn align_to(self, align: Align) -> Option<Size> {
        let mask = align.bytes().max(1) - 1;
        self.0.checked_add(mask).map(|n| Size(n & !mask))
    }

    pub fn checked_add(self, other: Size) -> Option<Size> {
        self.0.checked_add(other.0).map(Size)
    }

    pub fn checked_mul(self, count: u64) -> Option<Size> {
        self.0.checked_mul(count).map(Size)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
/// Alignment of a type in bytes (always a power of two).
pub struct Align(u64);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AlignError {
    TooLarge(u64),
    NotPowerOfTwo(u64),
}

impl Align {
    pub const ONE: Align = Align(1);

    #[inline]
    /// Creates an `Align` from a byte count.
    ///
    /// An alignment of 0 bytes is treated like 1-byte alignment so that
    /// zero-sized types still report a power-of-two alignment.
    pub const fn from_bytes(align: u64) -> Result<Align, AlignError> {
        if align == 0 {
            return Ok(Align(1));
        }

        #[cold]
        const fn not_power_of_2(align: u64) -> AlignError {
            AlignError::NotPowerOfTwo(align)
        }

        #[cold]
        const fn too_large(align: u64) -> AlignError {
            AlignError::TooLarge(align)
        }

        // When `align` is 0, `align.trailing_zeros()` is 64 and `1 << tz`
        // would shift out of range; the early return above rules that out.
        let tz = align.trailing_zeros();
        if align != (1 << tz) {
            return Err(not_power_of_2(align));
        }

        if align > u64::MAX / 8 {
            return Err(too_large(align));
        }

        Ok(Align(align))
    }

    /// The natural alignment for a scalar of `size` bytes: the next power of
    /// two at or above `size`, capped at `cap` (the target pointer size).
    pub fn natural_for_size(size: Size, cap: Align) -> Align {
        let bytes = size.bytes().max(1).next_power_of_two();
        Align(bytes.min(cap.bytes()))
    }

    #[inline]
    pub const fn bytes(&self) -> u64 {
        self.0
    }

    pub fn max(self, other: Align) -> Align {
        if self.0 >= other.0 { self } else { other }
    }
}
