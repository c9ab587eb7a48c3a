use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use num_traits::{Num, NumAssign, PrimInt, Unsigned};
use sprs::CompressedStorage;
use std::fmt::Debug;
use std::mem::size_of;

/// Numeric types that can be stored as the values of a compressed matrix.
pub trait Element: Copy + Debug + PartialEq + PartialOrd + Num + NumAssign + Send + Sync + 'static {
    /// True for IEEE floating point types
    const IS_FLOAT: bool;

    /// True for signed types (floating point types are signed)
    const IS_SIGNED: bool;

    /// Bit pattern of the value, zero-extended. Two values are grouped together
    /// by the codecs iff their bit patterns are equal, which keeps encoding lossless
    /// for `-0.0` and NaN payloads.
    fn bits(self) -> u64;

    /// Write the value little-endian into the first `size_of::<Self>()` bytes of `buf`
    fn write_le(self, buf: &mut [u8]);

    /// Read a little-endian value from the first `size_of::<Self>()` bytes of `buf`
    fn read_le(buf: &[u8]) -> Self;

    /// `self * rhs`, wrapping around on integer overflow
    fn scale(self, rhs: Self) -> Self;

    /// `self + a * b`, wrapping around on integer overflow
    fn mul_acc(self, a: Self, b: Self) -> Self;
}

fn read_u8(buf: &[u8]) -> u8 {
    buf[0]
}

fn write_u8(buf: &mut [u8], v: u8) {
    buf[0] = v;
}

fn read_i8(buf: &[u8]) -> i8 {
    buf[0] as i8
}

fn write_i8(buf: &mut [u8], v: i8) {
    buf[0] = v as u8;
}

macro_rules! impl_element {
    ($t:ty, float: $float:expr, signed: $signed:expr, read: $read:expr, write: $write:expr, bits: |$v:ident| $bits:expr, mul: $mul:expr, add: $add:expr) => {
        impl Element for $t {
            const IS_FLOAT: bool = $float;
            const IS_SIGNED: bool = $signed;

            #[inline]
            fn bits(self) -> u64 {
                let $v = self;
                $bits
            }

            #[inline]
            fn write_le(self, buf: &mut [u8]) {
                ($write)(buf, self)
            }

            #[inline]
            fn read_le(buf: &[u8]) -> Self {
                ($read)(buf)
            }

            #[inline]
            fn scale(self, rhs: Self) -> Self {
                ($mul)(self, rhs)
            }

            #[inline]
            fn mul_acc(self, a: Self, b: Self) -> Self {
                ($add)(self, ($mul)(a, b))
            }
        }
    };
}

impl_element!(u8, float: false, signed: false, read: read_u8, write: write_u8, bits: |v| v as u64, mul: u8::wrapping_mul, add: u8::wrapping_add);
impl_element!(u16, float: false, signed: false, read: LittleEndian::read_u16, write: LittleEndian::write_u16, bits: |v| v as u64, mul: u16::wrapping_mul, add: u16::wrapping_add);
impl_element!(u32, float: false, signed: false, read: LittleEndian::read_u32, write: LittleEndian::write_u32, bits: |v| v as u64, mul: u32::wrapping_mul, add: u32::wrapping_add);
impl_element!(u64, float: false, signed: false, read: LittleEndian::read_u64, write: LittleEndian::write_u64, bits: |v| v, mul: u64::wrapping_mul, add: u64::wrapping_add);
impl_element!(i8, float: false, signed: true, read: read_i8, write: write_i8, bits: |v| v as u8 as u64, mul: i8::wrapping_mul, add: i8::wrapping_add);
impl_element!(i16, float: false, signed: true, read: LittleEndian::read_i16, write: LittleEndian::write_i16, bits: |v| v as u16 as u64, mul: i16::wrapping_mul, add: i16::wrapping_add);
impl_element!(i32, float: false, signed: true, read: LittleEndian::read_i32, write: LittleEndian::write_i32, bits: |v| v as u32 as u64, mul: i32::wrapping_mul, add: i32::wrapping_add);
impl_element!(i64, float: false, signed: true, read: LittleEndian::read_i64, write: LittleEndian::write_i64, bits: |v| v as u64, mul: i64::wrapping_mul, add: i64::wrapping_add);
impl_element!(f32, float: true, signed: true, read: LittleEndian::read_f32, write: LittleEndian::write_f32, bits: |v| v.to_bits() as u64, mul: |a: f32, b: f32| a * b, add: |a: f32, b: f32| a + b);
impl_element!(f64, float: true, signed: true, read: LittleEndian::read_f64, write: LittleEndian::write_f64, bits: |v| v.to_bits(), mul: |a: f64, b: f64| a * b, add: |a: f64, b: f64| a + b);

/// Unsigned integer types usable as inner indices and per-value counts.
/// The byte width of the type is recorded in the header as the index width.
/// Conversions assume the value fits, which construction and loading check
/// against `max_u64` before encoding.
pub trait IndexType: PrimInt + Unsigned + Debug + Send + Sync + 'static {
    /// Largest value representable by the index type
    const MAX_INDEX: u64;

    /// The index as a `usize`
    fn index(self) -> usize;

    /// Index from a `usize` known to fit the type
    fn from_usize(i: usize) -> Self;

    /// Largest value representable by the index type
    fn max_u64() -> u64 {
        Self::MAX_INDEX
    }

    /// Width in bytes of the index type
    fn width() -> usize {
        size_of::<Self>()
    }
}

macro_rules! impl_index {
    ($($t:ty),*) => {
        $(
            impl IndexType for $t {
                const MAX_INDEX: u64 = <$t>::MAX as u64;

                #[inline]
                fn index(self) -> usize {
                    self as usize
                }

                #[inline]
                fn from_usize(i: usize) -> Self {
                    debug_assert!(<$t>::try_from(i).is_ok(), "index {i} does not fit {}", stringify!($t));
                    i as $t
                }
            }
        )*
    };
}

impl_index!(u8, u16, u32, u64, usize);

/// Packed description of the value type and storage order of a matrix:
/// byte0 = size of the element, byte1 = is floating point,
/// byte2 = is signed, byte3 = is column major.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeDescriptor(u32);

impl TypeDescriptor {
    /// Descriptor of element type `T` stored in `storage` order
    pub fn of<T: Element>(storage: CompressedStorage) -> TypeDescriptor {
        let byte0 = size_of::<T>() as u32;
        let byte1 = T::IS_FLOAT as u32;
        let byte2 = T::IS_SIGNED as u32;
        let byte3 = (storage == CompressedStorage::CSC) as u32;

        TypeDescriptor((byte3 << 24) | (byte2 << 16) | (byte1 << 8) | byte0)
    }

    /// Wrap a raw descriptor word read from a header
    pub fn from_raw(raw: u32) -> TypeDescriptor {
        TypeDescriptor(raw)
    }

    /// The packed descriptor word
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Size of the element type in bytes
    pub fn value_size(&self) -> u32 {
        self.0 & 0xFF
    }

    /// Whether the element type is floating point
    pub fn is_float(&self) -> bool {
        (self.0 >> 8) & 0xFF == 1
    }

    /// Whether the element type is signed
    pub fn is_signed(&self) -> bool {
        (self.0 >> 16) & 0xFF == 1
    }

    /// Whether the matrix is stored column major
    pub fn is_column_major(&self) -> bool {
        (self.0 >> 24) & 0xFF == 1
    }

    /// Storage order recorded in the descriptor
    pub fn storage(&self) -> CompressedStorage {
        if self.is_column_major() {
            CompressedStorage::CSC
        } else {
            CompressedStorage::CSR
        }
    }

    /// Check every field against element type `T` and `storage`.
    pub fn validate<T: Element>(&self, storage: CompressedStorage) -> Result<()> {
        let expected = TypeDescriptor::of::<T>(storage);

        let fields = [("value size", 0), ("floating point flag", 8), ("signed flag", 16), ("storage order", 24)];
        for (field, shift) in fields {
            let want = (expected.0 >> shift) & 0xFF;
            let got = (self.0 >> shift) & 0xFF;
            if want != got {
                return Err(Error::TypeMismatch {
                    field,
                    expected: want,
                    found: got,
                });
            }
        }

        Ok(())
    }
}
