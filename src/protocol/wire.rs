//! Wire Format Primitives
//!
//! Layout buffer yang sudah di-finish:
//! ┌──────────────────────────────────────────────────────────┐
//! │ [size prefix u32]? │ root uoffset u32 │ [file ident 4B]? │
//! ├──────────────────────────────────────────────────────────┤
//! │ vtables, records, strings, vectors (bottom-up, relative) │
//! └──────────────────────────────────────────────────────────┘
//!
//! - Record: i32 soffset ke field table, lalu inline fields
//! - Field table (vtable): u16 table size, u16 record size, u16 per slot
//! - String: u32 length, bytes, zero byte
//! - Vector: u32 count, packed elements atau u32 uoffsets
//!
//! Semua scalar little-endian dan aligned ke natural size-nya.

use std::fmt;
use std::marker::PhantomData;

use byteorder::{ByteOrder, LittleEndian};

use super::error::{Error, Result};

pub const SIZE_UOFFSET: usize = 4;
pub const SIZE_SOFFSET: usize = 4;
pub const SIZE_VOFFSET: usize = 2;
pub const SIZE_PREFIX: usize = 4;
pub const FILE_IDENTIFIER_LENGTH: usize = 4;

/// u16 table size + u16 record size
pub const VTABLE_HEADER_SIZE: usize = 2 * SIZE_VOFFSET;

/// Batas default ukuran buffer (2^31 - 1), agar semua offset muat di i32
pub const MAX_BUFFER_SIZE: usize = (1 << 31) - 1;

/// Slot maksimum yang masih muat di vtable dengan panjang u16
pub const MAX_SLOTS: usize = (u16::MAX as usize - VTABLE_HEADER_SIZE) / SIZE_VOFFSET;

/// Tipe scalar fixed-width yang didukung wire format
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool = 0,
    I8 = 1,
    U8 = 2,
    I16 = 3,
    U16 = 4,
    I32 = 5,
    U32 = 6,
    I64 = 7,
    U64 = 8,
    F32 = 9,
    F64 = 10,
}

impl ScalarType {
    /// Ukuran (dan alignment) dalam bytes
    #[inline(always)]
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "int8",
            Self::U8 => "uint8",
            Self::I16 => "int16",
            Self::U16 => "uint16",
            Self::I32 => "int32",
            Self::U32 => "uint32",
            Self::I64 => "int64",
            Self::U64 => "uint64",
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scalar yang bisa ditulis/dibaca langsung dari buffer.
///
/// `read_le`/`write_le` mengasumsikan slice minimal `SIZE` bytes;
/// bounds check dilakukan oleh pemanggil.
pub trait Scalar: Copy + PartialEq + fmt::Debug + 'static {
    const SIZE: usize;
    const KIND: ScalarType;

    fn read_le(buf: &[u8]) -> Self;
    fn write_le(self, buf: &mut [u8]);
}

macro_rules! impl_scalar {
    ($ty:ty, $kind:ident, $read:ident, $write:ident) => {
        impl Scalar for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();
            const KIND: ScalarType = ScalarType::$kind;

            #[inline(always)]
            fn read_le(buf: &[u8]) -> Self {
                LittleEndian::$read(buf)
            }

            #[inline(always)]
            fn write_le(self, buf: &mut [u8]) {
                LittleEndian::$write(buf, self)
            }
        }
    };
}

impl_scalar!(i16, I16, read_i16, write_i16);
impl_scalar!(u16, U16, read_u16, write_u16);
impl_scalar!(i32, I32, read_i32, write_i32);
impl_scalar!(u32, U32, read_u32, write_u32);
impl_scalar!(i64, I64, read_i64, write_i64);
impl_scalar!(u64, U64, read_u64, write_u64);
impl_scalar!(f32, F32, read_f32, write_f32);
impl_scalar!(f64, F64, read_f64, write_f64);

impl Scalar for u8 {
    const SIZE: usize = 1;
    const KIND: ScalarType = ScalarType::U8;

    #[inline(always)]
    fn read_le(buf: &[u8]) -> Self {
        buf[0]
    }

    #[inline(always)]
    fn write_le(self, buf: &mut [u8]) {
        buf[0] = self;
    }
}

impl Scalar for i8 {
    const SIZE: usize = 1;
    const KIND: ScalarType = ScalarType::I8;

    #[inline(always)]
    fn read_le(buf: &[u8]) -> Self {
        buf[0] as i8
    }

    #[inline(always)]
    fn write_le(self, buf: &mut [u8]) {
        buf[0] = self as u8;
    }
}

impl Scalar for bool {
    const SIZE: usize = 1;
    const KIND: ScalarType = ScalarType::Bool;

    #[inline(always)]
    fn read_le(buf: &[u8]) -> Self {
        buf[0] != 0
    }

    #[inline(always)]
    fn write_le(self, buf: &mut [u8]) {
        buf[0] = self as u8;
    }
}

/// Marker: offset ke string
pub enum StrMarker {}
/// Marker: offset ke vector
pub enum VectorMarker {}
/// Marker: offset ke record
pub enum TableMarker {}

/// Handle ke object yang sudah ditulis oleh `Builder`.
///
/// Disimpan sebagai jarak dari akhir buffer (revloc), sehingga tetap valid
/// walaupun buffer di-grow. Nilai mentahnya tidak pernah diekspos; hanya
/// builder yang mengubahnya menjadi relative offset saat di-reference.
pub struct Offset<T> {
    revloc: u32,
    _marker: PhantomData<T>,
}

impl<T> Offset<T> {
    #[inline(always)]
    pub(crate) fn new(revloc: usize) -> Self {
        Self {
            revloc: revloc as u32,
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    pub(crate) fn revloc(&self) -> usize {
        self.revloc as usize
    }
}

impl<T> Clone for Offset<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Offset<T> {}

impl<T> PartialEq for Offset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.revloc == other.revloc
    }
}

impl<T> Eq for Offset<T> {}

impl<T> fmt::Debug for Offset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset({})", self.revloc)
    }
}

/// Jumlah padding agar `len` menjadi kelipatan `alignment` (power of 2)
#[inline(always)]
pub const fn padding_bytes(len: usize, alignment: usize) -> usize {
    (!len).wrapping_add(1) & (alignment - 1)
}

/// Baca scalar di `pos` dengan bounds check.
#[inline(always)]
pub(crate) fn read_scalar_at<T: Scalar>(buf: &[u8], pos: usize) -> Result<T> {
    match pos.checked_add(T::SIZE) {
        Some(end) if end <= buf.len() => Ok(T::read_le(&buf[pos..end])),
        _ => Err(Error::corrupt(pos, "scalar read out of bounds")),
    }
}

/// Resolve uoffset yang tersimpan di `pos` menjadi posisi target.
///
/// Satu-satunya tempat relative offset diubah menjadi posisi. Offset harus
/// non-zero dan maju, sehingga traversal selalu berhenti.
#[inline(always)]
pub(crate) fn follow_offset(buf: &[u8], pos: usize) -> Result<usize> {
    let rel = read_scalar_at::<u32>(buf, pos)? as usize;
    if rel == 0 {
        return Err(Error::corrupt(pos, "zero relative offset"));
    }
    match pos.checked_add(rel) {
        Some(target) if target < buf.len() => Ok(target),
        _ => Err(Error::corrupt(pos, "relative offset points past end of buffer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(<i16 as Scalar>::SIZE, ScalarType::I16.size());
        assert_eq!(<f64 as Scalar>::SIZE, ScalarType::F64.size());
        assert_eq!(<bool as Scalar>::SIZE, 1);
        assert_eq!(<u64 as Scalar>::KIND, ScalarType::U64);
    }

    #[test]
    fn test_scalar_little_endian() {
        let mut buf = [0u8; 4];
        0x0403_0201u32.write_le(&mut buf);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(u32::read_le(&buf), 0x0403_0201);

        let mut buf = [0u8; 2];
        (-2i16).write_le(&mut buf);
        assert_eq!(buf, [0xFE, 0xFF]);
    }

    #[test]
    fn test_padding_bytes() {
        assert_eq!(padding_bytes(0, 4), 0);
        assert_eq!(padding_bytes(1, 4), 3);
        assert_eq!(padding_bytes(6, 4), 2);
        assert_eq!(padding_bytes(9, 8), 7);
        assert_eq!(padding_bytes(5, 1), 0);
    }

    #[test]
    fn test_follow_offset_bounds() {
        // uoffset 4 di posisi 0 -> target 4
        let buf = [4u8, 0, 0, 0, 0xAA, 0, 0, 0];
        assert_eq!(follow_offset(&buf, 0).unwrap(), 4);

        // Menunjuk ke luar buffer
        let buf = [8u8, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            follow_offset(&buf, 0),
            Err(Error::CorruptBuffer { position: 0, .. })
        ));

        // Zero offset ditolak
        let buf = [0u8; 8];
        assert!(follow_offset(&buf, 0).is_err());

        // Offset field sendiri terpotong
        assert!(follow_offset(&buf, 6).is_err());
    }

    #[test]
    fn test_read_scalar_overflow() {
        let buf = [0u8; 4];
        assert!(read_scalar_at::<u32>(&buf, usize::MAX - 1).is_err());
        assert!(read_scalar_at::<u64>(&buf, 0).is_err());
    }
}
