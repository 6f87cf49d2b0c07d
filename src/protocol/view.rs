//! Reader View: Zero-Copy Access
//!
//! Overlay read-only di atas `&[u8]`. Offset di-resolve secara lazy; setiap
//! offset/length di-bounds-check tepat saat di-dereference, sehingga buffer
//! dari sumber tidak dipercaya tidak pernah menyebabkan read di luar batas.
//!
//! Semua view adalah `Copy` dan hanya meminjam buffer, jadi aman dibagi
//! ke banyak reader sekaligus.

use std::fmt;
use std::marker::PhantomData;

use super::error::{Error, Result};
use super::verifier::{self, VerifierOptions};
use super::wire::{
    follow_offset, read_scalar_at, Scalar, FILE_IDENTIFIER_LENGTH, SIZE_PREFIX, SIZE_UOFFSET,
    SIZE_VOFFSET, VTABLE_HEADER_SIZE,
};
use crate::schema::Schema;

/// Opsi untuk `BufferView::open_with`
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// Walk seluruh graph sekali sebelum `open` sukses
    pub strict: bool,
    /// File identifier yang wajib ada
    pub file_identifier: Option<[u8; FILE_IDENTIFIER_LENGTH]>,
    /// Batas untuk mode strict
    pub verifier: VerifierOptions,
}

impl ReaderOptions {
    /// Opsi strict dengan batas default
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_file_identifier(mut self, identifier: [u8; FILE_IDENTIFIER_LENGTH]) -> Self {
        self.file_identifier = Some(identifier);
        self
    }

    pub fn with_verifier(mut self, verifier: VerifierOptions) -> Self {
        self.verifier = verifier;
        self
    }
}

/// View atas buffer yang sudah di-finish
#[derive(Clone, Copy)]
pub struct BufferView<'a> {
    buf: &'a [u8],
    /// Posisi root uoffset (0, atau 4 untuk buffer size-prefixed)
    root_at: usize,
}

impl<'a> BufferView<'a> {
    /// Open lazy: hanya memastikan root header muat.
    pub fn open(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < SIZE_UOFFSET {
            return Err(Error::TruncatedBuffer {
                needed: SIZE_UOFFSET,
                actual: buf.len(),
            });
        }
        Ok(Self { buf, root_at: 0 })
    }

    /// Open buffer dengan u32 size prefix.
    ///
    /// Bytes setelah `4 + prefix` diabaikan (framing transport).
    pub fn open_size_prefixed(buf: &'a [u8]) -> Result<Self> {
        let needed = SIZE_PREFIX + SIZE_UOFFSET;
        if buf.len() < needed {
            return Err(Error::TruncatedBuffer {
                needed,
                actual: buf.len(),
            });
        }
        let len = read_scalar_at::<u32>(buf, 0)? as usize;
        let total = SIZE_PREFIX.saturating_add(len);
        if total > buf.len() {
            return Err(Error::TruncatedBuffer {
                needed: total,
                actual: buf.len(),
            });
        }
        if len < SIZE_UOFFSET {
            return Err(Error::corrupt(0, "size prefix smaller than root header"));
        }
        Ok(Self {
            buf: &buf[..total],
            root_at: SIZE_PREFIX,
        })
    }

    /// Open dengan opsi; mode strict memverifikasi seluruh graph dari root
    /// memakai descriptor root di `schema`.
    pub fn open_with(buf: &'a [u8], options: &ReaderOptions, schema: &Schema) -> Result<Self> {
        let view = Self::open(buf)?;
        view.check_options(options, schema)?;
        Ok(view)
    }

    /// `open_with` untuk buffer size-prefixed
    pub fn open_size_prefixed_with(
        buf: &'a [u8],
        options: &ReaderOptions,
        schema: &Schema,
    ) -> Result<Self> {
        let view = Self::open_size_prefixed(buf)?;
        view.check_options(options, schema)?;
        Ok(view)
    }

    /// Shortcut: open + strict verification
    pub fn open_strict(buf: &'a [u8], schema: &Schema) -> Result<Self> {
        Self::open_with(buf, &ReaderOptions::strict(), schema)
    }

    fn check_options(&self, options: &ReaderOptions, schema: &Schema) -> Result<()> {
        if let Some(id) = options.file_identifier {
            if !self.has_identifier(&id) {
                return Err(Error::corrupt(
                    self.root_at + SIZE_UOFFSET,
                    "file identifier mismatch",
                ));
            }
        }
        if options.strict {
            let root = schema.root_record()?;
            verifier::verify(self, schema, root, &options.verifier)?;
        }
        Ok(())
    }

    /// Cek file identifier setelah root offset
    pub fn has_identifier(&self, identifier: &[u8; FILE_IDENTIFIER_LENGTH]) -> bool {
        let start = self.root_at + SIZE_UOFFSET;
        self.buf
            .get(start..start + FILE_IDENTIFIER_LENGTH)
            .map_or(false, |id| id == identifier)
    }

    /// Root record (resolve lazy)
    pub fn root(&self) -> Result<TableView<'a>> {
        let pos = follow_offset(self.buf, self.root_at)?;
        TableView::at(self.buf, pos)
    }

    /// Bytes buffer (termasuk size prefix jika ada)
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl fmt::Debug for BufferView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("len", &self.buf.len())
            .field("root_at", &self.root_at)
            .finish()
    }
}

/// View atas satu record
#[derive(Clone, Copy)]
pub struct TableView<'a> {
    buf: &'a [u8],
    pos: usize,
    vtable: usize,
    vtable_len: usize,
    object_len: usize,
}

impl<'a> TableView<'a> {
    /// Validasi header record dan field table-nya
    pub(crate) fn at(buf: &'a [u8], pos: usize) -> Result<Self> {
        let soffset = read_scalar_at::<i32>(buf, pos)?;
        let vtable = pos as i64 - soffset as i64;
        if vtable < 0 || vtable as usize >= buf.len() {
            return Err(Error::corrupt(pos, "field table offset out of bounds"));
        }
        let vtable = vtable as usize;

        let vtable_len = read_scalar_at::<u16>(buf, vtable)? as usize;
        let object_len = read_scalar_at::<u16>(buf, vtable + SIZE_VOFFSET)? as usize;
        if vtable_len < VTABLE_HEADER_SIZE || vtable_len % SIZE_VOFFSET != 0 {
            return Err(Error::corrupt(vtable, "malformed field table length"));
        }
        if vtable + vtable_len > buf.len() {
            return Err(Error::corrupt(vtable, "field table extends past end of buffer"));
        }
        if object_len < SIZE_UOFFSET || pos + object_len > buf.len() {
            return Err(Error::corrupt(pos, "record extends past end of buffer"));
        }

        Ok(Self {
            buf,
            pos,
            vtable,
            vtable_len,
            object_len,
        })
    }

    /// Posisi record dalam buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Jumlah slot di field table (termasuk slot kosong)
    pub fn slot_count(&self) -> usize {
        (self.vtable_len - VTABLE_HEADER_SIZE) / SIZE_VOFFSET
    }

    /// Ukuran inline record (soffset + fields)
    pub fn inline_size(&self) -> usize {
        self.object_len
    }

    /// Offset field relatif ke awal record, tanpa validasi isi field
    pub fn slot_offset(&self, slot: u16) -> Option<u16> {
        let entry = VTABLE_HEADER_SIZE + slot as usize * SIZE_VOFFSET;
        if entry + SIZE_VOFFSET > self.vtable_len {
            return None;
        }
        // Bounds field table sudah dicek di `at`
        let offset = u16::read_le(&self.buf[self.vtable + entry..self.vtable + entry + 2]);
        (offset != 0).then_some(offset)
    }

    /// Posisi absolut field dengan ukuran inline `size`, atau None jika absent.
    ///
    /// Slot di luar field table dianggap absent (record dari schema lama).
    pub(crate) fn field_position(&self, slot: u16, size: usize) -> Result<Option<usize>> {
        let offset = match self.slot_offset(slot) {
            Some(offset) => offset as usize,
            None => return Ok(None),
        };
        if offset < SIZE_UOFFSET || offset + size > self.object_len {
            return Err(Error::corrupt(
                self.vtable + VTABLE_HEADER_SIZE + slot as usize * SIZE_VOFFSET,
                "field lies outside its record",
            ));
        }
        Ok(Some(self.pos + offset))
    }

    /// Presence check
    pub fn has_field(&self, slot: u16) -> bool {
        self.slot_offset(slot).is_some()
    }

    /// Scalar field, atau `default` jika absent
    #[inline(always)]
    pub fn get<T: Scalar>(&self, slot: u16, default: T) -> Result<T> {
        Ok(self.get_opt(slot)?.unwrap_or(default))
    }

    /// Scalar field tanpa default
    pub fn get_opt<T: Scalar>(&self, slot: u16) -> Result<Option<T>> {
        match self.field_position(slot, T::SIZE)? {
            Some(pos) => read_scalar_at(self.buf, pos).map(Some),
            None => Ok(None),
        }
    }

    fn follow_field(&self, slot: u16) -> Result<Option<usize>> {
        match self.field_position(slot, SIZE_UOFFSET)? {
            Some(pos) => follow_offset(self.buf, pos).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_str(&self, slot: u16) -> Result<Option<StrView<'a>>> {
        match self.follow_field(slot)? {
            Some(pos) => StrView::at(self.buf, pos).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_vector<T: Follow<'a>>(&self, slot: u16) -> Result<Option<VectorView<'a, T>>> {
        match self.follow_field(slot)? {
            Some(pos) => VectorView::at(self.buf, pos).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_table(&self, slot: u16) -> Result<Option<TableView<'a>>> {
        match self.follow_field(slot)? {
            Some(pos) => TableView::at(self.buf, pos).map(Some),
            None => Ok(None),
        }
    }

    /// Struct inline berukuran `size`
    pub fn get_struct(&self, slot: u16, size: usize) -> Result<Option<StructView<'a>>> {
        match self.field_position(slot, size)? {
            Some(pos) => Ok(Some(StructView {
                bytes: &self.buf[pos..pos + size],
            })),
            None => Ok(None),
        }
    }

    /// Vector of structs dengan stride `size`
    pub fn get_struct_vector(&self, slot: u16, size: usize) -> Result<Option<StructVectorView<'a>>> {
        match self.follow_field(slot)? {
            Some(pos) => StructVectorView::at(self.buf, pos, size).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn buffer(&self) -> &'a [u8] {
        self.buf
    }
}

impl fmt::Debug for TableView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableView")
            .field("pos", &self.pos)
            .field("slots", &self.slot_count())
            .field("inline_size", &self.object_len)
            .finish()
    }
}

/// View atas string (bytes tanpa terminator)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StrView<'a> {
    bytes: &'a [u8],
}

impl<'a> StrView<'a> {
    pub(crate) fn at(buf: &'a [u8], pos: usize) -> Result<Self> {
        let len = read_scalar_at::<u32>(buf, pos)? as usize;
        let start = pos + SIZE_UOFFSET;
        let end = match start.checked_add(len) {
            Some(end) if end < buf.len() => end,
            _ => return Err(Error::corrupt(pos, "string extends past end of buffer")),
        };
        if buf[end] != 0 {
            return Err(Error::corrupt(end, "string missing zero terminator"));
        }
        Ok(Self {
            bytes: &buf[start..end],
        })
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Decode sebagai UTF-8 (zero-copy)
    pub fn to_str(&self) -> Result<&'a str> {
        std::str::from_utf8(self.bytes).map_err(|_| Error::InvalidUtf8)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for StrView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.bytes))
    }
}

impl PartialEq<str> for StrView<'_> {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for StrView<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

/// Tipe yang bisa menjadi elemen vector
pub trait Follow<'a>: Sized {
    /// Ukuran inline elemen dalam vector
    const INLINE_SIZE: usize;

    fn follow(buf: &'a [u8], pos: usize) -> Result<Self>;
}

macro_rules! impl_follow_scalar {
    ($($ty:ty),*) => {
        $(
            impl<'a> Follow<'a> for $ty {
                const INLINE_SIZE: usize = <$ty as Scalar>::SIZE;

                #[inline(always)]
                fn follow(buf: &'a [u8], pos: usize) -> Result<Self> {
                    read_scalar_at(buf, pos)
                }
            }
        )*
    };
}

impl_follow_scalar!(bool, i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl<'a> Follow<'a> for StrView<'a> {
    const INLINE_SIZE: usize = SIZE_UOFFSET;

    fn follow(buf: &'a [u8], pos: usize) -> Result<Self> {
        StrView::at(buf, follow_offset(buf, pos)?)
    }
}

impl<'a> Follow<'a> for TableView<'a> {
    const INLINE_SIZE: usize = SIZE_UOFFSET;

    fn follow(buf: &'a [u8], pos: usize) -> Result<Self> {
        TableView::at(buf, follow_offset(buf, pos)?)
    }
}

/// Baca header vector; memastikan `len * elem_size` bytes ada di buffer.
///
/// Returns (posisi elemen pertama, jumlah elemen).
pub(crate) fn vector_header(buf: &[u8], pos: usize, elem_size: usize) -> Result<(usize, usize)> {
    let len = read_scalar_at::<u32>(buf, pos)? as usize;
    let start = pos + SIZE_UOFFSET;
    let fits = len
        .checked_mul(elem_size)
        .and_then(|bytes| start.checked_add(bytes))
        .map_or(false, |end| end <= buf.len());
    if !fits {
        return Err(Error::corrupt(pos, "vector extends past end of buffer"));
    }
    Ok((start, len))
}

/// View atas vector dengan elemen bertipe `T`
pub struct VectorView<'a, T> {
    buf: &'a [u8],
    start: usize,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T> Clone for VectorView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for VectorView<'_, T> {}

impl<'a, T: Follow<'a>> VectorView<'a, T> {
    pub(crate) fn at(buf: &'a [u8], pos: usize) -> Result<Self> {
        let (start, len) = vector_header(buf, pos, T::INLINE_SIZE)?;
        Ok(Self {
            buf,
            start,
            len,
            _marker: PhantomData,
        })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elemen ke-`index`; `IndexOutOfRange` di luar `[0, len)`
    #[inline(always)]
    pub fn get(&self, index: usize) -> Result<T> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        T::follow(self.buf, self.start + index * T::INLINE_SIZE)
    }

    pub fn iter(&self) -> VectorIter<'a, T> {
        VectorIter {
            vector: *self,
            index: 0,
        }
    }
}

impl<'a> VectorView<'a, u8> {
    /// Vector byte sebagai slice (zero-copy)
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.buf[self.start..self.start + self.len]
    }
}

impl<T> fmt::Debug for VectorView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorView")
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

/// Iterator elemen vector; setiap elemen bisa gagal jika buffer rusak
pub struct VectorIter<'a, T> {
    vector: VectorView<'a, T>,
    index: usize,
}

impl<'a, T: Follow<'a>> Iterator for VectorIter<'a, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.vector.len {
            return None;
        }
        let item = self.vector.get(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.vector.len - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a, T: Follow<'a>> ExactSizeIterator for VectorIter<'a, T> {}

/// View atas struct inline
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StructView<'a> {
    bytes: &'a [u8],
}

impl<'a> StructView<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Scalar di `offset` dalam struct
    pub fn get<T: Scalar>(&self, offset: usize) -> Result<T> {
        match offset.checked_add(T::SIZE) {
            Some(end) if end <= self.bytes.len() => Ok(T::read_le(&self.bytes[offset..end])),
            _ => Err(Error::IndexOutOfRange {
                index: offset,
                len: self.bytes.len(),
            }),
        }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

impl fmt::Debug for StructView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StructView({} bytes)", self.bytes.len())
    }
}

/// View atas vector of structs
#[derive(Debug, Clone, Copy)]
pub struct StructVectorView<'a> {
    buf: &'a [u8],
    start: usize,
    len: usize,
    stride: usize,
}

impl<'a> StructVectorView<'a> {
    pub(crate) fn at(buf: &'a [u8], pos: usize, stride: usize) -> Result<Self> {
        let (start, len) = vector_header(buf, pos, stride)?;
        Ok(Self {
            buf,
            start,
            len,
            stride,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Result<StructView<'a>> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let pos = self.start + index * self.stride;
        Ok(StructView {
            bytes: &self.buf[pos..pos + self.stride],
        })
    }
}
