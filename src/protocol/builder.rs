//! Buffer Builder
//!
//! Membangun satu buffer contiguous secara bottom-up: setiap child
//! (string, vector, nested record) harus selesai ditulis sebelum parent
//! yang me-reference-nya dimulai. Pelanggaran urutan ditolak dengan
//! `Error::OrderViolation`, tidak pernah diam-diam ditoleransi.
//!
//! Builder hanya untuk satu thread (`&mut self`); setelah `finish`,
//! buffer immutable sampai `reset`.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace};

use super::error::{Error, Result};
use super::wire::{
    padding_bytes, Offset, Scalar, StrMarker, TableMarker, VectorMarker, FILE_IDENTIFIER_LENGTH,
    MAX_BUFFER_SIZE, MAX_SLOTS, SIZE_PREFIX, SIZE_UOFFSET, SIZE_VOFFSET, VTABLE_HEADER_SIZE,
};
use crate::core::ScratchBuffer;

/// Konfigurasi builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Kapasitas awal scratch buffer
    pub initial_capacity: usize,
    /// Ukuran maksimum buffer final
    pub max_size: usize,
    /// Tolak byte string yang bukan UTF-8 (default off: raw bytes diteruskan)
    pub validate_utf8: bool,
    /// Tulis scalar walaupun sama dengan default
    pub force_defaults: bool,
    /// Pakai ulang field table yang identik
    pub dedup_vtables: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            max_size: MAX_BUFFER_SIZE,
            validate_utf8: false,
            force_defaults: false,
            dedup_vtables: true,
        }
    }
}

impl BuilderConfig {
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.min(MAX_BUFFER_SIZE);
        self
    }

    pub fn with_validate_utf8(mut self, validate: bool) -> Self {
        self.validate_utf8 = validate;
        self
    }

    pub fn with_force_defaults(mut self, force: bool) -> Self {
        self.force_defaults = force;
        self
    }

    pub fn with_dedup_vtables(mut self, dedup: bool) -> Self {
        self.dedup_vtables = dedup;
        self
    }
}

/// Lokasi field yang sudah ditulis dalam record yang sedang dibangun
#[derive(Clone, Copy)]
struct FieldLoc {
    revloc: usize,
    slot: u16,
}

/// Object yang sedang terbuka
#[derive(Clone, Copy, PartialEq, Eq)]
enum OpenObject {
    None,
    Record {
        start: usize,
    },
    Vector {
        len: usize,
        pushed: usize,
        elem_size: usize,
        /// revloc elemen pertama
        first: usize,
    },
}

/// Builder untuk satu buffer
pub struct Builder {
    scratch: ScratchBuffer,
    config: BuilderConfig,
    min_align: usize,
    open: OpenObject,
    field_locs: Vec<FieldLoc>,
    vtables: Vec<usize>,
    finished: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    pub fn with_config(config: BuilderConfig) -> Self {
        Self {
            scratch: ScratchBuffer::new(config.initial_capacity, config.max_size),
            config,
            min_align: 1,
            open: OpenObject::None,
            field_locs: Vec::with_capacity(16),
            vtables: Vec::with_capacity(16),
            finished: false,
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Reset builder untuk reuse (kapasitas scratch dipertahankan)
    pub fn reset(&mut self) {
        self.scratch.clear();
        self.min_align = 1;
        self.open = OpenObject::None;
        self.field_locs.clear();
        self.vtables.clear();
        self.finished = false;
    }

    /// Bytes yang sudah ditulis
    #[inline(always)]
    pub fn used_space(&self) -> usize {
        self.scratch.used()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    #[inline(always)]
    fn ensure_writable(&self) -> Result<()> {
        if self.finished {
            return Err(Error::OrderViolation(
                "builder already finished; call reset before writing",
            ));
        }
        Ok(())
    }

    /// String, vector, dan record tidak boleh dimulai di dalam object lain
    #[inline(always)]
    fn ensure_not_nested(&self) -> Result<()> {
        self.ensure_writable()?;
        match self.open {
            OpenObject::None => Ok(()),
            OpenObject::Record { .. } => Err(Error::OrderViolation(
                "child object started while a record is open; build children first",
            )),
            OpenObject::Vector { .. } => Err(Error::OrderViolation(
                "child object started while a vector is open; build elements first",
            )),
        }
    }

    /// Padding agar setelah menulis `len` bytes, posisi aligned ke `alignment`
    #[inline(always)]
    fn align(&mut self, len: usize, alignment: usize) -> Result<()> {
        self.min_align = self.min_align.max(alignment);
        let pad = padding_bytes(self.used_space().wrapping_add(len), alignment);
        if pad > 0 {
            self.scratch.reserve(pad)?;
        }
        Ok(())
    }

    /// Offset harus menunjuk object yang sudah ditulis oleh builder ini,
    /// sebelum posisi `limit` (revloc).
    #[inline(always)]
    fn check_reference(revloc: usize, limit: usize) -> Result<()> {
        if revloc == 0 || revloc > limit {
            return Err(Error::OrderViolation(
                "offset does not refer to an object written before its parent",
            ));
        }
        Ok(())
    }

    /// Tulis uoffset ke object `revloc`
    fn push_uoffset(&mut self, revloc: usize) -> Result<()> {
        self.align(SIZE_UOFFSET, SIZE_UOFFSET)?;
        let rel = self.used_space() + SIZE_UOFFSET - revloc;
        self.scratch.push_scalar(rel as u32)
    }

    fn check_slot(&self, slot: u16) -> Result<()> {
        if !matches!(self.open, OpenObject::Record { .. }) {
            return Err(Error::OrderViolation("field added outside of a record"));
        }
        if slot as usize >= MAX_SLOTS {
            return Err(Error::SizeLimitExceeded {
                requested: slot as usize,
                limit: MAX_SLOTS - 1,
            });
        }
        if self.field_locs.iter().any(|f| f.slot == slot) {
            return Err(Error::DuplicateField { slot });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scalars & strings
    // ------------------------------------------------------------------

    /// Tulis scalar aligned di posisi tulis saat ini
    #[inline(always)]
    pub fn push_scalar<T: Scalar>(&mut self, value: T) -> Result<()> {
        self.ensure_writable()?;
        self.align(T::SIZE, T::SIZE)?;
        self.scratch.push_scalar(value)
    }

    /// Tulis string UTF-8
    pub fn create_string(&mut self, text: &str) -> Result<Offset<StrMarker>> {
        self.write_string_bytes(text.as_bytes())
    }

    /// Tulis raw bytes dengan layout string.
    ///
    /// Validasi UTF-8 hanya jika `BuilderConfig::validate_utf8` aktif.
    pub fn create_byte_string(&mut self, bytes: &[u8]) -> Result<Offset<StrMarker>> {
        if self.config.validate_utf8 && std::str::from_utf8(bytes).is_err() {
            return Err(Error::InvalidUtf8);
        }
        self.write_string_bytes(bytes)
    }

    fn write_string_bytes(&mut self, bytes: &[u8]) -> Result<Offset<StrMarker>> {
        self.ensure_not_nested()?;
        if bytes.len() > u32::MAX as usize {
            return Err(Error::SizeLimitExceeded {
                requested: bytes.len(),
                limit: self.config.max_size,
            });
        }

        // length prefix + bytes + terminator, prefix aligned ke 4
        self.align(bytes.len() + 1, SIZE_UOFFSET)?;
        self.scratch.push_scalar(0u8)?;
        self.scratch.push_bytes(bytes)?;
        self.scratch.push_scalar(bytes.len() as u32)?;

        Ok(Offset::new(self.used_space()))
    }

    // ------------------------------------------------------------------
    // Vectors
    // ------------------------------------------------------------------

    /// Mulai vector dengan `len` elemen berukuran `elem_size`.
    ///
    /// Region elemen di-reserve di sini; elemen di-push berurutan dari
    /// index 0 dan `end_vector` memeriksa jumlahnya.
    pub fn start_vector(&mut self, len: usize, elem_size: usize, alignment: usize) -> Result<()> {
        self.ensure_not_nested()?;
        if elem_size == 0 || !alignment.is_power_of_two() {
            return Err(Error::OrderViolation(
                "vector element size must be non-zero with power-of-two alignment",
            ));
        }

        let bytes = len
            .checked_mul(elem_size)
            .filter(|b| *b <= u32::MAX as usize)
            .ok_or(Error::SizeLimitExceeded {
                requested: usize::MAX,
                limit: self.config.max_size,
            })?;

        self.align(bytes, alignment.max(SIZE_UOFFSET))?;
        self.scratch.reserve(bytes)?;

        self.open = OpenObject::Vector {
            len,
            pushed: 0,
            elem_size,
            first: self.used_space(),
        };
        Ok(())
    }

    /// Revloc slot elemen berikutnya
    fn next_element(&mut self, size: usize) -> Result<(usize, usize)> {
        match &mut self.open {
            OpenObject::Vector {
                len,
                pushed,
                elem_size,
                first,
            } => {
                if *elem_size != size {
                    return Err(Error::OrderViolation(
                        "element size does not match start_vector",
                    ));
                }
                if *pushed >= *len {
                    return Err(Error::OrderViolation(
                        "more elements pushed than announced in start_vector",
                    ));
                }
                let revloc = *first - *pushed * size;
                // Batas: semua child harus ada sebelum region vector
                let limit = *first - *len * size;
                *pushed += 1;
                Ok((revloc, limit))
            }
            _ => Err(Error::OrderViolation("element pushed outside of a vector")),
        }
    }

    /// Push elemen scalar inline
    pub fn push_element<T: Scalar>(&mut self, value: T) -> Result<()> {
        self.ensure_writable()?;
        let (revloc, _) = self.next_element(T::SIZE)?;
        value.write_le(self.scratch.at_revloc_mut(revloc, T::SIZE));
        Ok(())
    }

    /// Push elemen berupa offset ke string/record yang sudah ditulis
    pub fn push_offset_element<T>(&mut self, child: Offset<T>) -> Result<()> {
        self.ensure_writable()?;
        let (revloc, limit) = self.next_element(SIZE_UOFFSET)?;
        if let Err(err) = Self::check_reference(child.revloc(), limit) {
            self.unpush_element();
            return Err(err);
        }
        let rel = (revloc - child.revloc()) as u32;
        rel.write_le(self.scratch.at_revloc_mut(revloc, SIZE_UOFFSET));
        Ok(())
    }

    /// Push elemen struct (bytes dengan layout final)
    pub fn push_struct_element(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let (revloc, _) = self.next_element(bytes.len())?;
        self.scratch
            .at_revloc_mut(revloc, bytes.len())
            .copy_from_slice(bytes);
        Ok(())
    }

    fn unpush_element(&mut self) {
        if let OpenObject::Vector { pushed, .. } = &mut self.open {
            *pushed -= 1;
        }
    }

    /// Tutup vector dan tulis length prefix
    pub fn end_vector(&mut self) -> Result<Offset<VectorMarker>> {
        self.ensure_writable()?;
        let len = match self.open {
            OpenObject::Vector { len, pushed, .. } if pushed == len => len,
            OpenObject::Vector { .. } => {
                return Err(Error::OrderViolation(
                    "fewer elements pushed than announced in start_vector",
                ))
            }
            _ => return Err(Error::OrderViolation("end_vector without start_vector")),
        };
        self.open = OpenObject::None;
        self.push_scalar(len as u32)?;
        Ok(Offset::new(self.used_space()))
    }

    /// Vector scalar dari slice
    pub fn create_vector<T: Scalar>(&mut self, items: &[T]) -> Result<Offset<VectorMarker>> {
        self.start_vector(items.len(), T::SIZE, T::SIZE)?;
        for item in items {
            self.push_element(*item)?;
        }
        self.end_vector()
    }

    /// Vector offset dari child yang sudah ditulis
    pub fn create_vector_of_offsets<T>(
        &mut self,
        items: &[Offset<T>],
    ) -> Result<Offset<VectorMarker>> {
        self.start_vector(items.len(), SIZE_UOFFSET, SIZE_UOFFSET)?;
        for item in items {
            self.push_offset_element(*item)?;
        }
        self.end_vector()
    }

    /// Tulis semua string dulu, lalu vector offset-nya
    pub fn create_vector_of_strings(&mut self, items: &[&str]) -> Result<Offset<VectorMarker>> {
        let offsets = items
            .iter()
            .map(|s| self.create_string(s))
            .collect::<Result<Vec<_>>>()?;
        self.create_vector_of_offsets(&offsets)
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    pub fn start_record(&mut self) -> Result<()> {
        self.ensure_not_nested()?;
        self.field_locs.clear();
        self.open = OpenObject::Record {
            start: self.used_space(),
        };
        Ok(())
    }

    /// Tambah scalar field; di-skip jika sama dengan default
    pub fn add_field<T: Scalar>(&mut self, slot: u16, value: T, default: T) -> Result<()> {
        self.ensure_writable()?;
        self.check_slot(slot)?;
        if value == default && !self.config.force_defaults {
            return Ok(());
        }
        self.push_scalar(value)?;
        self.track_field(slot);
        Ok(())
    }

    /// Tambah scalar field tanpa default (selalu ditulis)
    pub fn add_field_required<T: Scalar>(&mut self, slot: u16, value: T) -> Result<()> {
        self.ensure_writable()?;
        self.check_slot(slot)?;
        self.push_scalar(value)?;
        self.track_field(slot);
        Ok(())
    }

    /// Tambah struct inline
    pub fn add_field_struct(&mut self, slot: u16, bytes: &[u8], alignment: usize) -> Result<()> {
        self.ensure_writable()?;
        self.check_slot(slot)?;
        self.align(bytes.len(), alignment)?;
        self.scratch.push_bytes(bytes)?;
        self.track_field(slot);
        Ok(())
    }

    /// Tambah offset ke child yang sudah ditulis sebelum record dimulai
    pub fn add_field_offset<T>(&mut self, slot: u16, child: Offset<T>) -> Result<()> {
        self.ensure_writable()?;
        self.check_slot(slot)?;
        let start = match self.open {
            OpenObject::Record { start } => start,
            _ => return Err(Error::OrderViolation("field added outside of a record")),
        };
        Self::check_reference(child.revloc(), start)?;
        self.push_uoffset(child.revloc())?;
        self.track_field(slot);
        Ok(())
    }

    #[inline(always)]
    fn track_field(&mut self, slot: u16) {
        self.field_locs.push(FieldLoc {
            revloc: self.used_space(),
            slot,
        });
    }

    /// Tutup record: tulis soffset, lalu field table (atau pakai ulang yang identik)
    pub fn end_record(&mut self) -> Result<Offset<TableMarker>> {
        self.ensure_writable()?;
        let start = match self.open {
            OpenObject::Record { start } => start,
            _ => return Err(Error::OrderViolation("end_record without start_record")),
        };

        // Cek ukuran sebelum placeholder ditulis
        let soffset_size = std::mem::size_of::<i32>();
        let pad = padding_bytes(self.used_space() + soffset_size, soffset_size);
        let object_size = self.used_space() + pad + soffset_size - start;
        if object_size > u16::MAX as usize {
            return Err(Error::SizeLimitExceeded {
                requested: object_size,
                limit: u16::MAX as usize,
            });
        }

        // Placeholder soffset, diisi setelah posisi vtable diketahui
        self.push_scalar(0i32)?;
        let object_revloc = self.used_space();
        debug_assert_eq!(object_revloc - start, object_size);

        let slots = self
            .field_locs
            .iter()
            .map(|f| f.slot as usize + 1)
            .max()
            .unwrap_or(0);
        let vtable_len = VTABLE_HEADER_SIZE + slots * SIZE_VOFFSET;

        let mut vtable = vec![0u8; vtable_len];
        LittleEndian::write_u16(&mut vtable[0..2], vtable_len as u16);
        LittleEndian::write_u16(&mut vtable[2..4], object_size as u16);
        for field in &self.field_locs {
            let entry = VTABLE_HEADER_SIZE + field.slot as usize * SIZE_VOFFSET;
            let offset_in_object = (object_revloc - field.revloc) as u16;
            LittleEndian::write_u16(&mut vtable[entry..entry + 2], offset_in_object);
        }

        let existing = if self.config.dedup_vtables {
            self.find_vtable(&vtable)
        } else {
            None
        };

        let vtable_revloc = match existing {
            Some(revloc) => {
                trace!(revloc, "reusing identical field table");
                revloc
            }
            None => {
                self.align(vtable_len, SIZE_VOFFSET)?;
                self.scratch.push_bytes(&vtable)?;
                let revloc = self.used_space();
                self.vtables.push(revloc);
                revloc
            }
        };

        let soffset = vtable_revloc as i64 - object_revloc as i64;
        (soffset as i32).write_le(self.scratch.at_revloc_mut(object_revloc, 4));

        self.open = OpenObject::None;
        self.field_locs.clear();
        Ok(Offset::new(object_revloc))
    }

    fn find_vtable(&self, vtable: &[u8]) -> Option<usize> {
        self.vtables.iter().copied().find(|&revloc| {
            let len = u16::read_le(self.scratch.at_revloc(revloc, 2)) as usize;
            len == vtable.len() && self.scratch.at_revloc(revloc, len) == vtable
        })
    }

    // ------------------------------------------------------------------
    // Finish
    // ------------------------------------------------------------------

    /// Tulis root offset di awal buffer
    pub fn finish(&mut self, root: Offset<TableMarker>) -> Result<&[u8]> {
        self.finish_impl(root, None, false)
    }

    /// Root offset diikuti 4-byte file identifier
    pub fn finish_with_identifier(
        &mut self,
        root: Offset<TableMarker>,
        identifier: &[u8; FILE_IDENTIFIER_LENGTH],
    ) -> Result<&[u8]> {
        self.finish_impl(root, Some(identifier), false)
    }

    /// Seperti `finish`, dengan u32 size prefix untuk framing di transport
    pub fn finish_size_prefixed(
        &mut self,
        root: Offset<TableMarker>,
        identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
    ) -> Result<&[u8]> {
        self.finish_impl(root, identifier, true)
    }

    fn finish_impl(
        &mut self,
        root: Offset<TableMarker>,
        identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
        size_prefixed: bool,
    ) -> Result<&[u8]> {
        self.ensure_writable()?;
        if self.open != OpenObject::None {
            return Err(Error::OrderViolation(
                "finish called while a record or vector is open",
            ));
        }
        Self::check_reference(root.revloc(), self.used_space())?;

        let header_len = SIZE_UOFFSET
            + identifier.map_or(0, |_| FILE_IDENTIFIER_LENGTH)
            + if size_prefixed { SIZE_PREFIX } else { 0 };
        let alignment = self.min_align.max(SIZE_UOFFSET);
        self.align(header_len, alignment)?;

        if let Some(id) = identifier {
            self.scratch.push_bytes(id)?;
        }
        self.push_uoffset(root.revloc())?;
        if size_prefixed {
            let len = self.used_space() as u32;
            self.push_scalar(len)?;
        }

        self.finished = true;
        debug!(
            bytes = self.used_space(),
            min_align = self.min_align,
            vtables = self.vtables.len(),
            "buffer finished"
        );
        Ok(self.scratch.data())
    }

    /// Buffer final (hanya setelah finish)
    pub fn finished_data(&self) -> Result<&[u8]> {
        if !self.finished {
            return Err(Error::OrderViolation("buffer has not been finished"));
        }
        Ok(self.scratch.data())
    }

    /// Ambil buffer final sebagai owned bytes
    pub fn into_vec(self) -> Result<Vec<u8>> {
        if !self.finished {
            return Err(Error::OrderViolation("buffer has not been finished"));
        }
        Ok(self.scratch.into_vec())
    }
}
