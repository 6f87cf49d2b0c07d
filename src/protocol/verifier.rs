//! Strict-Mode Verifier
//!
//! Walk seluruh graph yang reachable dari root satu kali, memakai record
//! descriptor untuk tahu slot mana berisi offset. Setelah lolos, semua
//! akses lazy pada buffer yang sama tidak akan gagal karena bounds.

use tracing::{debug, warn};

use super::error::{Error, Result};
use super::view::{vector_header, BufferView, StrView, TableView};
use super::wire::{follow_offset, SIZE_UOFFSET};
use crate::schema::{ElementType, FieldDescriptor, FieldType, RecordDescriptor, Schema};

/// Batas verifikasi
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierOptions {
    /// Kedalaman nested record maksimum
    pub max_depth: usize,
    /// Jumlah record maksimum yang boleh dikunjungi
    pub max_tables: usize,
    /// Tolak field yang tidak aligned ke natural size-nya
    pub check_alignment: bool,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_tables: 1_000_000,
            check_alignment: true,
        }
    }
}

impl VerifierOptions {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_tables(mut self, tables: usize) -> Self {
        self.max_tables = tables;
        self
    }

    pub fn with_check_alignment(mut self, check: bool) -> Self {
        self.check_alignment = check;
        self
    }
}

/// Verifikasi buffer terhadap record `root`
pub fn verify(
    view: &BufferView<'_>,
    schema: &Schema,
    root: &RecordDescriptor,
    options: &VerifierOptions,
) -> Result<()> {
    let mut walker = Walker {
        buf: view.as_bytes(),
        schema,
        options,
        tables: 0,
    };

    let result = view
        .root()
        .and_then(|table| walker.table(table, root, 0));

    match &result {
        Ok(()) => debug!(
            bytes = view.len(),
            tables = walker.tables,
            root = %root.name,
            "buffer verified"
        ),
        Err(err) => warn!(error = %err, root = %root.name, "buffer verification failed"),
    }
    result
}

struct Walker<'a, 's> {
    buf: &'a [u8],
    schema: &'s Schema,
    options: &'s VerifierOptions,
    tables: usize,
}

impl<'a> Walker<'a, '_> {
    fn aligned(&self, pos: usize, alignment: usize) -> Result<()> {
        if self.options.check_alignment && alignment > 1 && pos % alignment != 0 {
            return Err(Error::corrupt(pos, "misaligned value"));
        }
        Ok(())
    }

    fn table(&mut self, table: TableView<'a>, desc: &RecordDescriptor, depth: usize) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(Error::corrupt(table.position(), "record nesting too deep"));
        }
        self.tables += 1;
        if self.tables > self.options.max_tables {
            return Err(Error::corrupt(table.position(), "too many records"));
        }
        self.aligned(table.position(), SIZE_UOFFSET)?;

        // Deprecated field tetap dicek: buffer lama masih bisa berisi slot itu
        for field in &desc.fields {
            self.field(&table, field, depth)?;
        }
        Ok(())
    }

    fn field(&mut self, table: &TableView<'a>, field: &FieldDescriptor, depth: usize) -> Result<()> {
        match &field.ty {
            FieldType::Scalar(_) | FieldType::Enum(_) => {
                let (ty, _) = self.schema.scalar_of(field)?;
                if let Some(pos) = table.field_position(field.slot, ty.size())? {
                    self.aligned(pos, ty.size())?;
                }
            }
            FieldType::Struct(name) => {
                let desc = self.schema.structure(name)?;
                if let Some(pos) = table.field_position(field.slot, desc.size)? {
                    self.aligned(pos, desc.align)?;
                }
            }
            FieldType::String => {
                if let Some(target) = self.offset_field(table, field.slot)? {
                    self.string(target)?;
                }
            }
            FieldType::Record(name) => {
                if let Some(target) = self.offset_field(table, field.slot)? {
                    let desc = self.schema.record(name)?;
                    let child = TableView::at(self.buf, target)?;
                    self.table(child, desc, depth + 1)?;
                }
            }
            FieldType::Vector(element) => {
                if let Some(target) = self.offset_field(table, field.slot)? {
                    self.vector(target, element, depth)?;
                }
            }
        }
        Ok(())
    }

    /// Posisi target offset field, atau None jika absent
    fn offset_field(&self, table: &TableView<'a>, slot: u16) -> Result<Option<usize>> {
        match table.field_position(slot, SIZE_UOFFSET)? {
            Some(pos) => {
                self.aligned(pos, SIZE_UOFFSET)?;
                follow_offset(self.buf, pos).map(Some)
            }
            None => Ok(None),
        }
    }

    fn string(&self, pos: usize) -> Result<()> {
        self.aligned(pos, SIZE_UOFFSET)?;
        StrView::at(self.buf, pos).map(|_| ())
    }

    fn vector(&mut self, pos: usize, element: &ElementType, depth: usize) -> Result<()> {
        self.aligned(pos, SIZE_UOFFSET)?;
        match element {
            ElementType::Scalar(ty) => {
                let (start, _) = vector_header(self.buf, pos, ty.size())?;
                self.aligned(start, ty.size())?;
            }
            ElementType::Struct(name) => {
                let desc = self.schema.structure(name)?;
                let (start, _) = vector_header(self.buf, pos, desc.size)?;
                self.aligned(start, desc.align)?;
            }
            ElementType::String => {
                let (start, len) = vector_header(self.buf, pos, SIZE_UOFFSET)?;
                for i in 0..len {
                    let target = follow_offset(self.buf, start + i * SIZE_UOFFSET)?;
                    self.string(target)?;
                }
            }
            ElementType::Record(name) => {
                let desc = self.schema.record(name)?;
                let (start, len) = vector_header(self.buf, pos, SIZE_UOFFSET)?;
                for i in 0..len {
                    let target = follow_offset(self.buf, start + i * SIZE_UOFFSET)?;
                    let child = TableView::at(self.buf, target)?;
                    self.table(child, desc, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}
