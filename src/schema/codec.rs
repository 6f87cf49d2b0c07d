//! Generic Record Codec
//!
//! Satu codec data-driven untuk semua record type: descriptor menentukan
//! slot dan wire type, sehingga tidak ada wrapper per-type.
//!
//! - `encode`: owned `Record` -> builder (children dulu, lalu parent)
//! - `TableView::field`: akses field lewat descriptor, tetap zero-copy
//! - `to_owned`: view -> owned `Record`

use std::fmt;

use super::descriptor::{ElementType, FieldDescriptor, FieldType, Schema, StructDescriptor};
use super::value::{with_scalar, Record, ScalarValue, Value};
use crate::protocol::view::vector_header;
use crate::protocol::wire::{
    follow_offset, Offset, ScalarType, StrMarker, TableMarker, VectorMarker, SIZE_UOFFSET,
};
use crate::protocol::{
    BufferView, Builder, BuilderConfig, Error, Follow, ReaderOptions, Result, StrView, StructView,
    TableView, VerifierOptions,
};

// ----------------------------------------------------------------------
// Encode
// ----------------------------------------------------------------------

/// Offset child yang sudah ditulis, menunggu dipasang ke parent
#[derive(Clone, Copy)]
enum Child {
    Str(Offset<StrMarker>),
    Vector(Offset<VectorMarker>),
    Table(Offset<TableMarker>),
}

/// Field yang ditulis setelah `start_record`
enum Pending {
    Scalar {
        slot: u16,
        value: ScalarValue,
        default: ScalarValue,
    },
    Struct {
        slot: u16,
        bytes: Vec<u8>,
        align: usize,
    },
    Child {
        slot: u16,
        child: Child,
    },
}

impl Pending {
    /// Field besar dulu agar padding minimal
    fn alignment(&self) -> usize {
        match self {
            Pending::Scalar { value, .. } => value.scalar_type().size(),
            Pending::Struct { align, .. } => *align,
            Pending::Child { .. } => SIZE_UOFFSET,
        }
    }

    fn write(&self, builder: &mut Builder) -> Result<()> {
        match self {
            Pending::Scalar {
                slot,
                value,
                default,
            } => add_scalar_field(builder, *slot, *value, *default),
            Pending::Struct { slot, bytes, align } => builder.add_field_struct(*slot, bytes, *align),
            Pending::Child { slot, child } => match *child {
                Child::Str(offset) => builder.add_field_offset(*slot, offset),
                Child::Vector(offset) => builder.add_field_offset(*slot, offset),
                Child::Table(offset) => builder.add_field_offset(*slot, offset),
            },
        }
    }
}

macro_rules! add_typed_field {
    ($builder:expr, $slot:expr, $value:expr, $default:expr; $($variant:ident),*) => {
        match ($value, $default) {
            $(
                (ScalarValue::$variant(v), ScalarValue::$variant(d)) => $builder.add_field($slot, v, d),
            )*
            (value, default) => Err(Error::SchemaMismatch(format!(
                "scalar {} does not match field type {}",
                value.scalar_type(),
                default.scalar_type()
            ))),
        }
    };
}

fn add_scalar_field(
    builder: &mut Builder,
    slot: u16,
    value: ScalarValue,
    default: ScalarValue,
) -> Result<()> {
    add_typed_field!(builder, slot, value, default;
        Bool, I8, U8, I16, U16, I32, U32, I64, U64, F32, F64)
}

/// Samakan tipe scalar dengan tipe field.
///
/// Integer dikonversi jika muat, float dari integer/float lain; bool tidak
/// pernah dikonversi.
fn coerce(value: ScalarValue, ty: ScalarType, field: &str) -> Result<ScalarValue> {
    if value.scalar_type() == ty {
        return Ok(value);
    }
    let mismatch = || {
        Error::SchemaMismatch(format!(
            "field `{field}` expects {ty}, got {}",
            value.scalar_type()
        ))
    };
    if matches!(value, ScalarValue::Bool(_)) || ty == ScalarType::Bool {
        return Err(mismatch());
    }
    match ty {
        ScalarType::F32 => Ok(ScalarValue::F32(value.as_f64() as f32)),
        ScalarType::F64 => Ok(ScalarValue::F64(value.as_f64())),
        _ => match value.as_i64() {
            Some(v) => ScalarValue::from_i64(ty, v).map_err(|_| mismatch()),
            None => Err(mismatch()),
        },
    }
}

fn type_mismatch(field: &str, expected: &str, value: &Value) -> Error {
    Error::SchemaMismatch(format!(
        "field `{field}` expects {expected}, got {}",
        value.kind()
    ))
}

/// Layout bytes struct dari owned record; semua field struct wajib ada
fn struct_bytes(desc: &StructDescriptor, value: &Value, field: &str) -> Result<Vec<u8>> {
    let record = match value {
        Value::Struct(r) | Value::Record(r) => r,
        other => return Err(type_mismatch(field, "struct", other)),
    };
    if let Some((name, _)) = record.iter().find(|(name, _)| desc.field(name).is_none()) {
        return Err(Error::SchemaMismatch(format!(
            "struct `{}` has no field `{name}`",
            desc.name
        )));
    }

    let mut bytes = vec![0u8; desc.size];
    for member in &desc.fields {
        let value = match record.get(&member.name) {
            Some(Value::Scalar(v)) => coerce(*v, member.ty, &member.name)?,
            Some(other) => return Err(type_mismatch(&member.name, "scalar", other)),
            None => {
                return Err(Error::SchemaMismatch(format!(
                    "struct `{}` is missing field `{}`",
                    desc.name, member.name
                )))
            }
        };
        value.write_le(&mut bytes[member.offset..member.offset + member.ty.size()]);
    }
    Ok(bytes)
}

fn encode_string(builder: &mut Builder, value: &Value, field: &str) -> Result<Offset<StrMarker>> {
    match value {
        Value::String(s) => builder.create_string(s),
        Value::Bytes(b) => builder.create_byte_string(b),
        other => Err(type_mismatch(field, "string", other)),
    }
}

fn encode_vector(
    builder: &mut Builder,
    schema: &Schema,
    element: &ElementType,
    value: &Value,
    field: &str,
) -> Result<Offset<VectorMarker>> {
    let items = match value {
        Value::Vector(items) => items,
        other => return Err(type_mismatch(field, "vector", other)),
    };

    match element {
        ElementType::Scalar(ty) => {
            builder.start_vector(items.len(), ty.size(), ty.size())?;
            for item in items {
                let scalar = match item {
                    Value::Scalar(v) => coerce(*v, *ty, field)?,
                    other => return Err(type_mismatch(field, "scalar element", other)),
                };
                with_scalar!(scalar, v => builder.push_element(v))?;
            }
            builder.end_vector()
        }
        ElementType::Struct(name) => {
            let desc = schema.structure(name)?;
            let elements = items
                .iter()
                .map(|item| struct_bytes(desc, item, field))
                .collect::<Result<Vec<_>>>()?;
            builder.start_vector(elements.len(), desc.size, desc.align)?;
            for bytes in &elements {
                builder.push_struct_element(bytes)?;
            }
            builder.end_vector()
        }
        ElementType::String => {
            let offsets = items
                .iter()
                .map(|item| encode_string(builder, item, field))
                .collect::<Result<Vec<_>>>()?;
            builder.create_vector_of_offsets(&offsets)
        }
        ElementType::Record(name) => {
            let offsets = items
                .iter()
                .map(|item| match item {
                    Value::Record(r) => encode(builder, schema, name, r),
                    other => Err(type_mismatch(field, "record element", other)),
                })
                .collect::<Result<Vec<_>>>()?;
            builder.create_vector_of_offsets(&offsets)
        }
    }
}

/// Encode owned record bertipe `record_type` ke builder.
///
/// Semua child (string, vector, nested record) ditulis sebelum record
/// dimulai. Field yang tidak dikenal atau deprecated ditolak dengan
/// `SchemaMismatch`.
pub fn encode(
    builder: &mut Builder,
    schema: &Schema,
    record_type: &str,
    record: &Record,
) -> Result<Offset<TableMarker>> {
    let desc = schema.record(record_type)?;

    for (name, _) in record.iter() {
        match desc.field(name) {
            Some(field) if field.deprecated => {
                return Err(Error::SchemaMismatch(format!(
                    "field `{record_type}.{name}` is deprecated"
                )))
            }
            Some(_) => {}
            None => {
                return Err(Error::SchemaMismatch(format!(
                    "record `{record_type}` has no field `{name}`"
                )))
            }
        }
    }

    let mut pending = Vec::with_capacity(record.len());
    for field in desc.live_fields() {
        let value = match record.get(&field.name) {
            Some(value) => value,
            None => continue,
        };
        let slot = field.slot;
        let name = field.name.as_str();

        let item = match &field.ty {
            FieldType::Scalar(_) | FieldType::Enum(_) => {
                let (ty, default) = schema.scalar_of(field)?;
                let value = match (value, &field.ty) {
                    (Value::Scalar(v), _) => coerce(*v, ty, name)?,
                    // Enum boleh diisi nama variant
                    (Value::String(variant), FieldType::Enum(enum_name)) => {
                        let desc = schema.enumeration(enum_name)?;
                        let raw = desc.value_of(variant).ok_or_else(|| {
                            Error::SchemaMismatch(format!(
                                "enum `{enum_name}` has no variant `{variant}`"
                            ))
                        })?;
                        ScalarValue::from_i64(ty, raw)?
                    }
                    (other, _) => return Err(type_mismatch(name, "scalar", other)),
                };
                Pending::Scalar {
                    slot,
                    value,
                    default,
                }
            }
            FieldType::Struct(struct_name) => {
                let desc = schema.structure(struct_name)?;
                Pending::Struct {
                    slot,
                    bytes: struct_bytes(desc, value, name)?,
                    align: desc.align,
                }
            }
            FieldType::String => Pending::Child {
                slot,
                child: Child::Str(encode_string(builder, value, name)?),
            },
            FieldType::Vector(element) => Pending::Child {
                slot,
                child: Child::Vector(encode_vector(builder, schema, element, value, name)?),
            },
            FieldType::Record(child_type) => match value {
                Value::Record(child) => Pending::Child {
                    slot,
                    child: Child::Table(encode(builder, schema, child_type, child)?),
                },
                other => return Err(type_mismatch(name, "record", other)),
            },
        };
        pending.push(item);
    }

    // Stable sort: urutan slot dipertahankan untuk alignment yang sama
    pending.sort_by(|a, b| b.alignment().cmp(&a.alignment()));

    builder.start_record()?;
    for item in &pending {
        item.write(builder)?;
    }
    builder.end_record()
}

/// Encode record root schema menjadi buffer final.
///
/// File identifier schema (jika ada) ditulis setelah root offset.
pub fn encode_root(schema: &Schema, record: &Record, config: &BuilderConfig) -> Result<Vec<u8>> {
    let root_type = schema.root_record()?.name.as_str();
    let mut builder = Builder::with_config(config.clone());
    let root = encode(&mut builder, schema, root_type, record)?;
    match schema.file_identifier() {
        Some(id) => builder.finish_with_identifier(root, &id)?,
        None => builder.finish(root)?,
    };
    builder.into_vec()
}

// ----------------------------------------------------------------------
// Descriptor-driven views
// ----------------------------------------------------------------------

/// Tipe elemen vector yang sudah di-resolve ke layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynElement {
    Scalar(ScalarType),
    String,
    Record,
    Struct { size: usize },
}

impl DynElement {
    fn resolve(schema: &Schema, element: &ElementType) -> Result<Self> {
        Ok(match element {
            ElementType::Scalar(ty) => DynElement::Scalar(*ty),
            ElementType::String => DynElement::String,
            ElementType::Record(name) => {
                schema.record(name)?;
                DynElement::Record
            }
            ElementType::Struct(name) => DynElement::Struct {
                size: schema.structure(name)?.size,
            },
        })
    }

    pub fn inline_size(self) -> usize {
        match self {
            DynElement::Scalar(ty) => ty.size(),
            DynElement::String | DynElement::Record => SIZE_UOFFSET,
            DynElement::Struct { size } => size,
        }
    }
}

/// Vector yang tipe elemennya baru diketahui saat runtime
#[derive(Clone, Copy)]
pub struct DynVector<'a> {
    buf: &'a [u8],
    start: usize,
    len: usize,
    element: DynElement,
}

impl<'a> DynVector<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn element(&self) -> DynElement {
        self.element
    }

    pub fn get(&self, index: usize) -> Result<FieldView<'a>> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let size = self.element.inline_size();
        let pos = self.start + index * size;
        // Region elemen sudah dicek oleh vector_header
        Ok(match self.element {
            DynElement::Scalar(ty) => {
                FieldView::Scalar(ScalarValue::read_le(ty, &self.buf[pos..pos + size]))
            }
            DynElement::String => FieldView::Str(StrView::follow(self.buf, pos)?),
            DynElement::Record => FieldView::Record(TableView::follow(self.buf, pos)?),
            DynElement::Struct { .. } => {
                FieldView::Struct(StructView::new(&self.buf[pos..pos + size]))
            }
        })
    }
}

impl fmt::Debug for DynVector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynVector")
            .field("element", &self.element)
            .field("len", &self.len)
            .finish()
    }
}

/// Hasil baca satu field lewat descriptor
#[derive(Debug, Clone, Copy)]
pub enum FieldView<'a> {
    /// Offset field yang tidak ditulis
    Absent,
    /// Scalar/enum; default jika tidak ditulis
    Scalar(ScalarValue),
    Str(StrView<'a>),
    Vector(DynVector<'a>),
    Record(TableView<'a>),
    Struct(StructView<'a>),
}

impl FieldView<'_> {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldView::Absent)
    }
}

impl<'a> TableView<'a> {
    /// Baca field sesuai descriptor-nya
    pub fn field(&self, schema: &Schema, field: &FieldDescriptor) -> Result<FieldView<'a>> {
        let slot = field.slot;
        match &field.ty {
            FieldType::Scalar(_) | FieldType::Enum(_) => {
                let (ty, default) = schema.scalar_of(field)?;
                let value = match self.field_position(slot, ty.size())? {
                    Some(pos) => ScalarValue::read_le(ty, &self.buffer()[pos..pos + ty.size()]),
                    None => default,
                };
                Ok(FieldView::Scalar(value))
            }
            FieldType::Struct(name) => {
                let size = schema.structure(name)?.size;
                Ok(self
                    .get_struct(slot, size)?
                    .map_or(FieldView::Absent, FieldView::Struct))
            }
            FieldType::String => Ok(self.get_str(slot)?.map_or(FieldView::Absent, FieldView::Str)),
            FieldType::Record(_) => Ok(self
                .get_table(slot)?
                .map_or(FieldView::Absent, FieldView::Record)),
            FieldType::Vector(element) => {
                let pos = match self.field_position(slot, SIZE_UOFFSET)? {
                    Some(pos) => follow_offset(self.buffer(), pos)?,
                    None => return Ok(FieldView::Absent),
                };
                let element = DynElement::resolve(schema, element)?;
                let (start, len) = vector_header(self.buffer(), pos, element.inline_size())?;
                Ok(FieldView::Vector(DynVector {
                    buf: self.buffer(),
                    start,
                    len,
                    element,
                }))
            }
        }
    }

    /// Baca field berdasarkan nama di record descriptor `record_type`
    pub fn field_by_name(
        &self,
        schema: &Schema,
        record_type: &str,
        name: &str,
    ) -> Result<FieldView<'a>> {
        let desc = schema.record(record_type)?;
        let field = desc.field(name).ok_or_else(|| {
            Error::SchemaMismatch(format!("record `{record_type}` has no field `{name}`"))
        })?;
        self.field(schema, field)
    }
}

// ----------------------------------------------------------------------
// To owned
// ----------------------------------------------------------------------

fn owned_string(s: StrView<'_>) -> Value {
    match s.to_str() {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::Bytes(s.as_bytes().to_vec()),
    }
}

fn owned_struct(desc: &StructDescriptor, view: StructView<'_>) -> Result<Record> {
    let bytes = view.as_bytes();
    let mut record = Record::new();
    for member in &desc.fields {
        let end = member.offset + member.ty.size();
        let raw = bytes
            .get(member.offset..end)
            .ok_or(Error::IndexOutOfRange {
                index: member.offset,
                len: bytes.len(),
            })?;
        record.set(&member.name, ScalarValue::read_le(member.ty, raw));
    }
    Ok(record)
}

/// Batas materialisasi untuk jalur lazy.
///
/// Buffer yang belum diverifikasi bisa berisi chain record yang sangat
/// dalam, atau banyak offset ke child yang sama. Kedalaman dibatasi
/// `max_depth`; setiap record, string, dan vector yang dimaterialisasi
/// dihitung terhadap `max_tables`.
struct Materializer<'s> {
    schema: &'s Schema,
    options: &'s VerifierOptions,
    objects: usize,
}

impl Materializer<'_> {
    fn charge(&mut self, position: usize) -> Result<()> {
        self.objects += 1;
        if self.objects > self.options.max_tables {
            return Err(Error::corrupt(position, "too many objects to materialize"));
        }
        Ok(())
    }

    /// `owner` adalah posisi record atau vector yang me-reference string
    fn string(&mut self, s: StrView<'_>, owner: usize) -> Result<Value> {
        self.charge(owner)?;
        Ok(owned_string(s))
    }

    fn element(
        &mut self,
        element: &ElementType,
        view: FieldView<'_>,
        owner: usize,
        depth: usize,
    ) -> Result<Value> {
        Ok(match (element, view) {
            (_, FieldView::Scalar(v)) => Value::Scalar(v),
            (_, FieldView::Str(s)) => self.string(s, owner)?,
            (ElementType::Record(name), FieldView::Record(table)) => {
                Value::Record(self.record(name, table, depth + 1)?)
            }
            (ElementType::Struct(name), FieldView::Struct(s)) => {
                Value::Struct(owned_struct(self.schema.structure(name)?, s)?)
            }
            _ => {
                return Err(Error::SchemaMismatch(
                    "vector element does not match descriptor".into(),
                ))
            }
        })
    }

    fn record(&mut self, record_type: &str, table: TableView<'_>, depth: usize) -> Result<Record> {
        if depth > self.options.max_depth {
            return Err(Error::corrupt(table.position(), "record nesting too deep"));
        }
        self.charge(table.position())?;

        let schema = self.schema;
        let desc = schema.record(record_type)?;
        let mut record = Record::new();

        for field in desc.live_fields() {
            let value = match (&field.ty, table.field(schema, field)?) {
                (_, FieldView::Absent) => continue,
                (_, FieldView::Scalar(v)) => Value::Scalar(v),
                (_, FieldView::Str(s)) => self.string(s, table.position())?,
                (FieldType::Record(name), FieldView::Record(child)) => {
                    Value::Record(self.record(name, child, depth + 1)?)
                }
                (FieldType::Struct(name), FieldView::Struct(s)) => {
                    Value::Struct(owned_struct(schema.structure(name)?, s)?)
                }
                (FieldType::Vector(element), FieldView::Vector(vector)) => {
                    self.charge(vector.start)?;
                    let mut items = Vec::with_capacity(vector.len());
                    for i in 0..vector.len() {
                        items.push(self.element(element, vector.get(i)?, vector.start, depth)?);
                    }
                    Value::Vector(items)
                }
                _ => {
                    return Err(Error::SchemaMismatch(format!(
                        "field `{record_type}.{}` does not match descriptor",
                        field.name
                    )))
                }
            };
            record.set(&field.name, value);
        }
        Ok(record)
    }
}

/// Materialisasi record menjadi owned value dengan batas default.
///
/// Scalar absent diisi default; offset field yang absent tetap absent
/// (vector kosong berbeda dengan vector absent).
pub fn to_owned(schema: &Schema, record_type: &str, table: TableView<'_>) -> Result<Record> {
    to_owned_with(schema, record_type, table, &VerifierOptions::default())
}

/// Seperti `to_owned`, dengan batas kedalaman dan jumlah object dari `limits`
pub fn to_owned_with(
    schema: &Schema,
    record_type: &str,
    table: TableView<'_>,
    limits: &VerifierOptions,
) -> Result<Record> {
    let mut materializer = Materializer {
        schema,
        options: limits,
        objects: 0,
    };
    materializer.record(record_type, table, 0)
}

/// Open buffer dengan `options`, lalu materialisasi root record
pub fn decode_root(schema: &Schema, buf: &[u8], options: &ReaderOptions) -> Result<Record> {
    let view = BufferView::open_with(buf, options, schema)?;
    let root = schema.root_record()?;
    to_owned_with(schema, &root.name, view.root()?, &options.verifier)
}
