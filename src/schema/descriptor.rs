//! Field Descriptor Tables
//!
//! Schema dibangun langsung di kode (tidak ada parsing IDL). Per field,
//! engine hanya butuh: slot index, wire type, dan default value.

use std::collections::HashMap;

use super::value::ScalarValue;
use crate::protocol::wire::{ScalarType, FILE_IDENTIFIER_LENGTH, MAX_SLOTS};
use crate::protocol::{Error, Result};

/// Tipe field dalam record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarType),
    /// Scalar dengan nama value (enum); disimpan sebagai underlying scalar
    Enum(String),
    String,
    Vector(ElementType),
    Record(String),
    Struct(String),
}

/// Tipe elemen vector (nested vector tidak didukung wire format)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Scalar(ScalarType),
    String,
    Record(String),
    Struct(String),
}

/// Satu field dalam record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub slot: u16,
    pub ty: FieldType,
    /// Default untuk scalar/enum; offset fields tidak punya default
    pub default: Option<ScalarValue>,
    /// Slot tetap dipesan tapi field tidak ditulis/dibaca lagi
    pub deprecated: bool,
}

impl FieldDescriptor {
    fn new(name: &str, slot: u16, ty: FieldType, default: Option<ScalarValue>) -> Self {
        Self {
            name: name.to_string(),
            slot,
            ty,
            default,
            deprecated: false,
        }
    }

    /// Scalar field dengan default zero
    pub fn scalar(name: &str, slot: u16, ty: ScalarType) -> Self {
        Self::new(name, slot, FieldType::Scalar(ty), Some(ScalarValue::zero(ty)))
    }

    /// Enum field; default diambil dari `EnumDescriptor` saat schema divalidasi
    pub fn enumeration(name: &str, slot: u16, enum_name: &str) -> Self {
        Self::new(name, slot, FieldType::Enum(enum_name.to_string()), None)
    }

    pub fn string(name: &str, slot: u16) -> Self {
        Self::new(name, slot, FieldType::String, None)
    }

    pub fn vector(name: &str, slot: u16, element: ElementType) -> Self {
        Self::new(name, slot, FieldType::Vector(element), None)
    }

    pub fn record(name: &str, slot: u16, record: &str) -> Self {
        Self::new(name, slot, FieldType::Record(record.to_string()), None)
    }

    pub fn structure(name: &str, slot: u16, structure: &str) -> Self {
        Self::new(name, slot, FieldType::Struct(structure.to_string()), None)
    }

    pub fn with_default(mut self, default: ScalarValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Field disimpan inline (scalar/enum/struct) atau via offset
    pub fn is_inline(&self) -> bool {
        matches!(
            self.ty,
            FieldType::Scalar(_) | FieldType::Enum(_) | FieldType::Struct(_)
        )
    }
}

/// Record: kumpulan field dengan slot unik
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    pub fn new(name: &str, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_slot(&self, slot: u16) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.slot == slot)
    }

    /// Field yang masih aktif
    pub fn live_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.deprecated)
    }
}

/// Field dalam struct, dengan offset hasil layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub ty: ScalarType,
    pub offset: usize,
}

/// Struct fixed-layout: setiap field aligned ke natural size-nya,
/// ukuran total dibulatkan ke alignment terbesar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDescriptor {
    pub name: String,
    pub fields: Vec<StructField>,
    pub size: usize,
    pub align: usize,
}

impl StructDescriptor {
    pub fn new(name: &str, fields: &[(&str, ScalarType)]) -> Self {
        let mut offset = 0usize;
        let mut align = 1usize;
        let mut laid_out = Vec::with_capacity(fields.len());

        for (field_name, ty) in fields {
            let size = ty.size();
            offset += crate::protocol::wire::padding_bytes(offset, size);
            laid_out.push(StructField {
                name: field_name.to_string(),
                ty: *ty,
                offset,
            });
            offset += size;
            align = align.max(size);
        }
        let size = offset + crate::protocol::wire::padding_bytes(offset, align);

        Self {
            name: name.to_string(),
            fields: laid_out,
            size,
            align,
        }
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Enum: nama untuk value scalar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    pub name: String,
    pub underlying: ScalarType,
    pub variants: Vec<(String, i64)>,
    /// Nama variant default
    pub default: String,
}

impl EnumDescriptor {
    pub fn new(name: &str, underlying: ScalarType, variants: &[(&str, i64)], default: &str) -> Self {
        Self {
            name: name.to_string(),
            underlying,
            variants: variants
                .iter()
                .map(|(n, v)| (n.to_string(), *v))
                .collect(),
            default: default.to_string(),
        }
    }

    pub fn value_of(&self, variant: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(n, _)| n == variant)
            .map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}

/// Registry semua descriptor
#[derive(Debug, Clone, Default)]
pub struct Schema {
    records: HashMap<String, RecordDescriptor>,
    structs: HashMap<String, StructDescriptor>,
    enums: HashMap<String, EnumDescriptor>,
    root: Option<String>,
    file_identifier: Option<[u8; FILE_IDENTIFIER_LENGTH]>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: RecordDescriptor) -> Self {
        self.records.insert(record.name.clone(), record);
        self
    }

    pub fn with_struct(mut self, structure: StructDescriptor) -> Self {
        self.structs.insert(structure.name.clone(), structure);
        self
    }

    pub fn with_enum(mut self, enumeration: EnumDescriptor) -> Self {
        self.enums.insert(enumeration.name.clone(), enumeration);
        self
    }

    pub fn with_root(mut self, record: &str) -> Self {
        self.root = Some(record.to_string());
        self
    }

    pub fn with_file_identifier(mut self, identifier: [u8; FILE_IDENTIFIER_LENGTH]) -> Self {
        self.file_identifier = Some(identifier);
        self
    }

    pub fn record(&self, name: &str) -> Result<&RecordDescriptor> {
        self.records
            .get(name)
            .ok_or_else(|| Error::SchemaMismatch(format!("unknown record type `{name}`")))
    }

    pub fn structure(&self, name: &str) -> Result<&StructDescriptor> {
        self.structs
            .get(name)
            .ok_or_else(|| Error::SchemaMismatch(format!("unknown struct type `{name}`")))
    }

    pub fn enumeration(&self, name: &str) -> Result<&EnumDescriptor> {
        self.enums
            .get(name)
            .ok_or_else(|| Error::SchemaMismatch(format!("unknown enum type `{name}`")))
    }

    pub fn root_record(&self) -> Result<&RecordDescriptor> {
        match &self.root {
            Some(name) => self.record(name),
            None => Err(Error::SchemaMismatch("schema has no root type".into())),
        }
    }

    pub fn file_identifier(&self) -> Option<[u8; FILE_IDENTIFIER_LENGTH]> {
        self.file_identifier
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordDescriptor> {
        self.records.values()
    }

    /// Scalar type dan default efektif untuk field inline scalar/enum
    pub fn scalar_of(&self, field: &FieldDescriptor) -> Result<(ScalarType, ScalarValue)> {
        match &field.ty {
            FieldType::Scalar(ty) => {
                let default = field.default.unwrap_or(ScalarValue::zero(*ty));
                Ok((*ty, default))
            }
            FieldType::Enum(name) => {
                let desc = self.enumeration(name)?;
                let default = match field.default {
                    Some(default) => default,
                    None => {
                        let value = desc.value_of(&desc.default).ok_or_else(|| {
                            Error::SchemaMismatch(format!(
                                "enum `{name}` has no variant `{}`",
                                desc.default
                            ))
                        })?;
                        ScalarValue::from_i64(desc.underlying, value)?
                    }
                };
                Ok((desc.underlying, default))
            }
            _ => Err(Error::SchemaMismatch(format!(
                "field `{}` is not a scalar",
                field.name
            ))),
        }
    }

    /// Validasi referensi, slot unik, dan tipe default
    pub fn validate(&self) -> Result<()> {
        if let Some(root) = &self.root {
            self.record(root)?;
        }

        for record in self.records.values() {
            let mut slots: Vec<u16> = record.fields.iter().map(|f| f.slot).collect();
            slots.sort_unstable();
            if let Some(pair) = slots.windows(2).find(|w| w[0] == w[1]) {
                return Err(Error::SchemaMismatch(format!(
                    "record `{}` uses slot {} twice",
                    record.name, pair[0]
                )));
            }

            for field in &record.fields {
                if field.slot as usize >= MAX_SLOTS {
                    return Err(Error::SchemaMismatch(format!(
                        "field `{}.{}` slot {} exceeds maximum",
                        record.name, field.name, field.slot
                    )));
                }
                match &field.ty {
                    FieldType::Scalar(_) | FieldType::Enum(_) => {
                        let (ty, default) = self.scalar_of(field)?;
                        if default.scalar_type() != ty {
                            return Err(Error::SchemaMismatch(format!(
                                "field `{}.{}` default is {}, expected {}",
                                record.name,
                                field.name,
                                default.scalar_type(),
                                ty
                            )));
                        }
                    }
                    FieldType::String => {}
                    FieldType::Record(name) => {
                        self.record(name)?;
                    }
                    FieldType::Struct(name) => {
                        self.structure(name)?;
                    }
                    FieldType::Vector(element) => match element {
                        ElementType::Scalar(_) | ElementType::String => {}
                        ElementType::Record(name) => {
                            self.record(name)?;
                        }
                        ElementType::Struct(name) => {
                            self.structure(name)?;
                        }
                    },
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_layout() {
        let vec3 = StructDescriptor::new(
            "Vec3",
            &[
                ("x", ScalarType::F32),
                ("y", ScalarType::F32),
                ("z", ScalarType::F32),
            ],
        );
        assert_eq!(vec3.size, 12);
        assert_eq!(vec3.align, 4);
        assert_eq!(vec3.field("z").unwrap().offset, 8);

        let mixed = StructDescriptor::new(
            "Mixed",
            &[("a", ScalarType::U8), ("b", ScalarType::F64), ("c", ScalarType::I16)],
        );
        assert_eq!(mixed.field("b").unwrap().offset, 8);
        assert_eq!(mixed.field("c").unwrap().offset, 16);
        assert_eq!(mixed.size, 24);
        assert_eq!(mixed.align, 8);
    }

    #[test]
    fn test_enum_lookup() {
        let color = EnumDescriptor::new(
            "Color",
            ScalarType::I8,
            &[("Red", 0), ("Green", 1), ("Blue", 2)],
            "Blue",
        );
        assert_eq!(color.value_of("Green"), Some(1));
        assert_eq!(color.name_of(2), Some("Blue"));
        assert_eq!(color.name_of(7), None);
    }

    #[test]
    fn test_validate_duplicate_slot() {
        let schema = Schema::new().with_record(RecordDescriptor::new(
            "Bad",
            vec![
                FieldDescriptor::scalar("a", 0, ScalarType::I32),
                FieldDescriptor::string("b", 0),
            ],
        ));
        assert!(matches!(schema.validate(), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn test_validate_unknown_reference() {
        let schema = Schema::new()
            .with_record(RecordDescriptor::new(
                "Holder",
                vec![FieldDescriptor::record("child", 0, "Missing")],
            ))
            .with_root("Holder");
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_default_type() {
        let schema = Schema::new().with_record(RecordDescriptor::new(
            "Bad",
            vec![FieldDescriptor::scalar("hp", 0, ScalarType::I16)
                .with_default(ScalarValue::I32(100))],
        ));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_enum_default_resolution() {
        let schema = Schema::new().with_enum(EnumDescriptor::new(
            "Color",
            ScalarType::I8,
            &[("Red", 0), ("Blue", 2)],
            "Blue",
        ));
        let field = FieldDescriptor::enumeration("color", 6, "Color");

        let (ty, default) = schema.scalar_of(&field).unwrap();
        assert_eq!(ty, ScalarType::I8);
        assert_eq!(default, ScalarValue::I8(2));
    }
}
