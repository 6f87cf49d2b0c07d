//! Owned Values
//!
//! Representasi in-memory yang sepenuhnya owned, hasil `to_owned` dari
//! view, atau input untuk `encode`. Dipakai saat data harus hidup lebih
//! lama dari buffer.

use std::collections::BTreeMap;
use std::fmt;

use crate::protocol::wire::{Scalar, ScalarType};
use crate::protocol::{Error, Result};

/// Scalar bertipe
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

/// Jalankan `$body` dengan `$v` terikat ke value primitif di dalam `ScalarValue`
macro_rules! with_scalar {
    ($value:expr, $v:ident => $body:expr) => {
        match $value {
            ScalarValue::Bool($v) => $body,
            ScalarValue::I8($v) => $body,
            ScalarValue::U8($v) => $body,
            ScalarValue::I16($v) => $body,
            ScalarValue::U16($v) => $body,
            ScalarValue::I32($v) => $body,
            ScalarValue::U32($v) => $body,
            ScalarValue::I64($v) => $body,
            ScalarValue::U64($v) => $body,
            ScalarValue::F32($v) => $body,
            ScalarValue::F64($v) => $body,
        }
    };
}

pub(crate) use with_scalar;

impl ScalarValue {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Bool(_) => ScalarType::Bool,
            Self::I8(_) => ScalarType::I8,
            Self::U8(_) => ScalarType::U8,
            Self::I16(_) => ScalarType::I16,
            Self::U16(_) => ScalarType::U16,
            Self::I32(_) => ScalarType::I32,
            Self::U32(_) => ScalarType::U32,
            Self::I64(_) => ScalarType::I64,
            Self::U64(_) => ScalarType::U64,
            Self::F32(_) => ScalarType::F32,
            Self::F64(_) => ScalarType::F64,
        }
    }

    pub fn zero(ty: ScalarType) -> Self {
        match ty {
            ScalarType::Bool => Self::Bool(false),
            ScalarType::I8 => Self::I8(0),
            ScalarType::U8 => Self::U8(0),
            ScalarType::I16 => Self::I16(0),
            ScalarType::U16 => Self::U16(0),
            ScalarType::I32 => Self::I32(0),
            ScalarType::U32 => Self::U32(0),
            ScalarType::I64 => Self::I64(0),
            ScalarType::U64 => Self::U64(0),
            ScalarType::F32 => Self::F32(0.0),
            ScalarType::F64 => Self::F64(0.0),
        }
    }

    /// Konversi integer ke tipe `ty`; gagal jika tidak muat
    pub fn from_i64(ty: ScalarType, value: i64) -> Result<Self> {
        let out_of_range =
            || Error::SchemaMismatch(format!("value {value} does not fit in {ty}"));
        Ok(match ty {
            ScalarType::Bool => Self::Bool(value != 0),
            ScalarType::I8 => Self::I8(i8::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::U8 => Self::U8(u8::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::I16 => Self::I16(i16::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::U16 => Self::U16(u16::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::I32 => Self::I32(i32::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::U32 => Self::U32(u32::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::I64 => Self::I64(value),
            ScalarType::U64 => Self::U64(u64::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::F32 => Self::F32(value as f32),
            ScalarType::F64 => Self::F64(value as f64),
        })
    }

    /// Nilai integer (untuk enum dan tampilan); None untuk float
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Bool(v) => Some(v as i64),
            Self::I8(v) => Some(v as i64),
            Self::U8(v) => Some(v as i64),
            Self::I16(v) => Some(v as i64),
            Self::U16(v) => Some(v as i64),
            Self::I32(v) => Some(v as i64),
            Self::U32(v) => Some(v as i64),
            Self::I64(v) => Some(v),
            Self::U64(v) => i64::try_from(v).ok(),
            Self::F32(_) | Self::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::F32(v) => v as f64,
            Self::F64(v) => v,
            Self::U64(v) => v as f64,
            other => other.as_i64().unwrap_or(0) as f64,
        }
    }

    /// Baca scalar bertipe `ty` dari bytes (minimal `ty.size()`)
    pub fn read_le(ty: ScalarType, bytes: &[u8]) -> Self {
        match ty {
            ScalarType::Bool => Self::Bool(bool::read_le(bytes)),
            ScalarType::I8 => Self::I8(i8::read_le(bytes)),
            ScalarType::U8 => Self::U8(u8::read_le(bytes)),
            ScalarType::I16 => Self::I16(i16::read_le(bytes)),
            ScalarType::U16 => Self::U16(u16::read_le(bytes)),
            ScalarType::I32 => Self::I32(i32::read_le(bytes)),
            ScalarType::U32 => Self::U32(u32::read_le(bytes)),
            ScalarType::I64 => Self::I64(i64::read_le(bytes)),
            ScalarType::U64 => Self::U64(u64::read_le(bytes)),
            ScalarType::F32 => Self::F32(f32::read_le(bytes)),
            ScalarType::F64 => Self::F64(f64::read_le(bytes)),
        }
    }

    /// Tulis little-endian ke `out` (minimal `size()` bytes)
    pub fn write_le(&self, out: &mut [u8]) {
        with_scalar!(*self, v => v.write_le(out))
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_scalar!(*self, v => write!(f, "{v}"))
    }
}

/// Value owned untuk satu field
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(ScalarValue),
    String(String),
    /// String field yang bukan UTF-8 valid (raw bytes diteruskan apa adanya)
    Bytes(Vec<u8>),
    Vector(Vec<Value>),
    Record(Record),
    Struct(Record),
}

impl Value {
    pub fn as_scalar(&self) -> Option<ScalarValue> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[Value]> {
        match self {
            Self::Vector(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) | Self::Struct(r) => Some(r),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Vector(_) => "vector",
            Self::Record(_) => "record",
            Self::Struct(_) => "struct",
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl From<$ty> for ScalarValue {
                fn from(v: $ty) -> Self {
                    ScalarValue::$variant(v)
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Scalar(ScalarValue::$variant(v))
                }
            }
        )*
    };
}

impl_from_scalar!(
    bool => Bool, i8 => I8, u8 => U8, i16 => I16, u16 => U16,
    i32 => I32, u32 => U32, i64 => I64, u64 => U64, f32 => F32, f64 => F64
);

impl From<ScalarValue> for Value {
    fn from(v: ScalarValue) -> Self {
        Value::Scalar(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Vector(v)
    }
}

/// Record owned: field name -> value
///
/// Field absent tidak ada di map (empty vector != absent).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style set
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_scalar(&self, name: &str) -> Option<ScalarValue> {
        self.get(name).and_then(Value::as_scalar)
    }

    pub fn get_vector(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_vector)
    }

    pub fn get_record(&self, name: &str) -> Option<&Record> {
        self.get(name).and_then(Value::as_record)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
