//! Schema Layer: Descriptor Tables dan Generic Codec
//!
//! Schema dibangun di kode sebagai tabel descriptor; satu codec generic
//! meng-encode dan men-decode semua record type.

pub mod codec;
pub mod descriptor;
pub mod sample;
pub mod value;

pub use codec::{
    decode_root, encode, encode_root, to_owned, to_owned_with, DynElement, DynVector, FieldView,
};
pub use descriptor::{
    ElementType, EnumDescriptor, FieldDescriptor, FieldType, RecordDescriptor, Schema,
    StructDescriptor, StructField,
};
pub use value::{Record, ScalarValue, Value};
