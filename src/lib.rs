//! Flatwire - Schema-Driven Binary Serialization Engine
//!
//! Arsitektur:
//! - Back-to-Front Builder: Children ditulis sebelum parent, offset relatif
//! - Zero-Copy Reader: View lazy di atas `&[u8]`, bounds-checked
//! - Data-Driven Codec: Satu codec generic untuk semua record type
//! - Mmap Files: Buffer final bisa di-map langsung dari disk
//!
//! Wire format kompatibel dengan FlatBuffers (little-endian, vtable per
//! record, relative uoffset).
//!
//! ```
//! use flatwire::{BufferView, Builder};
//!
//! let mut builder = Builder::new();
//! let name = builder.create_string("Orc").unwrap();
//! builder.start_record().unwrap();
//! builder.add_field_offset(3, name).unwrap();
//! builder.add_field(2, 300i16, 100).unwrap();
//! let root = builder.end_record().unwrap();
//! let bytes = builder.finish(root).unwrap();
//!
//! let monster = BufferView::open(bytes).unwrap().root().unwrap();
//! assert_eq!(monster.get_str(3).unwrap().unwrap(), "Orc");
//! assert_eq!(monster.get::<i16>(2, 100).unwrap(), 300);
//! ```

pub mod core;
pub mod protocol;
pub mod schema;

pub use crate::core::MappedBuffer;
pub use crate::protocol::{
    BufferView, Builder, BuilderConfig, Error, Offset, ReaderOptions, Result, ScalarType,
    StrView, StructView, TableView, VectorView, VerifierOptions,
};
pub use crate::schema::{Record, ScalarValue, Schema, Value};
