//! Protocol Layer: Zero-Copy Binary Encoding
//!
//! Prinsip desain:
//! - Flat Binary: Field dibaca langsung dari buffer tanpa parsing
//! - Relative Offsets: Buffer bisa dipindah/di-mmap tanpa relokasi
//! - Bounds-Checked: Setiap offset dicek tepat saat di-dereference

pub mod builder;
pub mod error;
pub mod verifier;
pub mod view;
pub mod wire;

pub use builder::{Builder, BuilderConfig};
pub use error::{Error, Result};
pub use verifier::VerifierOptions;
pub use view::{
    BufferView, Follow, ReaderOptions, StrView, StructVectorView, StructView, TableView,
    VectorIter, VectorView,
};
pub use wire::{Offset, Scalar, ScalarType, StrMarker, TableMarker, VectorMarker};
