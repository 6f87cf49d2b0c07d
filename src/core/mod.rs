//! Core module: Scratch Buffer dan Mmap-backed Buffer Files
//!
//! Prinsip desain:
//! - Back-to-Front: Scratch buffer tumbuh ke depan, posisi stabil saat grow
//! - Zero-Copy: Buffer file di-mmap, tidak ada copy ke user space

mod mmap_storage;
mod scratch;

pub use mmap_storage::MappedBuffer;
pub use scratch::ScratchBuffer;
