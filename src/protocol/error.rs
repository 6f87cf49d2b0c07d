//! Error types untuk builder, reader, dan codec
//!
//! Builder errors adalah programming/configuration errors (tidak di-retry).
//! Reader errors berasal dari input yang tidak dipercaya (file, socket).

use thiserror::Error;

/// Semua error flatwire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Child object di-reference sebelum ditulis, atau builder dipakai
    /// di luar urutan bottom-up.
    #[error("order violation: {0}")]
    OrderViolation(&'static str),

    /// Buffer akan melebihi batas ukuran yang dikonfigurasi
    #[error("size limit exceeded: {requested} bytes requested, limit is {limit}")]
    SizeLimitExceeded { requested: usize, limit: usize },

    /// String bytes bukan UTF-8 valid
    #[error("invalid UTF-8 in string data")]
    InvalidUtf8,

    /// Slot yang sama ditambahkan dua kali ke satu record
    #[error("field slot {slot} added twice to the same record")]
    DuplicateField { slot: u16 },

    /// Buffer lebih pendek dari root header minimal
    #[error("truncated buffer: need at least {needed} bytes, got {actual}")]
    TruncatedBuffer { needed: usize, actual: usize },

    /// Offset atau length menunjuk ke luar buffer, atau struktur rusak
    #[error("corrupt buffer at byte {position}: {reason}")]
    CorruptBuffer {
        position: usize,
        reason: &'static str,
    },

    /// Index vector di luar `[0, len)`
    #[error("index {index} out of range for vector of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Owned value atau view tidak cocok dengan descriptor
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

/// Result type untuk semua operasi flatwire.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    #[inline]
    pub(crate) fn corrupt(position: usize, reason: &'static str) -> Self {
        Error::CorruptBuffer { position, reason }
    }

    /// Error lokal dari sisi builder (bug pemanggil atau konfigurasi).
    pub fn is_builder_error(&self) -> bool {
        matches!(
            self,
            Error::OrderViolation(_)
                | Error::SizeLimitExceeded { .. }
                | Error::InvalidUtf8
                | Error::DuplicateField { .. }
        )
    }

    /// Error karena buffer dari sumber luar rusak atau terpotong.
    ///
    /// Pemanggil yang memutuskan: retry, drop, atau disconnect peer.
    pub fn is_untrusted_input(&self) -> bool {
        matches!(
            self,
            Error::TruncatedBuffer { .. }
                | Error::CorruptBuffer { .. }
                | Error::IndexOutOfRange { .. }
        )
    }
}
