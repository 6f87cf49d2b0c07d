//! Memory-Mapped Buffer Files untuk Zero-Copy Read
//!
//! Buffer final ditulis sekali ke file, lalu di-mmap read-only:
//! - Zero-copy read: view langsung di atas page cache
//! - Page-aligned: alignment field di buffer tetap berlaku di memory
//! - Engine sendiri tidak pernah melakukan I/O; modul ini hanya
//!   menyediakan byte region untuk `BufferView`

use memmap2::{Mmap, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use tracing::debug;

use crate::protocol::{BufferView, ReaderOptions, Result};
use crate::schema::Schema;

/// Buffer read-only yang di-mmap dari file
pub struct MappedBuffer {
    mmap: Mmap,
}

impl MappedBuffer {
    /// Tulis `bytes` ke `path` (truncate jika ada) dan map hasilnya
    pub fn create<P: AsRef<Path>>(path: P, bytes: &[u8]) -> io::Result<Self> {
        let path = path.as_ref();
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map an empty buffer",
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(bytes.len() as u64)?;

        // SAFETY: File baru saja dibuat dengan read/write permission dan
        // panjang yang sesuai; mapping dimiliki sepenuhnya oleh struct ini
        let mut mmap = unsafe { MmapOptions::new().len(bytes.len()).map_mut(&file)? };
        mmap.copy_from_slice(bytes);
        mmap.flush()?;

        debug!(path = %path.display(), bytes = bytes.len(), "buffer file written");

        Ok(Self {
            mmap: mmap.make_read_only()?,
        })
    }

    /// Map file buffer yang sudah ada (read-only)
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "buffer file is empty",
            ));
        }

        // SAFETY: Mapping read-only; file tidak boleh diubah proses lain
        // selama MappedBuffer hidup
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        debug!(path = %path.display(), bytes = len, "buffer file mapped");
        Ok(Self { mmap })
    }

    /// Bytes di mmap region (zero-copy)
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Lazy view di atas file
    pub fn view(&self) -> Result<BufferView<'_>> {
        BufferView::open(self.as_bytes())
    }

    /// View dengan opsi (mis. strict verification)
    pub fn view_with(&self, options: &ReaderOptions, schema: &Schema) -> Result<BufferView<'_>> {
        BufferView::open_with(self.as_bytes(), options, schema)
    }
}
