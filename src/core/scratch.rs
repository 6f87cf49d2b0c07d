//! Back-to-Front Scratch Buffer
//!
//! Data ditulis dari akhir buffer ke depan. Posisi object disimpan sebagai
//! jarak dari akhir (revloc), sehingga grow (copy ke buffer yang lebih besar)
//! tidak mengubah posisi yang sudah diberikan ke pemanggil.

use tracing::trace;

use crate::protocol::wire::Scalar;
use crate::protocol::{Error, Result};

/// Growable buffer untuk builder
///
/// Region terpakai selalu `buf[head..]`.
pub struct ScratchBuffer {
    buf: Vec<u8>,
    head: usize,
    max_size: usize,
}

impl ScratchBuffer {
    /// Membuat scratch buffer dengan kapasitas awal dan batas ukuran
    pub fn new(initial_capacity: usize, max_size: usize) -> Self {
        let capacity = initial_capacity.min(max_size);
        Self {
            buf: vec![0u8; capacity],
            head: capacity,
            max_size,
        }
    }

    /// Bytes yang sudah terpakai (dari akhir buffer)
    #[inline(always)]
    pub fn used(&self) -> usize {
        self.buf.len() - self.head
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline(always)]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Reserve `len` bytes (zero-filled) di depan region terpakai.
    ///
    /// Returns posisi awal region baru dalam buffer internal.
    #[inline(always)]
    pub fn reserve(&mut self, len: usize) -> Result<usize> {
        if len > self.head {
            self.grow(len)?;
        }
        self.head -= len;
        self.buf[self.head..self.head + len].fill(0);
        Ok(self.head)
    }

    /// Geometric growth: kapasitas digandakan sampai cukup
    fn grow(&mut self, additional: usize) -> Result<()> {
        let used = self.used();
        let limit = self.max_size;
        let required = used
            .checked_add(additional)
            .ok_or(Error::SizeLimitExceeded {
                requested: usize::MAX,
                limit,
            })?;
        if required > limit {
            return Err(Error::SizeLimitExceeded {
                requested: required,
                limit,
            });
        }

        let mut new_capacity = self.buf.len().max(64);
        while new_capacity < required {
            new_capacity = new_capacity.saturating_mul(2);
        }
        let new_capacity = new_capacity.min(limit);

        let mut new_buf = vec![0u8; new_capacity];
        new_buf[new_capacity - used..].copy_from_slice(&self.buf[self.head..]);

        trace!(
            old_capacity = self.buf.len(),
            new_capacity,
            used,
            "scratch buffer grown"
        );

        self.buf = new_buf;
        self.head = new_capacity - used;
        Ok(())
    }

    /// Tulis bytes di depan region terpakai
    #[inline(always)]
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let start = self.reserve(bytes.len())?;
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Tulis scalar little-endian (tanpa alignment; itu tugas builder)
    #[inline(always)]
    pub fn push_scalar<T: Scalar>(&mut self, value: T) -> Result<()> {
        let start = self.reserve(T::SIZE)?;
        value.write_le(&mut self.buf[start..start + T::SIZE]);
        Ok(())
    }

    /// Slice yang dimulai pada revloc tertentu
    #[inline(always)]
    pub fn at_revloc(&self, revloc: usize, len: usize) -> &[u8] {
        let start = self.buf.len() - revloc;
        &self.buf[start..start + len]
    }

    #[inline(always)]
    pub fn at_revloc_mut(&mut self, revloc: usize, len: usize) -> &mut [u8] {
        let start = self.buf.len() - revloc;
        &mut self.buf[start..start + len]
    }

    /// Region yang sudah ditulis
    #[inline(always)]
    pub fn data(&self) -> &[u8] {
        &self.buf[self.head..]
    }

    /// Reset untuk reuse; kapasitas dipertahankan
    #[inline(always)]
    pub fn clear(&mut self) {
        self.head = self.buf.len();
    }

    /// Ambil region terpakai sebagai Vec tanpa copy kedua
    pub fn into_vec(self) -> Vec<u8> {
        let mut buf = self.buf;
        buf.drain(..self.head);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_back_to_front() {
        let mut scratch = ScratchBuffer::new(16, 1024);

        scratch.push_bytes(b"cd").unwrap();
        scratch.push_bytes(b"ab").unwrap();

        assert_eq!(scratch.data(), b"abcd");
        assert_eq!(scratch.used(), 4);
    }

    #[test]
    fn test_grow_keeps_revlocs() {
        let mut scratch = ScratchBuffer::new(4, 1 << 20);

        scratch.push_scalar(0xDEAD_BEEFu32).unwrap();
        let revloc = scratch.used();

        // Paksa beberapa kali grow
        for i in 0..100u32 {
            scratch.push_scalar(i).unwrap();
        }

        assert!(scratch.capacity() >= 404);
        assert_eq!(u32::read_le(scratch.at_revloc(revloc, 4)), 0xDEAD_BEEF);
    }

    #[test]
    fn test_size_limit() {
        let mut scratch = ScratchBuffer::new(8, 32);

        scratch.push_bytes(&[1u8; 30]).unwrap();
        let err = scratch.push_bytes(&[1u8; 3]).unwrap_err();

        assert_eq!(
            err,
            Error::SizeLimitExceeded {
                requested: 33,
                limit: 32
            }
        );
        // Isi lama tidak berubah
        assert_eq!(scratch.used(), 30);
    }

    #[test]
    fn test_clear_and_reserve_zero_fills() {
        let mut scratch = ScratchBuffer::new(8, 64);

        scratch.push_bytes(&[0xFF; 8]).unwrap();
        scratch.clear();
        assert_eq!(scratch.used(), 0);

        scratch.reserve(4).unwrap();
        assert_eq!(scratch.data(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_into_vec() {
        let mut scratch = ScratchBuffer::new(32, 64);
        scratch.push_bytes(b"xyz").unwrap();

        assert_eq!(scratch.into_vec(), b"xyz".to_vec());
    }
}
