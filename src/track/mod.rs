//! Track file writer and reader.
//!
//! File layout:
//!
//! ```text
//!   header pack | fill | primer + sets | fill
//!   body pack   | fill | [index segments | fill] | edit unit*      (1..N)
//!   footer pack | fill | index segments | fill
//!   random index pack
//! ```
//!
//! An edit unit is the essence triplet (or its encrypted envelope), the
//! optional per-frame metadata triplet, then fill up to the KAG.
//!
//! The header byte count and the index byte count of a partition are both
//! measured from the first byte after the fill that follows the pack.

mod reader;
mod writer;

pub use reader::TrackFileReader;
pub use writer::{TrackFileWriter, WriterState};

use std::io::{Read, Seek, SeekFrom};

use crate::crypto::{EncryptionContext, FrameCipher, KeyedHash};
use crate::error::Result;
use crate::index::FLAG_RANDOM_ACCESS;
use crate::klv;

/// Per-frame index data and metadata for [`TrackFileWriter::write_frame_with`].
#[derive(Debug, Clone, Copy)]
pub struct FrameOptions<'a> {
    pub flags: u8,
    pub temporal_offset: i8,
    pub key_frame_offset: i8,
    /// Payload of the metadata triplet written after the essence.
    pub metadata: Option<&'a [u8]>,
}

impl Default for FrameOptions<'_> {
    fn default() -> Self {
        Self { flags: FLAG_RANDOM_ACCESS, temporal_offset: 0, key_frame_offset: 0, metadata: None }
    }
}

impl<'a> FrameOptions<'a> {
    pub fn with_metadata(metadata: &'a [u8]) -> Self {
        Self { metadata: Some(metadata), ..Self::default() }
    }
}

/// Decryption collaborators for one read call.
#[derive(Clone, Copy, Default)]
pub struct ReadContext<'a> {
    pub cipher: Option<&'a dyn FrameCipher>,
    pub hmac: Option<&'a dyn KeyedHash>,
}

impl<'a> ReadContext<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_crypto(ctx: &'a EncryptionContext) -> Self {
        Self { cipher: Some(ctx.cipher.as_ref()), hmac: ctx.mac.as_deref() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Plaintext,
    Decrypted,
    /// The file is encrypted and no cipher was supplied; the data is the raw
    /// encrypted source value (IV followed by ciphertext).
    EncryptedNoKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub status: FrameStatus,
}

/// Caller-owned frame storage reused across reads.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    data: Vec<u8>,
    status: FrameStatus,
    frame_number: Option<u32>,
}

impl FrameBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity), status: FrameStatus::Plaintext, frame_number: None }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn status(&self) -> FrameStatus {
        self.status
    }

    /// Frame last read into this buffer.
    pub fn frame_number(&self) -> Option<u32> {
        self.frame_number
    }

    pub fn into_frame(self) -> Frame {
        Frame { data: self.data, status: self.status }
    }

    fn fill_from(&mut self, bytes: &[u8], status: FrameStatus, frame: u32) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
        self.status = status;
        self.frame_number = Some(frame);
    }

    /// Read `len` bytes straight into the buffer, keeping its allocation.
    fn read_from<R: Read>(&mut self, r: &mut R, len: usize, status: FrameStatus, frame: u32) -> Result<()> {
        self.data.resize(len, 0);
        if let Err(e) = r.read_exact(&mut self.data) {
            self.data.clear();
            return Err(e.into());
        }
        self.status = status;
        self.frame_number = Some(frame);
        Ok(())
    }

    fn reset(&mut self) {
        self.data.clear();
        self.frame_number = None;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

/// Position of the first non-fill byte at or after `pos`, stopping at `end`.
fn skip_fill_from<R: Read + Seek>(r: &mut R, mut pos: u64, end: u64) -> Result<u64> {
    while pos + klv::MIN_TRIPLET_LEN <= end {
        r.seek(SeekFrom::Start(pos))?;
        let header = klv::read_klv_header(r)?;
        if !header.is_fill() {
            break;
        }
        pos += header.total_size;
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::labels;
    use std::io::Cursor;

    #[test]
    fn fill_is_skipped_up_to_limit() {
        let mut bytes = klv::fill_item(40);
        bytes.extend(klv::encode(&labels::PREFACE, b"x"));
        let end = bytes.len() as u64;
        let mut cur = Cursor::new(bytes);
        assert_eq!(skip_fill_from(&mut cur, 0, end).unwrap(), 40);
        assert_eq!(skip_fill_from(&mut cur, 0, 30).unwrap(), 0);
    }

    #[test]
    fn buffer_reuses_allocation() {
        let mut buf = FrameBuffer::with_capacity(64);
        buf.fill_from(&[1, 2, 3], FrameStatus::Plaintext, 7);
        let cap = buf.capacity();
        buf.fill_from(&[4; 10], FrameStatus::Decrypted, 8);
        assert_eq!(buf.capacity(), cap);
        assert_eq!(buf.frame_number(), Some(8));
        assert_eq!(buf.into_frame().data.len(), 10);
    }
}
