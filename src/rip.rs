//! Random index pack: the tail directory of partition offsets.
//!
//! Layout: `key | BER length | (u32 BodySID | u64 offset)* | u32 total length`
//! where the trailing u32 is the size of the whole triplet, so a reader can
//! locate it from the last four bytes of the file.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::klv;
use crate::label::labels;

const ENTRY_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipEntry {
    pub body_sid: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rip {
    pub entries: Vec<RipEntry>,
}

impl Rip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, body_sid: u32, offset: u64) {
        self.entries.push(RipEntry { body_sid, offset });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The complete triplet, trailing length included.
    pub fn encode(&self) -> Vec<u8> {
        let value_len = self.entries.len() * ENTRY_LEN + 4;
        let total = klv::KEY_LEN + klv::ber_len_size(value_len as u64) + value_len;
        let mut value = Vec::with_capacity(value_len);
        for e in &self.entries {
            value.extend_from_slice(&e.body_sid.to_be_bytes());
            value.extend_from_slice(&e.offset.to_be_bytes());
        }
        value.extend_from_slice(&(total as u32).to_be_bytes());
        klv::encode(&labels::RANDOM_INDEX_PACK, &value)
    }

    /// Decode a complete triplet.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = klv::decode(bytes, 0)?;
        if header.label != labels::RANDOM_INDEX_PACK {
            return Err(Error::format(format!("expected a random index pack, found {}", header.label)));
        }
        if header.total_size != bytes.len() as u64 {
            return Err(Error::format("random index pack length disagrees with its trailer"));
        }
        let value = &bytes[header.value_offset..];
        if value.len() < 4 || (value.len() - 4) % ENTRY_LEN != 0 {
            return Err(Error::format(format!("random index pack value of {} bytes", value.len())));
        }
        let (body, trailer) = value.split_at(value.len() - 4);
        if BigEndian::read_u32(trailer) as usize != bytes.len() {
            return Err(Error::format("random index pack trailer mismatch"));
        }
        let entries = body
            .chunks_exact(ENTRY_LEN)
            .map(|c| RipEntry {
                body_sid: BigEndian::read_u32(&c[0..4]),
                offset: BigEndian::read_u64(&c[4..12]),
            })
            .collect();
        Ok(Self { entries })
    }

    /// Locate and decode the pack from the end of a stream of `file_size`
    /// bytes.
    pub fn read_from_end<R: Read + Seek>(r: &mut R, file_size: u64) -> Result<Self> {
        if file_size < klv::MIN_TRIPLET_LEN + 4 {
            return Err(Error::format("file too short for a random index pack"));
        }
        r.seek(SeekFrom::Start(file_size - 4))?;
        let mut trailer = [0u8; 4];
        r.read_exact(&mut trailer)?;
        let total = BigEndian::read_u32(&trailer) as u64;
        if total < klv::MIN_TRIPLET_LEN + 4 || total > file_size {
            return Err(Error::format(format!(
                "random index pack length {total} does not fit a {file_size}-byte file"
            )));
        }
        r.seek(SeekFrom::Start(file_size - total))?;
        let mut bytes = vec![0u8; total as usize];
        r.read_exact(&mut bytes)?;
        let rip = Self::decode(&bytes)?;
        if let Some(bad) = rip.entries.iter().find(|e| e.offset >= file_size - total) {
            return Err(Error::format(format!(
                "random index pack entry {} points past the partitions",
                bad.offset
            )));
        }
        Ok(rip)
    }
}
