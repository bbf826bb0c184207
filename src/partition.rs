//! Partition packs.
//!
//! Value layout (big-endian, 88 + 16·N bytes):
//!
//!   major u16 | minor u16 | KAG u32 | this u64 | previous u64 | footer u64
//!   | header byte count u64 | index byte count u64 | IndexSID u32
//!   | body offset u64 | BodySID u32 | operational pattern (16)
//!   | essence containers batch (u32 N, u32 16, N labels)
//!
//! Key byte 13 is the partition kind and byte 14 its status. Every field is
//! fixed width, so a pack can be rewritten in place once its final values
//! are known.

use std::io::{self, Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};
use crate::klv;
use crate::label::{labels, Label};

pub const MAJOR_VERSION: u16 = 1;
pub const MINOR_VERSION: u16 = 3;
/// Value length without the essence container labels.
pub const FIXED_VALUE_LEN: usize = 88;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PartitionKind {
    Header,
    Body,
    Footer,
}

impl PartitionKind {
    fn key_byte(self) -> u8 {
        match self {
            PartitionKind::Header => 0x02,
            PartitionKind::Body => 0x03,
            PartitionKind::Footer => 0x04,
        }
    }

    fn from_key_byte(b: u8) -> Option<Self> {
        match b {
            0x02 => Some(PartitionKind::Header),
            0x03 => Some(PartitionKind::Body),
            0x04 => Some(PartitionKind::Footer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    OpenIncomplete,
    ClosedIncomplete,
    OpenComplete,
    ClosedComplete,
}

impl PartitionStatus {
    fn key_byte(self) -> u8 {
        match self {
            PartitionStatus::OpenIncomplete => 0x01,
            PartitionStatus::ClosedIncomplete => 0x02,
            PartitionStatus::OpenComplete => 0x03,
            PartitionStatus::ClosedComplete => 0x04,
        }
    }

    fn from_key_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(PartitionStatus::OpenIncomplete),
            0x02 => Some(PartitionStatus::ClosedIncomplete),
            0x03 => Some(PartitionStatus::OpenComplete),
            0x04 => Some(PartitionStatus::ClosedComplete),
            _ => None,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, PartitionStatus::ClosedIncomplete | PartitionStatus::ClosedComplete)
    }

    pub fn is_complete(self) -> bool {
        matches!(self, PartitionStatus::OpenComplete | PartitionStatus::ClosedComplete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPack {
    pub kind: PartitionKind,
    pub status: PartitionStatus,
    pub major_version: u16,
    pub minor_version: u16,
    pub kag_size: u32,
    pub this_partition: u64,
    pub previous_partition: u64,
    pub footer_partition: u64,
    pub header_byte_count: u64,
    pub index_byte_count: u64,
    pub index_sid: u32,
    pub body_offset: u64,
    pub body_sid: u32,
    pub operational_pattern: Label,
    pub essence_containers: Vec<Label>,
}

impl PartitionPack {
    pub fn new(kind: PartitionKind, status: PartitionStatus, kag_size: u32) -> Self {
        Self {
            kind,
            status,
            major_version: MAJOR_VERSION,
            minor_version: MINOR_VERSION,
            kag_size,
            this_partition: 0,
            previous_partition: 0,
            footer_partition: 0,
            header_byte_count: 0,
            index_byte_count: 0,
            index_sid: 0,
            body_offset: 0,
            body_sid: 0,
            operational_pattern: labels::OP1A,
            essence_containers: Vec::new(),
        }
    }

    pub fn key(&self) -> Label {
        let mut key = labels::PARTITION_PACK_BASE;
        key.0[13] = self.kind.key_byte();
        key.0[14] = self.status.key_byte();
        key
    }

    pub fn encode_value(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(FIXED_VALUE_LEN + 16 * self.essence_containers.len());
        v.extend_from_slice(&self.major_version.to_be_bytes());
        v.extend_from_slice(&self.minor_version.to_be_bytes());
        v.extend_from_slice(&self.kag_size.to_be_bytes());
        v.extend_from_slice(&self.this_partition.to_be_bytes());
        v.extend_from_slice(&self.previous_partition.to_be_bytes());
        v.extend_from_slice(&self.footer_partition.to_be_bytes());
        v.extend_from_slice(&self.header_byte_count.to_be_bytes());
        v.extend_from_slice(&self.index_byte_count.to_be_bytes());
        v.extend_from_slice(&self.index_sid.to_be_bytes());
        v.extend_from_slice(&self.body_offset.to_be_bytes());
        v.extend_from_slice(&self.body_sid.to_be_bytes());
        v.extend_from_slice(self.operational_pattern.as_bytes());
        v.extend_from_slice(&(self.essence_containers.len() as u32).to_be_bytes());
        v.extend_from_slice(&16u32.to_be_bytes());
        for ec in &self.essence_containers {
            v.extend_from_slice(ec.as_bytes());
        }
        v
    }

    /// The complete pack triplet.
    pub fn to_klv(&self) -> Vec<u8> {
        klv::encode(&self.key(), &self.encode_value())
    }

    /// Encoded triplet size; stable across status and offset changes.
    pub fn encoded_len(&self) -> u64 {
        let value = (FIXED_VALUE_LEN + 16 * self.essence_containers.len()) as u64;
        klv::KEY_LEN as u64 + klv::ber_len_size(value) as u64 + value
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        let bytes = self.to_klv();
        w.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }

    pub fn decode(key: &Label, value: &[u8]) -> Result<Self> {
        if !key.is_partition_pack() {
            return Err(Error::format(format!("{key} is not a partition pack key")));
        }
        let kind = PartitionKind::from_key_byte(key.0[13])
            .ok_or_else(|| Error::format(format!("partition kind {:02x}", key.0[13])))?;
        let status = PartitionStatus::from_key_byte(key.0[14])
            .ok_or_else(|| Error::format(format!("partition status {:02x}", key.0[14])))?;
        if value.len() < FIXED_VALUE_LEN {
            return Err(Error::format(format!("partition pack value of {} bytes", value.len())));
        }

        let mut r = value;
        let major_version = r.read_u16::<BigEndian>()?;
        let minor_version = r.read_u16::<BigEndian>()?;
        let kag_size = r.read_u32::<BigEndian>()?;
        let this_partition = r.read_u64::<BigEndian>()?;
        let previous_partition = r.read_u64::<BigEndian>()?;
        let footer_partition = r.read_u64::<BigEndian>()?;
        let header_byte_count = r.read_u64::<BigEndian>()?;
        let index_byte_count = r.read_u64::<BigEndian>()?;
        let index_sid = r.read_u32::<BigEndian>()?;
        let body_offset = r.read_u64::<BigEndian>()?;
        let body_sid = r.read_u32::<BigEndian>()?;
        let mut op = [0u8; 16];
        r.read_exact(&mut op)?;
        let count = r.read_u32::<BigEndian>()? as usize;
        let item_size = r.read_u32::<BigEndian>()?;
        if item_size != 16 || r.len() != count * 16 {
            return Err(Error::format("malformed essence container batch in partition pack"));
        }
        let essence_containers = r.chunks_exact(16).filter_map(Label::from_slice).collect();

        Ok(Self {
            kind,
            status,
            major_version,
            minor_version,
            kag_size,
            this_partition,
            previous_partition,
            footer_partition,
            header_byte_count,
            index_byte_count,
            index_sid,
            body_offset,
            body_sid,
            operational_pattern: Label(op),
            essence_containers,
        })
    }

    /// Read a pack at the current stream position.
    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let header = klv::read_klv_header(r)?;
        if !header.label.is_partition_pack() {
            return Err(Error::format(format!(
                "expected a partition pack, found {}",
                header.label
            )));
        }
        if header.length > 64 * 1024 {
            return Err(Error::format(format!("partition pack of {} bytes", header.length)));
        }
        let mut value = vec![0u8; header.length as usize];
        r.read_exact(&mut value)?;
        Self::decode(&header.label, &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn body_pack() -> PartitionPack {
        let mut p = PartitionPack::new(PartitionKind::Body, PartitionStatus::ClosedComplete, 512);
        p.this_partition = 4096;
        p.previous_partition = 0;
        p.body_offset = 1_000_000;
        p.body_sid = 1;
        p.essence_containers = vec![labels::PRORES_ESSENCE_CONTAINER];
        p
    }

    #[test]
    fn key_carries_kind_and_status() {
        let key = body_pack().key();
        assert_eq!(key.0[13], 0x03);
        assert_eq!(key.0[14], 0x04);
        assert!(key.is_partition_pack());
    }

    #[test]
    fn value_layout() {
        let p = body_pack();
        let v = p.encode_value();
        assert_eq!(v.len(), FIXED_VALUE_LEN + 16);
        assert_eq!(&v[8..16], &4096u64.to_be_bytes());
        assert_eq!(&v[52..60], &1_000_000u64.to_be_bytes());
        assert_eq!(&v[60..64], &1u32.to_be_bytes());
        assert_eq!(&v[80..84], &1u32.to_be_bytes());
        assert_eq!(p.to_klv().len() as u64, p.encoded_len());
    }

    #[test]
    fn read_back() {
        let p = body_pack();
        let mut cur = Cursor::new(p.to_klv());
        assert_eq!(PartitionPack::read(&mut cur).unwrap(), p);
    }

    #[test]
    fn status_change_keeps_length() {
        let mut p = PartitionPack::new(PartitionKind::Header, PartitionStatus::OpenIncomplete, 1);
        p.essence_containers = vec![labels::OP1A];
        let before = p.to_klv().len();
        p.status = PartitionStatus::ClosedComplete;
        p.footer_partition = u64::MAX;
        p.header_byte_count = 123_456_789;
        assert_eq!(p.to_klv().len(), before);
    }

    #[test]
    fn rejects_non_partition_key() {
        let bytes = klv::encode(&labels::PRIMER_PACK, &[0u8; 88]);
        assert!(PartitionPack::read(&mut Cursor::new(bytes)).unwrap_err().is_format());
    }

    #[test]
    fn rejects_truncated_value() {
        let p = body_pack();
        let v = p.encode_value();
        assert!(PartitionPack::decode(&p.key(), &v[..40]).unwrap_err().is_format());
    }
}
