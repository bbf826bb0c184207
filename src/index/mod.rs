//! Index table segments and the merged frame index.
//!
//! A segment is a local set with static tags:
//!
//!   3C0A instance | 3F0B edit rate | 3F0C start | 3F0D duration
//!   | 3F05 edit unit byte count | 3F06 IndexSID | 3F07 BodySID
//!   | 3F08 slice count | 3F0A entry array
//!
//! Two encodings exist. Constant byte count (CBR): every edit unit has the
//! same size, recorded once, and the segment carries no entries. Explicit
//! (VBR): one 11-byte entry per edit unit
//! `i8 temporal offset | i8 key-frame offset | u8 flags | u64 stream offset`.
//!
//! Stream offsets count essence-container bytes only; partition packs and
//! index segments inside body partitions are not part of the stream.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::klv::{self, LocalItems};
use crate::label::labels;
use crate::metadata::Rational;

pub const FLAG_RANDOM_ACCESS: u8 = 0x80;
pub const FLAG_SEQUENCE_HEADER: u8 = 0x40;
pub const FLAG_FORWARD_PREDICTION: u8 = 0x20;
pub const FLAG_BACKWARD_PREDICTION: u8 = 0x10;

pub const ENTRY_LEN: usize = 11;
/// Largest entry array that fits a 16-bit local item length.
pub const MAX_ENTRIES_PER_SEGMENT: usize = (u16::MAX as usize - 8) / ENTRY_LEN;

mod tag {
    pub const INSTANCE_UID: u16 = 0x3C0A;
    pub const EDIT_UNIT_BYTE_COUNT: u16 = 0x3F05;
    pub const INDEX_SID: u16 = 0x3F06;
    pub const BODY_SID: u16 = 0x3F07;
    pub const SLICE_COUNT: u16 = 0x3F08;
    pub const ENTRY_ARRAY: u16 = 0x3F0A;
    pub const EDIT_RATE: u16 = 0x3F0B;
    pub const START: u16 = 0x3F0C;
    pub const DURATION: u16 = 0x3F0D;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub temporal_offset: i8,
    pub key_frame_offset: i8,
    pub flags: u8,
    pub stream_offset: u64,
}

impl IndexEntry {
    pub fn is_random_access(&self) -> bool {
        self.flags & FLAG_RANDOM_ACCESS != 0
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.temporal_offset as u8);
        out.push(self.key_frame_offset as u8);
        out.push(self.flags);
        out.extend_from_slice(&self.stream_offset.to_be_bytes());
    }

    fn decode(b: &[u8]) -> Self {
        let mut off = [0u8; 8];
        off.copy_from_slice(&b[3..11]);
        Self {
            temporal_offset: b[0] as i8,
            key_frame_offset: b[1] as i8,
            flags: b[2],
            stream_offset: u64::from_be_bytes(off),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSegment {
    pub instance: Uuid,
    pub edit_rate: Rational,
    pub start: i64,
    pub duration: i64,
    /// Non-zero for constant byte count segments.
    pub edit_unit_byte_count: u32,
    pub index_sid: u32,
    pub body_sid: u32,
    pub entries: Vec<IndexEntry>,
}

impl IndexSegment {
    pub fn is_cbr(&self) -> bool {
        self.edit_unit_byte_count > 0
    }

    /// The complete segment triplet.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut v = Vec::with_capacity(96 + self.entries.len() * ENTRY_LEN);
        klv::put_local(&mut v, tag::INSTANCE_UID, self.instance.as_bytes())?;
        let mut rate = self.edit_rate.num.to_be_bytes().to_vec();
        rate.extend_from_slice(&self.edit_rate.den.to_be_bytes());
        klv::put_local(&mut v, tag::EDIT_RATE, &rate)?;
        klv::put_local(&mut v, tag::START, &self.start.to_be_bytes())?;
        klv::put_local(&mut v, tag::DURATION, &self.duration.to_be_bytes())?;
        klv::put_local(&mut v, tag::EDIT_UNIT_BYTE_COUNT, &self.edit_unit_byte_count.to_be_bytes())?;
        klv::put_local(&mut v, tag::INDEX_SID, &self.index_sid.to_be_bytes())?;
        klv::put_local(&mut v, tag::BODY_SID, &self.body_sid.to_be_bytes())?;
        klv::put_local(&mut v, tag::SLICE_COUNT, &[0])?;
        if !self.is_cbr() {
            let mut array = Vec::with_capacity(8 + self.entries.len() * ENTRY_LEN);
            array.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
            array.extend_from_slice(&(ENTRY_LEN as u32).to_be_bytes());
            for e in &self.entries {
                e.encode_into(&mut array);
            }
            klv::put_local(&mut v, tag::ENTRY_ARRAY, &array)?;
        }
        Ok(klv::encode(&labels::INDEX_TABLE_SEGMENT, &v))
    }

    /// Decode a segment value. Unrecognised tags are skipped.
    pub fn decode(value: &[u8]) -> Result<Self> {
        let mut seg = Self {
            instance: Uuid::nil(),
            edit_rate: Rational::new(0, 0),
            start: 0,
            duration: 0,
            edit_unit_byte_count: 0,
            index_sid: 0,
            body_sid: 0,
            entries: Vec::new(),
        };
        for item in LocalItems::new(value) {
            let (t, b) = item?;
            match t {
                tag::INSTANCE_UID => seg.instance = Uuid::from_slice(b).map_err(|_| bad_item(t))?,
                tag::EDIT_RATE => {
                    let r: [u8; 8] = b.try_into().map_err(|_| bad_item(t))?;
                    seg.edit_rate = Rational::new(
                        i32::from_be_bytes([r[0], r[1], r[2], r[3]]),
                        i32::from_be_bytes([r[4], r[5], r[6], r[7]]),
                    );
                }
                tag::START => seg.start = i64::from_be_bytes(b.try_into().map_err(|_| bad_item(t))?),
                tag::DURATION => seg.duration = i64::from_be_bytes(b.try_into().map_err(|_| bad_item(t))?),
                tag::EDIT_UNIT_BYTE_COUNT => {
                    seg.edit_unit_byte_count = u32::from_be_bytes(b.try_into().map_err(|_| bad_item(t))?)
                }
                tag::INDEX_SID => seg.index_sid = u32::from_be_bytes(b.try_into().map_err(|_| bad_item(t))?),
                tag::BODY_SID => seg.body_sid = u32::from_be_bytes(b.try_into().map_err(|_| bad_item(t))?),
                tag::SLICE_COUNT => {
                    if b.first().copied().unwrap_or(0) != 0 {
                        return Err(Error::format("sliced index segments are not supported"));
                    }
                }
                tag::ENTRY_ARRAY => seg.entries = decode_entries(b)?,
                _ => {}
            }
        }
        if seg.start < 0 || seg.duration < 0 {
            return Err(Error::format(format!(
                "index segment start {} duration {}",
                seg.start, seg.duration
            )));
        }
        if !seg.is_cbr() && seg.entries.len() as i64 != seg.duration {
            return Err(Error::format(format!(
                "index segment declares {} edit units but holds {} entries",
                seg.duration,
                seg.entries.len()
            )));
        }
        Ok(seg)
    }
}

fn bad_item(t: u16) -> Error {
    Error::format(format!("index segment item {t:04x} has the wrong size"))
}

fn decode_entries(b: &[u8]) -> Result<Vec<IndexEntry>> {
    if b.len() < 8 {
        return Err(Error::format("truncated index entry array"));
    }
    let count = u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize;
    let size = u32::from_be_bytes([b[4], b[5], b[6], b[7]]) as usize;
    if size < ENTRY_LEN {
        return Err(Error::format(format!("index entry size {size}")));
    }
    if b.len() - 8 != count * size {
        return Err(Error::format("index entry array length mismatch"));
    }
    // Entries larger than 11 bytes carry slice / position data we ignore.
    Ok(b[8..].chunks_exact(size).map(IndexEntry::decode).collect())
}

// ── Writer side ──────────────────────────────────────────────────────────────

/// Accumulates one entry per written edit unit and cuts segments on demand.
#[derive(Debug)]
pub struct IndexBuilder {
    edit_rate: Rational,
    index_sid: u32,
    body_sid: u32,
    entries: Vec<IndexEntry>,
    /// Size shared by every edit unit so far, if there is one.
    uniform_size: Option<u64>,
    mixed: bool,
    flushed: usize,
}

impl IndexBuilder {
    pub fn new(edit_rate: Rational, index_sid: u32, body_sid: u32) -> Self {
        Self {
            edit_rate,
            index_sid,
            body_sid,
            entries: Vec::new(),
            uniform_size: None,
            mixed: false,
            flushed: 0,
        }
    }

    pub fn push(&mut self, entry: IndexEntry, edit_unit_size: u64) {
        match self.uniform_size {
            None if self.entries.is_empty() => self.uniform_size = Some(edit_unit_size),
            Some(s) if s != edit_unit_size => self.mixed = true,
            _ => {}
        }
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.entries.len() - self.flushed
    }

    /// Constant edit unit size over the whole stream, if representable.
    pub fn constant_size(&self) -> Option<u32> {
        if self.mixed {
            return None;
        }
        self.uniform_size.and_then(|s| u32::try_from(s).ok()).filter(|&s| s > 0)
    }

    /// Segments covering every entry not yet emitted. A single CBR segment
    /// is produced only when `allow_cbr` is set and nothing was emitted
    /// before, since CBR offsets are computed from the stream start.
    pub fn take_segments(&mut self, allow_cbr: bool) -> Vec<IndexSegment> {
        let pending = &self.entries[self.flushed..];
        if pending.is_empty() {
            return Vec::new();
        }
        if allow_cbr && self.flushed == 0 {
            if let Some(size) = self.constant_size() {
                let seg = IndexSegment {
                    instance: Uuid::new_v4(),
                    edit_rate: self.edit_rate,
                    start: 0,
                    duration: pending.len() as i64,
                    edit_unit_byte_count: size,
                    index_sid: self.index_sid,
                    body_sid: self.body_sid,
                    entries: Vec::new(),
                };
                self.flushed = self.entries.len();
                debug!(frames = seg.duration, size, "constant byte count index");
                return vec![seg];
            }
        }
        let mut out = Vec::new();
        let mut start = self.flushed;
        for chunk in pending.chunks(MAX_ENTRIES_PER_SEGMENT) {
            out.push(IndexSegment {
                instance: Uuid::new_v4(),
                edit_rate: self.edit_rate,
                start: start as i64,
                duration: chunk.len() as i64,
                edit_unit_byte_count: 0,
                index_sid: self.index_sid,
                body_sid: self.body_sid,
                entries: chunk.to_vec(),
            });
            start += chunk.len();
        }
        self.flushed = self.entries.len();
        debug!(segments = out.len(), through = start, "explicit index segments");
        out
    }
}

// ── Reader side ──────────────────────────────────────────────────────────────

/// All segments of one index stream merged in partition order.
#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    segments: Vec<IndexSegment>,
    frame_count: u64,
}

impl FrameIndex {
    /// Merge segments given in partition order. Frame ranges must be
    /// contiguous from zero with no overlap.
    pub fn merge(segments: Vec<IndexSegment>) -> Result<Self> {
        let mut next = 0u64;
        let mut last_offset: Option<u64> = None;
        for seg in &segments {
            if seg.start as u64 != next {
                let what = if (seg.start as u64) < next { "overlaps" } else { "leaves a gap before" };
                return Err(Error::format(format!(
                    "index segment at edit unit {} {what} edit unit {next}",
                    seg.start
                )));
            }
            if seg.is_cbr() && segments.len() > 1 {
                return Err(Error::format("constant byte count index mixed with other segments"));
            }
            for e in &seg.entries {
                if last_offset.is_some_and(|prev| e.stream_offset <= prev) {
                    return Err(Error::format(format!(
                        "index stream offset {} does not increase",
                        e.stream_offset
                    )));
                }
                last_offset = Some(e.stream_offset);
            }
            next += seg.duration as u64;
        }
        if segments.iter().any(|s| s.is_cbr() && s.duration == 0) {
            warn!("constant byte count index segment with zero duration");
        }
        Ok(Self { segments, frame_count: next })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn segments(&self) -> &[IndexSegment] {
        &self.segments
    }

    pub fn edit_rate(&self) -> Option<Rational> {
        self.segments.first().map(|s| s.edit_rate)
    }

    /// Entry for `frame`; CBR entries are synthesised.
    pub fn entry(&self, frame: u64) -> Option<IndexEntry> {
        if frame >= self.frame_count {
            return None;
        }
        let seg = self
            .segments
            .iter()
            .find(|s| frame < (s.start + s.duration) as u64)?;
        if seg.is_cbr() {
            return Some(IndexEntry {
                temporal_offset: 0,
                key_frame_offset: 0,
                flags: FLAG_RANDOM_ACCESS,
                stream_offset: frame * seg.edit_unit_byte_count as u64,
            });
        }
        seg.entries.get((frame - seg.start as u64) as usize).copied()
    }

    pub fn stream_offset(&self, frame: u64) -> Option<u64> {
        self.entry(frame).map(|e| e.stream_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: Rational = Rational::new(24, 1);

    fn entry(offset: u64) -> IndexEntry {
        IndexEntry { temporal_offset: 0, key_frame_offset: 0, flags: FLAG_RANDOM_ACCESS, stream_offset: offset }
    }

    fn decode_triplet(bytes: &[u8]) -> IndexSegment {
        let h = klv::decode(bytes, 0).unwrap();
        assert!(h.label.is_index_segment());
        IndexSegment::decode(&bytes[h.value_offset..]).unwrap()
    }

    #[test]
    fn constant_sizes_give_one_cbr_segment() {
        let mut b = IndexBuilder::new(RATE, 129, 1);
        for i in 0..10 {
            b.push(entry(i * 512), 512);
        }
        let segs = b.take_segments(true);
        assert_eq!(segs.len(), 1);
        let seg = decode_triplet(&segs[0].encode().unwrap());
        assert_eq!(seg.edit_unit_byte_count, 512);
        assert!(seg.entries.is_empty());
        let idx = FrameIndex::merge(vec![seg]).unwrap();
        assert_eq!(idx.frame_count(), 10);
        assert_eq!(idx.stream_offset(7), Some(7 * 512));
    }

    #[test]
    fn variable_sizes_give_explicit_entries() {
        let mut b = IndexBuilder::new(RATE, 129, 1);
        let sizes = [100u64, 250, 100_000];
        let mut off = 0;
        for s in sizes {
            b.push(
                IndexEntry { temporal_offset: -1, key_frame_offset: 0, flags: FLAG_RANDOM_ACCESS | FLAG_SEQUENCE_HEADER, stream_offset: off },
                s,
            );
            off += s;
        }
        let segs = b.take_segments(true);
        let seg = decode_triplet(&segs[0].encode().unwrap());
        assert_eq!(seg.entries.len(), 3);
        assert_eq!(seg.entries[1].stream_offset, 100);
        assert_eq!(seg.entries[0].temporal_offset, -1);
        assert_eq!(seg.entries[0].flags, 0xC0);
    }

    #[test]
    fn incremental_flushes_are_contiguous() {
        let mut b = IndexBuilder::new(RATE, 129, 1);
        let mut segs = Vec::new();
        for i in 0..9u64 {
            b.push(entry(i * 10), 10);
            if i % 3 == 2 {
                segs.extend(b.take_segments(false));
            }
        }
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[2].start, 6);
        let idx = FrameIndex::merge(segs).unwrap();
        assert_eq!(idx.stream_offset(8), Some(80));
        assert!(idx.entry(9).is_none());
    }

    #[test]
    fn large_indexes_are_split() {
        let mut b = IndexBuilder::new(RATE, 129, 1);
        let n = MAX_ENTRIES_PER_SEGMENT as u64 + 10;
        for i in 0..n {
            b.push(entry(i * 3), 3 + (i % 2));
        }
        let segs = b.take_segments(true);
        assert_eq!(segs.len(), 2);
        for s in &segs {
            s.encode().unwrap();
        }
        assert_eq!(FrameIndex::merge(segs).unwrap().frame_count(), n);
    }

    #[test]
    fn gaps_and_overlaps_are_rejected() {
        let seg = |start, n: usize, base: u64| IndexSegment {
            instance: Uuid::new_v4(),
            edit_rate: RATE,
            start,
            duration: n as i64,
            edit_unit_byte_count: 0,
            index_sid: 129,
            body_sid: 1,
            entries: (0..n as u64).map(|i| entry(base + i)).collect(),
        };
        assert!(FrameIndex::merge(vec![seg(0, 2, 0), seg(3, 2, 10)]).unwrap_err().is_format());
        assert!(FrameIndex::merge(vec![seg(0, 2, 0), seg(1, 2, 10)]).unwrap_err().is_format());
        assert!(FrameIndex::merge(vec![seg(0, 2, 10), seg(2, 2, 0)]).unwrap_err().is_format());
        assert!(FrameIndex::merge(vec![seg(0, 2, 0), seg(2, 2, 10)]).is_ok());
    }

    #[test]
    fn entry_count_must_match_duration() {
        let mut seg = IndexSegment {
            instance: Uuid::new_v4(),
            edit_rate: RATE,
            start: 0,
            duration: 2,
            edit_unit_byte_count: 0,
            index_sid: 129,
            body_sid: 1,
            entries: vec![entry(0), entry(5)],
        };
        seg.duration = 3;
        let bytes = seg.encode().unwrap();
        let h = klv::decode(&bytes, 0).unwrap();
        assert!(IndexSegment::decode(&bytes[h.value_offset..]).unwrap_err().is_format());
    }
}
