//! KLV (Key-Length-Value) codec.
//!
//! Triplet layout:
//!   [ key (16 B) | BER length | value (length B) ]
//!
//! BER length: values ≤ 127 use one byte; larger values use `0x80 | n`
//! followed by `n` big-endian bytes (1 ≤ n ≤ 8). Only the minimal encoding is
//! produced and only the minimal encoding is accepted.
//!
//! Fill items pad the stream up to the next KAG (key alignment grid)
//! boundary. Readers skip them transparently through [`KlvIter`] and
//! [`skip_fill`].

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};
use crate::label::{labels, Label};

pub const KEY_LEN: usize = 16;
/// Smallest possible triplet: key + one-byte length + empty value.
pub const MIN_TRIPLET_LEN: u64 = KEY_LEN as u64 + 1;
const MAX_BER_BYTES: usize = 8;
/// Largest triplet value read into memory in one piece.
pub const MAX_VALUE_LEN: u64 = 256 * 1024 * 1024;

// ── BER lengths ──────────────────────────────────────────────────────────────

/// Number of bytes the minimal BER encoding of `len` occupies.
pub fn ber_len_size(len: u64) -> usize {
    if len <= 0x7F {
        1
    } else {
        1 + (8 - (len.leading_zeros() as usize) / 8)
    }
}

pub fn put_ber(out: &mut Vec<u8>, len: u64) {
    if len <= 0x7F {
        out.push(len as u8);
        return;
    }
    let n = ber_len_size(len) - 1;
    out.push(0x80 | n as u8);
    out.extend_from_slice(&len.to_be_bytes()[8 - n..]);
}

pub fn encode_ber(len: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    put_ber(&mut out, len);
    out
}

/// Decode a BER length at `bytes[pos..]`. Returns `(length, bytes consumed)`.
pub fn decode_ber(bytes: &[u8], pos: usize) -> Result<(u64, usize)> {
    let first = *bytes
        .get(pos)
        .ok_or_else(|| Error::format("truncated BER length"))?;
    if first & 0x80 == 0 {
        return Ok((first as u64, 1));
    }
    let n = (first & 0x7F) as usize;
    if n == 0 {
        return Err(Error::format("indefinite BER length"));
    }
    if n > MAX_BER_BYTES {
        return Err(Error::format(format!("BER length uses {n} bytes")));
    }
    let tail = bytes
        .get(pos + 1..pos + 1 + n)
        .ok_or_else(|| Error::format("truncated BER length"))?;
    let len = tail.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    check_minimal(len, n)?;
    Ok((len, 1 + n))
}

/// Stream variant of [`decode_ber`].
pub fn read_ber<R: Read>(r: &mut R) -> Result<(u64, usize)> {
    let first = r.read_u8()?;
    if first & 0x80 == 0 {
        return Ok((first as u64, 1));
    }
    let n = (first & 0x7F) as usize;
    if n == 0 {
        return Err(Error::format("indefinite BER length"));
    }
    if n > MAX_BER_BYTES {
        return Err(Error::format(format!("BER length uses {n} bytes")));
    }
    let mut buf = [0u8; MAX_BER_BYTES];
    r.read_exact(&mut buf[..n])?;
    let len = buf[..n].iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    check_minimal(len, n)?;
    Ok((len, 1 + n))
}

fn check_minimal(len: u64, n: usize) -> Result<()> {
    if ber_len_size(len) != n + 1 {
        return Err(Error::format(format!(
            "non-minimal BER encoding of {len} in {n} bytes"
        )));
    }
    Ok(())
}

// ── Triplets ─────────────────────────────────────────────────────────────────

/// Decoded key and length of one triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KlvHeader {
    pub label: Label,
    pub length: u64,
    /// Where the value starts. Absolute index into the slice for [`decode`];
    /// relative to the triplet start for [`read_klv_header`].
    pub value_offset: usize,
    /// Key + length + value.
    pub total_size: u64,
}

impl KlvHeader {
    pub fn header_len(&self) -> u64 {
        self.total_size - self.length
    }

    pub fn is_fill(&self) -> bool {
        self.label.is_fill()
    }
}

pub fn encode(label: &Label, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(KEY_LEN + 9 + payload.len());
    out.extend_from_slice(label.as_bytes());
    put_ber(&mut out, payload.len() as u64);
    out.extend_from_slice(payload);
    out
}

/// Write one triplet; returns the number of bytes written.
pub fn write_klv<W: Write>(w: &mut W, label: &Label, payload: &[u8]) -> io::Result<u64> {
    let ber = encode_ber(payload.len() as u64);
    w.write_all(label.as_bytes())?;
    w.write_all(&ber)?;
    w.write_all(payload)?;
    Ok((KEY_LEN + ber.len() + payload.len()) as u64)
}

/// Decode the triplet header at `bytes[offset..]`, checking that the whole
/// value is present.
pub fn decode(bytes: &[u8], offset: usize) -> Result<KlvHeader> {
    let key = bytes
        .get(offset..offset + KEY_LEN)
        .ok_or_else(|| Error::format(format!("truncated KLV key at {offset}")))?;
    let label = Label::from_slice(key).ok_or_else(|| Error::format("bad key"))?;
    let (length, ber) = decode_ber(bytes, offset + KEY_LEN)?;
    let value_offset = offset + KEY_LEN + ber;
    let remaining = (bytes.len() - value_offset) as u64;
    if length > remaining {
        return Err(Error::format(format!(
            "KLV length {length} exceeds remaining {remaining} bytes at {offset}"
        )));
    }
    Ok(KlvHeader {
        label,
        length,
        value_offset,
        total_size: (KEY_LEN + ber) as u64 + length,
    })
}

/// Read a triplet header from a stream; the stream is left at the value.
pub fn read_klv_header<R: Read>(r: &mut R) -> Result<KlvHeader> {
    let mut key = [0u8; KEY_LEN];
    r.read_exact(&mut key)?;
    let (length, ber) = read_ber(r)?;
    Ok(KlvHeader {
        label: Label(key),
        length,
        value_offset: KEY_LEN + ber,
        total_size: (KEY_LEN + ber) as u64 + length,
    })
}

/// Read the next non-fill triplet header, seeking over any fill items.
pub fn skip_fill<R: Read + Seek>(r: &mut R) -> Result<KlvHeader> {
    loop {
        let header = read_klv_header(r)?;
        if !header.is_fill() {
            return Ok(header);
        }
        r.seek(SeekFrom::Current(header.length as i64))?;
    }
}

/// Read a whole non-fill triplet value whose key must be `expected`.
pub fn read_expected<R: Read + Seek>(r: &mut R, expected: &Label) -> Result<Vec<u8>> {
    let header = skip_fill(r)?;
    if header.label != *expected {
        return Err(Error::format(format!(
            "expected {} but found {}",
            expected, header.label
        )));
    }
    if header.length > MAX_VALUE_LEN {
        return Err(Error::format(format!("{} value of {} bytes", expected, header.length)));
    }
    let mut value = vec![0u8; header.length as usize];
    r.read_exact(&mut value)?;
    Ok(value)
}

// ── Fill ─────────────────────────────────────────────────────────────────────

/// Total size of the fill triplet needed at stream `position` so the next
/// item starts on a `kag` boundary. Zero when already aligned or `kag <= 1`.
pub fn fill_size(position: u64, kag: u32) -> u64 {
    if kag <= 1 {
        return 0;
    }
    let kag = kag as u64;
    let gap = (kag - position % kag) % kag;
    if gap == 0 {
        return 0;
    }
    let mut total = gap;
    loop {
        if total >= MIN_TRIPLET_LEN && fill_payload_len(total).is_some() {
            return total;
        }
        total += kag;
    }
}

/// Payload length of a fill triplet occupying exactly `total` bytes, if a
/// minimal BER length makes that possible.
fn fill_payload_len(total: u64) -> Option<u64> {
    (1..=MAX_BER_BYTES + 1).find_map(|ber| {
        let payload = total.checked_sub((KEY_LEN + ber) as u64)?;
        (ber_len_size(payload) == ber).then_some(payload)
    })
}

/// A fill triplet exactly `total` bytes long. `total` must come from
/// [`fill_size`].
pub fn fill_item(total: u64) -> Vec<u8> {
    match fill_payload_len(total) {
        Some(payload) => encode(&labels::FILL_ITEM, &vec![0u8; payload as usize]),
        None => Vec::new(),
    }
}

/// Emit fill at `position` up to the next KAG boundary.
pub fn write_fill<W: Write>(w: &mut W, position: u64, kag: u32) -> io::Result<u64> {
    let total = fill_size(position, kag);
    if total == 0 {
        return Ok(0);
    }
    w.write_all(&fill_item(total))?;
    Ok(total)
}

// ── Iteration over a buffer ──────────────────────────────────────────────────

/// Iterates triplets in a byte slice, skipping fill items.
pub struct KlvIter<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> KlvIter<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0, failed: false }
    }

    /// Offset of the next triplet within the slice.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for KlvIter<'a> {
    type Item = Result<(KlvHeader, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && self.pos < self.bytes.len() {
            let header = match decode(self.bytes, self.pos) {
                Ok(h) => h,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            let start = header.value_offset;
            let end = start + header.length as usize;
            self.pos = end;
            if header.is_fill() {
                continue;
            }
            return Some(Ok((header, &self.bytes[start..end])));
        }
        None
    }
}

// ── Local sets ───────────────────────────────────────────────────────────────

/// Append one local-set item (`u16 tag | u16 length | value`).
pub fn put_local(out: &mut Vec<u8>, tag: u16, value: &[u8]) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        Error::format(format!("local item {tag:04x} is {} bytes", value.len()))
    })?;
    out.extend_from_slice(&tag.to_be_bytes());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(value);
    Ok(())
}

/// Iterates `(tag, value)` pairs of a local set value.
pub struct LocalItems<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LocalItems<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl<'a> Iterator for LocalItems<'a> {
    type Item = Result<(u16, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let Some(head) = self.bytes.get(self.pos..self.pos + 4) else {
            self.pos = self.bytes.len();
            return Some(Err(Error::format("truncated local set item")));
        };
        let tag = u16::from_be_bytes([head[0], head[1]]);
        let len = u16::from_be_bytes([head[2], head[3]]) as usize;
        let start = self.pos + 4;
        let Some(value) = self.bytes.get(start..start + len) else {
            self.pos = self.bytes.len();
            return Some(Err(Error::format(format!(
                "local item {tag:04x} overruns its set"
            ))));
        };
        self.pos = start + len;
        Some(Ok((tag, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const KEY: Label = labels::PREFACE;

    #[test]
    fn ber_boundaries() {
        assert_eq!(encode_ber(0), vec![0x00]);
        assert_eq!(encode_ber(127), vec![0x7F]);
        assert_eq!(encode_ber(128), vec![0x81, 0x80]);
        assert_eq!(encode_ber(65535), vec![0x82, 0xFF, 0xFF]);
        assert_eq!(encode_ber(65536), vec![0x83, 0x01, 0x00, 0x00]);
        assert_eq!(ber_len_size(u64::MAX), 9);
    }

    #[test]
    fn decode_reports_offsets() {
        let bytes = encode(&KEY, &[7u8; 200]);
        let h = decode(&bytes, 0).unwrap();
        assert_eq!(h.label, KEY);
        assert_eq!(h.length, 200);
        assert_eq!(h.value_offset, 18);
        assert_eq!(h.total_size, bytes.len() as u64);
    }

    #[test]
    fn rejects_bad_lengths() {
        let mut indefinite = KEY.0.to_vec();
        indefinite.push(0x80);
        assert!(decode(&indefinite, 0).unwrap_err().is_format());

        let mut non_minimal = KEY.0.to_vec();
        non_minimal.extend_from_slice(&[0x82, 0x00, 0x05, 1, 2, 3, 4, 5]);
        assert!(decode(&non_minimal, 0).unwrap_err().is_format());

        let mut too_wide = KEY.0.to_vec();
        too_wide.extend_from_slice(&[0x89, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(decode(&too_wide, 0).unwrap_err().is_format());

        let mut overrun = KEY.0.to_vec();
        overrun.extend_from_slice(&[0x05, 1, 2]);
        assert!(decode(&overrun, 0).unwrap_err().is_format());
    }

    #[test]
    fn fill_reaches_boundary() {
        for kag in [16u32, 512, 4096] {
            for pos in [0u64, 1, 17, 100, 511, 4000, 4097] {
                let total = fill_size(pos, kag);
                assert_eq!((pos + total) % kag as u64, 0, "pos {pos} kag {kag}");
                if total > 0 {
                    let item = fill_item(total);
                    assert_eq!(item.len() as u64, total);
                    assert!(decode(&item, 0).unwrap().is_fill());
                }
            }
        }
        assert_eq!(fill_size(1234, 1), 0);
    }

    #[test]
    fn fill_grows_past_unrepresentable_gap() {
        // 145 bytes cannot be a minimal-BER fill item.
        let total = fill_size(1000 - 145, 1000);
        assert_eq!(total, 1145);
    }

    #[test]
    fn iterator_skips_fill() {
        let mut buf = encode(&KEY, b"one");
        buf.extend(fill_item(fill_size(buf.len() as u64, 64)));
        buf.extend(encode(&labels::IDENTIFICATION, b"two"));
        let items: Vec<_> = KlvIter::new(&buf).map(|r| r.unwrap()).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].1, b"two");
    }

    #[test]
    fn stream_skip_fill() {
        let mut buf = fill_item(40);
        buf.extend(encode(&KEY, b"payload"));
        let mut cur = Cursor::new(buf);
        assert_eq!(read_expected(&mut cur, &KEY).unwrap(), b"payload");
    }

    #[test]
    fn oversized_value_is_not_allocated() {
        let mut buf = KEY.as_bytes().to_vec();
        buf.extend(encode_ber(MAX_VALUE_LEN + 1));
        buf.extend_from_slice(b"short");
        let err = read_expected(&mut Cursor::new(buf), &KEY).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn local_items_round_trip_and_overrun() {
        let mut set = Vec::new();
        put_local(&mut set, 0x3C0A, &[1; 16]).unwrap();
        put_local(&mut set, 0x4801, &[0, 0, 0, 2]).unwrap();
        let items: Vec<_> = LocalItems::new(&set).map(|r| r.unwrap()).collect();
        assert_eq!(items[1], (0x4801, &[0u8, 0, 0, 2][..]));

        set.truncate(set.len() - 1);
        assert!(LocalItems::new(&set).any(|r| r.is_err()));
        assert!(put_local(&mut Vec::new(), 1, &vec![0; 70_000]).is_err());
    }
}
