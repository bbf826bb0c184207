//! Track file reader.
//!
//! `open_read` parses everything needed for random access up front: header
//! partition and metadata, the RIP, every listed partition pack and the
//! merged index. The parsed state is immutable and shared by [`fork`]ed
//! handles, each owning its own file handle.
//!
//! [`fork`]: TrackFileReader::fork

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::crypto::Envelope;
use crate::error::{Error, Result};
use crate::essence::EssenceAdapter;
use crate::index::{FrameIndex, IndexSegment};
use crate::info::WriterInfo;
use crate::klv::{self, KlvHeader, KlvIter};
use crate::label::{labels, Label};
use crate::metadata::{HeaderMetadata, Rational, ESSENCE_TRACK_ID};
use crate::partition::{PartitionKind, PartitionPack};
use crate::rip::Rip;
use crate::storage::{FileReader, FileReaderFactory};

use super::{skip_fill_from, Frame, FrameBuffer, FrameStatus, ReadContext};

/// Where a body partition's essence sits in the file.
#[derive(Debug, Clone, Copy)]
struct BodySpan {
    body_offset: u64,
    essence_start: u64,
    /// Offset of the next partition pack.
    end: u64,
}

#[derive(Debug)]
struct Parsed {
    name: String,
    file_size: u64,
    metadata: HeaderMetadata,
    info: WriterInfo,
    rip: Rip,
    partitions: Vec<PartitionPack>,
    bodies: Vec<BodySpan>,
    index: FrameIndex,
    edit_rate: Rational,
    encrypted: bool,
    track_file_id: [u8; 16],
    frame_count: u32,
    body_sid: u32,
    index_sid: u32,
}

pub struct TrackFileReader {
    factory: Arc<dyn FileReaderFactory>,
    adapter: Arc<dyn EssenceAdapter>,
    file: Option<Box<dyn FileReader>>,
    parsed: Option<Arc<Parsed>>,
}

impl TrackFileReader {
    pub fn new(factory: Arc<dyn FileReaderFactory>, adapter: Arc<dyn EssenceAdapter>) -> Self {
        Self { factory, adapter, file: None, parsed: None }
    }

    pub fn adapter(&self) -> &Arc<dyn EssenceAdapter> {
        &self.adapter
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some() && self.parsed.is_some()
    }

    /// Open and fully parse `name`. On failure the reader stays closed.
    pub fn open_read(&mut self, name: &str) -> Result<()> {
        if self.is_open() {
            return Err(Error::state("reader is already open"));
        }
        let mut file = self.factory.open(name)?;
        match parse_file(&mut file, name, self.adapter.as_ref()) {
            Ok(parsed) => {
                info!(
                    file = name,
                    frames = parsed.frame_count,
                    partitions = parsed.partitions.len(),
                    encrypted = parsed.encrypted,
                    "track file opened for reading"
                );
                self.file = Some(file);
                self.parsed = Some(Arc::new(parsed));
                Ok(())
            }
            Err(e) => {
                warn!(file = name, error = %e, "open_read failed");
                Err(e)
            }
        }
    }

    pub fn close(&mut self) {
        self.file = None;
        self.parsed = None;
    }

    /// A second handle on the same file sharing the parsed state.
    pub fn fork(&self) -> Result<Self> {
        let parsed = self.parsed()?;
        let file = self.factory.open(&parsed.name)?;
        Ok(Self {
            factory: Arc::clone(&self.factory),
            adapter: Arc::clone(&self.adapter),
            file: Some(file),
            parsed: Some(Arc::clone(parsed)),
        })
    }

    fn parsed(&self) -> Result<&Arc<Parsed>> {
        self.parsed.as_ref().ok_or(Error::NotOpen)
    }

    pub fn frame_count(&self) -> Result<u32> {
        Ok(self.parsed()?.frame_count)
    }

    pub fn edit_rate(&self) -> Result<Rational> {
        Ok(self.parsed()?.edit_rate)
    }

    pub fn writer_info(&self) -> Result<&WriterInfo> {
        Ok(&self.parsed()?.info)
    }

    pub fn header_metadata(&self) -> Result<&HeaderMetadata> {
        Ok(&self.parsed()?.metadata)
    }

    pub fn rip(&self) -> Result<&Rip> {
        Ok(&self.parsed()?.rip)
    }

    pub fn index(&self) -> Result<&FrameIndex> {
        Ok(&self.parsed()?.index)
    }

    /// BodySID of the essence stream being read.
    pub fn body_sid(&self) -> Result<u32> {
        Ok(self.parsed()?.body_sid)
    }

    /// IndexSID of the index being followed.
    pub fn index_sid(&self) -> Result<u32> {
        Ok(self.parsed()?.index_sid)
    }

    /// Partition packs in file order.
    pub fn partitions(&self) -> Result<&[PartitionPack]> {
        Ok(&self.parsed()?.partitions)
    }

    pub fn read_frame(&mut self, frame: u32, ctx: ReadContext<'_>) -> Result<Frame> {
        let mut buf = FrameBuffer::default();
        self.read_frame_into(frame, &mut buf, ctx)?;
        Ok(buf.into_frame())
    }

    /// Read `frame` into a caller-owned buffer, reusing its allocation.
    pub fn read_frame_into(&mut self, frame: u32, buf: &mut FrameBuffer, ctx: ReadContext<'_>) -> Result<()> {
        buf.reset();
        let parsed = Arc::clone(self.parsed()?);
        let Located { header, value_pos: value, .. } = self.locate(&parsed, frame)?;
        let file = self.file.as_mut().ok_or(Error::NotOpen)?;

        if !parsed.encrypted {
            let element = self.adapter.essence_element();
            if header.label != element {
                return Err(Error::format(format!(
                    "frame {frame}: expected essence key {element}, found {}",
                    header.label
                )));
            }
            if header.length > klv::MAX_VALUE_LEN {
                return Err(Error::format(format!("frame {frame}: value of {} bytes", header.length)));
            }
            file.seek(SeekFrom::Start(value))?;
            buf.read_from(file, header.length as usize, FrameStatus::Plaintext, frame)?;
            return Ok(());
        }

        if header.label != labels::ENCRYPTED_TRIPLET {
            return Err(Error::format(format!(
                "frame {frame}: expected an encrypted triplet, found {}",
                header.label
            )));
        }
        let raw = read_value(file, value, header.length)?;
        let envelope = Envelope::parse(&raw)?;
        if envelope.source_key != self.adapter.essence_element() {
            return Err(Error::format(format!(
                "frame {frame}: envelope wraps {}, not {}",
                envelope.source_key,
                self.adapter.essence_element()
            )));
        }
        envelope.verify(frame as u64 + 1, &parsed.track_file_id, ctx.hmac)?;
        match ctx.cipher {
            Some(cipher) => {
                let plain = envelope.decrypt(cipher)?;
                buf.fill_from(&plain, FrameStatus::Decrypted, frame);
            }
            None => buf.fill_from(envelope.encrypted_source, FrameStatus::EncryptedNoKey, frame),
        }
        Ok(())
    }

    /// Payload of the per-frame metadata triplet following frame `frame`.
    pub fn read_meta_frame(&mut self, frame: u32) -> Result<Vec<u8>> {
        let key = self.adapter.metadata_element().ok_or_else(|| {
            Error::state(format!("{} essence carries no per-frame metadata", self.adapter.name()))
        })?;
        let parsed = Arc::clone(self.parsed()?);
        let essence = self.locate(&parsed, frame)?;
        let file = self.file.as_mut().ok_or(Error::NotOpen)?;
        let end = essence.span_end;
        let meta_pos = skip_fill_from(file, essence.value_pos + essence.header.length, end)?;
        if meta_pos + klv::MIN_TRIPLET_LEN > end {
            return Err(Error::format(format!("frame {frame} has no metadata triplet")));
        }
        file.seek(SeekFrom::Start(meta_pos))?;
        let header = klv::read_klv_header(file)?;
        if header.label != key {
            return Err(Error::format(format!(
                "frame {frame}: expected metadata key {key}, found {}",
                header.label
            )));
        }
        if meta_pos + header.total_size > end {
            return Err(Error::format(format!("frame {frame}: metadata triplet overruns its partition")));
        }
        read_value(file, meta_pos + header.value_offset as u64, header.length)
    }

    /// Find the essence triplet of `frame`. Structural failures close the
    /// reader.
    fn locate(&mut self, parsed: &Parsed, frame: u32) -> Result<Located> {
        if frame >= parsed.frame_count {
            return Err(Error::Range { frame, count: parsed.frame_count });
        }
        match self.locate_in_file(parsed, frame) {
            Ok(found) => Ok(found),
            Err(LocateError::Failed(e)) => Err(e),
            Err(LocateError::Structural(msg)) => {
                warn!(frame, error = %msg, "closing reader after structural error");
                self.close();
                Err(Error::Format(msg))
            }
        }
    }

    fn locate_in_file(&mut self, parsed: &Parsed, frame: u32) -> std::result::Result<Located, LocateError> {
        let offset = parsed
            .index
            .stream_offset(frame as u64)
            .ok_or_else(|| LocateError::Structural(format!("frame {frame} missing from index")))?;
        let span = parsed.span_for(offset).ok_or_else(|| {
            LocateError::Structural(format!("stream offset {offset} precedes every body partition"))
        })?;
        let pos = span.essence_start + (offset - span.body_offset);
        if pos >= span.end || pos >= parsed.file_size {
            return Err(LocateError::Structural(format!(
                "frame {frame} at {pos} lies outside its partition"
            )));
        }
        let file = self.file.as_mut().ok_or(Error::NotOpen)?;
        let pos = skip_fill_from(file, pos, span.end)?;
        if pos + klv::MIN_TRIPLET_LEN > span.end {
            return Err(LocateError::Structural(format!("frame {frame} runs into the next partition")));
        }
        file.seek(SeekFrom::Start(pos)).map_err(Error::from)?;
        let header = klv::read_klv_header(file)?;
        if pos + header.total_size > span.end {
            return Err(LocateError::Structural(format!(
                "frame {frame} triplet of {} bytes overruns its partition",
                header.total_size
            )));
        }
        Ok(Located { header, value_pos: pos + header.value_offset as u64, span_end: span.end })
    }
}

/// An essence triplet found through the index.
struct Located {
    header: KlvHeader,
    value_pos: u64,
    span_end: u64,
}

enum LocateError {
    /// The index points somewhere the partitions cannot hold.
    Structural(String),
    Failed(Error),
}

impl From<Error> for LocateError {
    fn from(e: Error) -> Self {
        LocateError::Failed(e)
    }
}

impl Parsed {
    /// Body partition with the largest body offset not above `offset`.
    fn span_for(&self, offset: u64) -> Option<&BodySpan> {
        self.bodies.iter().rev().find(|b| b.body_offset <= offset)
    }
}

fn read_value(file: &mut Box<dyn FileReader>, pos: u64, len: u64) -> Result<Vec<u8>> {
    if len > klv::MAX_VALUE_LEN {
        return Err(Error::format(format!("triplet value of {len} bytes")));
    }
    file.seek(SeekFrom::Start(pos))?;
    let mut bytes = vec![0u8; len as usize];
    file.read_exact(&mut bytes)?;
    Ok(bytes)
}

// ── Open-time parsing ───────────────────────────────────────────────────────

fn parse_file(file: &mut Box<dyn FileReader>, name: &str, adapter: &dyn EssenceAdapter) -> Result<Parsed> {
    let file_size = file.size()?;
    file.seek(SeekFrom::Start(0))?;
    let header = PartitionPack::read(file)?;
    if header.kind != PartitionKind::Header || header.this_partition != 0 {
        return Err(Error::format("file does not start with a header partition"));
    }
    if header.header_byte_count == 0 {
        return Err(Error::format("header partition carries no metadata"));
    }

    let rip = Rip::read_from_end(file, file_size)?;
    let partitions = read_partitions(file, &rip)?;
    let rip_start = file_size - rip.encode().len() as u64;

    let metadata_start = skip_fill_from(file, header.encoded_len(), partitions_end(&partitions, 0, rip_start))?;
    let metadata_bytes = read_region(file, metadata_start, header.header_byte_count, file_size)?;
    let metadata = HeaderMetadata::parse(&metadata_bytes)?;
    let info = WriterInfo::from_metadata(&metadata)?;

    let encrypted = check_descriptor(&metadata, adapter)?;
    let stream = metadata
        .file_essence_data()
        .ok_or_else(|| Error::format("no essence container data links to the file package"))?;
    let (body_sid, index_sid) = (stream.body_sid, stream.index_sid);
    if body_sid == 0 || index_sid == 0 {
        return Err(Error::format(format!(
            "essence container data names BodySID {body_sid} and IndexSID {index_sid}"
        )));
    }

    let mut bodies = Vec::new();
    let mut segments = Vec::new();
    for (i, pack) in partitions.iter().enumerate() {
        let end = partitions_end(&partitions, i, rip_start);
        if pack.kind == PartitionKind::Header {
            continue;
        }
        let region_start = skip_fill_from(file, pack.this_partition + pack.encoded_len(), end)?;
        if pack.index_byte_count > 0 {
            if region_start + pack.index_byte_count > end {
                return Err(Error::format(format!(
                    "index of partition at {} overruns the partition",
                    pack.this_partition
                )));
            }
            if pack.index_sid == index_sid {
                let bytes = read_region(file, region_start, pack.index_byte_count, file_size)?;
                segments.extend(decode_segments(&bytes, index_sid, body_sid)?);
            } else {
                warn!(index_sid = pack.index_sid, "skipping index of another stream");
            }
        }
        if pack.kind == PartitionKind::Body {
            if pack.body_sid == body_sid {
                bodies.push(BodySpan {
                    body_offset: pack.body_offset,
                    essence_start: region_start + pack.index_byte_count,
                    end,
                });
            } else {
                debug!(body_sid = pack.body_sid, offset = pack.this_partition, "skipping body of another stream");
            }
        }
    }
    if bodies.is_empty() {
        return Err(Error::format(format!("file has no body partition with BodySID {body_sid}")));
    }

    let duration = metadata.duration();
    if segments.is_empty() && duration != Some(0) {
        return Err(Error::format(format!("no index segment carries IndexSID {index_sid}")));
    }
    let index = FrameIndex::merge(segments)?;
    let frame_count = u32::try_from(index.frame_count())
        .map_err(|_| Error::format(format!("{} frames exceed the supported count", index.frame_count())))?;
    if let Some(d) = duration {
        if d != frame_count as i64 {
            return Err(Error::format(format!(
                "essence track duration {d} disagrees with {frame_count} indexed frames"
            )));
        }
    }
    let edit_rate = essence_edit_rate(&metadata).or(index.edit_rate()).unwrap_or(Rational::new(0, 0));
    debug!(bodies = bodies.len(), segments = index.segments().len(), "index merged");

    Ok(Parsed {
        name: name.to_owned(),
        file_size,
        track_file_id: info.asset_uuid.into_bytes(),
        metadata,
        info,
        rip,
        partitions,
        bodies,
        index,
        edit_rate,
        encrypted,
        frame_count,
        body_sid,
        index_sid,
    })
}

/// Read and check every pack the RIP lists.
fn read_partitions(file: &mut Box<dyn FileReader>, rip: &Rip) -> Result<Vec<PartitionPack>> {
    let n = rip.entries.len();
    if n < 2 {
        return Err(Error::format(format!("random index pack lists {n} partitions")));
    }
    let mut packs: Vec<PartitionPack> = Vec::with_capacity(n);
    for (i, entry) in rip.entries.iter().enumerate() {
        file.seek(SeekFrom::Start(entry.offset))?;
        let pack = PartitionPack::read(file)?;
        let expected = match i {
            0 => PartitionKind::Header,
            _ if i == n - 1 => PartitionKind::Footer,
            _ => PartitionKind::Body,
        };
        if pack.kind != expected {
            return Err(Error::format(format!(
                "partition {i} at {} is {:?}, expected {expected:?}",
                entry.offset, pack.kind
            )));
        }
        if pack.this_partition != entry.offset {
            return Err(Error::format(format!(
                "partition at {} records its offset as {}",
                entry.offset, pack.this_partition
            )));
        }
        let previous = packs.last().map_or(0, |p| p.this_partition);
        if pack.previous_partition != previous {
            return Err(Error::format(format!(
                "partition at {} points back to {}, expected {previous}",
                entry.offset, pack.previous_partition
            )));
        }
        if i > 0 && previous >= entry.offset {
            return Err(Error::format("random index pack is not in file order"));
        }
        if pack.body_sid != entry.body_sid {
            return Err(Error::format(format!(
                "partition at {} has BodySID {} but the RIP says {}",
                entry.offset, pack.body_sid, entry.body_sid
            )));
        }
        packs.push(pack);
    }
    let footer = packs[n - 1].this_partition;
    if packs[0].footer_partition != footer {
        return Err(Error::format(format!(
            "header points to footer {}, RIP lists it at {footer}",
            packs[0].footer_partition
        )));
    }
    Ok(packs)
}

/// End of partition `i`: the next pack, or the RIP for the last one.
fn partitions_end(packs: &[PartitionPack], i: usize, rip_start: u64) -> u64 {
    packs.get(i + 1).map_or(rip_start, |p| p.this_partition)
}

fn read_region(file: &mut Box<dyn FileReader>, start: u64, len: u64, file_size: u64) -> Result<Vec<u8>> {
    if len > klv::MAX_VALUE_LEN || start + len > file_size {
        return Err(Error::format(format!("region of {len} bytes at {start} exceeds the file")));
    }
    read_value(file, start, len)
}

fn decode_segments(bytes: &[u8], index_sid: u32, body_sid: u32) -> Result<Vec<IndexSegment>> {
    let mut out = Vec::new();
    for item in KlvIter::new(bytes) {
        let (header, value) = item?;
        if !header.label.is_index_segment() {
            warn!(key = %header.label, "unexpected triplet in index region");
            continue;
        }
        let seg = IndexSegment::decode(value)?;
        if seg.index_sid != index_sid {
            continue;
        }
        if seg.body_sid != body_sid {
            return Err(Error::format(format!(
                "index segment for IndexSID {index_sid} indexes BodySID {}, expected {body_sid}",
                seg.body_sid
            )));
        }
        out.push(seg);
    }
    Ok(out)
}

/// Check the descriptor against the adapter; true when the essence is
/// encrypted.
fn check_descriptor(metadata: &HeaderMetadata, adapter: &dyn EssenceAdapter) -> Result<bool> {
    let descriptor = metadata
        .descriptor()
        .ok_or_else(|| Error::format("source package has no essence descriptor"))?;
    if descriptor.set_label != adapter.descriptor_label() {
        return Err(Error::format(format!(
            "descriptor {} does not match {} essence",
            descriptor.set_label,
            adapter.name()
        )));
    }
    let expected: Label = adapter.essence_container();
    if descriptor.essence_container == expected {
        return Ok(false);
    }
    if descriptor.essence_container == labels::ENCRYPTED_ESSENCE_CONTAINER {
        let ctx = metadata
            .cryptographic_context()
            .ok_or_else(|| Error::format("encrypted essence without a cryptographic context"))?;
        if ctx.source_essence_container != expected {
            return Err(Error::format(format!(
                "encrypted container wraps {}, expected {expected}",
                ctx.source_essence_container
            )));
        }
        return Ok(true);
    }
    Err(Error::format(format!(
        "essence container {} is not {} essence",
        descriptor.essence_container,
        adapter.name()
    )))
}

fn essence_edit_rate(metadata: &HeaderMetadata) -> Option<Rational> {
    let mp = metadata.material_package()?;
    metadata
        .package_tracks(mp)
        .into_iter()
        .find(|t| t.track_id == ESSENCE_TRACK_ID)
        .map(|t| t.edit_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriterConfig;
    use crate::essence::{prores_test_frame, MgaSadmAdapter, ProResAdapter};
    use crate::storage::MemoryStorage;
    use crate::track::TrackFileWriter;

    fn write(mem: &MemoryStorage, frames: &[Vec<u8>]) {
        let mut w = TrackFileWriter::new();
        w.open_write(
            mem,
            "r.mxf",
            WriterInfo::default(),
            Arc::new(ProResAdapter::default()),
            Rational::new(25, 1),
            WriterConfig::default(),
            None,
        )
        .unwrap();
        for f in frames {
            w.write_frame(f).unwrap();
        }
        w.finalize().unwrap();
    }

    fn reader(mem: &MemoryStorage) -> TrackFileReader {
        TrackFileReader::new(Arc::new(mem.clone()), Arc::new(ProResAdapter::default()))
    }

    #[test]
    fn reads_back_frames_and_edit_rate() {
        let mem = MemoryStorage::new();
        let frames: Vec<_> = (0..4).map(|i| prores_test_frame(40 + i * 10, i as u8)).collect();
        write(&mem, &frames);
        let mut r = reader(&mem);
        r.open_read("r.mxf").unwrap();
        assert_eq!(r.frame_count().unwrap(), 4);
        assert_eq!(r.edit_rate().unwrap(), Rational::new(25, 1));
        for (i, f) in frames.iter().enumerate() {
            let got = r.read_frame(i as u32, ReadContext::none()).unwrap();
            assert_eq!(&got.data, f);
            assert_eq!(got.status, FrameStatus::Plaintext);
        }
    }

    #[test]
    fn plaintext_reads_land_in_the_callers_buffer() {
        let mem = MemoryStorage::new();
        let frames: Vec<_> = (0..3).map(|i| prores_test_frame(300 - i * 50, i as u8)).collect();
        write(&mem, &frames);
        let mut r = reader(&mem);
        r.open_read("r.mxf").unwrap();
        assert_eq!((r.index_sid().unwrap(), r.body_sid().unwrap()), (129, 1));

        let mut buf = FrameBuffer::with_capacity(4096);
        let base = buf.as_slice().as_ptr();
        for (i, f) in frames.iter().enumerate() {
            r.read_frame_into(i as u32, &mut buf, ReadContext::none()).unwrap();
            assert_eq!(buf.as_slice(), &f[..]);
            assert_eq!(buf.as_slice().as_ptr(), base);
            assert!(buf.capacity() >= 4096);
        }
    }

    #[test]
    fn out_of_range_and_closed() {
        let mem = MemoryStorage::new();
        write(&mem, &[prores_test_frame(32, 0)]);
        let mut r = reader(&mem);
        assert!(matches!(r.frame_count(), Err(Error::NotOpen)));
        r.open_read("r.mxf").unwrap();
        assert!(matches!(r.read_frame(1, ReadContext::none()), Err(Error::Range { frame: 1, count: 1 })));
        r.close();
        assert!(matches!(r.read_frame(0, ReadContext::none()), Err(Error::NotOpen)));
    }

    #[test]
    fn wrong_adapter_is_a_format_error() {
        let mem = MemoryStorage::new();
        write(&mem, &[prores_test_frame(32, 0)]);
        let mut r = TrackFileReader::new(Arc::new(mem.clone()), Arc::new(MgaSadmAdapter::default()));
        assert!(r.open_read("r.mxf").unwrap_err().is_format());
        assert!(!r.is_open());
    }

    #[test]
    fn truncated_file_fails_to_open() {
        let mem = MemoryStorage::new();
        write(&mem, &[prores_test_frame(32, 0)]);
        let bytes = mem.get("r.mxf").unwrap();
        mem.insert("cut.mxf", bytes[..bytes.len() - 10].to_vec());
        let mut r = reader(&mem);
        assert!(r.open_read("cut.mxf").is_err());
        assert!(!r.is_open());
    }

    #[test]
    fn broken_back_pointer_is_rejected() {
        let mem = MemoryStorage::new();
        write(&mem, &[prores_test_frame(32, 0)]);
        let mut bytes = mem.get("r.mxf").unwrap().to_vec();
        let size = bytes.len() as u64;
        let rip = Rip::read_from_end(&mut std::io::Cursor::new(&bytes), size).unwrap();
        // previous_partition of the footer pack sits at value offset 16.
        let footer = rip.entries.last().unwrap().offset as usize;
        let value_start = klv::decode(&bytes, footer).unwrap().value_offset;
        bytes[value_start + 16 + 7] ^= 0x01;
        mem.insert("bad.mxf", bytes);
        let mut r = reader(&mem);
        assert!(r.open_read("bad.mxf").unwrap_err().is_format());
    }

    #[test]
    fn fork_shares_state() {
        let mem = MemoryStorage::new();
        let frames: Vec<_> = (0..3).map(|i| prores_test_frame(48, i)).collect();
        write(&mem, &frames);
        let mut r = reader(&mem);
        r.open_read("r.mxf").unwrap();
        let mut f = r.fork().unwrap();
        r.close();
        assert_eq!(f.read_frame(2, ReadContext::none()).unwrap().data, frames[2]);
        assert_eq!(f.frame_count().unwrap(), 3);
    }
}
