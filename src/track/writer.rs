//! Track file writer.
//!
//! `Init → Running → Finalized`, with any failure while running moving the
//! writer to `Invalid`. Output is append-only apart from the finalize-time
//! patches of the header partition pack and the metadata duration fields,
//! both rewritten at their original length.

use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{IndexPlacement, WriterConfig};
use crate::crypto::{self, EncryptionContext, EnvelopeIds};
use crate::error::{Error, Result};
use crate::essence::EssenceAdapter;
use crate::index::{IndexBuilder, IndexEntry, IndexSegment};
use crate::info::WriterInfo;
use crate::klv;
use crate::label::labels;
use crate::metadata::{HeaderMetadata, Rational, TrackFilePlan, BODY_SID, INDEX_SID};
use crate::partition::{PartitionKind, PartitionPack, PartitionStatus};
use crate::rip::Rip;
use crate::storage::{FileWriter, FileWriterFactory};

use super::FrameOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Init,
    Running,
    Finalized,
    Invalid,
}

pub struct TrackFileWriter {
    state: WriterState,
    session: Option<Session>,
}

/// Everything that lives between `open_write` and `finalize`.
struct Session {
    file: Box<dyn FileWriter>,
    name: String,
    pos: u64,
    info: WriterInfo,
    adapter: Arc<dyn EssenceAdapter>,
    config: WriterConfig,
    crypto: Option<EncryptionContext>,
    ids: EnvelopeIds,
    metadata: HeaderMetadata,
    metadata_len: usize,
    metadata_offset: u64,
    header: PartitionPack,
    /// Offset of the most recent partition pack.
    last_partition: u64,
    rip: Rip,
    index: IndexBuilder,
    frames: u32,
    frames_in_partition: u32,
    stream_offset: u64,
}

impl Default for TrackFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackFileWriter {
    pub fn new() -> Self {
        Self { state: WriterState::Init, session: None }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Frames accepted so far.
    pub fn frames_written(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.frames)
    }

    pub fn writer_info(&self) -> Option<&WriterInfo> {
        self.session.as_ref().map(|s| &s.info)
    }

    /// Create `name` and write everything up to the first body partition.
    ///
    /// `crypto` must agree with `info.encrypted_essence`, and its MAC with
    /// `info.uses_hmac`. The file is only created once every check passed.
    #[allow(clippy::too_many_arguments)]
    pub fn open_write(
        &mut self,
        storage: &dyn FileWriterFactory,
        name: &str,
        info: WriterInfo,
        adapter: Arc<dyn EssenceAdapter>,
        edit_rate: Rational,
        config: WriterConfig,
        crypto: Option<EncryptionContext>,
    ) -> Result<()> {
        if self.state != WriterState::Init {
            return Err(Error::state(format!("open_write called in state {:?}", self.state)));
        }
        config.validate()?;
        if edit_rate.num <= 0 || edit_rate.den <= 0 {
            return Err(Error::format(format!("edit rate {edit_rate} is not positive")));
        }
        if info.encrypted_essence != crypto.is_some() {
            return Err(Error::state("encrypted_essence does not match the supplied cipher"));
        }
        if let Some(ctx) = &crypto {
            if info.uses_hmac != ctx.mac.is_some() {
                return Err(Error::state("uses_hmac does not match the supplied keyed hash"));
            }
        }

        let plan = TrackFilePlan {
            info: &info,
            adapter: adapter.as_ref(),
            edit_rate,
            operational_pattern: config.operational_pattern.label(),
            crypto: crypto
                .as_ref()
                .map(|c| (c.cipher.algorithm(), c.mac.as_ref().map(|m| m.algorithm()))),
        };
        let metadata = HeaderMetadata::for_track_file(&plan)?;
        let metadata_bytes = metadata.serialize()?;
        let container = match crypto {
            Some(_) => labels::ENCRYPTED_ESSENCE_CONTAINER,
            None => adapter.essence_container(),
        };

        let mut header = PartitionPack::new(PartitionKind::Header, PartitionStatus::OpenIncomplete, config.kag_size);
        header.operational_pattern = config.operational_pattern.label();
        header.essence_containers = vec![container];

        let file = storage.create(name)?;
        let ids = EnvelopeIds {
            context_id: info.context_id.into_bytes(),
            track_file_id: info.asset_uuid.into_bytes(),
        };
        let mut session = Session {
            file,
            name: name.to_owned(),
            pos: 0,
            index: IndexBuilder::new(edit_rate, INDEX_SID, BODY_SID),
            info,
            adapter,
            config,
            crypto,
            ids,
            metadata,
            metadata_len: metadata_bytes.len(),
            metadata_offset: 0,
            header,
            last_partition: 0,
            rip: Rip::new(),
            frames: 0,
            frames_in_partition: 0,
            stream_offset: 0,
        };

        match session.write_header(&metadata_bytes).and_then(|_| session.open_body(Vec::new())) {
            Ok(()) => {
                info!(
                    file = %session.name,
                    essence = session.adapter.name(),
                    encrypted = session.crypto.is_some(),
                    kag = session.config.kag_size,
                    "track file opened for writing"
                );
                self.session = Some(session);
                self.state = WriterState::Running;
                Ok(())
            }
            Err(e) => {
                warn!(file = %session.name, error = %e, "open_write failed");
                self.state = WriterState::Invalid;
                Err(e)
            }
        }
    }

    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.write_frame_with(frame, FrameOptions::default())
    }

    pub fn write_frame_with(&mut self, frame: &[u8], opts: FrameOptions<'_>) -> Result<()> {
        let session = self.running()?;
        let result = session.write_frame(frame, &opts);
        self.settle(result)
    }

    /// Write the footer, patch the header and durations, append the RIP.
    pub fn finalize(&mut self) -> Result<()> {
        let session = self.running()?;
        let result = session.finalize();
        let result = self.settle(result);
        if result.is_ok() {
            if let Some(s) = self.session.take() {
                info!(file = %s.name, frames = s.frames, bytes = s.pos, "track file finalized");
            }
            self.state = WriterState::Finalized;
        }
        result
    }

    fn running(&mut self) -> Result<&mut Session> {
        match (self.state, self.session.as_mut()) {
            (WriterState::Running, Some(s)) => Ok(s),
            (state, _) => Err(Error::state(format!("writer is {state:?}"))),
        }
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if let Some(s) = self.session.take() {
                warn!(file = %s.name, frames = s.frames, error = %e, "writer invalidated");
            }
            self.state = WriterState::Invalid;
        }
        result
    }
}

impl Session {
    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    fn fill(&mut self) -> Result<u64> {
        let n = klv::write_fill(&mut self.file, self.pos, self.config.kag_size)?;
        self.pos += n;
        Ok(n)
    }

    fn write_header(&mut self, metadata: &[u8]) -> Result<()> {
        let pack = self.header.to_klv();
        self.emit(&pack)?;
        self.fill()?;
        self.metadata_offset = self.pos;
        self.emit(metadata)?;
        self.fill()?;
        self.header.header_byte_count = self.pos - self.metadata_offset;
        self.rip.push(0, 0);
        debug!(header_byte_count = self.header.header_byte_count, "header partition written");
        Ok(())
    }

    /// Open a body partition, placing `segments` at its head.
    fn open_body(&mut self, segments: Vec<IndexSegment>) -> Result<()> {
        let mut pack = PartitionPack::new(PartitionKind::Body, PartitionStatus::ClosedComplete, self.config.kag_size);
        pack.this_partition = self.pos;
        pack.previous_partition = self.last_partition;
        pack.body_offset = self.stream_offset;
        pack.body_sid = BODY_SID;
        pack.operational_pattern = self.header.operational_pattern;
        pack.essence_containers = self.header.essence_containers.clone();

        let index_bytes = self.layout_index(&pack, &segments)?;
        if !index_bytes.is_empty() {
            pack.index_sid = INDEX_SID;
            pack.index_byte_count = index_bytes.len() as u64;
        }
        let offset = self.pos;
        self.emit(&pack.to_klv())?;
        self.fill()?;
        self.emit(&index_bytes)?;
        self.rip.push(BODY_SID, offset);
        self.last_partition = offset;
        self.frames_in_partition = 0;
        debug!(offset, body_offset = pack.body_offset, segments = segments.len(), "body partition opened");
        Ok(())
    }

    /// Encoded segments plus their trailing fill, as they will sit after
    /// `pack` and its fill.
    fn layout_index(&self, pack: &PartitionPack, segments: &[IndexSegment]) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for seg in segments {
            bytes.extend(seg.encode()?);
        }
        if bytes.is_empty() {
            return Ok(bytes);
        }
        let kag = self.config.kag_size;
        let after_pack = self.pos + pack.encoded_len();
        let start = after_pack + klv::fill_size(after_pack, kag);
        bytes.extend(klv::fill_item(klv::fill_size(start + bytes.len() as u64, kag)));
        Ok(bytes)
    }

    fn write_frame(&mut self, frame: &[u8], opts: &FrameOptions<'_>) -> Result<()> {
        if self.frames == u32::MAX {
            return Err(Error::state("frame count limit reached"));
        }
        let meta_key = match (opts.metadata, self.adapter.metadata_element()) {
            (Some(_), None) => {
                return Err(Error::state(format!(
                    "{} essence carries no per-frame metadata",
                    self.adapter.name()
                )))
            }
            (_, key) => key,
        };
        self.adapter.validate_frame(frame)?;

        if let Some(limit) = self.config.partition_frames {
            if self.frames_in_partition >= limit {
                let segments = match self.config.index_placement {
                    IndexPlacement::FollowingPartition => self.index.take_segments(false),
                    IndexPlacement::Footer => Vec::new(),
                };
                self.open_body(segments)?;
            }
        }

        let start = self.pos;
        let element = self.adapter.essence_element();
        let sealed = match &self.crypto {
            Some(ctx) => {
                let sequence = self.frames as u64 + 1;
                let envelope = crypto::seal(&self.ids, &element, frame, sequence, ctx)?;
                Some(klv::encode(&labels::ENCRYPTED_TRIPLET, &envelope))
            }
            None => None,
        };
        match sealed {
            Some(triplet) => self.emit(&triplet)?,
            None => {
                let n = klv::write_klv(&mut self.file, &element, frame)?;
                self.pos += n;
            }
        }
        if let (Some(meta), Some(key)) = (opts.metadata, meta_key) {
            let n = klv::write_klv(&mut self.file, &key, meta)?;
            self.pos += n;
        }
        self.fill()?;

        let size = self.pos - start;
        self.index.push(
            IndexEntry {
                temporal_offset: opts.temporal_offset,
                key_frame_offset: opts.key_frame_offset,
                flags: opts.flags,
                stream_offset: self.stream_offset,
            },
            size,
        );
        self.stream_offset += size;
        self.frames += 1;
        self.frames_in_partition += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let allow_cbr = self.config.index_placement == IndexPlacement::Footer;
        let segments = self.index.take_segments(allow_cbr);

        let footer_offset = self.pos;
        let mut footer = PartitionPack::new(PartitionKind::Footer, PartitionStatus::ClosedComplete, self.config.kag_size);
        footer.this_partition = footer_offset;
        footer.previous_partition = self.last_partition;
        footer.footer_partition = footer_offset;
        footer.index_sid = INDEX_SID;
        footer.operational_pattern = self.header.operational_pattern;
        footer.essence_containers = self.header.essence_containers.clone();
        let index_bytes = self.layout_index(&footer, &segments)?;
        footer.index_byte_count = index_bytes.len() as u64;
        self.emit(&footer.to_klv())?;
        self.fill()?;
        self.emit(&index_bytes)?;
        self.rip.push(0, footer_offset);
        debug!(footer_offset, segments = segments.len(), "footer partition written");

        let end = self.pos;

        self.header.status = PartitionStatus::ClosedComplete;
        self.header.footer_partition = footer_offset;
        let pack = self.header.to_klv();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&pack)?;

        self.metadata.set_durations(self.frames as i64);
        let bytes = self.metadata.serialize()?;
        if bytes.len() != self.metadata_len {
            return Err(Error::format(format!(
                "header metadata changed size from {} to {} bytes",
                self.metadata_len,
                bytes.len()
            )));
        }
        self.file.seek(SeekFrom::Start(self.metadata_offset))?;
        self.file.write_all(&bytes)?;

        self.file.seek(SeekFrom::Start(end))?;
        let rip = self.rip.encode();
        self.emit(&rip)?;
        self.file.flush()?;
        Ok(())
    }
}
