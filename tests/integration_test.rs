use std::io::Cursor;
use std::sync::Arc;

use tempfile::tempdir;
use trackfile::crypto::{Aes256GcmCipher, Blake3Mac, Envelope};
use trackfile::essence::{prores_test_frame, MgaSadmAdapter, ProResAdapter};
use trackfile::klv;
use trackfile::label::labels;
use trackfile::partition::{PartitionKind, PartitionPack, PartitionStatus};
use trackfile::rip::Rip;
use trackfile::storage::{FsStorage, MemoryStorage};
use trackfile::{
    EncryptionContext, Error, EssenceAdapter, FrameBuffer, FrameOptions, FrameStatus, IndexPlacement, Rational,
    ReadContext, TrackFileReader, TrackFileWriter, WriterConfig, WriterInfo, WriterState,
};
use uuid::Uuid;

const KEY: [u8; 32] = [0x42; 32];

fn prores() -> Arc<dyn EssenceAdapter> {
    Arc::new(ProResAdapter::default())
}

fn write_prores(mem: &MemoryStorage, name: &str, sizes: &[usize], config: WriterConfig) -> Vec<Vec<u8>> {
    let frames: Vec<Vec<u8>> = sizes.iter().enumerate().map(|(i, &n)| prores_test_frame(n, i as u8)).collect();
    let mut w = TrackFileWriter::new();
    w.open_write(mem, name, WriterInfo::default(), prores(), Rational::new(24, 1), config, None)
        .unwrap();
    for f in &frames {
        w.write_frame(f).unwrap();
    }
    w.finalize().unwrap();
    frames
}

fn open(mem: &MemoryStorage, name: &str, adapter: Arc<dyn EssenceAdapter>) -> TrackFileReader {
    let mut r = TrackFileReader::new(Arc::new(mem.clone()), adapter);
    r.open_read(name).unwrap();
    r
}

fn crypto(with_mac: bool) -> EncryptionContext {
    let ctx = EncryptionContext::new(Arc::new(Aes256GcmCipher::new(&KEY)));
    if with_mac {
        ctx.with_mac(Arc::new(Blake3Mac::derived_from(&KEY)))
    } else {
        ctx
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).position(|w| w == needle).unwrap()
}

/// Rewrite every fixed-width local item `tag = from` within `range`.
fn replace_local(bytes: &mut [u8], range: std::ops::Range<usize>, tag: u16, from: &[u8], to: &[u8]) -> usize {
    let mut needle = tag.to_be_bytes().to_vec();
    needle.extend((from.len() as u16).to_be_bytes());
    needle.extend_from_slice(from);
    let mut count = 0;
    let mut pos = range.start;
    while pos + needle.len() <= range.end {
        if bytes[pos..pos + needle.len()] == needle[..] {
            bytes[pos + 4..pos + needle.len()].copy_from_slice(to);
            count += 1;
            pos += needle.len();
        } else {
            pos += 1;
        }
    }
    count
}

/// Renumber the IndexSID and BodySID of a finalized file in place. The
/// header metadata is left alone unless `metadata` is set.
fn renumber_streams(bytes: &mut Vec<u8>, index_sid: (u32, u32), body_sid: (u32, u32), metadata: bool) {
    let size = bytes.len() as u64;
    let mut rip = Rip::read_from_end(&mut Cursor::new(bytes.as_slice()), size).unwrap();
    let header_end = rip.entries[1].offset as usize;
    let (idx_from, idx_to) = (index_sid.0.to_be_bytes(), index_sid.1.to_be_bytes());
    let (body_from, body_to) = (body_sid.0.to_be_bytes(), body_sid.1.to_be_bytes());

    for entry in rip.entries.iter_mut() {
        let at = entry.offset as usize;
        let mut pack = PartitionPack::read(&mut Cursor::new(&bytes[at..])).unwrap();
        if pack.index_sid == index_sid.0 {
            pack.index_sid = index_sid.1;
        }
        if pack.body_sid == body_sid.0 {
            pack.body_sid = body_sid.1;
            entry.body_sid = body_sid.1;
        }
        let encoded = pack.to_klv();
        bytes[at..at + encoded.len()].copy_from_slice(&encoded);
    }
    let encoded = rip.encode();
    let rip_start = bytes.len() - encoded.len();
    bytes[rip_start..].copy_from_slice(&encoded);

    // Index segments carry both ids as local items 3F06 and 3F07.
    let tail = header_end..rip_start;
    assert!(replace_local(bytes, tail.clone(), 0x3F06, &idx_from, &idx_to) > 0);
    assert!(replace_local(bytes, tail, 0x3F07, &body_from, &body_to) > 0);
    if metadata {
        assert_eq!(replace_local(bytes, 0..header_end, 0x3F06, &idx_from, &idx_to), 1);
        assert_eq!(replace_local(bytes, 0..header_end, 0x3F07, &body_from, &body_to), 1);
    }
}

#[test]
fn test_round_trip_on_disk() {
    let dir = tempdir().unwrap();
    let storage = FsStorage::new(dir.path());
    let frames: Vec<Vec<u8>> = (0..24).map(|i| prores_test_frame(500 + i * 37, i as u8)).collect();

    let mut w = TrackFileWriter::new();
    w.open_write(&storage, "clip.mxf", WriterInfo::default(), prores(), Rational::new(24, 1), WriterConfig::default(), None)
        .unwrap();
    for f in &frames {
        w.write_frame(f).unwrap();
    }
    w.finalize().unwrap();

    let mut r = TrackFileReader::new(Arc::new(storage), prores());
    r.open_read("clip.mxf").unwrap();
    assert_eq!(r.frame_count().unwrap(), 24);
    for (i, f) in frames.iter().enumerate() {
        assert_eq!(&r.read_frame(i as u32, ReadContext::none()).unwrap().data, f);
    }
    // Random access out of order.
    assert_eq!(r.read_frame(17, ReadContext::none()).unwrap().data, frames[17]);
    assert_eq!(r.read_frame(2, ReadContext::none()).unwrap().data, frames[2]);
}

#[test]
fn test_three_frame_scenario() {
    let mem = MemoryStorage::new();
    let frames = write_prores(&mem, "s.mxf", &[100, 250, 100_000], WriterConfig::default());
    let mut r = open(&mem, "s.mxf", prores());
    assert_eq!(r.frame_count().unwrap(), 3);
    for (i, f) in frames.iter().enumerate() {
        let got = r.read_frame(i as u32, ReadContext::none()).unwrap();
        assert_eq!(got.data.len(), f.len());
        assert_eq!(&got.data, f);
    }
    let err = r.read_frame(3, ReadContext::none()).unwrap_err();
    assert!(matches!(err, Error::Range { frame: 3, count: 3 }));
    // A range error leaves the reader usable.
    assert!(r.read_frame(0, ReadContext::none()).is_ok());
}

#[test]
fn test_write_before_open_creates_nothing() {
    let dir = tempdir().unwrap();
    let mut w = TrackFileWriter::new();
    assert!(matches!(w.write_frame(&prores_test_frame(64, 0)), Err(Error::State(_))));
    assert_eq!(w.state(), WriterState::Init);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_rip_points_at_linked_partitions() {
    let mem = MemoryStorage::new();
    let config = WriterConfig::default().with_partition_frames(2, IndexPlacement::Footer);
    write_prores(&mem, "p.mxf", &[64, 80, 96, 112, 128], config);
    let bytes = mem.get("p.mxf").unwrap();
    let rip = Rip::read_from_end(&mut Cursor::new(bytes.as_slice()), bytes.len() as u64).unwrap();
    assert_eq!(rip.len(), 5, "header + 3 bodies + footer");

    let mut previous = 0;
    for (i, entry) in rip.entries.iter().enumerate() {
        let mut cur = Cursor::new(bytes.as_slice());
        cur.set_position(entry.offset);
        let pack = PartitionPack::read(&mut cur).unwrap();
        assert_eq!(pack.this_partition, entry.offset);
        assert_eq!(pack.previous_partition, previous);
        assert_eq!(pack.body_sid, entry.body_sid);
        let kind = match i {
            0 => PartitionKind::Header,
            4 => PartitionKind::Footer,
            _ => PartitionKind::Body,
        };
        assert_eq!(pack.kind, kind);
        previous = entry.offset;
    }

    let header = PartitionPack::read(&mut Cursor::new(bytes.as_slice())).unwrap();
    assert_eq!(header.status, PartitionStatus::ClosedComplete);
    assert_eq!(header.footer_partition, rip.entries[4].offset);
}

#[test]
fn test_renumbered_stream_ids_are_followed() {
    let mem = MemoryStorage::new();
    let frames = write_prores(&mem, "s.mxf", &[100, 250, 100_000], WriterConfig::default());
    let mut bytes = mem.get("s.mxf").unwrap().to_vec();
    renumber_streams(&mut bytes, (129, 2), (1, 7), true);
    mem.insert("renumbered.mxf", bytes);

    let mut r = open(&mem, "renumbered.mxf", prores());
    assert_eq!(r.index_sid().unwrap(), 2);
    assert_eq!(r.body_sid().unwrap(), 7);
    assert_eq!(r.frame_count().unwrap(), 3);
    for (i, f) in frames.iter().enumerate() {
        assert_eq!(&r.read_frame(i as u32, ReadContext::none()).unwrap().data, f);
    }
}

#[test]
fn test_renumbered_stream_ids_across_body_partitions() {
    let mem = MemoryStorage::new();
    let config = WriterConfig::default().with_partition_frames(2, IndexPlacement::FollowingPartition);
    let frames = write_prores(&mem, "p.mxf", &[64, 80, 96, 112, 128], config);
    let mut bytes = mem.get("p.mxf").unwrap().to_vec();
    renumber_streams(&mut bytes, (129, 40), (1, 3), true);
    mem.insert("renumbered.mxf", bytes);

    let mut r = open(&mem, "renumbered.mxf", prores());
    assert_eq!(r.frame_count().unwrap(), 5);
    assert_eq!(r.read_frame(4, ReadContext::none()).unwrap().data, frames[4]);
    assert_eq!(r.read_frame(1, ReadContext::none()).unwrap().data, frames[1]);
}

#[test]
fn test_index_of_another_stream_is_rejected() {
    let mem = MemoryStorage::new();
    write_prores(&mem, "s.mxf", &[100, 250, 100_000], WriterConfig::default());
    let mut bytes = mem.get("s.mxf").unwrap().to_vec();
    // The metadata still names IndexSID 129; every index now claims 2.
    renumber_streams(&mut bytes, (129, 2), (1, 1), false);
    mem.insert("foreign.mxf", bytes);

    let mut r = TrackFileReader::new(Arc::new(mem.clone()), prores());
    let err = r.open_read("foreign.mxf").unwrap_err();
    assert!(err.is_format(), "{err}");
    assert!(!r.is_open());
}

#[test]
fn test_body_of_another_stream_is_rejected() {
    let mem = MemoryStorage::new();
    write_prores(&mem, "s.mxf", &[100, 250, 100_000], WriterConfig::default());
    let mut bytes = mem.get("s.mxf").unwrap().to_vec();
    renumber_streams(&mut bytes, (129, 129), (1, 9), false);
    mem.insert("foreign.mxf", bytes);

    let mut r = TrackFileReader::new(Arc::new(mem.clone()), prores());
    assert!(r.open_read("foreign.mxf").unwrap_err().is_format());
    assert!(!r.is_open());
}

#[test]
fn test_duration_must_match_the_index() {
    let mem = MemoryStorage::new();
    write_prores(&mem, "s.mxf", &[100, 250, 100_000], WriterConfig::default());
    let mut bytes = mem.get("s.mxf").unwrap().to_vec();
    let size = bytes.len() as u64;
    let rip = Rip::read_from_end(&mut Cursor::new(bytes.as_slice()), size).unwrap();
    let header_end = rip.entries[1].offset as usize;
    let patched = replace_local(&mut bytes, 0..header_end, 0x0202, &3i64.to_be_bytes(), &4i64.to_be_bytes());
    assert!(patched > 0);
    mem.insert("long.mxf", bytes);

    let mut r = TrackFileReader::new(Arc::new(mem.clone()), prores());
    let err = r.open_read("long.mxf").unwrap_err();
    assert!(err.is_format(), "{err}");
    assert!(!r.is_open());
}

#[test]
fn test_index_offsets_strictly_increase() {
    let mem = MemoryStorage::new();
    write_prores(&mem, "i.mxf", &[300, 64, 9000, 64, 1200, 77], WriterConfig::default());
    let r = open(&mem, "i.mxf", prores());
    let index = r.index().unwrap();
    let offsets: Vec<u64> = (0..6).map(|n| index.stream_offset(n).unwrap()).collect();
    assert_eq!(offsets[0], 0);
    assert!(offsets.windows(2).all(|w| w[0] < w[1]), "{offsets:?}");
}

#[test]
fn test_following_partition_index_placement() {
    let mem = MemoryStorage::new();
    let sizes: Vec<usize> = (0..10).map(|i| 64 + i * 13).collect();
    let config = WriterConfig::default().with_partition_frames(3, IndexPlacement::FollowingPartition);
    let frames = write_prores(&mem, "f.mxf", &sizes, config);

    let mut r = open(&mem, "f.mxf", prores());
    assert_eq!(r.frame_count().unwrap(), 10);
    let partitions = r.partitions().unwrap().to_vec();
    assert_eq!(partitions.len(), 6);
    // Bodies after the first carry their predecessor's segment.
    assert_eq!(partitions[1].index_byte_count, 0);
    assert!(partitions[2..5].iter().all(|p| p.index_byte_count > 0));
    assert_eq!(r.index().unwrap().segments().len(), 4);
    for (i, f) in frames.iter().enumerate().rev() {
        assert_eq!(&r.read_frame(i as u32, ReadContext::none()).unwrap().data, f);
    }
}

#[test]
fn test_kag_alignment_and_constant_rate_index() {
    let mem = MemoryStorage::new();
    let frames = write_prores(&mem, "k.mxf", &[700; 6], WriterConfig::default().with_kag(512));
    let mut r = open(&mem, "k.mxf", prores());
    let segments = r.index().unwrap().segments().to_vec();
    assert_eq!(segments.len(), 1);
    assert!(segments[0].is_cbr());
    assert_eq!(segments[0].edit_unit_byte_count % 512, 0);
    for p in r.partitions().unwrap() {
        assert_eq!(p.this_partition % 512, 0);
        assert_eq!(p.kag_size, 512);
    }
    assert_eq!(r.read_frame(5, ReadContext::none()).unwrap().data, frames[5]);
}

#[test]
fn test_variable_frames_with_kag() {
    let mem = MemoryStorage::new();
    let frames = write_prores(&mem, "v.mxf", &[100, 2000, 513, 40], WriterConfig::default().with_kag(512));
    let mut r = open(&mem, "v.mxf", prores());
    let index = r.index().unwrap();
    for n in 0..4 {
        assert_eq!(index.stream_offset(n).unwrap() % 512, 0);
    }
    for (i, f) in frames.iter().enumerate() {
        assert_eq!(&r.read_frame(i as u32, ReadContext::none()).unwrap().data, f);
    }
}

#[test]
fn test_metadata_reflects_final_duration() {
    let mem = MemoryStorage::new();
    write_prores(&mem, "d.mxf", &[64; 7], WriterConfig::default());
    let r = open(&mem, "d.mxf", prores());
    let md = r.header_metadata().unwrap();
    assert_eq!(md.duration(), Some(7));
    assert_eq!(md.descriptor().unwrap().container_duration, 7);
    assert_eq!(r.edit_rate().unwrap(), Rational::new(24, 1));
}

#[test]
fn test_writer_info_round_trip() {
    let mem = MemoryStorage::new();
    let info = WriterInfo { company_name: "Acme Post".into(), product_version: "9.1".into(), ..WriterInfo::default() };
    let mut w = TrackFileWriter::new();
    w.open_write(&mem, "w.mxf", info.clone(), prores(), Rational::new(24, 1), WriterConfig::default(), None)
        .unwrap();
    w.write_frame(&prores_test_frame(64, 1)).unwrap();
    w.finalize().unwrap();

    let r = open(&mem, "w.mxf", prores());
    assert_eq!(r.writer_info().unwrap(), &info);
}

fn write_encrypted(mem: &MemoryStorage, name: &str, frames: &[Vec<u8>], with_mac: bool) -> WriterInfo {
    let info = WriterInfo::default().encrypted(Uuid::new_v4(), with_mac);
    let mut w = TrackFileWriter::new();
    w.open_write(mem, name, info.clone(), prores(), Rational::new(24, 1), WriterConfig::default(), Some(crypto(with_mac)))
        .unwrap();
    for f in frames {
        w.write_frame(f).unwrap();
    }
    w.finalize().unwrap();
    info
}

#[test]
fn test_encrypted_round_trip() {
    let mem = MemoryStorage::new();
    let frames: Vec<Vec<u8>> = (0..5).map(|i| prores_test_frame(200 + i * 50, i as u8)).collect();
    let info = write_encrypted(&mem, "e.mxf", &frames, true);

    let mut r = open(&mem, "e.mxf", prores());
    assert_eq!(r.writer_info().unwrap(), &info);
    let md = r.header_metadata().unwrap();
    assert_eq!(md.descriptor().unwrap().essence_container, labels::ENCRYPTED_ESSENCE_CONTAINER);
    assert_eq!(md.cryptographic_context().unwrap().source_essence_container, labels::PRORES_ESSENCE_CONTAINER);

    let ctx = crypto(true);
    let mut buf = FrameBuffer::with_capacity(1024);
    for (i, f) in frames.iter().enumerate() {
        r.read_frame_into(i as u32, &mut buf, ReadContext::from_crypto(&ctx)).unwrap();
        assert_eq!(buf.as_slice(), &f[..]);
        assert_eq!(buf.status(), FrameStatus::Decrypted);
    }
}

#[test]
fn test_encrypted_without_key() {
    let mem = MemoryStorage::new();
    let frames = vec![prores_test_frame(300, 7)];
    write_encrypted(&mem, "nk.mxf", &frames, false);
    let mut r = open(&mem, "nk.mxf", prores());
    let got = r.read_frame(0, ReadContext::none()).unwrap();
    assert_eq!(got.status, FrameStatus::EncryptedNoKey);
    assert_ne!(got.data, frames[0]);
    // IV + check value + plaintext + GCM tag.
    assert_eq!(got.data.len(), 16 + 16 + 300 + 16);
}

#[test]
fn test_ciphertext_bit_flip_is_an_integrity_error() {
    let mem = MemoryStorage::new();
    write_encrypted(&mem, "x.mxf", &[prores_test_frame(128, 3)], false);
    let mut bytes = mem.get("x.mxf").unwrap().to_vec();

    let at = find(&bytes, labels::ENCRYPTED_TRIPLET.as_bytes());
    let h = klv::decode(&bytes, at).unwrap();
    let value = &bytes[h.value_offset..h.value_offset + h.length as usize];
    let env = Envelope::parse(value).unwrap();
    let cipher_at = h.value_offset + (env.encrypted_source.as_ptr() as usize - value.as_ptr() as usize) + 40;
    bytes[cipher_at] ^= 0x80;
    mem.insert("x.mxf", bytes);

    let mut r = open(&mem, "x.mxf", prores());
    let ctx = crypto(false);
    let err = r.read_frame(0, ReadContext::from_crypto(&ctx)).unwrap_err();
    assert!(err.is_integrity(), "{err}");
    assert!(r.is_open());
}

#[test]
fn test_mic_bit_flip_is_an_integrity_error() {
    let mem = MemoryStorage::new();
    write_encrypted(&mem, "m.mxf", &[prores_test_frame(128, 3), prores_test_frame(96, 4)], true);
    let mut bytes = mem.get("m.mxf").unwrap().to_vec();

    let at = find(&bytes, labels::ENCRYPTED_TRIPLET.as_bytes());
    let h = klv::decode(&bytes, at).unwrap();
    let last = h.value_offset + h.length as usize - 1;
    bytes[last] ^= 0x01;
    mem.insert("m.mxf", bytes);

    let mut r = open(&mem, "m.mxf", prores());
    let ctx = crypto(true);
    assert!(r.read_frame(0, ReadContext::from_crypto(&ctx)).unwrap_err().is_integrity());
    // The untouched frame still verifies.
    assert!(r.read_frame(1, ReadContext::from_crypto(&ctx)).is_ok());
}

#[test]
fn test_wrong_key_is_an_integrity_error() {
    let mem = MemoryStorage::new();
    write_encrypted(&mem, "wk.mxf", &[prores_test_frame(128, 3)], false);
    let mut r = open(&mem, "wk.mxf", prores());
    let wrong = EncryptionContext::new(Arc::new(Aes256GcmCipher::new(&[0x24; 32])));
    assert!(r.read_frame(0, ReadContext::from_crypto(&wrong)).unwrap_err().is_integrity());
}

#[test]
fn test_meta_frames() {
    let mem = MemoryStorage::new();
    let adapter: Arc<dyn EssenceAdapter> = Arc::new(MgaSadmAdapter::default());
    let mut w = TrackFileWriter::new();
    w.open_write(
        &mem,
        "a.mxf",
        WriterInfo::default(),
        adapter.clone(),
        Rational::new(24, 1),
        WriterConfig::default().with_kag(512),
        None,
    )
    .unwrap();
    let audio: Vec<Vec<u8>> = (0..4).map(|i| vec![i as u8; 2000 + i]).collect();
    let sadm: Vec<Vec<u8>> = (0..4).map(|i| format!("<frame n=\"{i}\"/>").into_bytes()).collect();
    for (a, m) in audio.iter().zip(&sadm) {
        w.write_frame_with(a, FrameOptions::with_metadata(m)).unwrap();
    }
    w.finalize().unwrap();

    let mut r = open(&mem, "a.mxf", adapter);
    for i in 0..4u32 {
        assert_eq!(r.read_meta_frame(i).unwrap(), sadm[i as usize]);
        assert_eq!(r.read_frame(i, ReadContext::none()).unwrap().data, audio[i as usize]);
    }

    let mem2 = MemoryStorage::new();
    write_prores(&mem2, "p.mxf", &[64], WriterConfig::default());
    let mut p = open(&mem2, "p.mxf", prores());
    assert!(matches!(p.read_meta_frame(0), Err(Error::State(_))));
}

#[test]
fn test_fork_reads_independently() {
    let mem = MemoryStorage::new();
    let frames = write_prores(&mem, "fk.mxf", &[90, 91, 92, 93], WriterConfig::default());
    let mut a = open(&mem, "fk.mxf", prores());
    let mut b = a.fork().unwrap();
    assert_eq!(b.read_frame(3, ReadContext::none()).unwrap().data, frames[3]);
    assert_eq!(a.read_frame(0, ReadContext::none()).unwrap().data, frames[0]);
    a.close();
    assert!(matches!(a.read_frame(0, ReadContext::none()), Err(Error::NotOpen)));
    assert_eq!(b.read_frame(1, ReadContext::none()).unwrap().data, frames[1]);
}

#[test]
fn test_garbage_is_rejected_and_reader_stays_closed() {
    let mem = MemoryStorage::new();
    mem.insert("junk.mxf", vec![0xAB; 4096]);
    let mut r = TrackFileReader::new(Arc::new(mem.clone()), prores());
    assert!(r.open_read("junk.mxf").unwrap_err().is_format());
    assert!(!r.is_open());
    assert!(matches!(r.frame_count(), Err(Error::NotOpen)));
}

#[test]
fn test_unfinalized_file_is_rejected() {
    let mem = MemoryStorage::new();
    let mut w = TrackFileWriter::new();
    w.open_write(&mem, "open.mxf", WriterInfo::default(), prores(), Rational::new(24, 1), WriterConfig::default(), None)
        .unwrap();
    w.write_frame(&prores_test_frame(64, 0)).unwrap();
    drop(w);
    let mut r = TrackFileReader::new(Arc::new(mem.clone()), prores());
    assert!(r.open_read("open.mxf").is_err());
    assert!(!r.is_open());
}
