use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trackfile::crypto::{Aes256GcmCipher, Blake3Mac};
use trackfile::essence::{prores_test_frame, ProResAdapter};
use trackfile::storage::MemoryStorage;
use trackfile::{
    EncryptionContext, FrameBuffer, IndexPlacement, Rational, ReadContext, TrackFileReader, TrackFileWriter,
    WriterConfig, WriterInfo,
};

const FRAMES: usize = 48;

fn write_clip(mem: &MemoryStorage, config: WriterConfig, crypto: Option<EncryptionContext>, frame: &[u8]) {
    let info = match crypto {
        Some(_) => WriterInfo::default().encrypted(uuid::Uuid::new_v4(), true),
        None => WriterInfo::default(),
    };
    let mut w = TrackFileWriter::new();
    w.open_write(mem, "bench.mxf", info, Arc::new(ProResAdapter::default()), Rational::new(24, 1), config, crypto)
        .unwrap();
    for _ in 0..FRAMES {
        w.write_frame(black_box(frame)).unwrap();
    }
    w.finalize().unwrap();
}

fn crypto() -> EncryptionContext {
    let key = [7u8; 32];
    EncryptionContext::new(Arc::new(Aes256GcmCipher::new(&key))).with_mac(Arc::new(Blake3Mac::derived_from(&key)))
}

fn bench_write(c: &mut Criterion) {
    let frame = prores_test_frame(256 * 1024, 0x5A);

    c.bench_function("write_48x256k_plain", |b| {
        b.iter(|| write_clip(&MemoryStorage::new(), WriterConfig::default(), None, &frame))
    });

    c.bench_function("write_48x256k_kag512_partitioned", |b| {
        let config = WriterConfig::default()
            .with_kag(512)
            .with_partition_frames(12, IndexPlacement::FollowingPartition);
        b.iter(|| write_clip(&MemoryStorage::new(), config.clone(), None, &frame))
    });

    c.bench_function("write_48x256k_encrypted", |b| {
        b.iter(|| write_clip(&MemoryStorage::new(), WriterConfig::default(), Some(crypto()), &frame))
    });
}

fn bench_read(c: &mut Criterion) {
    let frame = prores_test_frame(256 * 1024, 0x5A);
    let plain = MemoryStorage::new();
    write_clip(&plain, WriterConfig::default(), None, &frame);
    let sealed = MemoryStorage::new();
    write_clip(&sealed, WriterConfig::default(), Some(crypto()), &frame);

    c.bench_function("read_48x256k_plain", |b| {
        let mut r = TrackFileReader::new(Arc::new(plain.clone()), Arc::new(ProResAdapter::default()));
        r.open_read("bench.mxf").unwrap();
        let mut buf = FrameBuffer::with_capacity(frame.len());
        b.iter(|| {
            for n in 0..FRAMES as u32 {
                r.read_frame_into(n, &mut buf, ReadContext::none()).unwrap();
                black_box(buf.as_slice());
            }
        })
    });

    c.bench_function("read_48x256k_decrypt_and_verify", |b| {
        let ctx = crypto();
        let mut r = TrackFileReader::new(Arc::new(sealed.clone()), Arc::new(ProResAdapter::default()));
        r.open_read("bench.mxf").unwrap();
        let mut buf = FrameBuffer::with_capacity(frame.len());
        b.iter(|| {
            for n in 0..FRAMES as u32 {
                r.read_frame_into(n, &mut buf, ReadContext::from_crypto(&ctx)).unwrap();
                black_box(buf.as_slice());
            }
        })
    });
}

fn bench_open(c: &mut Criterion) {
    let mem = MemoryStorage::new();
    let config = WriterConfig::default().with_partition_frames(4, IndexPlacement::Footer);
    write_clip(&mem, config, None, &prores_test_frame(4096, 1));

    c.bench_function("open_12_partitions", |b| {
        b.iter(|| {
            let mut r = TrackFileReader::new(Arc::new(mem.clone()), Arc::new(ProResAdapter::default()));
            r.open_read(black_box("bench.mxf")).unwrap();
            black_box(r.frame_count().unwrap());
        })
    });
}

criterion_group!(benches, bench_write, bench_read, bench_open);
criterion_main!(benches);
