use proptest::prelude::*;
use trackfile::index::{FrameIndex, IndexBuilder, IndexEntry, IndexSegment, FLAG_RANDOM_ACCESS};
use trackfile::klv::{self, KlvIter};
use trackfile::label::labels;
use trackfile::Rational;

proptest! {
    #[test]
    fn ber_lengths_are_minimal(len in any::<u64>()) {
        let bytes = klv::encode_ber(len);
        prop_assert_eq!(bytes.len(), klv::ber_len_size(len));
        prop_assert_eq!(bytes.len() == 1, len <= 0x7F);
        if bytes.len() > 1 {
            // No leading zero byte in the long form.
            prop_assert_ne!(bytes[1], 0);
        }
        prop_assert_eq!(klv::decode_ber(&bytes, 0).unwrap(), (len, bytes.len()));
    }

    #[test]
    fn fill_lands_on_the_grid(position in 0u64..1 << 40, kag in 2u32..=65_536) {
        let total = klv::fill_size(position, kag);
        prop_assert_eq!((position + total) % kag as u64, 0);
        if total > 0 {
            prop_assert!(total >= klv::MIN_TRIPLET_LEN);
            let item = klv::fill_item(total);
            prop_assert_eq!(item.len() as u64, total);
            let h = klv::decode(&item, 0).unwrap();
            prop_assert!(h.is_fill());
            prop_assert_eq!(h.total_size, total);
        }
    }

    #[test]
    fn iteration_skips_fill(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..600), 1..12),
        kag in prop_oneof![Just(1u32), Just(256u32), Just(512u32)],
    ) {
        let mut stream = Vec::new();
        for p in &payloads {
            stream.extend(klv::encode(&labels::PRORES_PICTURE_ELEMENT, p));
            stream.extend(klv::fill_item(klv::fill_size(stream.len() as u64, kag)));
            prop_assert_eq!(stream.len() as u64 % kag as u64, 0);
        }
        let got: Vec<Vec<u8>> = KlvIter::new(&stream)
            .map(|r| r.map(|(h, v)| {
                assert_eq!(h.label, labels::PRORES_PICTURE_ELEMENT);
                v.to_vec()
            }))
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(got, payloads);
    }

    #[test]
    fn truncated_triplets_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        for item in KlvIter::new(&bytes) {
            if item.is_err() {
                break;
            }
        }
    }

    #[test]
    fn index_offsets_follow_unit_sizes(
        sizes in prop::collection::vec(1u64..5_000, 1..300),
        flush_every in 1usize..64,
    ) {
        let mut builder = IndexBuilder::new(Rational::new(24, 1), 129, 1);
        let mut segments = Vec::new();
        let mut offset = 0u64;
        let mut expected = Vec::new();
        for (i, &size) in sizes.iter().enumerate() {
            builder.push(
                IndexEntry { temporal_offset: 0, key_frame_offset: 0, flags: FLAG_RANDOM_ACCESS, stream_offset: offset },
                size,
            );
            expected.push(offset);
            offset += size;
            if (i + 1) % flush_every == 0 {
                segments.extend(builder.take_segments(false));
            }
        }
        segments.extend(builder.take_segments(false));

        // Through the wire form, as a reader would see them.
        let decoded: Vec<IndexSegment> = segments
            .iter()
            .map(|s| {
                let bytes = s.encode().unwrap();
                let h = klv::decode(&bytes, 0).unwrap();
                IndexSegment::decode(&bytes[h.value_offset..]).unwrap()
            })
            .collect();
        let index = FrameIndex::merge(decoded).unwrap();
        prop_assert_eq!(index.frame_count(), sizes.len() as u64);
        for (n, want) in expected.iter().enumerate() {
            prop_assert_eq!(index.stream_offset(n as u64), Some(*want));
        }
        prop_assert_eq!(index.stream_offset(sizes.len() as u64), None);
    }
}
