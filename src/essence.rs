//! Essence adapters.
//!
//! An adapter supplies what the container engine cannot know about a
//! payload kind: the element key frames are wrapped under, the container
//! label, the descriptor set and its fields, and a plausibility check for
//! frames handed to the writer.

use std::fmt;

use crate::error::{Error, Result};
use crate::label::{labels, props, Label};
use crate::metadata::sets::{value, Rational};

/// Sub-descriptor set contributed by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SubDescriptorSpec {
    pub set_label: Label,
    pub properties: Vec<(Label, Vec<u8>)>,
}

pub trait EssenceAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    /// Key of every essence triplet.
    fn essence_element(&self) -> Label;
    /// Key of the per-frame metadata triplet, for kinds that carry one.
    fn metadata_element(&self) -> Option<Label> {
        None
    }
    fn essence_container(&self) -> Label;
    fn data_definition(&self) -> Label;
    fn descriptor_label(&self) -> Label;
    /// Kind-specific descriptor properties (the common file descriptor
    /// fields are filled in by the engine).
    fn descriptor_properties(&self, edit_rate: Rational) -> Vec<(Label, Vec<u8>)>;
    fn sub_descriptors(&self) -> Vec<SubDescriptorSpec> {
        Vec::new()
    }
    fn validate_frame(&self, frame: &[u8]) -> Result<()>;

    /// Track number: the low four bytes of the element key.
    fn track_number(&self) -> u32 {
        let k = self.essence_element().0;
        u32::from_be_bytes([k[12], k[13], k[14], k[15]])
    }
}

impl fmt::Debug for dyn EssenceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EssenceAdapter({})", self.name())
    }
}

// ── ProRes ───────────────────────────────────────────────────────────────────

const PRORES_FRAME_ID: &[u8; 4] = b"icpf";
const PRORES_HEADER_LEN: usize = 8;

/// Frame-wrapped ProRes picture essence with a CDCI descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProResAdapter {
    pub stored_width: u32,
    pub stored_height: u32,
    /// 0 = full frame, 1 = separate fields.
    pub frame_layout: u8,
    pub aspect_ratio: Rational,
    pub component_depth: u32,
    pub horizontal_subsampling: u32,
    pub coding: Label,
}

impl Default for ProResAdapter {
    fn default() -> Self {
        Self {
            stored_width: 1920,
            stored_height: 1080,
            frame_layout: 0,
            aspect_ratio: Rational::new(16, 9),
            component_depth: 10,
            horizontal_subsampling: 2,
            coding: PRORES_422_HQ,
        }
    }
}

/// ProRes 422 HQ picture coding label.
pub const PRORES_422_HQ: Label = Label([
    0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x0D, 0x04, 0x01, 0x02, 0x02, 0x03, 0x06, 0x03, 0x00,
]);

impl EssenceAdapter for ProResAdapter {
    fn name(&self) -> &'static str {
        "prores"
    }

    fn essence_element(&self) -> Label {
        labels::PRORES_PICTURE_ELEMENT
    }

    fn essence_container(&self) -> Label {
        labels::PRORES_ESSENCE_CONTAINER
    }

    fn data_definition(&self) -> Label {
        labels::PICTURE_DATA_DEF
    }

    fn descriptor_label(&self) -> Label {
        labels::CDCI_DESCRIPTOR
    }

    fn descriptor_properties(&self, _edit_rate: Rational) -> Vec<(Label, Vec<u8>)> {
        vec![
            (props::PICTURE_COMPRESSION, value::label(&self.coding)),
            (props::STORED_HEIGHT, value::u32(self.stored_height)),
            (props::STORED_WIDTH, value::u32(self.stored_width)),
            (props::FRAME_LAYOUT, vec![self.frame_layout]),
            (props::ASPECT_RATIO, value::rational(self.aspect_ratio)),
            (props::COMPONENT_DEPTH, value::u32(self.component_depth)),
            (props::HORIZONTAL_SUBSAMPLING, value::u32(self.horizontal_subsampling)),
        ]
    }

    /// A frame starts with its own big-endian size followed by `icpf`.
    fn validate_frame(&self, frame: &[u8]) -> Result<()> {
        if frame.len() < PRORES_HEADER_LEN {
            return Err(Error::format(format!("ProRes frame of {} bytes", frame.len())));
        }
        if &frame[4..8] != PRORES_FRAME_ID {
            return Err(Error::format("ProRes frame lacks the icpf identifier"));
        }
        let declared = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        if declared != frame.len() {
            return Err(Error::format(format!(
                "ProRes frame declares {declared} bytes but holds {}",
                frame.len()
            )));
        }
        Ok(())
    }
}

/// Build a syntactically plausible ProRes frame of `len` bytes.
pub fn prores_test_frame(len: usize, fill: u8) -> Vec<u8> {
    let mut frame = vec![fill; len.max(PRORES_HEADER_LEN)];
    let frame_len = frame.len() as u32;
    frame[0..4].copy_from_slice(&frame_len.to_be_bytes());
    frame[4..8].copy_from_slice(PRORES_FRAME_ID);
    frame
}

// ── MGA + S-ADM ──────────────────────────────────────────────────────────────

/// Object-based audio (MGA) frames, each followed by one S-ADM metadata
/// triplet.
#[derive(Debug, Clone, PartialEq)]
pub struct MgaSadmAdapter {
    pub sampling_rate: Rational,
    pub channel_count: u32,
    pub quantization_bits: u32,
    pub soundfield_groups: Vec<SubDescriptorSpec>,
}

impl Default for MgaSadmAdapter {
    fn default() -> Self {
        Self {
            sampling_rate: Rational::new(48_000, 1),
            channel_count: 0,
            quantization_bits: 24,
            soundfield_groups: Vec::new(),
        }
    }
}

impl MgaSadmAdapter {
    /// Add a soundfield group sub-descriptor identified by `link_id`.
    pub fn with_soundfield_group(mut self, link_id: uuid::Uuid, dictionary_id: Label) -> Self {
        self.soundfield_groups.push(SubDescriptorSpec {
            set_label: labels::MGA_SOUNDFIELD_SUBDESCRIPTOR,
            properties: vec![
                (props::MGA_SOUNDFIELD_GROUP_LINK_ID, value::uuid(&link_id)),
                (props::MCA_LABEL_DICTIONARY_ID, value::label(&dictionary_id)),
            ],
        });
        self
    }
}

impl EssenceAdapter for MgaSadmAdapter {
    fn name(&self) -> &'static str {
        "mga-sadm"
    }

    fn essence_element(&self) -> Label {
        labels::MGA_SOUND_ELEMENT
    }

    fn metadata_element(&self) -> Option<Label> {
        Some(labels::SADM_METADATA_ELEMENT)
    }

    fn essence_container(&self) -> Label {
        labels::MGA_ESSENCE_CONTAINER
    }

    fn data_definition(&self) -> Label {
        labels::SOUND_DATA_DEF
    }

    fn descriptor_label(&self) -> Label {
        labels::MGA_SOUND_DESCRIPTOR
    }

    fn descriptor_properties(&self, _edit_rate: Rational) -> Vec<(Label, Vec<u8>)> {
        vec![
            (props::AUDIO_SAMPLING_RATE, value::rational(self.sampling_rate)),
            (props::CHANNEL_COUNT, value::u32(self.channel_count)),
            (props::QUANTIZATION_BITS, value::u32(self.quantization_bits)),
        ]
    }

    fn sub_descriptors(&self) -> Vec<SubDescriptorSpec> {
        self.soundfield_groups.clone()
    }

    fn validate_frame(&self, frame: &[u8]) -> Result<()> {
        if frame.is_empty() {
            return Err(Error::format("empty MGA frame"));
        }
        Ok(())
    }
}

/// Built-in adapter by name, as used by the CLI.
pub fn adapter_by_name(name: &str) -> Option<Box<dyn EssenceAdapter>> {
    match name {
        "prores" => Some(Box::new(ProResAdapter::default())),
        "mga-sadm" | "mga" => Some(Box::new(MgaSadmAdapter::default())),
        _ => None,
    }
}
