//! 16-byte SMPTE labels and the static label registry.
//!
//! Every KLV key and every metadata property is identified by a [`Label`].
//! The registry maps the labels this engine knows about to a display name
//! and, for properties, the static local tag used in local sets. It is
//! built once on first use and never mutated afterwards.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

/// A 16-byte Universal Label.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Label(pub [u8; 16]);

impl Label {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Label(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(Label(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 16]
    }

    /// Registered SMPTE labels start with `06 0E 2B 34`.
    pub fn is_smpte(&self) -> bool {
        self.0[0..4] == labels::SMPTE_PREFIX
    }

    /// Byte equality ignoring the registry version byte (byte 7).
    pub fn matches_ignoring_version(&self, other: &Label) -> bool {
        self.0[0..7] == other.0[0..7] && self.0[8..16] == other.0[8..16]
    }

    pub fn is_fill(&self) -> bool {
        self.matches_ignoring_version(&labels::FILL_ITEM)
            || self.matches_ignoring_version(&labels::FILL_ITEM_V1)
    }

    pub fn is_partition_pack(&self) -> bool {
        self.0[0..13] == labels::PARTITION_PACK_BASE.0[0..13] && (0x02..=0x04).contains(&self.0[13])
    }

    pub fn is_primer_pack(&self) -> bool {
        *self == labels::PRIMER_PACK
    }

    pub fn is_index_segment(&self) -> bool {
        self.matches_ignoring_version(&labels::INDEX_TABLE_SEGMENT)
    }

    /// Registry name, if the label is known.
    pub fn name(&self) -> Option<&'static str> {
        lookup(self).map(|e| e.name)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{}.{}.{}.{}.{}",
            hex::encode(&b[0..4]),
            hex::encode(&b[4..6]),
            hex::encode(&b[6..8]),
            hex::encode(&b[8..12]),
            hex::encode(&b[12..16]),
        )
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Label({self} {name})"),
            None => write!(f, "Label({self})"),
        }
    }
}

impl From<[u8; 16]> for Label {
    fn from(bytes: [u8; 16]) -> Self {
        Label(bytes)
    }
}

/// What kind of item a registry entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Pack,
    Set,
    Property,
    EssenceElement,
    EssenceContainer,
    DataDefinition,
    Algorithm,
    Other,
}

/// One row of the label registry.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub label: Label,
    pub name: &'static str,
    pub kind: EntryKind,
    /// Static local tag for properties that have one.
    pub tag: Option<u16>,
}

pub struct Registry {
    entries: Vec<Entry>,
    by_label: HashMap<Label, usize>,
    by_tag: HashMap<u16, usize>,
}

impl Registry {
    fn build(entries: Vec<Entry>) -> Self {
        let mut by_label = HashMap::with_capacity(entries.len());
        let mut by_tag = HashMap::new();
        for (i, e) in entries.iter().enumerate() {
            by_label.insert(e.label, i);
            if let Some(tag) = e.tag {
                by_tag.insert(tag, i);
            }
        }
        Self { entries, by_label, by_tag }
    }

    pub fn lookup(&self, label: &Label) -> Option<&Entry> {
        self.by_label.get(label).map(|&i| &self.entries[i])
    }

    pub fn by_static_tag(&self, tag: u16) -> Option<&Entry> {
        self.by_tag.get(&tag).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| Registry::build(registry_entries()));

/// The process-wide, read-only registry.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

pub fn lookup(label: &Label) -> Option<&'static Entry> {
    REGISTRY.lookup(label)
}

/// Static local tag for a property label, if it has one.
pub fn static_tag(label: &Label) -> Option<u16> {
    lookup(label).and_then(|e| e.tag)
}

/// Property label registered under a static local tag.
pub fn label_for_static_tag(tag: u16) -> Option<Label> {
    REGISTRY.by_static_tag(tag).map(|e| e.label)
}

const fn ul(b: [u8; 16]) -> Label {
    Label(b)
}

/// Well-known labels.
pub mod labels {
    use super::{ul, Label};

    pub const SMPTE_PREFIX: [u8; 4] = [0x06, 0x0E, 0x2B, 0x34];

    // ── Packs and structural items ───────────────────────────────────────
    pub const FILL_ITEM: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00, 0x00]);
    /// Pre-2004 fill key, accepted on read.
    pub const FILL_ITEM_V1: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00, 0x00]);
    pub const PARTITION_PACK_BASE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0x00]);
    pub const PRIMER_PACK: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x05, 0x01, 0x00]);
    pub const INDEX_TABLE_SEGMENT: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x10, 0x01, 0x00]);
    pub const RANDOM_INDEX_PACK: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x11, 0x01, 0x00]);
    pub const ENCRYPTED_TRIPLET: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x04, 0x01, 0x07, 0x0D, 0x01, 0x03, 0x01, 0x02, 0x7E, 0x01, 0x00]);

    // ── Operational pattern and containers ───────────────────────────────
    pub const OP1A: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x01, 0x09, 0x00]);
    pub const ENCRYPTED_ESSENCE_CONTAINER: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x07, 0x0D, 0x01, 0x03, 0x01, 0x02, 0x0B, 0x01, 0x00]);
    pub const PRORES_ESSENCE_CONTAINER: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x0D, 0x0D, 0x01, 0x03, 0x01, 0x02, 0x1C, 0x01, 0x00]);
    pub const MGA_ESSENCE_CONTAINER: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x0D, 0x0D, 0x01, 0x03, 0x01, 0x02, 0x25, 0x01, 0x00]);
    pub const CRYPTOGRAPHIC_DM_SCHEME: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x07, 0x0D, 0x01, 0x04, 0x01, 0x02, 0x00, 0x00, 0x00]);

    // ── Essence elements ─────────────────────────────────────────────────
    pub const PRORES_PICTURE_ELEMENT: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x15, 0x01, 0x17, 0x01]);
    pub const MGA_SOUND_ELEMENT: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x16, 0x01, 0x0E, 0x01]);
    pub const SADM_METADATA_ELEMENT: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x18, 0x01, 0x0B, 0x01]);

    // ── Data definitions ─────────────────────────────────────────────────
    pub const PICTURE_DATA_DEF: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x01, 0x03, 0x02, 0x02, 0x01, 0x00, 0x00, 0x00]);
    pub const SOUND_DATA_DEF: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x01, 0x03, 0x02, 0x02, 0x02, 0x00, 0x00, 0x00]);
    pub const TIMECODE_DATA_DEF: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x01, 0x03, 0x02, 0x01, 0x01, 0x00, 0x00, 0x00]);
    pub const DESCRIPTIVE_DATA_DEF: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x01, 0x03, 0x02, 0x01, 0x10, 0x00, 0x00, 0x00]);

    // ── Algorithms ───────────────────────────────────────────────────────
    pub const CIPHER_AES256_GCM: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x0D, 0x0E, 0x15, 0x00, 0x09, 0x01, 0x01, 0x00, 0x00]);
    pub const MIC_BLAKE3_KEYED: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x0D, 0x0E, 0x15, 0x00, 0x09, 0x02, 0x01, 0x00, 0x00]);

    // ── Metadata sets ────────────────────────────────────────────────────
    pub const PREFACE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x2F, 0x00]);
    pub const IDENTIFICATION: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x30, 0x00]);
    pub const CONTENT_STORAGE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x18, 0x00]);
    pub const ESSENCE_CONTAINER_DATA: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x23, 0x00]);
    pub const MATERIAL_PACKAGE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x36, 0x00]);
    pub const SOURCE_PACKAGE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x37, 0x00]);
    pub const STATIC_TRACK: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x3A, 0x00]);
    pub const TIMELINE_TRACK: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x3B, 0x00]);
    pub const SEQUENCE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x0F, 0x00]);
    pub const SOURCE_CLIP: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x11, 0x00]);
    pub const TIMECODE_COMPONENT: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x14, 0x00]);
    pub const DM_SEGMENT: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x41, 0x00]);
    pub const CDCI_DESCRIPTOR: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x28, 0x00]);
    pub const MGA_SOUND_DESCRIPTOR: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x81, 0x02]);
    pub const MGA_SOUNDFIELD_SUBDESCRIPTOR: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x81, 0x03]);
    pub const CRYPTOGRAPHIC_FRAMEWORK: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x04, 0x01, 0x02, 0x01, 0x00, 0x00]);
    pub const CRYPTOGRAPHIC_CONTEXT: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x04, 0x01, 0x02, 0x02, 0x00, 0x00]);
}

/// Property labels. Only the ones with a static tag in the registry are
/// guaranteed a fixed local tag; the rest get dynamic tags.
pub mod props {
    use super::{ul, Label};

    pub const INSTANCE_UID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x15, 0x02, 0x00, 0x00, 0x00, 0x00]);

    // Preface
    pub const LAST_MODIFIED_DATE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x07, 0x02, 0x01, 0x10, 0x02, 0x04, 0x00, 0x00]);
    pub const VERSION: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x03, 0x01, 0x02, 0x01, 0x05, 0x00, 0x00, 0x00]);
    pub const IDENTIFICATIONS: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x04, 0x06, 0x04, 0x00, 0x00]);
    pub const CONTENT_STORAGE_REF: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x04, 0x02, 0x01, 0x00, 0x00]);
    pub const PRIMARY_PACKAGE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x04, 0x06, 0x01, 0x01, 0x04, 0x01, 0x08, 0x00, 0x00]);
    pub const OPERATIONAL_PATTERN: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x01, 0x02, 0x02, 0x03, 0x00, 0x00, 0x00, 0x00]);
    pub const ESSENCE_CONTAINERS: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x01, 0x02, 0x02, 0x10, 0x02, 0x01, 0x00, 0x00]);
    pub const DM_SCHEMES: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x01, 0x02, 0x02, 0x10, 0x02, 0x02, 0x00, 0x00]);

    // Identification
    pub const THIS_GENERATION_UID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x05, 0x20, 0x07, 0x01, 0x01, 0x00, 0x00, 0x00]);
    pub const COMPANY_NAME: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x05, 0x20, 0x07, 0x01, 0x02, 0x01, 0x00, 0x00]);
    pub const PRODUCT_NAME: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x05, 0x20, 0x07, 0x01, 0x03, 0x01, 0x00, 0x00]);
    pub const VERSION_STRING: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x05, 0x20, 0x07, 0x01, 0x05, 0x01, 0x00, 0x00]);
    pub const PRODUCT_UID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x05, 0x20, 0x07, 0x01, 0x07, 0x00, 0x00, 0x00]);
    pub const MODIFICATION_DATE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x07, 0x02, 0x01, 0x10, 0x02, 0x03, 0x00, 0x00]);

    // ContentStorage / EssenceContainerData
    pub const PACKAGES: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x04, 0x05, 0x01, 0x00, 0x00]);
    pub const ESSENCE_CONTAINER_DATA_REFS: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x04, 0x05, 0x02, 0x00, 0x00]);
    pub const LINKED_PACKAGE_UID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x06, 0x01, 0x00, 0x00, 0x00]);
    pub const INDEX_SID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x04, 0x01, 0x03, 0x04, 0x05, 0x00, 0x00, 0x00, 0x00]);
    pub const BODY_SID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x04, 0x01, 0x03, 0x04, 0x04, 0x00, 0x00, 0x00, 0x00]);

    // Packages and tracks
    pub const PACKAGE_UID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x15, 0x10, 0x00, 0x00, 0x00, 0x00]);
    pub const PACKAGE_NAME: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x01, 0x03, 0x03, 0x02, 0x01, 0x00, 0x00, 0x00]);
    pub const TRACKS: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x04, 0x06, 0x05, 0x00, 0x00]);
    pub const PACKAGE_MODIFIED_DATE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x07, 0x02, 0x01, 0x10, 0x02, 0x05, 0x00, 0x00]);
    pub const PACKAGE_CREATION_DATE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x07, 0x02, 0x01, 0x10, 0x01, 0x03, 0x00, 0x00]);
    pub const DESCRIPTOR: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x04, 0x02, 0x03, 0x00, 0x00]);
    pub const TRACK_ID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x01, 0x07, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00]);
    pub const TRACK_NUMBER: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x01, 0x04, 0x01, 0x03, 0x00, 0x00, 0x00, 0x00]);
    pub const TRACK_NAME: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x01, 0x07, 0x01, 0x02, 0x01, 0x00, 0x00, 0x00]);
    pub const TRACK_SEQUENCE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x04, 0x02, 0x04, 0x00, 0x00]);
    pub const EDIT_RATE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x05, 0x30, 0x04, 0x05, 0x00, 0x00, 0x00, 0x00]);
    pub const ORIGIN: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x07, 0x02, 0x01, 0x03, 0x01, 0x03, 0x00, 0x00]);

    // Components
    pub const DATA_DEFINITION: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x04, 0x07, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
    pub const DURATION: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x07, 0x02, 0x02, 0x01, 0x01, 0x03, 0x00, 0x00]);
    pub const STRUCTURAL_COMPONENTS: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x04, 0x06, 0x09, 0x00, 0x00]);
    pub const START_POSITION: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x07, 0x02, 0x01, 0x03, 0x01, 0x04, 0x00, 0x00]);
    pub const SOURCE_PACKAGE_ID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x03, 0x01, 0x00, 0x00, 0x00]);
    pub const SOURCE_TRACK_ID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x03, 0x02, 0x00, 0x00, 0x00]);
    pub const ROUNDED_TIMECODE_BASE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x04, 0x04, 0x01, 0x01, 0x02, 0x06, 0x00, 0x00]);
    pub const START_TIMECODE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x07, 0x02, 0x01, 0x03, 0x01, 0x05, 0x00, 0x00]);
    pub const DROP_FRAME: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x04, 0x04, 0x01, 0x01, 0x05, 0x00, 0x00, 0x00]);
    pub const DM_FRAMEWORK: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x04, 0x02, 0x0C, 0x00, 0x00]);

    // Cryptographic framework / context (dynamic tags)
    pub const CONTEXT_SR: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x09, 0x06, 0x01, 0x01, 0x04, 0x02, 0x0D, 0x00, 0x00]);
    pub const CONTEXT_ID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x09, 0x01, 0x01, 0x15, 0x11, 0x00, 0x00, 0x00, 0x00]);
    pub const SOURCE_ESSENCE_CONTAINER: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x09, 0x06, 0x01, 0x01, 0x02, 0x02, 0x00, 0x00, 0x00]);
    pub const CIPHER_ALGORITHM: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x09, 0x02, 0x09, 0x03, 0x01, 0x01, 0x00, 0x00, 0x00]);
    pub const MIC_ALGORITHM: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x09, 0x02, 0x09, 0x03, 0x02, 0x01, 0x00, 0x00, 0x00]);
    pub const CRYPTOGRAPHIC_KEY_ID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x09, 0x02, 0x09, 0x03, 0x01, 0x02, 0x00, 0x00, 0x00]);

    // File descriptor
    pub const LINKED_TRACK_ID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x06, 0x01, 0x01, 0x03, 0x05, 0x00, 0x00, 0x00]);
    pub const SAMPLE_RATE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x04, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00]);
    pub const CONTAINER_DURATION: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x04, 0x06, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00]);
    pub const ESSENCE_CONTAINER: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x06, 0x01, 0x01, 0x04, 0x01, 0x02, 0x00, 0x00]);
    pub const SUB_DESCRIPTORS: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x09, 0x06, 0x01, 0x01, 0x04, 0x06, 0x10, 0x00, 0x00]);

    // Picture / sound descriptor fields used by the built-in adapters
    pub const PICTURE_COMPRESSION: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x04, 0x01, 0x06, 0x01, 0x00, 0x00, 0x00, 0x00]);
    pub const STORED_HEIGHT: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x04, 0x01, 0x05, 0x02, 0x01, 0x00, 0x00, 0x00]);
    pub const STORED_WIDTH: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x04, 0x01, 0x05, 0x02, 0x02, 0x00, 0x00, 0x00]);
    pub const FRAME_LAYOUT: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x04, 0x01, 0x03, 0x01, 0x04, 0x00, 0x00, 0x00]);
    pub const ASPECT_RATIO: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x04, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00]);
    pub const COMPONENT_DEPTH: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x04, 0x01, 0x05, 0x03, 0x0A, 0x00, 0x00, 0x00]);
    pub const HORIZONTAL_SUBSAMPLING: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x04, 0x01, 0x05, 0x01, 0x05, 0x00, 0x00, 0x00]);
    pub const AUDIO_SAMPLING_RATE: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x04, 0x02, 0x03, 0x01, 0x01, 0x01, 0x00, 0x00]);
    pub const CHANNEL_COUNT: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x04, 0x02, 0x01, 0x01, 0x04, 0x00, 0x00, 0x00]);
    pub const QUANTIZATION_BITS: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x04, 0x04, 0x02, 0x03, 0x03, 0x04, 0x00, 0x00, 0x00]);
    pub const MGA_SOUNDFIELD_GROUP_LINK_ID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x0E, 0x04, 0x02, 0x03, 0x01, 0x14, 0x00, 0x00, 0x00]);
    pub const MCA_LABEL_DICTIONARY_ID: Label = ul([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x0E, 0x01, 0x03, 0x07, 0x01, 0x01, 0x00, 0x00, 0x00]);
}

fn registry_entries() -> Vec<Entry> {
    use EntryKind::*;

    fn e(label: Label, name: &'static str, kind: EntryKind, tag: Option<u16>) -> Entry {
        Entry { label, name, kind, tag }
    }

    vec![
        e(labels::FILL_ITEM, "Fill Item", Other, None),
        e(labels::FILL_ITEM_V1, "Fill Item (v1)", Other, None),
        e(labels::PRIMER_PACK, "Primer Pack", Pack, None),
        e(labels::INDEX_TABLE_SEGMENT, "Index Table Segment", Pack, None),
        e(labels::RANDOM_INDEX_PACK, "Random Index Pack", Pack, None),
        e(labels::ENCRYPTED_TRIPLET, "Encrypted Triplet", Pack, None),
        e(labels::OP1A, "OP1a", Other, None),
        e(labels::ENCRYPTED_ESSENCE_CONTAINER, "Encrypted Essence Container", EssenceContainer, None),
        e(labels::PRORES_ESSENCE_CONTAINER, "ProRes Frame-Wrapped Container", EssenceContainer, None),
        e(labels::MGA_ESSENCE_CONTAINER, "MGA Frame-Wrapped Container", EssenceContainer, None),
        e(labels::CRYPTOGRAPHIC_DM_SCHEME, "Cryptographic DM Scheme", Other, None),
        e(labels::PRORES_PICTURE_ELEMENT, "ProRes Picture Element", EssenceElement, None),
        e(labels::MGA_SOUND_ELEMENT, "MGA Sound Element", EssenceElement, None),
        e(labels::SADM_METADATA_ELEMENT, "S-ADM Metadata Element", EssenceElement, None),
        e(labels::PICTURE_DATA_DEF, "Picture", DataDefinition, None),
        e(labels::SOUND_DATA_DEF, "Sound", DataDefinition, None),
        e(labels::TIMECODE_DATA_DEF, "Timecode", DataDefinition, None),
        e(labels::DESCRIPTIVE_DATA_DEF, "Descriptive Metadata", DataDefinition, None),
        e(labels::CIPHER_AES256_GCM, "AES-256-GCM", Algorithm, None),
        e(labels::MIC_BLAKE3_KEYED, "BLAKE3 Keyed Hash", Algorithm, None),
        e(labels::PREFACE, "Preface", Set, None),
        e(labels::IDENTIFICATION, "Identification", Set, None),
        e(labels::CONTENT_STORAGE, "Content Storage", Set, None),
        e(labels::ESSENCE_CONTAINER_DATA, "Essence Container Data", Set, None),
        e(labels::MATERIAL_PACKAGE, "Material Package", Set, None),
        e(labels::SOURCE_PACKAGE, "Source Package", Set, None),
        e(labels::STATIC_TRACK, "Static Track", Set, None),
        e(labels::TIMELINE_TRACK, "Timeline Track", Set, None),
        e(labels::SEQUENCE, "Sequence", Set, None),
        e(labels::SOURCE_CLIP, "Source Clip", Set, None),
        e(labels::TIMECODE_COMPONENT, "Timecode Component", Set, None),
        e(labels::DM_SEGMENT, "DM Segment", Set, None),
        e(labels::CDCI_DESCRIPTOR, "CDCI Descriptor", Set, None),
        e(labels::MGA_SOUND_DESCRIPTOR, "MGA Sound Essence Descriptor", Set, None),
        e(labels::MGA_SOUNDFIELD_SUBDESCRIPTOR, "MGA Soundfield Group Label Subdescriptor", Set, None),
        e(labels::CRYPTOGRAPHIC_FRAMEWORK, "Cryptographic Framework", Set, None),
        e(labels::CRYPTOGRAPHIC_CONTEXT, "Cryptographic Context", Set, None),
        e(props::INSTANCE_UID, "InstanceUID", Property, Some(0x3C0A)),
        e(props::LAST_MODIFIED_DATE, "LastModifiedDate", Property, Some(0x3B02)),
        e(props::VERSION, "Version", Property, Some(0x3B05)),
        e(props::IDENTIFICATIONS, "Identifications", Property, Some(0x3B06)),
        e(props::CONTENT_STORAGE_REF, "ContentStorage", Property, Some(0x3B03)),
        e(props::PRIMARY_PACKAGE, "PrimaryPackage", Property, Some(0x3B08)),
        e(props::OPERATIONAL_PATTERN, "OperationalPattern", Property, Some(0x3B09)),
        e(props::ESSENCE_CONTAINERS, "EssenceContainers", Property, Some(0x3B0A)),
        e(props::DM_SCHEMES, "DMSchemes", Property, Some(0x3B0B)),
        e(props::THIS_GENERATION_UID, "ThisGenerationUID", Property, Some(0x3C09)),
        e(props::COMPANY_NAME, "CompanyName", Property, Some(0x3C01)),
        e(props::PRODUCT_NAME, "ProductName", Property, Some(0x3C02)),
        e(props::VERSION_STRING, "VersionString", Property, Some(0x3C04)),
        e(props::PRODUCT_UID, "ProductUID", Property, Some(0x3C05)),
        e(props::MODIFICATION_DATE, "ModificationDate", Property, Some(0x3C06)),
        e(props::PACKAGES, "Packages", Property, Some(0x1901)),
        e(props::ESSENCE_CONTAINER_DATA_REFS, "EssenceContainerData", Property, Some(0x1902)),
        e(props::LINKED_PACKAGE_UID, "LinkedPackageUID", Property, Some(0x2701)),
        e(props::INDEX_SID, "IndexSID", Property, Some(0x3F06)),
        e(props::BODY_SID, "BodySID", Property, Some(0x3F07)),
        e(props::PACKAGE_UID, "PackageUID", Property, Some(0x4401)),
        e(props::PACKAGE_NAME, "Name", Property, Some(0x4402)),
        e(props::TRACKS, "Tracks", Property, Some(0x4403)),
        e(props::PACKAGE_MODIFIED_DATE, "PackageModifiedDate", Property, Some(0x4404)),
        e(props::PACKAGE_CREATION_DATE, "PackageCreationDate", Property, Some(0x4405)),
        e(props::DESCRIPTOR, "Descriptor", Property, Some(0x4701)),
        e(props::TRACK_ID, "TrackID", Property, Some(0x4801)),
        e(props::TRACK_NAME, "TrackName", Property, Some(0x4802)),
        e(props::TRACK_SEQUENCE, "Sequence", Property, Some(0x4803)),
        e(props::TRACK_NUMBER, "TrackNumber", Property, Some(0x4804)),
        e(props::EDIT_RATE, "EditRate", Property, Some(0x4B01)),
        e(props::ORIGIN, "Origin", Property, Some(0x4B02)),
        e(props::DATA_DEFINITION, "DataDefinition", Property, Some(0x0201)),
        e(props::DURATION, "Duration", Property, Some(0x0202)),
        e(props::STRUCTURAL_COMPONENTS, "StructuralComponents", Property, Some(0x1001)),
        e(props::SOURCE_PACKAGE_ID, "SourcePackageID", Property, Some(0x1101)),
        e(props::SOURCE_TRACK_ID, "SourceTrackID", Property, Some(0x1102)),
        e(props::START_POSITION, "StartPosition", Property, Some(0x1201)),
        e(props::START_TIMECODE, "StartTimecode", Property, Some(0x1501)),
        e(props::ROUNDED_TIMECODE_BASE, "RoundedTimecodeBase", Property, Some(0x1502)),
        e(props::DROP_FRAME, "DropFrame", Property, Some(0x1503)),
        e(props::DM_FRAMEWORK, "DMFramework", Property, Some(0x6101)),
        e(props::CONTEXT_SR, "ContextSR", Property, None),
        e(props::CONTEXT_ID, "ContextID", Property, None),
        e(props::SOURCE_ESSENCE_CONTAINER, "SourceEssenceContainer", Property, None),
        e(props::CIPHER_ALGORITHM, "CipherAlgorithm", Property, None),
        e(props::MIC_ALGORITHM, "MICAlgorithm", Property, None),
        e(props::CRYPTOGRAPHIC_KEY_ID, "CryptographicKeyID", Property, None),
        e(props::LINKED_TRACK_ID, "LinkedTrackID", Property, Some(0x3006)),
        e(props::SAMPLE_RATE, "SampleRate", Property, Some(0x3001)),
        e(props::CONTAINER_DURATION, "ContainerDuration", Property, Some(0x3002)),
        e(props::ESSENCE_CONTAINER, "EssenceContainer", Property, Some(0x3004)),
        e(props::SUB_DESCRIPTORS, "SubDescriptors", Property, None),
        e(props::PICTURE_COMPRESSION, "PictureEssenceCoding", Property, Some(0x3201)),
        e(props::STORED_HEIGHT, "StoredHeight", Property, Some(0x3202)),
        e(props::STORED_WIDTH, "StoredWidth", Property, Some(0x3203)),
        e(props::FRAME_LAYOUT, "FrameLayout", Property, Some(0x320C)),
        e(props::ASPECT_RATIO, "AspectRatio", Property, Some(0x320E)),
        e(props::COMPONENT_DEPTH, "ComponentDepth", Property, Some(0x3301)),
        e(props::HORIZONTAL_SUBSAMPLING, "HorizontalSubsampling", Property, Some(0x3302)),
        e(props::AUDIO_SAMPLING_RATE, "AudioSamplingRate", Property, Some(0x3D03)),
        e(props::CHANNEL_COUNT, "ChannelCount", Property, Some(0x3D07)),
        e(props::QUANTIZATION_BITS, "QuantizationBits", Property, Some(0x3D01)),
        e(props::MGA_SOUNDFIELD_GROUP_LINK_ID, "MGASoundfieldGroupLinkID", Property, None),
        e(props::MCA_LABEL_DICTIONARY_ID, "MCALabelDictionaryID", Property, None),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_dotted_hex() {
        assert_eq!(
            labels::PRIMER_PACK.to_string(),
            "060e2b34.0205.0101.0d010201.01050100"
        );
    }

    #[test]
    fn partition_and_primer_are_distinguished() {
        let mut header = labels::PARTITION_PACK_BASE;
        header.0[13] = 0x02;
        header.0[14] = 0x04;
        assert!(header.is_partition_pack());
        assert!(!labels::PRIMER_PACK.is_partition_pack());
        assert!(labels::PRIMER_PACK.is_primer_pack());
    }

    #[test]
    fn fill_matches_both_versions() {
        assert!(labels::FILL_ITEM.is_fill());
        assert!(labels::FILL_ITEM_V1.is_fill());
        assert!(!labels::PREFACE.is_fill());
    }

    #[test]
    fn registry_resolves_static_tags() {
        assert_eq!(static_tag(&props::INSTANCE_UID), Some(0x3C0A));
        assert_eq!(label_for_static_tag(0x4801), Some(props::TRACK_ID));
        assert_eq!(static_tag(&props::CONTEXT_ID), None);
        assert_eq!(labels::PREFACE.name(), Some("Preface"));
    }

    #[test]
    fn static_tags_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for e in registry_entries() {
            if let Some(tag) = e.tag {
                assert!(seen.insert(tag), "duplicate tag {tag:04x} for {}", e.name);
            }
        }
    }
}
