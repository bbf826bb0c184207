//! Header metadata: the object graph of sets stored in the header partition.
//!
//! Sets live in an arena (`Vec<MetadataSet>`) indexed by instance UUID.
//! Parsing is two-pass: every set is decoded in stream order first, then all
//! strong, weak and package references are resolved against the arena, so
//! forward references are legal.
//!
//! Serialized form: the primer pack triplet followed by one triplet per set,
//! each a local set starting with its InstanceUID item.

pub mod primer;
pub mod sets;

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::essence::EssenceAdapter;
use crate::info::WriterInfo;
use crate::klv::{self, KlvIter, LocalItems};
use crate::label::{labels, props, Label};

pub use primer::Primer;
pub use sets::{
    ContentStorage, CryptographicContext, CryptographicFramework, Descriptor, DmSegment,
    EssenceContainerData, Identification, MetadataSet, OpaqueSet, Package, Preface, Properties,
    Rational, Reference, Sequence, SetBody, SourceClip, TimecodeComponent, Timestamp, Track, Umid,
};

/// Set kinds a track file header must contain.
const REQUIRED: [(&str, fn(&MetadataSet) -> bool); 5] = [
    ("Preface", |s| matches!(s, MetadataSet::Preface(_))),
    ("ContentStorage", |s| matches!(s, MetadataSet::ContentStorage(_))),
    ("MaterialPackage", |s| matches!(s, MetadataSet::MaterialPackage(_))),
    ("SourcePackage", |s| matches!(s, MetadataSet::SourcePackage(_))),
    ("Track", |s| matches!(s, MetadataSet::Track(_))),
];

pub const ESSENCE_TRACK_ID: u32 = 2;
pub const TIMECODE_TRACK_ID: u32 = 1;
pub const DM_TRACK_ID: u32 = 3;
/// SIDs of the single essence container and its index.
pub const BODY_SID: u32 = 1;
pub const INDEX_SID: u32 = 129;

#[derive(Debug, Clone)]
pub struct HeaderMetadata {
    sets: Vec<MetadataSet>,
    by_id: HashMap<Uuid, usize>,
}

impl HeaderMetadata {
    /// Build a validated graph from a list of sets.
    pub fn from_sets(sets: Vec<MetadataSet>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(sets.len());
        for (i, set) in sets.iter().enumerate() {
            if by_id.insert(set.instance(), i).is_some() {
                return Err(Error::format(format!(
                    "instance UUID {} defined twice",
                    set.instance()
                )));
            }
        }
        let mut md = Self { sets, by_id };
        md.promote_sub_descriptors();
        md.resolve()?;
        Ok(md)
    }

    /// Opaque sets owned by a descriptor are its sub-descriptors.
    fn promote_sub_descriptors(&mut self) {
        let owned: Vec<usize> = self
            .sets
            .iter()
            .filter_map(|s| match s {
                MetadataSet::Descriptor(d) => Some(d.sub_descriptors.clone()),
                _ => None,
            })
            .flatten()
            .filter_map(|id| self.by_id.get(&id).copied())
            .collect();
        for i in owned {
            if let MetadataSet::Unknown(opaque) = &self.sets[i] {
                self.sets[i] = MetadataSet::SubDescriptor(opaque.clone());
            }
        }
    }

    fn resolve(&self) -> Result<()> {
        let packages: HashSet<Umid> = self
            .sets
            .iter()
            .filter_map(|s| match s {
                MetadataSet::MaterialPackage(p) | MetadataSet::SourcePackage(p) => Some(p.uid),
                _ => None,
            })
            .collect();

        let mut owner: HashMap<Uuid, Uuid> = HashMap::new();
        for set in &self.sets {
            set.validate()?;
            for r in set.references() {
                match r {
                    Reference::Strong(target) => {
                        self.require(set, &target)?;
                        if let Some(prev) = owner.insert(target, set.instance()) {
                            return Err(Error::format(format!(
                                "set {target} is strongly owned by both {prev} and {}",
                                set.instance()
                            )));
                        }
                    }
                    Reference::Weak(target) => self.require(set, &target)?,
                    Reference::Package(umid) => {
                        if !umid.is_zero() && !packages.contains(&umid) {
                            return Err(Error::format(format!(
                                "{} references undefined package {umid:?}",
                                set.kind_name()
                            )));
                        }
                    }
                }
            }
        }

        for (name, is_kind) in REQUIRED {
            if !self.sets.iter().any(is_kind) {
                return Err(Error::format(format!("required set {name} is missing")));
            }
        }
        let prefaces = self.sets.iter().filter(|s| matches!(s, MetadataSet::Preface(_))).count();
        if prefaces != 1 {
            return Err(Error::format(format!("header holds {prefaces} Preface sets")));
        }
        Ok(())
    }

    fn require(&self, from: &MetadataSet, target: &Uuid) -> Result<()> {
        if self.by_id.contains_key(target) {
            Ok(())
        } else {
            Err(Error::format(format!(
                "{} {} references undefined set {target}",
                from.kind_name(),
                from.instance()
            )))
        }
    }

    // ── Lookup ──────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataSet> {
        self.sets.iter()
    }

    pub fn get(&self, id: &Uuid) -> Option<&MetadataSet> {
        self.by_id.get(id).map(|&i| &self.sets[i])
    }

    /// Every set whose label is `label`.
    pub fn sets_of(&self, label: &Label) -> Vec<&MetadataSet> {
        self.sets.iter().filter(|s| s.set_label() == *label).collect()
    }

    pub fn preface(&self) -> Option<&Preface> {
        self.sets.iter().find_map(|s| match s {
            MetadataSet::Preface(p) => Some(p),
            _ => None,
        })
    }

    pub fn identification(&self) -> Option<&Identification> {
        self.sets.iter().find_map(|s| match s {
            MetadataSet::Identification(i) => Some(i),
            _ => None,
        })
    }

    pub fn content_storage(&self) -> Option<&ContentStorage> {
        self.sets.iter().find_map(|s| match s {
            MetadataSet::ContentStorage(c) => Some(c),
            _ => None,
        })
    }

    pub fn essence_container_data(&self) -> Option<&EssenceContainerData> {
        self.sets.iter().find_map(|s| match s {
            MetadataSet::EssenceContainerData(e) => Some(e),
            _ => None,
        })
    }

    /// Essence container data linked to the file package. Its BodySID and
    /// IndexSID name the streams holding the track's essence and index.
    pub fn file_essence_data(&self) -> Option<&EssenceContainerData> {
        let uid = self.source_package()?.uid;
        self.sets.iter().find_map(|s| match s {
            MetadataSet::EssenceContainerData(e) if e.linked_package == uid => Some(e),
            _ => None,
        })
    }

    pub fn material_package(&self) -> Option<&Package> {
        self.sets.iter().find_map(|s| match s {
            MetadataSet::MaterialPackage(p) => Some(p),
            _ => None,
        })
    }

    /// The file package, i.e. the source package with a descriptor.
    pub fn source_package(&self) -> Option<&Package> {
        let mut fallback = None;
        for s in &self.sets {
            if let MetadataSet::SourcePackage(p) = s {
                if p.descriptor.is_some() {
                    return Some(p);
                }
                fallback.get_or_insert(p);
            }
        }
        fallback
    }

    pub fn tracks(&self) -> Vec<&Track> {
        self.sets
            .iter()
            .filter_map(|s| match s {
                MetadataSet::Track(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Tracks of `package`, in package order.
    pub fn package_tracks(&self, package: &Package) -> Vec<&Track> {
        package
            .tracks
            .iter()
            .filter_map(|id| match self.get(id) {
                Some(MetadataSet::Track(t)) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        let id = self.source_package()?.descriptor?;
        match self.get(&id)? {
            MetadataSet::Descriptor(d) => Some(d),
            _ => None,
        }
    }

    pub fn sub_descriptors(&self) -> Vec<&OpaqueSet> {
        let Some(d) = self.descriptor() else {
            return Vec::new();
        };
        d.sub_descriptors
            .iter()
            .filter_map(|id| match self.get(id) {
                Some(MetadataSet::SubDescriptor(s)) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn cryptographic_context(&self) -> Option<&CryptographicContext> {
        self.sets.iter().find_map(|s| match s {
            MetadataSet::CryptographicContext(c) => Some(c),
            _ => None,
        })
    }

    // ── Mutation ────────────────────────────────────────────────────────────

    /// Rewrite every duration field to `frames`. All of them are fixed-width,
    /// so the serialized size does not change.
    pub fn set_durations(&mut self, frames: i64) {
        for set in &mut self.sets {
            match set {
                MetadataSet::Sequence(s) => {
                    if s.duration.is_some() {
                        s.duration = Some(frames);
                    }
                }
                MetadataSet::SourceClip(c) => c.duration = frames,
                MetadataSet::TimecodeComponent(t) => t.duration = frames,
                MetadataSet::Descriptor(d) => d.container_duration = frames,
                _ => {}
            }
        }
    }

    /// Duration recorded on the essence track of the material package.
    pub fn duration(&self) -> Option<i64> {
        let mp = self.material_package()?;
        let track = self
            .package_tracks(mp)
            .into_iter()
            .find(|t| t.track_id == ESSENCE_TRACK_ID)?;
        match self.get(&track.sequence)? {
            MetadataSet::Sequence(s) => s.duration,
            _ => None,
        }
    }

    // ── Serialization ───────────────────────────────────────────────────────

    /// Primer pack triplet followed by one triplet per set.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut primer = Primer::new();
        let mut bodies = Vec::with_capacity(self.sets.len());
        for set in &self.sets {
            let mut body = Vec::new();
            klv::put_local(&mut body, primer.tag_for(&props::INSTANCE_UID)?, set.instance().as_bytes())?;
            for (label, value) in set.properties() {
                let tag = primer.tag_for(&label)?;
                klv::put_local(&mut body, tag, &value)?;
            }
            bodies.push((set.set_label(), body));
        }

        let mut out = klv::encode(&labels::PRIMER_PACK, &primer.encode());
        for (label, body) in bodies {
            out.extend(klv::encode(&label, &body));
        }
        Ok(out)
    }

    /// Parse a header metadata region: primer pack, then sets. Fill items are
    /// skipped.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut items = KlvIter::new(bytes);
        let primer = match items.next() {
            Some(item) => {
                let (header, value) = item?;
                if !header.label.is_primer_pack() {
                    return Err(Error::format(format!(
                        "metadata set {} precedes the primer pack",
                        header.label
                    )));
                }
                Primer::decode(value)?
            }
            None => return Err(Error::format("header metadata is empty")),
        };

        let mut sets = Vec::new();
        for item in items {
            let (header, value) = item?;
            if header.label.is_primer_pack() {
                return Err(Error::format("second primer pack in header metadata"));
            }
            sets.push(decode_set(&primer, header.label, value)?);
        }
        debug!(sets = sets.len(), primer = primer.len(), "parsed header metadata");
        Self::from_sets(sets)
    }
}

fn decode_set(primer: &Primer, set_label: Label, value: &[u8]) -> Result<MetadataSet> {
    let mut items = Vec::new();
    let mut instance = None;
    for item in LocalItems::new(value) {
        let (tag, bytes) = item?;
        let label = primer
            .label_for(tag)
            .ok_or_else(|| Error::format(format!("local tag {tag:04x} not in primer")))?;
        if label == props::INSTANCE_UID {
            instance = Some(sets::value::get_uuid(bytes, "InstanceUID")?);
        }
        items.push((label, bytes));
    }
    let instance = instance.ok_or_else(|| Error::format(format!("set {set_label} has no InstanceUID")))?;
    let name = set_label.name().unwrap_or("set");
    MetadataSet::decode(set_label, instance, &Properties::new(name, items))
}

// ── Construction for a new track file ───────────────────────────────────────

/// Inputs needed to lay out the header of a new track file.
pub struct TrackFilePlan<'a> {
    pub info: &'a WriterInfo,
    pub adapter: &'a dyn EssenceAdapter,
    pub edit_rate: Rational,
    pub operational_pattern: Label,
    /// Cipher and MIC algorithm labels; `None` for clear essence.
    pub crypto: Option<(Label, Option<Label>)>,
}

struct TrackBuild {
    sets: Vec<MetadataSet>,
    now: Timestamp,
}

impl TrackBuild {
    fn push(&mut self, set: MetadataSet) -> Uuid {
        let id = set.instance();
        self.sets.push(set);
        id
    }

    /// Timecode track plus essence track for a package; returns track ids.
    fn package_tracks(
        &mut self,
        plan: &TrackFilePlan,
        essence_track_number: u32,
        clip_source: Umid,
        clip_track: u32,
    ) -> Vec<Uuid> {
        let tc = self.push(MetadataSet::TimecodeComponent(TimecodeComponent {
            instance: Uuid::new_v4(),
            data_definition: labels::TIMECODE_DATA_DEF,
            duration: 0,
            rounded_base: plan.edit_rate.rounded(),
            start: 0,
            drop_frame: false,
        }));
        let tc_seq = self.push(MetadataSet::Sequence(Sequence {
            instance: Uuid::new_v4(),
            data_definition: labels::TIMECODE_DATA_DEF,
            duration: Some(0),
            components: vec![tc],
        }));
        let tc_track = self.push(MetadataSet::Track(Track {
            instance: Uuid::new_v4(),
            is_static: false,
            track_id: TIMECODE_TRACK_ID,
            track_number: 0,
            name: Some("Timecode".into()),
            sequence: tc_seq,
            edit_rate: plan.edit_rate,
            origin: 0,
        }));

        let clip = self.push(MetadataSet::SourceClip(SourceClip {
            instance: Uuid::new_v4(),
            data_definition: plan.adapter.data_definition(),
            duration: 0,
            start_position: 0,
            source_package: clip_source,
            source_track_id: clip_track,
        }));
        let seq = self.push(MetadataSet::Sequence(Sequence {
            instance: Uuid::new_v4(),
            data_definition: plan.adapter.data_definition(),
            duration: Some(0),
            components: vec![clip],
        }));
        let track = self.push(MetadataSet::Track(Track {
            instance: Uuid::new_v4(),
            is_static: false,
            track_id: ESSENCE_TRACK_ID,
            track_number: essence_track_number,
            name: Some(plan.adapter.name().into()),
            sequence: seq,
            edit_rate: plan.edit_rate,
            origin: 0,
        }));
        vec![tc_track, track]
    }

    fn package(&self, uid: Umid, tracks: Vec<Uuid>, descriptor: Option<Uuid>) -> Package {
        Package {
            instance: Uuid::new_v4(),
            uid,
            name: None,
            created: self.now,
            modified: self.now,
            tracks,
            descriptor,
        }
    }
}

impl HeaderMetadata {
    /// Lay out the complete header graph for a new single-track file.
    pub fn for_track_file(plan: &TrackFilePlan) -> Result<Self> {
        let mut b = TrackBuild { sets: Vec::new(), now: Timestamp::now() };
        let adapter = plan.adapter;
        let source_uid = Umid::from_uuid(&plan.info.asset_uuid);
        let material_uid = Umid::from_uuid(&Uuid::new_v4());
        let container = match plan.crypto {
            Some(_) => labels::ENCRYPTED_ESSENCE_CONTAINER,
            None => adapter.essence_container(),
        };

        let preface_id = Uuid::new_v4();
        let ident_id = Uuid::new_v4();
        let storage_id = Uuid::new_v4();
        let ecd_id = Uuid::new_v4();

        // Preface is emitted first; its fields are filled once ids exist.
        b.sets.push(MetadataSet::Identification(Identification {
            instance: ident_id,
            this_generation: Uuid::new_v4(),
            company_name: plan.info.company_name.clone(),
            product_name: plan.info.product_name.clone(),
            version_string: plan.info.product_version.clone(),
            product_uid: plan.info.product_uuid,
            modification_date: b.now,
        }));
        b.sets.push(MetadataSet::EssenceContainerData(EssenceContainerData {
            instance: ecd_id,
            linked_package: source_uid,
            index_sid: INDEX_SID,
            body_sid: BODY_SID,
        }));

        let mp_tracks = b.package_tracks(plan, 0, source_uid, ESSENCE_TRACK_ID);
        let mp = b.package(material_uid, mp_tracks, None);
        let mp_id = mp.instance;
        b.sets.push(MetadataSet::MaterialPackage(mp));

        let mut sub_ids = Vec::new();
        for sub in adapter.sub_descriptors() {
            sub_ids.push(b.push(MetadataSet::SubDescriptor(OpaqueSet {
                instance: Uuid::new_v4(),
                set_label: sub.set_label,
                properties: sub.properties,
            })));
        }
        let descriptor_id = b.push(MetadataSet::Descriptor(Descriptor {
            instance: Uuid::new_v4(),
            set_label: adapter.descriptor_label(),
            linked_track_id: ESSENCE_TRACK_ID,
            sample_rate: plan.edit_rate,
            container_duration: 0,
            essence_container: container,
            sub_descriptors: sub_ids,
            extra: adapter.descriptor_properties(plan.edit_rate),
        }));

        let mut sp_tracks = b.package_tracks(plan, adapter.track_number(), Umid::default(), 0);
        let mut dm_schemes = Vec::new();
        if let Some((cipher, mic)) = plan.crypto {
            let ctx = b.push(MetadataSet::CryptographicContext(CryptographicContext {
                instance: Uuid::new_v4(),
                context_id: plan.info.context_id,
                source_essence_container: adapter.essence_container(),
                cipher_algorithm: cipher,
                mic_algorithm: mic.unwrap_or_default(),
                key_id: plan.info.cryptographic_key_id,
            }));
            let framework = b.push(MetadataSet::CryptographicFramework(CryptographicFramework {
                instance: Uuid::new_v4(),
                context: ctx,
            }));
            let segment = b.push(MetadataSet::DmSegment(DmSegment {
                instance: Uuid::new_v4(),
                data_definition: labels::DESCRIPTIVE_DATA_DEF,
                duration: None,
                framework,
            }));
            let seq = b.push(MetadataSet::Sequence(Sequence {
                instance: Uuid::new_v4(),
                data_definition: labels::DESCRIPTIVE_DATA_DEF,
                duration: None,
                components: vec![segment],
            }));
            sp_tracks.push(b.push(MetadataSet::Track(Track {
                instance: Uuid::new_v4(),
                is_static: true,
                track_id: DM_TRACK_ID,
                track_number: 0,
                name: Some("Cryptographic DM".into()),
                sequence: seq,
                edit_rate: Rational::new(0, 0),
                origin: 0,
            })));
            dm_schemes.push(labels::CRYPTOGRAPHIC_DM_SCHEME);
        }
        let sp = b.package(source_uid, sp_tracks, Some(descriptor_id));
        let sp_id = sp.instance;
        b.sets.push(MetadataSet::SourcePackage(sp));

        b.sets.push(MetadataSet::ContentStorage(ContentStorage {
            instance: storage_id,
            packages: vec![mp_id, sp_id],
            essence_container_data: vec![ecd_id],
        }));
        b.sets.insert(
            0,
            MetadataSet::Preface(Preface {
                instance: preface_id,
                last_modified: b.now,
                version: 0x0103,
                content_storage: storage_id,
                operational_pattern: plan.operational_pattern,
                essence_containers: vec![container],
                dm_schemes,
                identifications: vec![ident_id],
                primary_package: Some(mp_id),
            }),
        );
        Self::from_sets(b.sets)
    }
}
