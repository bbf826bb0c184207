//! Metadata set variants and their property encodings.
//!
//! Every set kind is a plain struct implementing [`SetBody`]; the closed
//! [`MetadataSet`] enum is what the graph arena stores. References between
//! sets are plain UUIDs (or UMIDs for package links) and are resolved by the
//! arena after the whole header has been decoded.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::label::{labels, props, Label};

// ── Value types ──────────────────────────────────────────────────────────────

/// Edit rate / sample rate as numerator over denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Integer frames-per-second, rounded up (timecode base).
    pub fn rounded(&self) -> u16 {
        if self.den <= 0 || self.num <= 0 {
            return 0;
        }
        ((self.num + self.den - 1) / self.den) as u16
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s.trim(), "1"),
        };
        let num = num.parse::<i32>().map_err(|e| format!("bad numerator in {s:?}: {e}"))?;
        let den = den.parse::<i32>().map_err(|e| format!("bad denominator in {s:?}: {e}"))?;
        if num <= 0 || den <= 0 {
            return Err(format!("rate {s:?} must be positive"));
        }
        Ok(Self { num, den })
    }
}

/// 32-byte basic UMID identifying a package.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Umid(pub [u8; 32]);

const UMID_PREFIX: [u8; 12] = [0x06, 0x0A, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x01, 0x01, 0x0F, 0x20];

impl Umid {
    /// UMID whose material number is `material`.
    pub fn from_uuid(material: &Uuid) -> Self {
        let mut b = [0u8; 32];
        b[..12].copy_from_slice(&UMID_PREFIX);
        b[12] = 0x13;
        b[16..].copy_from_slice(material.as_bytes());
        Umid(b)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn material(&self) -> Uuid {
        let mut m = [0u8; 16];
        m.copy_from_slice(&self.0[16..]);
        Uuid::from_bytes(m)
    }
}

impl fmt::Debug for Umid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Umid({})", hex::encode(self.0))
    }
}

/// MXF timestamp: date, time and milliseconds / 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub quarter_ms: u8,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    fn to_bytes(self) -> [u8; 8] {
        let y = self.year.to_be_bytes();
        [y[0], y[1], self.month, self.day, self.hour, self.minute, self.second, self.quarter_ms]
    }

    fn from_bytes(b: &[u8]) -> Result<Self> {
        if b.len() != 8 {
            return Err(Error::format(format!("timestamp is {} bytes", b.len())));
        }
        Ok(Self {
            year: u16::from_be_bytes([b[0], b[1]]),
            month: b[2],
            day: b[3],
            hour: b[4],
            minute: b[5],
            second: b[6],
            quarter_ms: b[7],
        })
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(t: DateTime<Utc>) -> Self {
        Self {
            year: t.year().clamp(0, u16::MAX as i32) as u16,
            month: t.month() as u8,
            day: t.day() as u8,
            hour: t.hour() as u8,
            minute: t.minute() as u8,
            second: t.second() as u8,
            quarter_ms: (t.timestamp_subsec_millis().min(999) / 4) as u8,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.quarter_ms as u32 * 4
        )
    }
}

// ── Property value codecs ────────────────────────────────────────────────────

pub(crate) mod value {
    use super::*;

    pub fn uuid(u: &Uuid) -> Vec<u8> {
        u.as_bytes().to_vec()
    }

    pub fn label(l: &Label) -> Vec<u8> {
        l.0.to_vec()
    }

    pub fn u16(v: u16) -> Vec<u8> {
        v.to_be_bytes().to_vec()
    }

    pub fn u32(v: u32) -> Vec<u8> {
        v.to_be_bytes().to_vec()
    }

    pub fn i64(v: i64) -> Vec<u8> {
        v.to_be_bytes().to_vec()
    }

    pub fn bool(v: bool) -> Vec<u8> {
        vec![v as u8]
    }

    pub fn rational(r: Rational) -> Vec<u8> {
        let mut out = r.num.to_be_bytes().to_vec();
        out.extend_from_slice(&r.den.to_be_bytes());
        out
    }

    /// UTF-16BE without terminator.
    pub fn string(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|c| c.to_be_bytes()).collect()
    }

    pub fn timestamp(t: Timestamp) -> Vec<u8> {
        t.to_bytes().to_vec()
    }

    pub fn umid(u: &Umid) -> Vec<u8> {
        u.0.to_vec()
    }

    /// Batch: u32 count, u32 item size, items.
    pub fn batch<'a>(item_size: u32, items: impl ExactSizeIterator<Item = &'a [u8]>) -> Vec<u8> {
        let mut out = (items.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&item_size.to_be_bytes());
        for item in items {
            out.extend_from_slice(item);
        }
        out
    }

    pub fn uuid_batch(ids: &[Uuid]) -> Vec<u8> {
        batch(16, ids.iter().map(|u| &u.as_bytes()[..]))
    }

    pub fn label_batch(ls: &[Label]) -> Vec<u8> {
        batch(16, ls.iter().map(|l| &l.0[..]))
    }

    fn fixed<const N: usize>(b: &[u8], what: &str) -> Result<[u8; N]> {
        b.try_into()
            .map_err(|_| Error::format(format!("{what}: expected {N} bytes, found {}", b.len())))
    }

    pub fn get_uuid(b: &[u8], what: &str) -> Result<Uuid> {
        Ok(Uuid::from_bytes(fixed::<16>(b, what)?))
    }

    pub fn get_label(b: &[u8], what: &str) -> Result<Label> {
        Ok(Label(fixed::<16>(b, what)?))
    }

    pub fn get_umid(b: &[u8], what: &str) -> Result<Umid> {
        Ok(Umid(fixed::<32>(b, what)?))
    }

    pub fn get_u16(b: &[u8], what: &str) -> Result<u16> {
        Ok(u16::from_be_bytes(fixed::<2>(b, what)?))
    }

    pub fn get_u32(b: &[u8], what: &str) -> Result<u32> {
        Ok(u32::from_be_bytes(fixed::<4>(b, what)?))
    }

    pub fn get_i64(b: &[u8], what: &str) -> Result<i64> {
        Ok(i64::from_be_bytes(fixed::<8>(b, what)?))
    }

    pub fn get_bool(b: &[u8], what: &str) -> Result<bool> {
        Ok(fixed::<1>(b, what)?[0] != 0)
    }

    pub fn get_rational(b: &[u8], what: &str) -> Result<Rational> {
        let raw = fixed::<8>(b, what)?;
        Ok(Rational {
            num: i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            den: i32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
    }

    pub fn get_string(b: &[u8], what: &str) -> Result<String> {
        if b.len() % 2 != 0 {
            return Err(Error::format(format!("{what}: odd-length UTF-16 string")));
        }
        let units: Vec<u16> = b.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
        let s = String::from_utf16(&units).map_err(|_| Error::format(format!("{what}: invalid UTF-16")))?;
        Ok(s.trim_end_matches('\0').to_string())
    }

    pub fn get_timestamp(b: &[u8], _what: &str) -> Result<Timestamp> {
        Timestamp::from_bytes(b)
    }

    pub fn get_batch<'a>(b: &'a [u8], item_size: usize, what: &str) -> Result<Vec<&'a [u8]>> {
        if b.len() < 8 {
            return Err(Error::format(format!("{what}: truncated batch header")));
        }
        let count = u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize;
        let size = u32::from_be_bytes([b[4], b[5], b[6], b[7]]) as usize;
        if size != item_size {
            return Err(Error::format(format!("{what}: item size {size}, expected {item_size}")));
        }
        if b.len() - 8 != count * size {
            return Err(Error::format(format!("{what}: {count} items do not fill {} bytes", b.len() - 8)));
        }
        Ok(b[8..].chunks_exact(size).collect())
    }

    pub fn get_uuid_batch(b: &[u8], what: &str) -> Result<Vec<Uuid>> {
        get_batch(b, 16, what)?.into_iter().map(|i| get_uuid(i, what)).collect()
    }

    pub fn get_label_batch(b: &[u8], what: &str) -> Result<Vec<Label>> {
        get_batch(b, 16, what)?.into_iter().map(|i| get_label(i, what)).collect()
    }
}

/// Decoded properties of one set, in stream order.
pub struct Properties<'a> {
    set_name: &'static str,
    items: Vec<(Label, &'a [u8])>,
}

impl<'a> Properties<'a> {
    pub fn new(set_name: &'static str, items: Vec<(Label, &'a [u8])>) -> Self {
        Self { set_name, items }
    }

    pub fn get(&self, label: &Label) -> Option<&'a [u8]> {
        self.items.iter().find(|(l, _)| l == label).map(|(_, v)| *v)
    }

    pub fn required(&self, label: &Label) -> Result<&'a [u8]> {
        self.get(label).ok_or_else(|| {
            Error::format(format!(
                "{} is missing {}",
                self.set_name,
                label.name().unwrap_or("a required property")
            ))
        })
    }

    pub fn has(&self, label: &Label) -> bool {
        self.get(label).is_some()
    }

    /// Owned copies of every property not in `known`.
    pub fn rest(&self, known: &[Label]) -> Vec<(Label, Vec<u8>)> {
        self.items
            .iter()
            .filter(|(l, _)| *l != props::INSTANCE_UID && !known.contains(l))
            .map(|(l, v)| (*l, v.to_vec()))
            .collect()
    }
}

// ── Capability trait ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// Owning link; a target may have only one owner.
    Strong(Uuid),
    /// Non-owning link by instance UUID.
    Weak(Uuid),
    /// Link to a package by its UMID. A zero UMID means "no source".
    Package(Umid),
}

pub trait SetBody {
    fn set_label(&self) -> Label;
    fn instance(&self) -> Uuid;
    /// Property values in emission order. InstanceUID is emitted separately.
    fn properties(&self) -> Vec<(Label, Vec<u8>)>;
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

fn strong(ids: &[Uuid]) -> impl Iterator<Item = Reference> + '_ {
    ids.iter().copied().map(Reference::Strong)
}

// ── Set kinds ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Preface {
    pub instance: Uuid,
    pub last_modified: Timestamp,
    pub version: u16,
    pub content_storage: Uuid,
    pub operational_pattern: Label,
    pub essence_containers: Vec<Label>,
    pub dm_schemes: Vec<Label>,
    pub identifications: Vec<Uuid>,
    pub primary_package: Option<Uuid>,
}

impl SetBody for Preface {
    fn set_label(&self) -> Label {
        labels::PREFACE
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        let mut out = vec![
            (props::LAST_MODIFIED_DATE, value::timestamp(self.last_modified)),
            (props::VERSION, value::u16(self.version)),
            (props::CONTENT_STORAGE_REF, value::uuid(&self.content_storage)),
            (props::OPERATIONAL_PATTERN, value::label(&self.operational_pattern)),
            (props::ESSENCE_CONTAINERS, value::label_batch(&self.essence_containers)),
            (props::DM_SCHEMES, value::label_batch(&self.dm_schemes)),
            (props::IDENTIFICATIONS, value::uuid_batch(&self.identifications)),
        ];
        if let Some(p) = &self.primary_package {
            out.push((props::PRIMARY_PACKAGE, value::uuid(p)));
        }
        out
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs: Vec<_> = strong(&self.identifications).collect();
        refs.push(Reference::Strong(self.content_storage));
        refs.extend(self.primary_package.map(Reference::Weak));
        refs
    }
}

impl Preface {
    fn decode(instance: Uuid, p: &Properties) -> Result<Self> {
        Ok(Self {
            instance,
            last_modified: match p.get(&props::LAST_MODIFIED_DATE) {
                Some(b) => value::get_timestamp(b, "LastModifiedDate")?,
                None => Timestamp::default(),
            },
            version: match p.get(&props::VERSION) {
                Some(b) => value::get_u16(b, "Version")?,
                None => 0,
            },
            content_storage: value::get_uuid(p.required(&props::CONTENT_STORAGE_REF)?, "ContentStorage")?,
            operational_pattern: value::get_label(p.required(&props::OPERATIONAL_PATTERN)?, "OperationalPattern")?,
            essence_containers: value::get_label_batch(p.required(&props::ESSENCE_CONTAINERS)?, "EssenceContainers")?,
            dm_schemes: match p.get(&props::DM_SCHEMES) {
                Some(b) => value::get_label_batch(b, "DMSchemes")?,
                None => Vec::new(),
            },
            identifications: match p.get(&props::IDENTIFICATIONS) {
                Some(b) => value::get_uuid_batch(b, "Identifications")?,
                None => Vec::new(),
            },
            primary_package: p
                .get(&props::PRIMARY_PACKAGE)
                .map(|b| value::get_uuid(b, "PrimaryPackage"))
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub instance: Uuid,
    pub this_generation: Uuid,
    pub company_name: String,
    pub product_name: String,
    pub version_string: String,
    pub product_uid: Uuid,
    pub modification_date: Timestamp,
}

impl SetBody for Identification {
    fn set_label(&self) -> Label {
        labels::IDENTIFICATION
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        vec![
            (props::THIS_GENERATION_UID, value::uuid(&self.this_generation)),
            (props::COMPANY_NAME, value::string(&self.company_name)),
            (props::PRODUCT_NAME, value::string(&self.product_name)),
            (props::VERSION_STRING, value::string(&self.version_string)),
            (props::PRODUCT_UID, value::uuid(&self.product_uid)),
            (props::MODIFICATION_DATE, value::timestamp(self.modification_date)),
        ]
    }
}

impl Identification {
    fn decode(instance: Uuid, p: &Properties) -> Result<Self> {
        let string = |l: &Label, what: &str| -> Result<String> {
            p.get(l).map(|b| value::get_string(b, what)).transpose().map(Option::unwrap_or_default)
        };
        Ok(Self {
            instance,
            this_generation: match p.get(&props::THIS_GENERATION_UID) {
                Some(b) => value::get_uuid(b, "ThisGenerationUID")?,
                None => Uuid::nil(),
            },
            company_name: string(&props::COMPANY_NAME, "CompanyName")?,
            product_name: string(&props::PRODUCT_NAME, "ProductName")?,
            version_string: string(&props::VERSION_STRING, "VersionString")?,
            product_uid: value::get_uuid(p.required(&props::PRODUCT_UID)?, "ProductUID")?,
            modification_date: match p.get(&props::MODIFICATION_DATE) {
                Some(b) => value::get_timestamp(b, "ModificationDate")?,
                None => Timestamp::default(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentStorage {
    pub instance: Uuid,
    pub packages: Vec<Uuid>,
    pub essence_container_data: Vec<Uuid>,
}

impl SetBody for ContentStorage {
    fn set_label(&self) -> Label {
        labels::CONTENT_STORAGE
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        vec![
            (props::PACKAGES, value::uuid_batch(&self.packages)),
            (props::ESSENCE_CONTAINER_DATA_REFS, value::uuid_batch(&self.essence_container_data)),
        ]
    }

    fn references(&self) -> Vec<Reference> {
        strong(&self.packages).chain(strong(&self.essence_container_data)).collect()
    }
}

impl ContentStorage {
    fn decode(instance: Uuid, p: &Properties) -> Result<Self> {
        Ok(Self {
            instance,
            packages: value::get_uuid_batch(p.required(&props::PACKAGES)?, "Packages")?,
            essence_container_data: match p.get(&props::ESSENCE_CONTAINER_DATA_REFS) {
                Some(b) => value::get_uuid_batch(b, "EssenceContainerData")?,
                None => Vec::new(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EssenceContainerData {
    pub instance: Uuid,
    pub linked_package: Umid,
    pub index_sid: u32,
    pub body_sid: u32,
}

impl SetBody for EssenceContainerData {
    fn set_label(&self) -> Label {
        labels::ESSENCE_CONTAINER_DATA
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        vec![
            (props::LINKED_PACKAGE_UID, value::umid(&self.linked_package)),
            (props::INDEX_SID, value::u32(self.index_sid)),
            (props::BODY_SID, value::u32(self.body_sid)),
        ]
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::Package(self.linked_package)]
    }
}

impl EssenceContainerData {
    fn decode(instance: Uuid, p: &Properties) -> Result<Self> {
        Ok(Self {
            instance,
            linked_package: value::get_umid(p.required(&props::LINKED_PACKAGE_UID)?, "LinkedPackageUID")?,
            index_sid: match p.get(&props::INDEX_SID) {
                Some(b) => value::get_u32(b, "IndexSID")?,
                None => 0,
            },
            body_sid: value::get_u32(p.required(&props::BODY_SID)?, "BodySID")?,
        })
    }
}

/// Shared body of material and source packages.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub instance: Uuid,
    pub uid: Umid,
    pub name: Option<String>,
    pub created: Timestamp,
    pub modified: Timestamp,
    pub tracks: Vec<Uuid>,
    /// File descriptor; source packages only.
    pub descriptor: Option<Uuid>,
}

impl Package {
    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        let mut out = vec![(props::PACKAGE_UID, value::umid(&self.uid))];
        if let Some(name) = &self.name {
            out.push((props::PACKAGE_NAME, value::string(name)));
        }
        out.push((props::PACKAGE_CREATION_DATE, value::timestamp(self.created)));
        out.push((props::PACKAGE_MODIFIED_DATE, value::timestamp(self.modified)));
        out.push((props::TRACKS, value::uuid_batch(&self.tracks)));
        if let Some(d) = &self.descriptor {
            out.push((props::DESCRIPTOR, value::uuid(d)));
        }
        out
    }

    fn references(&self) -> Vec<Reference> {
        strong(&self.tracks).chain(self.descriptor.map(Reference::Strong)).collect()
    }

    fn decode(instance: Uuid, p: &Properties) -> Result<Self> {
        Ok(Self {
            instance,
            uid: value::get_umid(p.required(&props::PACKAGE_UID)?, "PackageUID")?,
            name: p.get(&props::PACKAGE_NAME).map(|b| value::get_string(b, "Name")).transpose()?,
            created: match p.get(&props::PACKAGE_CREATION_DATE) {
                Some(b) => value::get_timestamp(b, "PackageCreationDate")?,
                None => Timestamp::default(),
            },
            modified: match p.get(&props::PACKAGE_MODIFIED_DATE) {
                Some(b) => value::get_timestamp(b, "PackageModifiedDate")?,
                None => Timestamp::default(),
            },
            tracks: value::get_uuid_batch(p.required(&props::TRACKS)?, "Tracks")?,
            descriptor: p.get(&props::DESCRIPTOR).map(|b| value::get_uuid(b, "Descriptor")).transpose()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub instance: Uuid,
    /// Static tracks carry no edit rate or origin.
    pub is_static: bool,
    pub track_id: u32,
    pub track_number: u32,
    pub name: Option<String>,
    pub sequence: Uuid,
    pub edit_rate: Rational,
    pub origin: i64,
}

impl SetBody for Track {
    fn set_label(&self) -> Label {
        if self.is_static {
            labels::STATIC_TRACK
        } else {
            labels::TIMELINE_TRACK
        }
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        let mut out = vec![
            (props::TRACK_ID, value::u32(self.track_id)),
            (props::TRACK_NUMBER, value::u32(self.track_number)),
        ];
        if let Some(name) = &self.name {
            out.push((props::TRACK_NAME, value::string(name)));
        }
        out.push((props::TRACK_SEQUENCE, value::uuid(&self.sequence)));
        if !self.is_static {
            out.push((props::EDIT_RATE, value::rational(self.edit_rate)));
            out.push((props::ORIGIN, value::i64(self.origin)));
        }
        out
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::Strong(self.sequence)]
    }

    fn validate(&self) -> Result<()> {
        if !self.is_static && (self.edit_rate.num <= 0 || self.edit_rate.den <= 0) {
            return Err(Error::format(format!(
                "track {} has edit rate {}",
                self.track_id, self.edit_rate
            )));
        }
        Ok(())
    }
}

impl Track {
    fn decode(instance: Uuid, is_static: bool, p: &Properties) -> Result<Self> {
        let (edit_rate, origin) = if is_static {
            (Rational::new(0, 0), 0)
        } else {
            (
                value::get_rational(p.required(&props::EDIT_RATE)?, "EditRate")?,
                match p.get(&props::ORIGIN) {
                    Some(b) => value::get_i64(b, "Origin")?,
                    None => 0,
                },
            )
        };
        Ok(Self {
            instance,
            is_static,
            track_id: value::get_u32(p.required(&props::TRACK_ID)?, "TrackID")?,
            track_number: match p.get(&props::TRACK_NUMBER) {
                Some(b) => value::get_u32(b, "TrackNumber")?,
                None => 0,
            },
            name: p.get(&props::TRACK_NAME).map(|b| value::get_string(b, "TrackName")).transpose()?,
            sequence: value::get_uuid(p.required(&props::TRACK_SEQUENCE)?, "Sequence")?,
            edit_rate,
            origin,
        })
    }
}

fn optional_duration(p: &Properties) -> Result<Option<i64>> {
    p.get(&props::DURATION).map(|b| value::get_i64(b, "Duration")).transpose()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub instance: Uuid,
    pub data_definition: Label,
    pub duration: Option<i64>,
    pub components: Vec<Uuid>,
}

impl SetBody for Sequence {
    fn set_label(&self) -> Label {
        labels::SEQUENCE
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        let mut out = vec![(props::DATA_DEFINITION, value::label(&self.data_definition))];
        if let Some(d) = self.duration {
            out.push((props::DURATION, value::i64(d)));
        }
        out.push((props::STRUCTURAL_COMPONENTS, value::uuid_batch(&self.components)));
        out
    }

    fn references(&self) -> Vec<Reference> {
        strong(&self.components).collect()
    }
}

impl Sequence {
    fn decode(instance: Uuid, p: &Properties) -> Result<Self> {
        Ok(Self {
            instance,
            data_definition: value::get_label(p.required(&props::DATA_DEFINITION)?, "DataDefinition")?,
            duration: optional_duration(p)?,
            components: value::get_uuid_batch(p.required(&props::STRUCTURAL_COMPONENTS)?, "StructuralComponents")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceClip {
    pub instance: Uuid,
    pub data_definition: Label,
    pub duration: i64,
    pub start_position: i64,
    pub source_package: Umid,
    pub source_track_id: u32,
}

impl SetBody for SourceClip {
    fn set_label(&self) -> Label {
        labels::SOURCE_CLIP
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        vec![
            (props::DATA_DEFINITION, value::label(&self.data_definition)),
            (props::DURATION, value::i64(self.duration)),
            (props::START_POSITION, value::i64(self.start_position)),
            (props::SOURCE_PACKAGE_ID, value::umid(&self.source_package)),
            (props::SOURCE_TRACK_ID, value::u32(self.source_track_id)),
        ]
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::Package(self.source_package)]
    }
}

impl SourceClip {
    fn decode(instance: Uuid, p: &Properties) -> Result<Self> {
        Ok(Self {
            instance,
            data_definition: value::get_label(p.required(&props::DATA_DEFINITION)?, "DataDefinition")?,
            duration: optional_duration(p)?.unwrap_or(0),
            start_position: match p.get(&props::START_POSITION) {
                Some(b) => value::get_i64(b, "StartPosition")?,
                None => 0,
            },
            source_package: value::get_umid(p.required(&props::SOURCE_PACKAGE_ID)?, "SourcePackageID")?,
            source_track_id: match p.get(&props::SOURCE_TRACK_ID) {
                Some(b) => value::get_u32(b, "SourceTrackID")?,
                None => 0,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimecodeComponent {
    pub instance: Uuid,
    pub data_definition: Label,
    pub duration: i64,
    pub rounded_base: u16,
    pub start: i64,
    pub drop_frame: bool,
}

impl SetBody for TimecodeComponent {
    fn set_label(&self) -> Label {
        labels::TIMECODE_COMPONENT
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        vec![
            (props::DATA_DEFINITION, value::label(&self.data_definition)),
            (props::DURATION, value::i64(self.duration)),
            (props::ROUNDED_TIMECODE_BASE, value::u16(self.rounded_base)),
            (props::START_TIMECODE, value::i64(self.start)),
            (props::DROP_FRAME, value::bool(self.drop_frame)),
        ]
    }
}

impl TimecodeComponent {
    fn decode(instance: Uuid, p: &Properties) -> Result<Self> {
        Ok(Self {
            instance,
            data_definition: value::get_label(p.required(&props::DATA_DEFINITION)?, "DataDefinition")?,
            duration: optional_duration(p)?.unwrap_or(0),
            rounded_base: value::get_u16(p.required(&props::ROUNDED_TIMECODE_BASE)?, "RoundedTimecodeBase")?,
            start: value::get_i64(p.required(&props::START_TIMECODE)?, "StartTimecode")?,
            drop_frame: match p.get(&props::DROP_FRAME) {
                Some(b) => value::get_bool(b, "DropFrame")?,
                None => false,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DmSegment {
    pub instance: Uuid,
    pub data_definition: Label,
    pub duration: Option<i64>,
    pub framework: Uuid,
}

impl SetBody for DmSegment {
    fn set_label(&self) -> Label {
        labels::DM_SEGMENT
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        let mut out = vec![(props::DATA_DEFINITION, value::label(&self.data_definition))];
        if let Some(d) = self.duration {
            out.push((props::DURATION, value::i64(d)));
        }
        out.push((props::DM_FRAMEWORK, value::uuid(&self.framework)));
        out
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::Strong(self.framework)]
    }
}

impl DmSegment {
    fn decode(instance: Uuid, p: &Properties) -> Result<Self> {
        Ok(Self {
            instance,
            data_definition: value::get_label(p.required(&props::DATA_DEFINITION)?, "DataDefinition")?,
            duration: optional_duration(p)?,
            framework: value::get_uuid(p.required(&props::DM_FRAMEWORK)?, "DMFramework")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CryptographicFramework {
    pub instance: Uuid,
    pub context: Uuid,
}

impl SetBody for CryptographicFramework {
    fn set_label(&self) -> Label {
        labels::CRYPTOGRAPHIC_FRAMEWORK
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        vec![(props::CONTEXT_SR, value::uuid(&self.context))]
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::Strong(self.context)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CryptographicContext {
    pub instance: Uuid,
    pub context_id: Uuid,
    pub source_essence_container: Label,
    pub cipher_algorithm: Label,
    /// Zero label when frames carry no MIC.
    pub mic_algorithm: Label,
    pub key_id: Uuid,
}

impl SetBody for CryptographicContext {
    fn set_label(&self) -> Label {
        labels::CRYPTOGRAPHIC_CONTEXT
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        vec![
            (props::CONTEXT_ID, value::uuid(&self.context_id)),
            (props::SOURCE_ESSENCE_CONTAINER, value::label(&self.source_essence_container)),
            (props::CIPHER_ALGORITHM, value::label(&self.cipher_algorithm)),
            (props::MIC_ALGORITHM, value::label(&self.mic_algorithm)),
            (props::CRYPTOGRAPHIC_KEY_ID, value::uuid(&self.key_id)),
        ]
    }
}

impl CryptographicContext {
    fn decode(instance: Uuid, p: &Properties) -> Result<Self> {
        Ok(Self {
            instance,
            context_id: value::get_uuid(p.required(&props::CONTEXT_ID)?, "ContextID")?,
            source_essence_container: value::get_label(
                p.required(&props::SOURCE_ESSENCE_CONTAINER)?,
                "SourceEssenceContainer",
            )?,
            cipher_algorithm: value::get_label(p.required(&props::CIPHER_ALGORITHM)?, "CipherAlgorithm")?,
            mic_algorithm: match p.get(&props::MIC_ALGORITHM) {
                Some(b) => value::get_label(b, "MICAlgorithm")?,
                None => Label::default(),
            },
            key_id: value::get_uuid(p.required(&props::CRYPTOGRAPHIC_KEY_ID)?, "CryptographicKeyID")?,
        })
    }
}

/// File descriptor: common fields plus whatever the essence adapter adds.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub instance: Uuid,
    pub set_label: Label,
    pub linked_track_id: u32,
    pub sample_rate: Rational,
    pub container_duration: i64,
    pub essence_container: Label,
    pub sub_descriptors: Vec<Uuid>,
    pub extra: Vec<(Label, Vec<u8>)>,
}

const DESCRIPTOR_FIELDS: [Label; 5] = [
    props::LINKED_TRACK_ID,
    props::SAMPLE_RATE,
    props::CONTAINER_DURATION,
    props::ESSENCE_CONTAINER,
    props::SUB_DESCRIPTORS,
];

impl SetBody for Descriptor {
    fn set_label(&self) -> Label {
        self.set_label
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        let mut out = vec![
            (props::LINKED_TRACK_ID, value::u32(self.linked_track_id)),
            (props::SAMPLE_RATE, value::rational(self.sample_rate)),
            (props::CONTAINER_DURATION, value::i64(self.container_duration)),
            (props::ESSENCE_CONTAINER, value::label(&self.essence_container)),
        ];
        if !self.sub_descriptors.is_empty() {
            out.push((props::SUB_DESCRIPTORS, value::uuid_batch(&self.sub_descriptors)));
        }
        out.extend(self.extra.iter().cloned());
        out
    }

    fn references(&self) -> Vec<Reference> {
        strong(&self.sub_descriptors).collect()
    }
}

impl Descriptor {
    fn decode(instance: Uuid, set_label: Label, p: &Properties) -> Result<Self> {
        Ok(Self {
            instance,
            set_label,
            linked_track_id: match p.get(&props::LINKED_TRACK_ID) {
                Some(b) => value::get_u32(b, "LinkedTrackID")?,
                None => 0,
            },
            sample_rate: value::get_rational(p.required(&props::SAMPLE_RATE)?, "SampleRate")?,
            container_duration: match p.get(&props::CONTAINER_DURATION) {
                Some(b) => value::get_i64(b, "ContainerDuration")?,
                None => 0,
            },
            essence_container: value::get_label(p.required(&props::ESSENCE_CONTAINER)?, "EssenceContainer")?,
            sub_descriptors: match p.get(&props::SUB_DESCRIPTORS) {
                Some(b) => value::get_uuid_batch(b, "SubDescriptors")?,
                None => Vec::new(),
            },
            extra: p.rest(&DESCRIPTOR_FIELDS),
        })
    }

    pub fn property(&self, label: &Label) -> Option<&[u8]> {
        self.extra.iter().find(|(l, _)| l == label).map(|(_, v)| v.as_slice())
    }
}

/// A set whose properties are kept as opaque bytes. Used for sub-descriptors
/// and for set kinds this crate does not model.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueSet {
    pub instance: Uuid,
    pub set_label: Label,
    pub properties: Vec<(Label, Vec<u8>)>,
}

impl SetBody for OpaqueSet {
    fn set_label(&self) -> Label {
        self.set_label
    }

    fn instance(&self) -> Uuid {
        self.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        self.properties.clone()
    }
}

// ── Closed variant set ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataSet {
    Preface(Preface),
    Identification(Identification),
    ContentStorage(ContentStorage),
    EssenceContainerData(EssenceContainerData),
    MaterialPackage(Package),
    SourcePackage(Package),
    Track(Track),
    Sequence(Sequence),
    SourceClip(SourceClip),
    TimecodeComponent(TimecodeComponent),
    DmSegment(DmSegment),
    CryptographicFramework(CryptographicFramework),
    CryptographicContext(CryptographicContext),
    Descriptor(Descriptor),
    SubDescriptor(OpaqueSet),
    Unknown(OpaqueSet),
}

struct PackageSet<'a>(&'a Package, Label);

impl SetBody for PackageSet<'_> {
    fn set_label(&self) -> Label {
        self.1
    }

    fn instance(&self) -> Uuid {
        self.0.instance
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        self.0.properties()
    }

    fn references(&self) -> Vec<Reference> {
        self.0.references()
    }
}

impl MetadataSet {
    fn with_body<R>(&self, f: impl FnOnce(&dyn SetBody) -> R) -> R {
        match self {
            MetadataSet::Preface(s) => f(s),
            MetadataSet::Identification(s) => f(s),
            MetadataSet::ContentStorage(s) => f(s),
            MetadataSet::EssenceContainerData(s) => f(s),
            MetadataSet::MaterialPackage(s) => f(&PackageSet(s, labels::MATERIAL_PACKAGE)),
            MetadataSet::SourcePackage(s) => f(&PackageSet(s, labels::SOURCE_PACKAGE)),
            MetadataSet::Track(s) => f(s),
            MetadataSet::Sequence(s) => f(s),
            MetadataSet::SourceClip(s) => f(s),
            MetadataSet::TimecodeComponent(s) => f(s),
            MetadataSet::DmSegment(s) => f(s),
            MetadataSet::CryptographicFramework(s) => f(s),
            MetadataSet::CryptographicContext(s) => f(s),
            MetadataSet::Descriptor(s) => f(s),
            MetadataSet::SubDescriptor(s) | MetadataSet::Unknown(s) => f(s),
        }
    }

    /// Decode one set from its label and decoded properties.
    pub fn decode(set_label: Label, instance: Uuid, p: &Properties) -> Result<Self> {
        let set = match set_label {
            l if l == labels::PREFACE => MetadataSet::Preface(Preface::decode(instance, p)?),
            l if l == labels::IDENTIFICATION => MetadataSet::Identification(Identification::decode(instance, p)?),
            l if l == labels::CONTENT_STORAGE => MetadataSet::ContentStorage(ContentStorage::decode(instance, p)?),
            l if l == labels::ESSENCE_CONTAINER_DATA => {
                MetadataSet::EssenceContainerData(EssenceContainerData::decode(instance, p)?)
            }
            l if l == labels::MATERIAL_PACKAGE => MetadataSet::MaterialPackage(Package::decode(instance, p)?),
            l if l == labels::SOURCE_PACKAGE => MetadataSet::SourcePackage(Package::decode(instance, p)?),
            l if l == labels::TIMELINE_TRACK => MetadataSet::Track(Track::decode(instance, false, p)?),
            l if l == labels::STATIC_TRACK => MetadataSet::Track(Track::decode(instance, true, p)?),
            l if l == labels::SEQUENCE => MetadataSet::Sequence(Sequence::decode(instance, p)?),
            l if l == labels::SOURCE_CLIP => MetadataSet::SourceClip(SourceClip::decode(instance, p)?),
            l if l == labels::TIMECODE_COMPONENT => {
                MetadataSet::TimecodeComponent(TimecodeComponent::decode(instance, p)?)
            }
            l if l == labels::DM_SEGMENT => MetadataSet::DmSegment(DmSegment::decode(instance, p)?),
            l if l == labels::CRYPTOGRAPHIC_FRAMEWORK => {
                MetadataSet::CryptographicFramework(CryptographicFramework {
                    instance,
                    context: value::get_uuid(p.required(&props::CONTEXT_SR)?, "ContextSR")?,
                })
            }
            l if l == labels::CRYPTOGRAPHIC_CONTEXT => {
                MetadataSet::CryptographicContext(CryptographicContext::decode(instance, p)?)
            }
            l if p.has(&props::ESSENCE_CONTAINER) => MetadataSet::Descriptor(Descriptor::decode(instance, l, p)?),
            l => MetadataSet::Unknown(OpaqueSet { instance, set_label: l, properties: p.rest(&[]) }),
        };
        Ok(set)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            MetadataSet::Preface(_) => "Preface",
            MetadataSet::Identification(_) => "Identification",
            MetadataSet::ContentStorage(_) => "ContentStorage",
            MetadataSet::EssenceContainerData(_) => "EssenceContainerData",
            MetadataSet::MaterialPackage(_) => "MaterialPackage",
            MetadataSet::SourcePackage(_) => "SourcePackage",
            MetadataSet::Track(_) => "Track",
            MetadataSet::Sequence(_) => "Sequence",
            MetadataSet::SourceClip(_) => "SourceClip",
            MetadataSet::TimecodeComponent(_) => "TimecodeComponent",
            MetadataSet::DmSegment(_) => "DMSegment",
            MetadataSet::CryptographicFramework(_) => "CryptographicFramework",
            MetadataSet::CryptographicContext(_) => "CryptographicContext",
            MetadataSet::Descriptor(_) => "Descriptor",
            MetadataSet::SubDescriptor(_) => "SubDescriptor",
            MetadataSet::Unknown(_) => "Unknown",
        }
    }
}

impl SetBody for MetadataSet {
    fn set_label(&self) -> Label {
        self.with_body(|b| b.set_label())
    }

    fn instance(&self) -> Uuid {
        self.with_body(|b| b.instance())
    }

    fn properties(&self) -> Vec<(Label, Vec<u8>)> {
        self.with_body(|b| b.properties())
    }

    fn references(&self) -> Vec<Reference> {
        self.with_body(|b| b.references())
    }

    fn validate(&self) -> Result<()> {
        self.with_body(|b| b.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_parses_and_rounds() {
        assert_eq!("24".parse::<Rational>().unwrap(), Rational::new(24, 1));
        assert_eq!("30000/1001".parse::<Rational>().unwrap().rounded(), 30);
        assert!("0/1".parse::<Rational>().is_err());
    }

    #[test]
    fn umid_carries_material_uuid() {
        let id = Uuid::new_v4();
        let umid = Umid::from_uuid(&id);
        assert_eq!(umid.material(), id);
        assert!(!umid.is_zero());
    }

    #[test]
    fn strings_are_utf16be() {
        let enc = value::string("Ab");
        assert_eq!(enc, vec![0, b'A', 0, b'b']);
        assert_eq!(value::get_string(&enc, "s").unwrap(), "Ab");
    }

    #[test]
    fn batch_size_is_checked() {
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let enc = value::uuid_batch(&ids);
        assert_eq!(value::get_uuid_batch(&enc, "b").unwrap(), ids);
        assert!(value::get_uuid_batch(&enc[..enc.len() - 1], "b").is_err());
        assert!(value::get_batch(&enc, 32, "b").is_err());
    }

    #[test]
    fn unknown_set_with_essence_container_is_a_descriptor() {
        let ec = value::label(&labels::PRORES_ESSENCE_CONTAINER);
        let rate = value::rational(Rational::new(24, 1));
        let width = value::u32(1920);
        let p = Properties::new(
            "set",
            vec![
                (props::SAMPLE_RATE, &rate[..]),
                (props::ESSENCE_CONTAINER, &ec[..]),
                (props::STORED_WIDTH, &width[..]),
            ],
        );
        let set = MetadataSet::decode(labels::CDCI_DESCRIPTOR, Uuid::new_v4(), &p).unwrap();
        let MetadataSet::Descriptor(d) = set else { panic!("not a descriptor") };
        assert_eq!(d.property(&props::STORED_WIDTH), Some(&width[..]));
        assert_eq!(d.extra.len(), 1);
    }

    #[test]
    fn missing_required_property_is_format_error() {
        let p = Properties::new("Track", vec![]);
        let err = MetadataSet::decode(labels::TIMELINE_TRACK, Uuid::new_v4(), &p).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn package_variants_report_their_labels() {
        let pkg = Package {
            instance: Uuid::new_v4(),
            uid: Umid::default(),
            name: None,
            created: Timestamp::default(),
            modified: Timestamp::default(),
            tracks: vec![],
            descriptor: None,
        };
        assert_eq!(MetadataSet::MaterialPackage(pkg.clone()).set_label(), labels::MATERIAL_PACKAGE);
        assert_eq!(MetadataSet::SourcePackage(pkg).set_label(), labels::SOURCE_PACKAGE);
    }
}
