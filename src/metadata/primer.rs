//! Primer pack: local tag ↔ property label mapping.
//!
//! Value layout: `u32 count | u32 item size (18) | (u16 tag | label)*`.
//! Static tags come from the label registry; labels without one get dynamic
//! tags counting down from 0xFFFF.

use std::collections::{BTreeMap, HashMap};

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::label::{self, Label};

pub const PRIMER_ITEM_SIZE: u32 = 18;
const FIRST_DYNAMIC_TAG: u16 = 0xFFFF;
const LAST_DYNAMIC_TAG: u16 = 0x8000;

#[derive(Debug, Clone, Default)]
pub struct Primer {
    by_tag: BTreeMap<u16, Label>,
    by_label: HashMap<Label, u16>,
    next_dynamic: Option<u16>,
}

impl Primer {
    pub fn new() -> Self {
        Self { next_dynamic: Some(FIRST_DYNAMIC_TAG), ..Self::default() }
    }

    /// Tag for `label`, assigning one if the label has not been seen.
    pub fn tag_for(&mut self, label: &Label) -> Result<u16> {
        if let Some(&tag) = self.by_label.get(label) {
            return Ok(tag);
        }
        let tag = match label::static_tag(label) {
            Some(tag) => tag,
            None => self.allocate_dynamic()?,
        };
        self.insert(tag, *label)?;
        Ok(tag)
    }

    fn allocate_dynamic(&mut self) -> Result<u16> {
        loop {
            let tag = self
                .next_dynamic
                .filter(|&t| t >= LAST_DYNAMIC_TAG)
                .ok_or_else(|| Error::format("dynamic local tags exhausted"))?;
            self.next_dynamic = tag.checked_sub(1);
            if !self.by_tag.contains_key(&tag) {
                return Ok(tag);
            }
        }
    }

    fn insert(&mut self, tag: u16, label: Label) -> Result<()> {
        if let Some(existing) = self.by_tag.get(&tag) {
            if *existing != label {
                return Err(Error::format(format!(
                    "local tag {tag:04x} mapped to both {existing} and {label}"
                )));
            }
            return Ok(());
        }
        self.by_tag.insert(tag, label);
        self.by_label.insert(label, tag);
        Ok(())
    }

    pub fn label_for(&self, tag: u16) -> Option<Label> {
        self.by_tag.get(&tag).copied()
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// Encoded pack value, entries in ascending tag order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.by_tag.len() * PRIMER_ITEM_SIZE as usize);
        out.extend_from_slice(&(self.by_tag.len() as u32).to_be_bytes());
        out.extend_from_slice(&PRIMER_ITEM_SIZE.to_be_bytes());
        for (tag, label) in &self.by_tag {
            out.extend_from_slice(&tag.to_be_bytes());
            out.extend_from_slice(label.as_bytes());
        }
        out
    }

    pub fn decode(value: &[u8]) -> Result<Self> {
        if value.len() < 8 {
            return Err(Error::format("truncated primer pack"));
        }
        let count = BigEndian::read_u32(&value[0..4]) as usize;
        let item_size = BigEndian::read_u32(&value[4..8]);
        if item_size != PRIMER_ITEM_SIZE {
            return Err(Error::format(format!("primer item size {item_size}")));
        }
        let body = &value[8..];
        if body.len() != count * PRIMER_ITEM_SIZE as usize {
            return Err(Error::format(format!(
                "primer declares {count} entries but holds {} bytes",
                body.len()
            )));
        }
        let mut primer = Self::new();
        for item in body.chunks_exact(PRIMER_ITEM_SIZE as usize) {
            let tag = BigEndian::read_u16(&item[0..2]);
            let label = Label::from_slice(&item[2..]).ok_or_else(|| Error::format("bad primer label"))?;
            primer.insert(tag, label)?;
        }
        Ok(primer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::props;

    #[test]
    fn static_and_dynamic_tags() {
        let mut p = Primer::new();
        assert_eq!(p.tag_for(&props::INSTANCE_UID).unwrap(), 0x3C0A);
        assert_eq!(p.tag_for(&props::CONTEXT_ID).unwrap(), 0xFFFF);
        assert_eq!(p.tag_for(&props::CIPHER_ALGORITHM).unwrap(), 0xFFFE);
        assert_eq!(p.tag_for(&props::CONTEXT_ID).unwrap(), 0xFFFF);
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn encode_decode() {
        let mut p = Primer::new();
        p.tag_for(&props::TRACK_ID).unwrap();
        p.tag_for(&props::MIC_ALGORITHM).unwrap();
        let enc = p.encode();
        assert_eq!(enc.len(), 8 + 2 * 18);
        let back = Primer::decode(&enc).unwrap();
        assert_eq!(back.label_for(0x4801), Some(props::TRACK_ID));
        assert_eq!(back.label_for(0xFFFF), Some(props::MIC_ALGORITHM));
    }

    #[test]
    fn conflicting_tag_is_rejected() {
        let mut enc = Vec::new();
        enc.extend_from_slice(&2u32.to_be_bytes());
        enc.extend_from_slice(&18u32.to_be_bytes());
        for label in [props::TRACK_ID, props::TRACK_NAME] {
            enc.extend_from_slice(&0x4801u16.to_be_bytes());
            enc.extend_from_slice(label.as_bytes());
        }
        assert!(Primer::decode(&enc).unwrap_err().is_format());
    }
}
