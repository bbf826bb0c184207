//! Writer descriptive info, fixed at open and read back from the header.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::metadata::HeaderMetadata;

/// Product UUID stamped into files written by this crate.
pub const PRODUCT_UUID: Uuid = Uuid::from_bytes([
    0x7d, 0x83, 0x6e, 0x16, 0x37, 0xc7, 0x4c, 0x22, 0xb2, 0xe0, 0x46, 0xa7, 0x17, 0xe8, 0x4f, 0x42,
]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterInfo {
    pub product_uuid: Uuid,
    pub company_name: String,
    pub product_name: String,
    pub product_version: String,
    /// Becomes the material number of the source package UMID.
    pub asset_uuid: Uuid,
    pub encrypted_essence: bool,
    pub uses_hmac: bool,
    pub context_id: Uuid,
    pub cryptographic_key_id: Uuid,
}

impl Default for WriterInfo {
    fn default() -> Self {
        Self {
            product_uuid: PRODUCT_UUID,
            company_name: "trackfile".into(),
            product_name: env!("CARGO_PKG_NAME").into(),
            product_version: env!("CARGO_PKG_VERSION").into(),
            asset_uuid: Uuid::new_v4(),
            encrypted_essence: false,
            uses_hmac: false,
            context_id: Uuid::nil(),
            cryptographic_key_id: Uuid::nil(),
        }
    }
}

impl WriterInfo {
    /// Info for an encrypted file; context id is fresh, key id names the key.
    pub fn encrypted(mut self, key_id: Uuid, uses_hmac: bool) -> Self {
        self.encrypted_essence = true;
        self.uses_hmac = uses_hmac;
        self.context_id = Uuid::new_v4();
        self.cryptographic_key_id = key_id;
        self
    }

    /// Rebuild the info from a parsed header.
    pub fn from_metadata(md: &HeaderMetadata) -> Result<Self> {
        let ident = md
            .identification()
            .ok_or_else(|| Error::format("header has no Identification set"))?;
        let source = md
            .source_package()
            .ok_or_else(|| Error::format("header has no SourcePackage"))?;
        let mut info = Self {
            product_uuid: ident.product_uid,
            company_name: ident.company_name.clone(),
            product_name: ident.product_name.clone(),
            product_version: ident.version_string.clone(),
            asset_uuid: source.uid.material(),
            encrypted_essence: false,
            uses_hmac: false,
            context_id: Uuid::nil(),
            cryptographic_key_id: Uuid::nil(),
        };
        if let Some(ctx) = md.cryptographic_context() {
            info.encrypted_essence = true;
            info.uses_hmac = !ctx.mic_algorithm.is_zero();
            info.context_id = ctx.context_id;
            info.cryptographic_key_id = ctx.key_id;
        }
        Ok(info)
    }
}
