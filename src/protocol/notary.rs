use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::errors::*;
use crate::key_types::{CanonicalMessage, ContentHash, KeyMaterial};
use crate::timestamp::Timestamp;

/// What a caller gets back from signing: everything needed to verify later.
#[derive(Serialize, Debug, Clone)]
pub struct Attestation {
    pub hash: String,
    pub timestamp: Timestamp,
    /// The signed text, byte for byte. Callers must verify against this,
    /// not against a message they rebuilt themselves.
    pub exact_message: String,
    /// base64 of the ASN.1 DER ECDSA signature
    pub signature: String,
}

pub struct Notary {
    keys: Arc<KeyMaterial>,
}

impl Notary {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Notary { keys }
    }

    pub fn stamp(&self, raw_hash: &str) -> Result<Attestation> {
        self.stamp_with(raw_hash, Timestamp::now)
    }

    fn stamp_with<F>(&self, raw_hash: &str, clock: F) -> Result<Attestation>
    where
        F: FnOnce() -> Timestamp,
    {
        let hash = ContentHash::parse(raw_hash)?;

        // NOTE: the clock is read exactly once, after validation. The same
        // value goes into the signed message and the response.
        let timestamp = clock();
        let message = CanonicalMessage::build(&hash, &timestamp);

        let sig = self.keys.sign(message.as_bytes())?;

        Ok(Attestation {
            hash: hash.to_string(),
            timestamp,
            exact_message: message.into_string(),
            signature: STANDARD.encode(sig),
        })
    }
}
