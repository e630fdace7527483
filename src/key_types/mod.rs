use std::fmt;

use crate::errors::*;
use crate::timestamp::Timestamp;

mod key_material;
pub mod pem;

// Re-export types
pub use self::key_material::{KeyMaterial, PublicKey};

pub const HASH_HEX_LEN: usize = 64;

/// A caller-supplied 32-byte digest, kept as the 64 hex characters it
/// arrived as. Case is preserved; the server never sees the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != HASH_HEX_LEN || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            bail!(ErrorKind::InvalidHash);
        }
        Ok(ContentHash(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The exact bytes that get signed: `<hash>|<timestamp>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage(String);

impl CanonicalMessage {
    pub fn build(hash: &ContentHash, timestamp: &Timestamp) -> Self {
        CanonicalMessage(format!("{}|{}", hash.as_str(), timestamp.as_str()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_hashes_of_either_case() {
        let lower = "0123456789abcdef".repeat(4);
        let upper = lower.to_uppercase();
        assert_eq!(ContentHash::parse(&lower).unwrap().as_str(), lower);
        assert_eq!(ContentHash::parse(&upper).unwrap().as_str(), upper);
    }

    #[test]
    fn rejects_bad_hashes() {
        let cases = vec![
            String::new(),
            "notavalidhash".to_string(),
            "a".repeat(63),
            "a".repeat(65),
            format!("{}g", "a".repeat(63)),
            format!("{} ", "a".repeat(63)),
            // 64 bytes, but not 64 hex characters
            "é".repeat(32),
        ];

        for case in cases {
            match ContentHash::parse(&case) {
                Err(Error(ErrorKind::InvalidHash, _)) => {}
                other => panic!("{:?} was not rejected: {:?}", case, other),
            }
        }
    }

    #[test]
    fn canonical_message_layout() {
        let hash = ContentHash::parse(&"a".repeat(64)).unwrap();
        let ts = Timestamp::from_secs(1700000000.5);
        let msg = CanonicalMessage::build(&hash, &ts);
        assert_eq!(msg.as_str(), format!("{}|1700000000.5", "a".repeat(64)));
    }

    #[test]
    fn canonical_message_is_deterministic() {
        let hash = ContentHash::parse(&"F".repeat(64)).unwrap();
        let ts = Timestamp::from_secs(1723456789.0);
        assert_eq!(
            CanonicalMessage::build(&hash, &ts).as_bytes(),
            CanonicalMessage::build(&hash.clone(), &ts.clone()).as_bytes()
        );
        assert!(CanonicalMessage::build(&hash, &ts).as_str().ends_with("|1723456789.0"));
    }
}
