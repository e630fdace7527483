use std::fmt;
use std::fs;
use std::io;

use log::{info, warn};
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, KeyPair, UnparsedPublicKey};

use crate::config::Config;
use crate::errors::*;
use crate::key_types::pem;

/// The server's one P-256 signing key.
///
/// Loaded once before the server starts taking requests and read-only from
/// then on, so concurrent signers share it without locking. The private half
/// never leaves this struct: it is not cloned, serialized or printed.
pub struct KeyMaterial {
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
    public_key: PublicKey,
}

/// The verifying half, plus the exact PEM text we publish for it.
#[derive(Clone)]
pub struct PublicKey {
    point: Vec<u8>,
    pem: String,
}

impl PublicKey {
    fn from_point(point: &[u8]) -> Self {
        PublicKey {
            point: point.to_vec(),
            pem: pem::encode(pem::PUBLIC_KEY_LABEL, &pem::p256_spki(point)),
        }
    }

    /// Parse a published SubjectPublicKeyInfo PEM, keeping its text verbatim.
    pub fn from_pem(text: &str) -> Result<Self> {
        let spki = pem::decode(pem::PUBLIC_KEY_LABEL, text)?;
        let point = pem::p256_point(&spki)?;
        if point[0] != 0x04 {
            bail!("public key point is not uncompressed");
        }

        Ok(PublicKey {
            point: point.to_vec(),
            pem: text.to_string(),
        })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Short fingerprint for logs: SHA-256 of the SubjectPublicKeyInfo.
    pub fn key_id(&self) -> String {
        let spki = pem::p256_spki(&self.point);
        digest::digest(&digest::SHA256, &spki).as_ref()[..8]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// ECDSA P-256 / SHA-256 over `message`, ASN.1 DER signature.
    pub fn verify(&self, message: &[u8], sig: &[u8]) -> bool {
        UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, &self.point)
            .verify(message, sig)
            .is_ok()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.point == other.point
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublicKey({})", self.key_id())
    }
}

impl KeyMaterial {
    /// Load the key pair named by `config`, then hold it against the
    /// published public key, if one exists. Every failure is `KeyUnavailable`
    /// and must stop the server from starting.
    pub fn load(config: &Config) -> Result<Self> {
        let keys = match (&config.private_signature_key, &config.private_key_path) {
            (Some(text), _) => Self::from_pkcs8_pem(text)?,
            (None, Some(path)) => {
                let text = fs::read_to_string(path).chain_err(|| {
                    ErrorKind::KeyUnavailable(format!("cannot read {}", path.display()))
                })?;
                Self::from_pkcs8_pem(&text)?
            }
            (None, None) => bail!(ErrorKind::KeyUnavailable(
                "set PRIVATE_SIGNATURE_KEY or private_key_path".into()
            )),
        };

        let path = &config.public_key_path;
        let keys = match fs::read_to_string(path) {
            Ok(text) => {
                let published = PublicKey::from_pem(&text).chain_err(|| {
                    ErrorKind::KeyUnavailable(format!("{} is not a P-256 public key", path.display()))
                })?;
                keys.with_published(published)?
            }
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "{} not found, publishing the key derived from the private key",
                    path.display()
                );
                keys
            }
            Err(e) => {
                return Err(Error::with_chain(
                    e,
                    ErrorKind::KeyUnavailable(format!("cannot read {}", path.display())),
                ))
            }
        };

        info!("signing key {} loaded", keys.public_key.key_id());
        Ok(keys)
    }

    pub fn from_pkcs8_pem(text: &str) -> Result<Self> {
        let der = pem::decode(pem::PRIVATE_KEY_LABEL, text).chain_err(|| {
            ErrorKind::KeyUnavailable("private key is not a PKCS#8 PEM block".into())
        })?;
        Self::from_pkcs8(&der)
    }

    pub fn from_pkcs8(der: &[u8]) -> Result<Self> {
        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&signature::ECDSA_P256_SHA256_ASN1_SIGNING, der, &rng)
                .map_err(|e| {
                    Error::from(ErrorKind::KeyUnavailable(format!(
                        "private key rejected: {}",
                        e
                    )))
                })?;
        let public_key = PublicKey::from_point(key_pair.public_key().as_ref());

        Ok(KeyMaterial {
            key_pair,
            rng,
            public_key,
        })
    }

    /// A fresh PKCS#8 v1 document for a new P-256 key.
    pub fn generate_pkcs8() -> Result<Vec<u8>> {
        let rng = SystemRandom::new();
        let doc = EcdsaKeyPair::generate_pkcs8(&signature::ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .chain_err(|| "failed to generate key pair")?;
        Ok(doc.as_ref().to_vec())
    }

    #[cfg(test)]
    pub fn generate() -> Result<Self> {
        Self::from_pkcs8(&Self::generate_pkcs8()?)
    }

    /// Swap in the published PEM text, after checking it is our key.
    pub fn with_published(mut self, published: PublicKey) -> Result<Self> {
        if published != self.public_key {
            bail!(ErrorKind::KeyUnavailable(format!(
                "published public key {} does not match signing key {}",
                published.key_id(),
                self.public_key.key_id()
            )));
        }
        self.public_key = published;
        Ok(self)
    }

    /// ECDSA P-256 / SHA-256, ASN.1 DER encoded.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let sig = self
            .key_pair
            .sign(&self.rng, message)
            .chain_err(|| ErrorKind::SigningFailed)?;
        Ok(sig.as_ref().to_vec())
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &self.public_key)
            .finish()
    }
}
