use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::info;

use crate::errors::*;
use crate::key_types::PublicKey;

/// Outcome of a verification that actually ran. `Invalid` is an answer,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
}

impl Verdict {
    #[cfg(test)]
    pub fn is_valid(&self) -> bool {
        *self == Verdict::Valid
    }
}

pub struct Verifier {
    public_key: PublicKey,
}

impl Verifier {
    pub fn new(public_key: PublicKey) -> Self {
        Verifier { public_key }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Check `signature` (base64, ASN.1 DER) over the raw bytes of `message`.
    ///
    /// Errors only when verification could not be attempted: a missing or
    /// empty field, or a signature that is not base64.
    pub fn verify(&self, message: Option<&str>, signature: Option<&str>) -> Result<Verdict> {
        let message = required("message", message)?;
        let signature = required("signature", signature)?;

        let sig = STANDARD
            .decode(signature)
            .chain_err(|| ErrorKind::MalformedSignature)?;

        if self.public_key.verify(message.as_bytes(), &sig) {
            Ok(Verdict::Valid)
        } else {
            info!(
                "signature mismatch for {}-byte message {:?}",
                message.len(),
                excerpt(message)
            );
            Ok(Verdict::Invalid)
        }
    }
}

/// Longest message prefix that goes into the log.
const LOGGED_PREFIX_CHARS: usize = 100;

fn excerpt(message: &str) -> &str {
    match message.char_indices().nth(LOGGED_PREFIX_CHARS) {
        Some((end, _)) => &message[..end],
        None => message,
    }
}

fn required<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!(ErrorKind::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_types::KeyMaterial;
    use crate::protocol::Notary;
    use std::sync::Arc;

    fn pair() -> (Notary, Verifier) {
        let keys = Arc::new(KeyMaterial::generate().unwrap());
        let verifier = Verifier::new(keys.public_key().clone());
        (Notary::new(keys), verifier)
    }

    #[test]
    fn round_trip() {
        let (notary, verifier) = pair();
        for hash in &["a".repeat(64), "0123456789ABCDEF".repeat(4)] {
            let att = notary.stamp(hash).unwrap();
            let verdict = verifier
                .verify(Some(att.exact_message.as_str()), Some(att.signature.as_str()))
                .unwrap();
            assert_eq!(verdict, Verdict::Valid);
        }
    }

    #[test]
    fn tampered_message_is_invalid() {
        let (notary, verifier) = pair();
        let att = notary.stamp(&"d".repeat(64)).unwrap();

        for i in 0..att.exact_message.len() {
            let mut bytes = att.exact_message.clone().into_bytes();
            bytes[i] ^= 0x01;
            let tampered = String::from_utf8(bytes).unwrap();

            let verdict = verifier.verify(Some(tampered.as_str()), Some(att.signature.as_str())).unwrap();
            assert_eq!(verdict, Verdict::Invalid, "flipped byte {}", i);
        }
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let (notary, verifier) = pair();
        let att = notary.stamp(&"e".repeat(64)).unwrap();
        let sig = STANDARD.decode(&att.signature).unwrap();

        for i in 0..sig.len() {
            let mut bytes = sig.clone();
            bytes[i] ^= 0x01;
            let tampered = STANDARD.encode(&bytes);

            let verdict = verifier.verify(Some(att.exact_message.as_str()), Some(tampered.as_str())).unwrap();
            assert_eq!(verdict, Verdict::Invalid, "flipped byte {}", i);
        }
    }

    #[test]
    fn garbage_signature_is_invalid() {
        let (_, verifier) = pair();
        let sig = STANDARD.encode(b"invalidsig");
        let verdict = verifier.verify(Some("test|1234567890.0"), Some(sig.as_str())).unwrap();
        assert!(!verdict.is_valid());
    }

    #[test]
    fn missing_fields() {
        let (_, verifier) = pair();

        let cases = vec![
            (None, Some("c2ln"), "message"),
            (Some(""), Some("c2ln"), "message"),
            (Some("msg"), None, "signature"),
            (Some("msg"), Some(""), "signature"),
            (None, None, "message"),
        ];

        for (message, signature, field) in cases {
            match verifier.verify(message, signature) {
                Err(Error(ErrorKind::MissingField(f), _)) => assert_eq!(f, field),
                other => panic!("expected missing {}, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn non_base64_signature_is_malformed() {
        let (notary, verifier) = pair();
        let att = notary.stamp(&"f".repeat(64)).unwrap();

        for sig in &["not base64!", "%%%%", "YWJj="] {
            match verifier.verify(Some(att.exact_message.as_str()), Some(*sig)) {
                Err(Error(ErrorKind::MalformedSignature, _)) => {}
                other => panic!("{:?} was not rejected: {:?}", sig, other),
            }
        }
    }

    #[test]
    fn logged_excerpt_is_bounded() {
        let short = format!("{}|1700000000.0", "a".repeat(64));
        assert_eq!(excerpt(&short), short);

        let huge = "é".repeat(1 << 20);
        let cut = excerpt(&huge);
        assert_eq!(cut.chars().count(), LOGGED_PREFIX_CHARS);
        assert!(huge.starts_with(cut));
    }

    #[test]
    fn huge_message_is_just_invalid() {
        let (_, verifier) = pair();
        let message = "x".repeat(1 << 20);
        let sig = STANDARD.encode(b"invalidsig");
        let verdict = verifier.verify(Some(message.as_str()), Some(sig.as_str())).unwrap();
        assert_eq!(verdict, Verdict::Invalid);
    }

    #[test]
    fn other_key_is_invalid() {
        let (notary, _) = pair();
        let (_, stranger) = pair();
        let att = notary.stamp(&"1".repeat(64)).unwrap();
        let verdict = stranger
            .verify(Some(att.exact_message.as_str()), Some(att.signature.as_str()))
            .unwrap();
        assert_eq!(verdict, Verdict::Invalid);
    }
}
