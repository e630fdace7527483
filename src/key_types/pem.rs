//! PEM armor, and the one SubjectPublicKeyInfo shape we publish.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::errors::*;

pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
pub const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";

/// DER header of a SubjectPublicKeyInfo holding an uncompressed P-256
/// point: id-ecPublicKey, prime256v1, then a BIT STRING of 66 bytes.
const P256_SPKI_PREFIX: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

pub const P256_POINT_LEN: usize = 65;

pub fn encode(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);

    let mut rslt = format!("-----BEGIN {}-----\n", label);
    for line in body.as_bytes().chunks(64) {
        rslt.push_str(&String::from_utf8_lossy(line));
        rslt.push('\n');
    }
    rslt += &format!("-----END {}-----\n", label);
    rslt
}

/// Extract the DER body of the first `label` block in `text`.
///
/// Environment variables often carry PEM with literal `\n` escapes instead
/// of line breaks; those are accepted too.
pub fn decode(label: &str, text: &str) -> Result<Vec<u8>> {
    let text = text.replace("\\n", "\n");
    let begin = format!("-----BEGIN {}-----", label);
    let end = format!("-----END {}-----", label);

    let mut lines = text.lines().map(str::trim);
    if !lines.by_ref().any(|line| line == begin) {
        bail!("no '{}' line found", begin);
    }

    let mut body = String::new();
    for line in lines {
        if line == end {
            return STANDARD
                .decode(&body)
                .chain_err(|| format!("{} block is not valid base64", label));
        }
        if line.contains(':') {
            bail!("{} block carries headers; encrypted keys are not supported", label);
        }
        body.push_str(line);
    }

    bail!("no '{}' line found", end)
}

pub fn p256_spki(point: &[u8]) -> Vec<u8> {
    let mut der = Vec::with_capacity(P256_SPKI_PREFIX.len() + point.len());
    der.extend_from_slice(&P256_SPKI_PREFIX);
    der.extend_from_slice(point);
    der
}

/// The uncompressed point inside a P-256 SubjectPublicKeyInfo.
pub fn p256_point(spki: &[u8]) -> Result<&[u8]> {
    if spki.len() != P256_SPKI_PREFIX.len() + P256_POINT_LEN || !spki.starts_with(&P256_SPKI_PREFIX) {
        bail!("public key is not an uncompressed P-256 SubjectPublicKeyInfo");
    }
    Ok(&spki[P256_SPKI_PREFIX.len()..])
}
