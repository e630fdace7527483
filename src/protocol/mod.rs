//! The two halves of the service: issuing attestations and checking them.
//!
//! Both are stateless. A `Notary` owns a handle to the signing key; a
//! `Verifier` needs nothing but the public key, so it can run anywhere the
//! published PEM is available.

mod notary;
mod verifier;

pub use self::notary::{Attestation, Notary};
pub use self::verifier::{Verdict, Verifier};
