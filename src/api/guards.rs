use std::marker::PhantomData;

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};

use crate::admission::{AdmissionControl, CallerIdentity, Operation};
use crate::errors::*;

/// Names the budget a route draws from.
pub trait Gate: Send + Sync + 'static {
    const OPERATION: Operation;
}

pub enum SignGate {}
pub enum VerifyGate {}
pub enum PublicKeyGate {}

impl Gate for SignGate {
    const OPERATION: Operation = Operation::Sign;
}

impl Gate for VerifyGate {
    const OPERATION: Operation = Operation::Verify;
}

impl Gate for PublicKeyGate {
    const OPERATION: Operation = Operation::PublicKey;
}

/// Proof that the caller was within budget. Request guards run before the
/// body is read, so an over-budget request never reaches protocol code.
pub struct Admitted<G: Gate>(PhantomData<G>);

/// How callers are told apart for admission. By default only the socket
/// peer counts; Rocket's `ip_header` is honoured only when the deployment
/// sits behind a proxy that sets it.
pub struct CallerSource {
    trust_ip_header: bool,
}

impl CallerSource {
    pub fn new(trust_ip_header: bool) -> Self {
        CallerSource { trust_ip_header }
    }

    pub fn identify(&self, req: &Request<'_>) -> CallerIdentity {
        if self.trust_ip_header {
            CallerIdentity::from(req.client_ip())
        } else {
            CallerIdentity::from(req.remote().map(|addr| addr.ip()))
        }
    }
}

/// Seconds to wait, stashed for the 429 catcher.
#[derive(Debug, Clone, Copy)]
pub struct RetryAfter(pub u64);

#[rocket::async_trait]
impl<'r, G: Gate> FromRequest<'r> for Admitted<G> {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let gate = match req.rocket().state::<AdmissionControl>() {
            Some(gate) => gate,
            None => {
                let e = Error::from("admission control is not configured");
                e.log("admission");
                return Outcome::Error((Status::InternalServerError, e));
            }
        };

        let who = match req.rocket().state::<CallerSource>() {
            Some(source) => source.identify(req),
            None => CallerIdentity::from(req.remote().map(|addr| addr.ip())),
        };
        match gate.check(who, G::OPERATION) {
            Ok(()) => Outcome::Success(Admitted(PhantomData)),
            Err(e) => {
                if let ErrorKind::RateLimited(secs) = *e.kind() {
                    req.local_cache(|| RetryAfter(secs));
                }
                e.log(&format!("{} budget for {}", G::OPERATION, who));
                Outcome::Error((e.kind().status(), e))
            }
        }
    }
}
