use log::info;
use rocket::http::Status;
use rocket::serde::json::{self, Json};
use rocket::State;

use crate::api::guards::{Admitted, PublicKeyGate, SignGate, VerifyGate};
use crate::api::types::*;
use crate::errors::*;
use crate::protocol::{Notary, Verdict, Verifier};

const SIGN_BODY_HINT: &str = "JSON body must include 'hash' field";
const VERIFY_BODY_HINT: &str = "JSON body required";

#[post("/timestamp", data = "<body>")]
pub fn timestamp(
    _admitted: Admitted<SignGate>,
    notary: &State<Notary>,
    body: std::result::Result<Json<SignRequest>, json::Error<'_>>,
) -> Result<Json<Attestation>> {
    let request = body.map_err(|e| {
        info!("unreadable sign request: {}", e);
        Error::from(ErrorKind::MalformedBody(SIGN_BODY_HINT))
    })?;

    let hash = request
        .hash
        .as_deref()
        .ok_or(ErrorKind::MalformedBody(SIGN_BODY_HINT))?;

    Ok(Json(notary.stamp(hash)?))
}

#[get("/public-key")]
pub fn public_key(_admitted: Admitted<PublicKeyGate>, verifier: &State<Verifier>) -> Json<KeyResponse> {
    Json(KeyResponse {
        public_key: verifier.public_key().pem().to_string(),
    })
}

/// A signature that does not match is still a 200: the check ran and said no.
#[post("/verify", data = "<body>")]
pub fn verify(
    _admitted: Admitted<VerifyGate>,
    verifier: &State<Verifier>,
    body: std::result::Result<Json<VerifyRequest>, json::Error<'_>>,
) -> (Status, Json<VerifyResponse>) {
    let verdict = body
        .map_err(|e| {
            info!("unreadable verify request: {}", e);
            Error::from(ErrorKind::MalformedBody(VERIFY_BODY_HINT))
        })
        .and_then(|request| {
            verifier.verify(request.message.as_deref(), request.signature.as_deref())
        });

    match verdict {
        Ok(Verdict::Valid) => (Status::Ok, Json(VerifyResponse::valid())),
        Ok(Verdict::Invalid) => (
            Status::Ok,
            Json(VerifyResponse::invalid("Signature verification failed")),
        ),
        Err(e) => {
            e.log("POST /api/verify");
            (
                e.kind().status(),
                Json(VerifyResponse::invalid(e.kind().client_message())),
            )
        }
    }
}

/// Answers CORS preflights; the `Cors` fairing adds the headers.
#[options("/<_..>")]
pub fn preflight() -> Status {
    Status::NoContent
}
