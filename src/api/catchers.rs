use rocket::http::{Header, Status};
use rocket::request::Request;
use rocket::serde::json::Json;

use crate::api::guards::RetryAfter;
use crate::api::types::ErrorResponse;
use crate::errors::ErrorKind;

#[derive(Responder)]
#[response(status = 429, content_type = "json")]
pub struct TooManyRequests {
    body: Json<ErrorResponse>,
    retry_after: Header<'static>,
}

#[catch(429)]
pub fn too_many_requests(req: &Request) -> TooManyRequests {
    let RetryAfter(secs) = *req.local_cache(|| RetryAfter(1));

    TooManyRequests {
        body: Json(ErrorResponse {
            error: ErrorKind::RateLimited(secs).to_string(),
            retry_after: Some(secs),
        }),
        retry_after: Header::new("Retry-After", secs.to_string()),
    }
}

#[catch(default)]
pub fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorResponse>) {
    let error = match status.code {
        500..=599 => "Internal server error",
        _ => status.reason().unwrap_or("request failed"),
    };

    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            retry_after: None,
        }),
    )
}
