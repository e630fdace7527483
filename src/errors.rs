use std::io::Cursor;

use log::{error, info};
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::json;

error_chain! {
    foreign_links {
        Io(::std::io::Error);
        Config(::rocket::figment::Error);
    }

    errors {
        InvalidHash {
            description("invalid content hash")
            display("hash must be a 64-character hex string")
        }
        MissingField(field: &'static str) {
            description("required field missing")
            display("'{}' field is required", field)
        }
        MalformedSignature {
            description("signature is not base64")
            display("Signature must be base64-encoded")
        }
        MalformedBody(hint: &'static str) {
            description("request body could not be parsed")
            display("{}", hint)
        }
        KeyUnavailable(reason: String) {
            description("signing key unavailable")
            display("signing key unavailable: {}", reason)
        }
        SigningFailed {
            description("signing failed")
            display("signing failed")
        }
        RateLimited(retry_after: u64) {
            description("rate limit exceeded")
            display("Rate limit exceeded. Please try again later.")
        }
        InvalidQuota(text: String) {
            description("invalid quota")
            display("invalid quota '{}', expected e.g. \"10 per minute\"", text)
        }
    }
}

/// Who is to blame for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Bad input; the caller can fix it and retry.
    Client,
    /// Something broke on our side. Details stay in the log.
    Server,
    /// Over budget; expected traffic, not an error.
    Admission,
}

impl ErrorKind {
    pub fn fault(&self) -> Fault {
        match *self {
            ErrorKind::InvalidHash
            | ErrorKind::MissingField(_)
            | ErrorKind::MalformedSignature
            | ErrorKind::MalformedBody(_) => Fault::Client,
            ErrorKind::RateLimited(_) => Fault::Admission,
            _ => Fault::Server,
        }
    }

    pub fn status(&self) -> Status {
        match self.fault() {
            Fault::Client => Status::BadRequest,
            Fault::Admission => Status::TooManyRequests,
            Fault::Server => Status::InternalServerError,
        }
    }

    /// The text a caller is allowed to see. Server faults never leak detail.
    pub fn client_message(&self) -> String {
        match self.fault() {
            Fault::Server => "Internal server error".into(),
            _ => self.to_string(),
        }
    }
}

impl Error {
    /// Render the whole error chain to a single line for the log.
    pub fn render_chain(&self) -> String {
        let mut rslt = format!("{}", self);
        for cause in self.iter().skip(1) {
            rslt += &format!(", caused by: {}", cause);
        }
        rslt
    }

    /// Log according to the fault class. Admission rejections are not errors.
    pub fn log(&self, context: &str) {
        match self.kind().fault() {
            Fault::Server => error!("{}: {}", context, self.render_chain()),
            Fault::Client => info!("{}: rejected input: {}", context, self),
            Fault::Admission => info!("{}: {}", context, self),
        }
    }
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        self.log(&format!("{} {}", req.method(), req.uri()));

        let resp = json!({
            "error": self.kind().client_message(),
        })
        .to_string();

        Response::build()
            .status(self.kind().status())
            .header(ContentType::JSON)
            .sized_body(resp.len(), Cursor::new(resp))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_bad_requests() {
        for kind in vec![
            ErrorKind::InvalidHash,
            ErrorKind::MissingField("message"),
            ErrorKind::MalformedSignature,
            ErrorKind::MalformedBody("JSON body required"),
        ] {
            assert_eq!(kind.fault(), Fault::Client);
            assert_eq!(kind.status(), Status::BadRequest);
        }
    }

    #[test]
    fn server_faults_hide_details() {
        let kind = ErrorKind::KeyUnavailable("/secret/path/key.pem: no such file".into());
        assert_eq!(kind.status(), Status::InternalServerError);
        assert_eq!(kind.client_message(), "Internal server error");

        let err: Error = "ring exploded".into();
        assert_eq!(err.kind().fault(), Fault::Server);
        assert!(!err.kind().client_message().contains("ring"));
    }

    #[test]
    fn rate_limit_is_its_own_class() {
        let kind = ErrorKind::RateLimited(42);
        assert_eq!(kind.fault(), Fault::Admission);
        assert_eq!(kind.status(), Status::TooManyRequests);
    }

    #[test]
    fn chain_is_rendered() {
        let io = ::std::io::Error::new(::std::io::ErrorKind::NotFound, "gone");
        let err = Error::with_chain(io, ErrorKind::KeyUnavailable("reading key".into()));
        let chain = err.render_chain();
        assert!(chain.contains("reading key"));
        assert!(chain.contains("caused by: gone"));
    }
}
