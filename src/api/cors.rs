use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Method};
use rocket::{Request, Response};

/// Origins allowed to call the API from a browser. Managed state, read by
/// the `Cors` fairing.
pub struct CorsPolicy {
    origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(origins: Vec<String>) -> Self {
        CorsPolicy { origins }
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }
}

/// GET and POST from allowed origins, `Content-Type` only, no credentials.
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let policy = match req.rocket().state::<CorsPolicy>() {
            Some(policy) => policy,
            None => return,
        };

        let origin = match req.headers().get_one("Origin") {
            Some(origin) if policy.allows(origin) => origin.to_string(),
            _ => return,
        };

        res.set_header(Header::new("Access-Control-Allow-Origin", origin));
        res.set_header(Header::new("Vary", "Origin"));

        if req.method() == Method::Options {
            res.set_header(Header::new("Access-Control-Allow-Methods", "GET, POST"));
            res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type"));
        }
    }
}
