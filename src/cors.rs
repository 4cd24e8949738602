use rocket::http::{Header, Method, Status};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Request, Response};

use crate::config::CorsConfig;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Credentialed CORS for the staff app and the public website.
pub struct Cors {
    allowed_origins: Vec<String>,
}

impl Cors {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allowed_origins: vec![config.internal_origin.clone(), config.public_origin.clone()],
        }
    }

    fn allows(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| allowed.trim_end_matches('/') == origin)
    }
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let Some(origin) = request.headers().get_one("Origin") else {
            return;
        };

        if !self.allows(origin) {
            return;
        }

        response.set_header(Header::new("Access-Control-Allow-Origin", origin.to_string()));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
        response.set_header(Header::new("Vary", "Origin"));

        if request.method() == Method::Options {
            response.set_header(Header::new("Access-Control-Allow-Methods", ALLOWED_METHODS));
            response.set_header(Header::new("Access-Control-Allow-Headers", ALLOWED_HEADERS));
            response.set_status(Status::NoContent);
        }
    }
}

/// Matches every preflight so it never falls through to the 404 catcher.
#[options("/<_..>")]
pub fn preflight() -> Status {
    Status::NoContent
}
