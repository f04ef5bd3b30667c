use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Request, Response};
use rocket::http::Header;

/// Lets the separately hosted poll page call the API. With no configured
/// origins, any `http://localhost` origin is allowed.
pub struct CORS {
    allowed_origins: Vec<String>,
}

impl CORS {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    pub fn allows(&self, origin: &str) -> bool {
        if self.allowed_origins.is_empty() {
            is_localhost(origin)
        } else {
            self.allowed_origins.iter().any(|allowed| allowed == origin)
        }
    }
}

/// `http://localhost` with an optional numeric port, nothing else.
fn is_localhost(origin: &str) -> bool {
    let Some(host) = origin
        .strip_prefix("http://")
        .and_then(|authority| authority.strip_prefix("localhost"))
    else {
        return false;
    };

    match host.strip_prefix(':') {
        Some(port) => !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
        None => host.is_empty(),
    }
}

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let Some(origin) = req.headers().get_one("Origin") else {
            return;
        };

        if self.allows(origin) {
            res.set_header(Header::new("Access-Control-Allow-Origin", origin.to_string()));
            res.set_header(Header::new("Access-Control-Allow-Methods", "POST, GET, OPTIONS"));
            res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type, Accept"));
            res.set_header(Header::new("Access-Control-Max-Age", "86400"));
            res.set_header(Header::new("Vary", "Origin"));
        }
    }
}
