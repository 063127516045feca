use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Header, Status},
    Request, Response, Route,
};

pub fn routes() -> Vec<Route> {
    routes![preflight]
}

/// A rocket fairing that lets the API be called from any origin.
#[derive(Debug, Copy, Clone)]
pub struct CorsFairing;

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _req: &'r Request<'_>, res: &mut Response<'r>) {
        res.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        res.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, OPTIONS",
        ));
        res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type"));
    }
}

/// Answer CORS preflight requests for any path.
#[options("/<_..>")]
pub fn preflight() -> Status {
    Status::NoContent
}
