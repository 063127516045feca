use rocket::Route;

mod auth;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes.extend(crate::cors::routes());
    routes
}
