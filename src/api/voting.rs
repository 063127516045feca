use chrono::Utc;
use rocket::{http::CookieJar, serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{SessionIdentity, VoteRequest, VoteResponse},
        election::Election,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![vote]
}

#[post("/api/vote", data = "<request>", format = "json")]
pub async fn vote(
    session: Option<SessionIdentity>,
    request: Json<VoteRequest>,
    cookies: &CookieJar<'_>,
    election: &State<Election>,
    config: &State<Config>,
) -> Result<Json<VoteResponse>> {
    let receipt = election.cast_vote(session.as_ref(), &request, Utc::now())?;

    // Keep the caller's session in step with their new voted status.
    cookies.add(receipt.session.into_cookie(config)?);

    Ok(Json(VoteResponse::accepted()))
}
