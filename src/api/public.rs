use std::collections::BTreeMap;

use rocket::{serde::json::Json, Route, State};

use crate::model::{
    api::VotingPatterns,
    ballot::{CandidateId, CandidateResult, Stats},
    election::Election,
};

pub fn routes() -> Vec<Route> {
    routes![results, stats, voting_patterns]
}

#[get("/api/results")]
pub fn results(election: &State<Election>) -> Json<BTreeMap<CandidateId, CandidateResult>> {
    Json(election.results())
}

#[get("/api/stats")]
pub fn stats(election: &State<Election>) -> Json<Stats> {
    Json(election.stats())
}

#[get("/api/voting-patterns")]
pub fn voting_patterns(election: &State<Election>) -> Json<VotingPatterns> {
    Json(election.voting_patterns())
}
