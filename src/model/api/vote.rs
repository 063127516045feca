use std::collections::BTreeMap;

use rocket::serde::json::Value;
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::ballot::CandidateId;

/// A vote submitted by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRequest {
    /// Missing or non-ID values are treated as an unknown candidate.
    #[serde(default, deserialize_with = "lenient_candidate_id")]
    pub candidate_id: Option<CandidateId>,
    /// Seconds the user spent on the ballot page. Missing means zero.
    #[serde(default)]
    pub voting_duration: f64,
}

/// Accept any JSON value, keeping it only if it is a valid candidate ID.
/// Anything else is left for the workflow to reject, after the session check.
fn lenient_candidate_id<'de, D>(deserializer: D) -> Result<Option<CandidateId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .and_then(|id| u32::try_from(id).ok())
        .map(CandidateId))
}

/// Response to an accepted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub success: bool,
    pub message: String,
    pub fraud_detected: bool,
}

impl VoteResponse {
    pub fn accepted() -> Self {
        Self {
            success: true,
            message: "Vote recorded successfully!".to_string(),
            fraud_detected: false,
        }
    }
}

/// Data behind the dashboard charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPatterns {
    pub candidate_distribution: BTreeMap<CandidateId, u64>,
    pub fraud_by_hour: BTreeMap<u32, u64>,
}


#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn missing_fields_default() {
        let request: VoteRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(None, request.candidate_id);
        assert_eq!(0.0, request.voting_duration);

        let request: VoteRequest =
            serde_json::from_str(r#"{"candidate_id": 2, "voting_duration": 4.25}"#).unwrap();
        assert_eq!(VoteRequest::example(2, 4.25), request);
    }

    #[test]
    fn malformed_candidate_ids_parse_as_unknown() {
        for id in [r#"-1"#, r#""1""#, "4294967296", "1.5", "null", "[1]", "{}"] {
            let request: VoteRequest =
                serde_json::from_str(&format!(r#"{{"candidate_id": {id}, "voting_duration": 9}}"#))
                    .unwrap();
            assert_eq!(None, request.candidate_id, "candidate_id {id}");
            assert_eq!(9.0, request.voting_duration);
        }

        let request: VoteRequest = serde_json::from_str(r#"{"candidate_id": 4294967295}"#).unwrap();
        assert_eq!(Some(CandidateId(u32::MAX)), request.candidate_id);
    }
}
