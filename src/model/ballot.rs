use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::num::NonZeroU64;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stable identifier of a candidate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub u32);

impl Display for CandidateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A candidate as configured at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub id: CandidateId,
    pub name: String,
    pub party: String,
}

/// Public view of a single candidate's standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub name: String,
    pub party: String,
    pub votes: u64,
}

/// Aggregate statistics over the whole ballot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_votes: u64,
    pub fraudulent_votes: u64,
    /// Percentage of the assumed electorate that has voted, capped at 100.
    pub voter_turnout: u64,
    pub avg_voting_time: f64,
}

/// Fixed inputs to [`Stats`] that aren't derived from the ballot itself.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsConfig {
    pub electorate_size: NonZeroU64,
    pub avg_voting_time: f64,
}

/// Turnout as a whole percentage, rounding half to even and capping at 100.
pub fn turnout_percent(total_votes: u64, electorate_size: NonZeroU64) -> u64 {
    let percent = total_votes as f64 * 100.0 / electorate_size.get() as f64;
    (percent.round_ties_even() as u64).min(100)
}

/// Storage for candidates and the vote counters.
pub trait BallotStore: Send + Sync {
    /// Does a candidate with this ID exist?
    fn contains(&self, candidate: CandidateId) -> bool;

    /// Count one vote for the candidate, along with the global total.
    fn record_vote(&self, candidate: CandidateId) -> Result<()>;

    /// Count one vote attempt flagged as fraudulent at time `at`.
    fn record_fraud(&self, at: DateTime<Utc>);

    /// The current standing of every candidate.
    fn snapshot(&self) -> BTreeMap<CandidateId, CandidateResult>;

    /// Aggregate statistics.
    fn stats(&self, config: &StatsConfig) -> Stats;

    /// Fraudulent attempts bucketed by UTC hour of day.
    fn fraud_by_hour(&self) -> BTreeMap<u32, u64>;
}

#[derive(Debug, Default)]
struct Tally {
    candidates: BTreeMap<CandidateId, CandidateResult>,
    total_votes: u64,
    fraudulent_votes: u64,
    fraud_by_hour: BTreeMap<u32, u64>,
}

/// A [`BallotStore`] that lives entirely in memory.
/// All counters share one lock, so `total_votes` always equals the sum of the
/// candidates' counts.
#[derive(Debug, Default)]
pub struct MemoryBallotStore {
    tally: RwLock<Tally>,
}

impl MemoryBallotStore {
    /// Create a store with the given candidates, all on zero votes.
    pub fn new<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = CandidateSpec>,
    {
        let candidates = candidates
            .into_iter()
            .map(|spec| {
                (
                    spec.id,
                    CandidateResult {
                        name: spec.name,
                        party: spec.party,
                        votes: 0,
                    },
                )
            })
            .collect();
        Self {
            tally: RwLock::new(Tally {
                candidates,
                ..Tally::default()
            }),
        }
    }
}

impl BallotStore for MemoryBallotStore {
    fn contains(&self, candidate: CandidateId) -> bool {
        self.tally
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .candidates
            .contains_key(&candidate)
    }

    fn record_vote(&self, candidate: CandidateId) -> Result<()> {
        let mut tally = self.tally.write().unwrap_or_else(PoisonError::into_inner);
        let result = tally
            .candidates
            .get_mut(&candidate)
            .ok_or(Error::UnknownCandidate)?;
        result.votes += 1;
        tally.total_votes += 1;
        Ok(())
    }

    fn record_fraud(&self, at: DateTime<Utc>) {
        let mut tally = self.tally.write().unwrap_or_else(PoisonError::into_inner);
        tally.fraudulent_votes += 1;
        *tally.fraud_by_hour.entry(at.hour()).or_insert(0) += 1;
    }

    fn snapshot(&self) -> BTreeMap<CandidateId, CandidateResult> {
        self.tally
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .candidates
            .clone()
    }

    fn stats(&self, config: &StatsConfig) -> Stats {
        let tally = self.tally.read().unwrap_or_else(PoisonError::into_inner);
        Stats {
            total_votes: tally.total_votes,
            fraudulent_votes: tally.fraudulent_votes,
            voter_turnout: turnout_percent(tally.total_votes, config.electorate_size),
            avg_voting_time: config.avg_voting_time,
        }
    }

    fn fraud_by_hour(&self) -> BTreeMap<u32, u64> {
        self.tally
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fraud_by_hour
            .clone()
    }
}
