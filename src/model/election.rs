use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{SessionIdentity, VoteRequest, VotingPatterns},
    ballot::{BallotStore, CandidateId, CandidateResult, MemoryBallotStore, Stats, StatsConfig},
    fraud::{FraudHeuristic, ThreadRandom},
    user::{IdentityStore, MemoryIdentityStore, NewUser, User},
};

/// The outcome of an accepted vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReceipt {
    pub candidate: CandidateId,
    /// The caller's session, updated to show they have voted.
    pub session: SessionIdentity,
}

/// The single election this server runs: its voters, its ballot, and the
/// rules for casting a vote. Lives in managed state.
pub struct Election {
    users: Box<dyn IdentityStore>,
    ballot: Box<dyn BallotStore>,
    fraud: FraudHeuristic,
    stats: StatsConfig,
    /// Held across the whole check-then-record sequence of a vote.
    vote_gate: Mutex<()>,
}

impl Election {
    pub fn new(
        users: Box<dyn IdentityStore>,
        ballot: Box<dyn BallotStore>,
        fraud: FraudHeuristic,
        stats: StatsConfig,
    ) -> Self {
        Self {
            users,
            ballot,
            fraud,
            stats,
            vote_gate: Mutex::new(()),
        }
    }

    /// Build an empty in-memory election from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Box::new(MemoryIdentityStore::new()),
            Box::new(MemoryBallotStore::new(config.candidates().iter().cloned())),
            FraudHeuristic::new(
                config.fraud_min_duration(),
                config.fraud_probability(),
                Box::new(ThreadRandom),
            ),
            config.stats(),
        )
    }

    pub fn users(&self) -> &dyn IdentityStore {
        self.users.as_ref()
    }

    pub fn ballot(&self) -> &dyn BallotStore {
        self.ballot.as_ref()
    }

    /// Register a new voter.
    pub fn register(&self, new_user: NewUser) -> Result<User> {
        let user = self.users.register(new_user)?;
        info!("Registered voter {}", user.email);
        Ok(user)
    }

    /// Check a user's credentials.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        self.users.authenticate(email, password)
    }

    /// Attempt to cast a vote on behalf of `session`.
    ///
    /// Each call is a single attempt: it is either accepted in full, or
    /// rejected with no effect other than counting a fraud attempt.
    pub fn cast_vote(
        &self,
        session: Option<&SessionIdentity>,
        request: &VoteRequest,
        at: DateTime<Utc>,
    ) -> Result<VoteReceipt> {
        let session = session.ok_or(Error::NotAuthenticated)?;

        let _gate = self.vote_gate.lock().unwrap_or_else(PoisonError::into_inner);

        let user = self
            .users
            .find(&session.email)
            .ok_or(Error::NotAuthenticated)?;
        if user.voted {
            return Err(Error::AlreadyVoted);
        }

        let candidate = request
            .candidate_id
            .filter(|id| self.ballot.contains(*id))
            .ok_or(Error::UnknownCandidate)?;

        if self.fraud.is_fraudulent(request.voting_duration) {
            self.ballot.record_fraud(at);
            warn!(
                "Flagged vote by {} for candidate {candidate} after {}s",
                user.email, request.voting_duration
            );
            return Err(Error::FraudSuspected);
        }

        self.ballot.record_vote(candidate)?;
        self.users.mark_voted(&user.email)?;
        info!("Accepted vote by {} for candidate {candidate}", user.email);

        Ok(VoteReceipt {
            candidate,
            session: SessionIdentity {
                voted: true,
                ..session.clone()
            },
        })
    }

    /// Current standing of every candidate.
    pub fn results(&self) -> BTreeMap<CandidateId, CandidateResult> {
        self.ballot.snapshot()
    }

    /// Aggregate statistics.
    pub fn stats(&self) -> Stats {
        self.ballot.stats(&self.stats)
    }

    /// Votes per candidate and fraud attempts per hour.
    pub fn voting_patterns(&self) -> VotingPatterns {
        VotingPatterns {
            candidate_distribution: self
                .ballot
                .snapshot()
                .into_iter()
                .map(|(id, result)| (id, result.votes))
                .collect(),
            fraud_by_hour: self.ballot.fraud_by_hour(),
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use crate::model::ballot::CandidateSpec;

    use super::*;

    impl Election {
        /// An empty election over the example candidates, where the random
        /// fraud branch always trips iff `fraud`.
        pub fn example(fraud: bool) -> Self {
            Self::new(
                Box::new(MemoryIdentityStore::new()),
                Box::new(MemoryBallotStore::new(CandidateSpec::examples())),
                FraudHeuristic::example(fraud),
                StatsConfig::example(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    fn registered(election: &Election, new_user: NewUser) -> SessionIdentity {
        SessionIdentity::from(&election.register(new_user).unwrap())
    }

    fn assert_tally_consistent(election: &Election) {
        let sum: u64 = election.results().values().map(|c| c.votes).sum();
        assert_eq!(sum, election.stats().total_votes);
    }

    #[test]
    fn accepted_vote() {
        log4rs_test_utils::test_logging::init_logging_once_for(["smartvote_backend"], None, None);

        let election = Election::example(false);
        let session = registered(&election, NewUser::example());

        let receipt = election
            .cast_vote(Some(&session), &VoteRequest::example(1, 10.0), Utc::now())
            .unwrap();

        assert_eq!(CandidateId(1), receipt.candidate);
        assert!(receipt.session.voted);
        assert_eq!(session.email, receipt.session.email);
        assert_eq!(1, election.results()[&CandidateId(1)].votes);
        assert_eq!(1, election.stats().total_votes);
        assert!(election.users().find("a@x.com").unwrap().voted);
        assert_tally_consistent(&election);

        // A second attempt by the same user is refused, even with a stale session.
        let err = election
            .cast_vote(Some(&session), &VoteRequest::example(2, 10.0), Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyVoted));
        assert_eq!(0, election.results()[&CandidateId(2)].votes);
        assert_eq!(1, election.stats().total_votes);
    }

    #[test]
    fn unauthenticated() {
        let election = Election::example(false);
        let err = election
            .cast_vote(None, &VoteRequest::example(1, 10.0), Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));

        // A session naming nobody we know is no better.
        let ghost = SessionIdentity {
            email: "ghost@x.com".into(),
            name: "Ghost".into(),
            is_admin: false,
            voted: false,
        };
        let err = election
            .cast_vote(Some(&ghost), &VoteRequest::example(1, 10.0), Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
        assert_eq!(0, election.stats().total_votes);
    }

    #[test]
    fn too_fast_is_fraud() {
        let election = Election::example(false);
        let session = registered(&election, NewUser::example());

        let err = election
            .cast_vote(Some(&session), &VoteRequest::example(1, 1.0), Utc::now())
            .unwrap_err();

        assert!(matches!(err, Error::FraudSuspected));
        assert_eq!(1, election.stats().fraudulent_votes);
        assert_eq!(0, election.stats().total_votes);
        assert!(election.results().values().all(|c| c.votes == 0));
        assert!(!election.users().find("a@x.com").unwrap().voted);
    }

    #[test]
    fn random_fraud_allows_retry() {
        let flagged = Election::example(true);
        let session = registered(&flagged, NewUser::example());

        for attempt in 1..=3 {
            let err = flagged
                .cast_vote(Some(&session), &VoteRequest::example(2, 30.0), Utc::now())
                .unwrap_err();
            assert!(matches!(err, Error::FraudSuspected));
            assert_eq!(attempt, flagged.stats().fraudulent_votes);
        }
        assert_eq!(0, flagged.stats().total_votes);
        assert!(!flagged.users().find("a@x.com").unwrap().voted);
    }

    #[test]
    fn unknown_candidate() {
        let election = Election::example(false);
        let session = registered(&election, NewUser::example());

        let err = election
            .cast_vote(Some(&session), &VoteRequest::example(999, 10.0), Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCandidate));

        let missing = VoteRequest {
            candidate_id: None,
            voting_duration: 10.0,
        };
        let err = election
            .cast_vote(Some(&session), &missing, Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCandidate));

        let stats = election.stats();
        assert_eq!(0, stats.total_votes);
        assert_eq!(0, stats.fraudulent_votes);
        assert!(!election.users().find("a@x.com").unwrap().voted);
    }

    #[test]
    fn checks_run_in_order() {
        let election = Election::example(true);
        let session = registered(&election, NewUser::example());

        // An unknown candidate is reported before the fraud check runs.
        let err = election
            .cast_vote(Some(&session), &VoteRequest::example(999, 0.0), Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCandidate));
        assert_eq!(0, election.stats().fraudulent_votes);
    }

    #[test]
    fn concurrent_attempts_by_one_user() {
        let election = Election::example(false);
        let session = registered(&election, NewUser::example());
        let accepted = AtomicUsize::new(0);

        thread::scope(|scope| {
            for i in 0..16 {
                let (election, session, accepted) = (&election, &session, &accepted);
                scope.spawn(move || {
                    let request = VoteRequest::example(i % 3 + 1, 10.0);
                    match election.cast_vote(Some(session), &request, Utc::now()) {
                        Ok(_) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(err) => assert!(matches!(err, Error::AlreadyVoted)),
                    }
                });
            }
        });

        assert_eq!(1, accepted.load(Ordering::SeqCst));
        assert_eq!(1, election.stats().total_votes);
        assert_tally_consistent(&election);
    }

    #[test]
    fn concurrent_voters_lose_no_updates() {
        let election = Election::example(false);
        let sessions = (0..64)
            .map(|i| {
                registered(
                    &election,
                    NewUser {
                        name: format!("Voter {i}"),
                        email: format!("voter{i}@x.com"),
                        password: "pw".into(),
                    },
                )
            })
            .collect::<Vec<_>>();

        thread::scope(|scope| {
            for (i, session) in sessions.iter().enumerate() {
                let election = &election;
                scope.spawn(move || {
                    // Everyone tries twice; only the first can count.
                    for _ in 0..2 {
                        let request = VoteRequest::example(i as u32 % 3 + 1, 10.0);
                        let _ = election.cast_vote(Some(session), &request, Utc::now());
                    }
                });
            }
        });

        assert_eq!(64, election.stats().total_votes);
        assert_tally_consistent(&election);
        assert_eq!(22, election.results()[&CandidateId(1)].votes);
        assert_eq!(21, election.results()[&CandidateId(2)].votes);
        assert_eq!(21, election.results()[&CandidateId(3)].votes);
    }

    #[test]
    fn voting_patterns() {
        let election = Election::example(false);
        let alice = registered(&election, NewUser::example());
        let bob = registered(&election, NewUser::example2());

        election
            .cast_vote(Some(&alice), &VoteRequest::example(3, 10.0), Utc::now())
            .unwrap();
        let _ = election.cast_vote(Some(&bob), &VoteRequest::example(3, 0.5), Utc::now());

        let patterns = election.voting_patterns();
        assert_eq!(
            BTreeMap::from([(CandidateId(1), 0), (CandidateId(2), 0), (CandidateId(3), 1)]),
            patterns.candidate_distribution
        );
        assert_eq!(1, patterns.fraud_by_hour.values().sum::<u64>());
    }
}
