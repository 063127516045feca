use log::info;
use rand::{seq::SliceRandom, Rng};

use crate::error::Result;
use crate::model::{
    election::Election,
    user::{hash_password, User},
};

pub const ADMIN_EMAIL: &str = "admin@smartvote.com";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const VOTER_EMAIL: &str = "voter1@example.com";
pub const VOTER_PASSWORD: &str = "password123";

impl Election {
    /// Seed the demo accounts and `votes` votes for random candidates.
    /// Returns the number of votes recorded, which is zero with no candidates.
    pub fn seed_demo_data<R: Rng>(&self, votes: u32, rng: &mut R) -> Result<u32> {
        self.users().insert(User {
            email: ADMIN_EMAIL.to_string(),
            name: "Administrator".to_string(),
            password_hash: hash_password(ADMIN_PASSWORD),
            is_admin: true,
            voted: false,
        })?;
        self.users().insert(User {
            email: VOTER_EMAIL.to_string(),
            name: "Alice Johnson".to_string(),
            password_hash: hash_password(VOTER_PASSWORD),
            is_admin: false,
            voted: false,
        })?;

        let candidates = self.results().into_keys().collect::<Vec<_>>();
        let mut recorded = 0;
        for _ in 0..votes {
            if let Some(candidate) = candidates.choose(rng) {
                self.ballot().record_vote(*candidate)?;
                recorded += 1;
            }
        }

        info!("Seeded demo accounts and {recorded} demo votes");
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use crate::error::Error;
    use crate::model::{
        ballot::{MemoryBallotStore, StatsConfig},
        fraud::FraudHeuristic,
        user::MemoryIdentityStore,
    };

    use super::*;

    #[test]
    fn seeds_accounts_and_votes() {
        let election = Election::example(false);
        let recorded = election
            .seed_demo_data(50, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(50, recorded);

        let admin = election.authenticate(ADMIN_EMAIL, ADMIN_PASSWORD).unwrap();
        assert!(admin.is_admin);
        assert!(!admin.voted);
        let voter = election.authenticate(VOTER_EMAIL, VOTER_PASSWORD).unwrap();
        assert!(!voter.is_admin);
        assert!(!voter.voted);

        let stats = election.stats();
        assert_eq!(50, stats.total_votes);
        assert_eq!(0, stats.fraudulent_votes);
        assert_eq!(5, stats.voter_turnout);
        let sum: u64 = election.results().values().map(|c| c.votes).sum();
        assert_eq!(50, sum);
    }

    #[test]
    fn seeding_twice_fails() {
        let election = Election::example(false);
        let mut rng = StdRng::seed_from_u64(7);
        election.seed_demo_data(0, &mut rng).unwrap();
        assert!(matches!(
            election.seed_demo_data(0, &mut rng),
            Err(Error::DuplicateEmail)
        ));
    }

    #[test]
    fn no_candidates_records_no_votes() {
        let election = Election::new(
            Box::new(MemoryIdentityStore::new()),
            Box::new(MemoryBallotStore::new(Vec::new())),
            FraudHeuristic::example(false),
            StatsConfig::example(),
        );
        let recorded = election
            .seed_demo_data(50, &mut StdRng::seed_from_u64(7))
            .unwrap();

        assert_eq!(0, recorded);
        assert_eq!(0, election.stats().total_votes);
        assert!(election.authenticate(VOTER_EMAIL, VOTER_PASSWORD).is_ok());
    }
}
