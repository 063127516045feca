use std::collections::BTreeSet;
use std::num::NonZeroU64;
use std::path::PathBuf;

use chrono::Duration;
use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    fs::FileServer,
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    ballot::{CandidateId, CandidateSpec, StatsConfig},
    election::Election,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    // non-secrets
    session_ttl: u32,
    #[serde(default = "default_electorate_size")]
    electorate_size: NonZeroU64,
    #[serde(default = "default_avg_voting_time")]
    avg_voting_time: f64,
    #[serde(default = "default_fraud_min_duration")]
    fraud_min_duration: f64,
    #[serde(default = "default_fraud_probability")]
    fraud_probability: f64,
    #[serde(default = "default_seed_demo_data")]
    seed_demo_data: bool,
    #[serde(default = "default_demo_votes")]
    demo_votes: u32,
    #[serde(default = "default_candidates")]
    candidates: Vec<CandidateSpec>,
    #[serde(default)]
    static_dir: Option<PathBuf>,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of session cookies in seconds.
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl.into())
    }

    /// Secret key used to sign session JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Votes below this many seconds are always flagged.
    pub fn fraud_min_duration(&self) -> f64 {
        self.fraud_min_duration
    }

    /// Chance that any other vote is flagged.
    pub fn fraud_probability(&self) -> f64 {
        self.fraud_probability
    }

    /// Assumed electorate size and placeholder average voting time.
    pub fn stats(&self) -> StatsConfig {
        StatsConfig {
            electorate_size: self.electorate_size,
            avg_voting_time: self.avg_voting_time,
        }
    }

    /// Should the demo accounts and votes be created at startup?
    pub fn seed_demo_data(&self) -> bool {
        self.seed_demo_data
    }

    /// How many random votes to seed.
    pub fn demo_votes(&self) -> u32 {
        self.demo_votes
    }

    /// The candidates standing in the election.
    pub fn candidates(&self) -> &[CandidateSpec] {
        &self.candidates
    }

    /// Directory holding the front end, if it should be served.
    pub fn static_dir(&self) -> Option<&PathBuf> {
        self.static_dir.as_ref()
    }
}

fn default_electorate_size() -> NonZeroU64 {
    const ELECTORATE_SIZE: NonZeroU64 = match NonZeroU64::new(1000) {
        Some(size) => size,
        None => panic!("electorate size is non-zero"),
    };
    ELECTORATE_SIZE
}

fn default_avg_voting_time() -> f64 {
    6.7
}

fn default_fraud_min_duration() -> f64 {
    3.0
}

fn default_fraud_probability() -> f64 {
    0.05
}

fn default_seed_demo_data() -> bool {
    true
}

fn default_demo_votes() -> u32 {
    50
}

fn default_candidates() -> Vec<CandidateSpec> {
    [
        (1, "John Anderson", "Progressive Alliance Party"),
        (2, "Sarah Johnson", "National Unity Party"),
        (3, "Michael Chen", "Green Future Party"),
    ]
    .into_iter()
    .map(|(id, name, party)| CandidateSpec {
        id: CandidateId(id),
        name: name.to_string(),
        party: party.to_string(),
    })
    .collect()
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if !(0.0..=1.0).contains(&config.fraud_probability) {
            error!(
                "`fraud_probability` must lie in [0, 1], got {}",
                config.fraud_probability
            );
            return Err(rocket);
        }
        if config.candidates.is_empty() {
            error!("At least one candidate must be configured");
            return Err(rocket);
        }
        let mut ids = BTreeSet::new();
        if let Some(duplicate) = config.candidates.iter().find(|c| !ids.insert(c.id)) {
            error!("Candidate ID {} is configured more than once", duplicate.id);
            return Err(rocket);
        }

        // Serve the front end below every API route.
        if let Some(dir) = config.static_dir() {
            if !dir.is_dir() {
                error!("`static_dir` {} is not a directory", dir.display());
                return Err(rocket);
            }
            info!("Serving front end from {}", dir.display());
            rocket = rocket.mount("/", FileServer::from(dir).rank(20));
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// A fairing that builds the in-memory election from the config, seeds any
/// demo data, and places the [`Election`] into managed state.
/// Must be attached after [`ConfigFairing`].
pub struct ElectionFairing;

#[rocket::async_trait]
impl Fairing for ElectionFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = rocket.state::<Config>() else {
            error!("Application config must be loaded before the election");
            return Err(rocket);
        };

        let election = Election::from_config(config);
        if config.seed_demo_data() {
            if let Err(e) = election.seed_demo_data(config.demo_votes(), &mut rand::thread_rng())
            {
                error!("Failed to seed demo data: {e}");
                return Err(rocket);
            }
        }
        info!(
            "Election ready with {} candidates",
            config.candidates().len()
        );

        // Manage the state.
        rocket = rocket.manage(election);
        Ok(rocket)
    }
}
