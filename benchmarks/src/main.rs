use anyhow::{anyhow, bail};
use clap::Parser;
use rand::Rng;
use reqwest::{blocking::Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::ops::AddAssign;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
struct Args {
    /// Base URL of the server under test.
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    url: String,

    /// How many threads to use. Defaults to the number of logical CPUs.
    #[arg(long, default_value_t = num_cpus::get())]
    threads: usize,

    /// How many voters each thread registers.
    #[arg(long, default_value_t = 50)]
    voters: usize,

    /// Cast every vote with the same, fast, duration so it is always flagged.
    #[arg(long)]
    too_fast: bool,
}

#[derive(Debug, Deserialize)]
struct CandidateResult {
    votes: u64,
}

#[derive(Debug, Deserialize)]
struct Stats {
    total_votes: u64,
    fraudulent_votes: u64,
}

/// What one thread saw.
#[derive(Debug, Default)]
struct Tally {
    accepted: u64,
    flagged: u64,
    register_time: Duration,
    vote_time: Duration,
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Self) {
        self.accepted += rhs.accepted;
        self.flagged += rhs.flagged;
        self.register_time += rhs.register_time;
        self.vote_time += rhs.vote_time;
    }
}

/// Construct a URL under the API root.
macro_rules! url {
    ($base:expr, $path:expr) => {
        format!("{}/api/{}", $base.trim_end_matches('/'), $path)
    };
}

fn results(client: &Client, base: &str) -> anyhow::Result<HashMap<String, CandidateResult>> {
    Ok(client.get(url!(base, "results")).send()?.json()?)
}

fn stats(client: &Client, base: &str) -> anyhow::Result<Stats> {
    Ok(client.get(url!(base, "stats")).send()?.json()?)
}

/// Register `voters` fresh users one after another, each casting a vote and
/// then trying (and failing) to vote again.
fn run_thread(
    base: &str,
    thread_id: usize,
    voters: usize,
    candidates: &[u32],
    too_fast: bool,
) -> anyhow::Result<Tally> {
    let mut tally = Tally::default();
    let mut rng = rand::thread_rng();
    let run_id: u32 = rng.gen();

    for i in 0..voters {
        // Each voter gets their own cookie jar.
        let client = Client::builder().cookie_store(true).build()?;

        let start = Instant::now();
        let response = client
            .post(url!(base, "register"))
            .json(&json!({
                "name": format!("Bench Voter {thread_id}-{i}"),
                "email": format!("bench-{run_id}-{thread_id}-{i}@example.com"),
                "password": "benchmark",
            }))
            .send()?;
        tally.register_time += start.elapsed();
        if !response.status().is_success() {
            bail!("Registration failed: {}", response.status());
        }

        let candidate = candidates[rng.gen_range(0..candidates.len())];
        let voting_duration = if too_fast { 0.5 } else { rng.gen_range(3.0..60.0) };
        let start = Instant::now();
        let response = client
            .post(url!(base, "vote"))
            .json(&json!({
                "candidate_id": candidate,
                "voting_duration": voting_duration,
            }))
            .send()?;
        tally.vote_time += start.elapsed();
        match response.status() {
            StatusCode::OK => tally.accepted += 1,
            StatusCode::BAD_REQUEST => {
                tally.flagged += 1;
                continue;
            }
            status => bail!("Unexpected vote status: {status}"),
        }

        // A second vote must always be refused.
        let response = client
            .post(url!(base, "vote"))
            .json(&json!({
                "candidate_id": candidate,
                "voting_duration": 30.0,
            }))
            .send()?;
        if response.status() != StatusCode::BAD_REQUEST {
            bail!("Voter {thread_id}-{i} voted twice: {}", response.status());
        }
    }

    Ok(tally)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = Client::new();

    let before = stats(&client, &args.url)?;
    let mut candidates = results(&client, &args.url)?
        .into_keys()
        .map(|id| id.parse::<u32>())
        .collect::<Result<Vec<_>, _>>()?;
    candidates.sort_unstable();
    if candidates.is_empty() {
        bail!("Server has no candidates");
    }
    println!(
        "Starting: {} threads x {} voters against {}",
        args.threads, args.voters, args.url
    );

    let start = Instant::now();
    let tally = thread::scope(|scope| {
        let handles = (0..args.threads)
            .map(|thread_id| {
                let (base, candidates) = (&args.url, &candidates);
                scope.spawn(move || {
                    run_thread(base, thread_id, args.voters, candidates, args.too_fast)
                })
            })
            .collect::<Vec<_>>();

        let mut total = Tally::default();
        for handle in handles {
            total += handle
                .join()
                .map_err(|_| anyhow!("Benchmark thread panicked"))??;
        }
        Ok::<_, anyhow::Error>(total)
    })?;
    let elapsed = start.elapsed();

    // Check the server's tallies against what we saw.
    let after = stats(&client, &args.url)?;
    let summed: u64 = results(&client, &args.url)?.values().map(|c| c.votes).sum();
    if summed != after.total_votes {
        bail!(
            "Candidate votes sum to {summed} but total_votes is {}",
            after.total_votes
        );
    }
    // Other clients may be voting too, so only a lower bound is certain.
    if after.total_votes < before.total_votes + tally.accepted {
        bail!(
            "Lost updates: expected at least {} votes, server has {}",
            before.total_votes + tally.accepted,
            after.total_votes
        );
    }
    if after.fraudulent_votes < before.fraudulent_votes + tally.flagged {
        bail!("Lost fraud counts");
    }

    let attempts = (args.threads * args.voters).max(1) as u32;
    println!("Finished in {:.2?}", elapsed);
    println!("  accepted: {}", tally.accepted);
    println!("  flagged:  {}", tally.flagged);
    println!("  mean register latency: {:.2?}", tally.register_time / attempts);
    println!("  mean vote latency:     {:.2?}", tally.vote_time / attempts);
    println!("Tally invariants hold");
    Ok(())
}
