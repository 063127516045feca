#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Provider, Build, Rocket};

pub mod api;
pub mod config;
pub mod cors;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, ElectionFairing};
use cors::CorsFairing;
use logging::LoggerFairing;

/// Build the server from `Rocket.toml` and `ROCKET_*` environment variables.
pub fn build() -> Rocket<Build> {
    build_from(rocket::Config::figment())
}

/// Build the server from an arbitrary configuration provider.
pub fn build_from<T: Provider>(provider: T) -> Rocket<Build> {
    rocket::custom(provider)
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(ElectionFairing)
        .attach(CorsFairing)
        .attach(LoggerFairing)
}

/// Build a server around an existing election, bypassing the config fairings.
#[cfg(test)]
fn rocket_for_election(config: Config, election: model::election::Election) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .manage(config)
        .manage(election)
        .attach(CorsFairing)
        .attach(LoggerFairing)
}
