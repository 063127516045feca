pub mod api;
pub mod ballot;
pub mod demo;
pub mod election;
pub mod fraud;
pub mod user;
