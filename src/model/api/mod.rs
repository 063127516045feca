mod auth;
mod session;
mod vote;

pub use auth::{Ack, AuthResponse, Credentials, UserStatus};
pub use session::{SessionIdentity, SESSION_COOKIE};
pub use vote::{VoteRequest, VoteResponse, VotingPatterns};
