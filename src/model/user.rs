use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// A registered user, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub voted: bool,
}

impl User {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        hash_password(password) == self.password_hash
    }
}

/// Raw registration details, received from a user. These are never stored
/// directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl From<NewUser> for User {
    /// Convert a [`NewUser`] into an ordinary voter by hashing the password.
    fn from(new_user: NewUser) -> Self {
        Self {
            password_hash: hash_password(&new_user.password),
            email: new_user.email,
            name: new_user.name,
            is_admin: false,
            voted: false,
        }
    }
}

/// Unsalted hex-encoded SHA-256 of the password.
// TODO: move to a salted KDF once users outlive a single process.
pub fn hash_password<T: AsRef<[u8]>>(password: T) -> String {
    HEXLOWER.encode(&Sha256::digest(password.as_ref()))
}

/// Storage for user records.
pub trait IdentityStore: Send + Sync {
    /// Insert a fully-formed user, failing if the email is taken.
    fn insert(&self, user: User) -> Result<User>;

    /// Create a new non-admin user that has not voted yet.
    fn register(&self, new_user: NewUser) -> Result<User> {
        self.insert(new_user.into())
    }

    /// Look up the user with the given email.
    fn find(&self, email: &str) -> Option<User>;

    /// Return the user iff the email exists and the password matches.
    fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        self.find(email)
            .filter(|user| user.verify_password(password))
            .ok_or(Error::InvalidCredentials)
    }

    /// Record that this user has cast their vote.
    fn mark_voted(&self, email: &str) -> Result<()>;
}

/// An [`IdentityStore`] that lives entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn insert(&self, user: User) -> Result<User> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&user.email) {
            return Err(Error::DuplicateEmail);
        }
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    fn find(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(email)
            .cloned()
    }

    fn mark_voted(&self, email: &str) -> Result<()> {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(email)
            .map(|user| user.voted = true)
            .ok_or(Error::NotAuthenticated)
    }
}
