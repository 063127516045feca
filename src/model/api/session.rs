use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::model::user::User;

pub const SESSION_COOKIE: &str = "session";

/// Snapshot of a user taken when they logged in, carried by the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub voted: bool,
}

impl From<&User> for SessionIdentity {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
            is_admin: user.is_admin,
            voted: user.voted,
        }
    }
}

impl SessionIdentity {
    /// Serialize this identity into a signed session cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            identity: self,
            expire_at: Utc::now() + config.session_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(SESSION_COOKIE, token)
            .max_age(Duration::seconds(config.session_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .finish())
    }

    /// Deserialize an identity from a session cookie, checking its signature and expiry.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self> {
        let identity = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.identity)?;
        Ok(identity)
    }
}

/// Cookie claims: the identity itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    identity: SessionIdentity,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionIdentity {
    type Error = ();

    /// Get the caller's identity from their session cookie.
    /// Requests with a missing, expired or forged cookie are forwarded, so
    /// `Option<SessionIdentity>` yields `None` for them.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<Config>() else {
            return Outcome::Forward(());
        };
        let Some(cookie) = req.cookies().get(SESSION_COOKIE) else {
            return Outcome::Forward(());
        };
        match Self::from_cookie(cookie, config) {
            Ok(identity) => Outcome::Success(identity),
            Err(_) => Outcome::Forward(()),
        }
    }
}
