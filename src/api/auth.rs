use log::info;
use rocket::{
    http::{Cookie, CookieJar},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::Result,
    model::{
        api::{Ack, AuthResponse, Credentials, SessionIdentity, UserStatus, SESSION_COOKIE},
        election::Election,
        user::NewUser,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![login, register, logout, user_status]
}

#[post("/api/login", data = "<credentials>", format = "json")]
pub async fn login(
    credentials: Json<Credentials>,
    cookies: &CookieJar<'_>,
    election: &State<Election>,
    config: &State<Config>,
) -> Result<Json<AuthResponse>> {
    let user = election.authenticate(&credentials.email, &credentials.password)?;
    let identity = SessionIdentity::from(&user);

    cookies.add(identity.clone().into_cookie(config)?);
    info!("{} logged in", identity.email);

    Ok(Json(AuthResponse::new(identity)))
}

#[post("/api/register", data = "<new_user>", format = "json")]
pub async fn register(
    new_user: Json<NewUser>,
    cookies: &CookieJar<'_>,
    election: &State<Election>,
    config: &State<Config>,
) -> Result<Json<AuthResponse>> {
    let user = election.register(new_user.0)?;
    let identity = SessionIdentity::from(&user);

    // Registration logs the new user straight in.
    cookies.add(identity.clone().into_cookie(config)?);

    Ok(Json(AuthResponse::new(identity)))
}

#[get("/api/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Json<Ack> {
    cookies.remove(Cookie::named(SESSION_COOKIE));
    Json(Ack { success: true })
}

#[get("/api/user-status")]
pub fn user_status(session: Option<SessionIdentity>) -> Json<UserStatus> {
    Json(UserStatus { user: session })
}
