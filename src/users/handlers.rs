use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use crate::{
    errors::AuthError,
    session::SessionCtx,
    state::AppState,
    users::{
        dto::{EmailQuery, PublicUser, SigninRequest, SignupRequest},
        password::hash_password,
        repo_types::UserPatch,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/signout", post(signout))
        .route("/auth/whoami", get(whoami))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/auth", get(find_all_users)).route(
        "/auth/:id",
        get(find_user).patch(update_user).delete(remove_user),
    )
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn parse_id(raw: &str) -> Result<i64, AuthError> {
    raw.parse::<i64>()
        .map_err(|_| AuthError::Validation("invalid user id".into()))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::Validation("invalid email".into()));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(AuthError::Validation("password too short".into()));
    }

    let user = state.auth.signup(&payload.email, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, session, payload))]
pub async fn signin(
    State(state): State<AppState>,
    mut session: SessionCtx,
    Json(mut payload): Json<SigninRequest>,
) -> Result<(HeaderMap, Json<PublicUser>), AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = state.auth.signin(&payload.email, &payload.password).await?;

    session.sign_in(user.id);
    let mut headers = HeaderMap::new();
    session.write_cookie(&mut headers);

    Ok((headers, Json(user.into())))
}

#[instrument(skip(session))]
pub async fn signout(mut session: SessionCtx) -> StatusCode {
    session.sign_out();
    StatusCode::NO_CONTENT
}

#[instrument(skip(state, session))]
pub async fn whoami(
    State(state): State<AppState>,
    session: SessionCtx,
) -> Result<Json<PublicUser>, AuthError> {
    let user_id = session.user_id().ok_or(AuthError::NotSignedIn)?;
    let user = state
        .users
        .find_one(user_id)
        .await?
        .ok_or(AuthError::NotSignedIn)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn find_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, AuthError> {
    let id = parse_id(&id)?;
    let user = state
        .users
        .find_one(id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn find_all_users(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<PublicUser>>, AuthError> {
    let users = state.users.find(&query.email).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, patch))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut patch): Json<UserPatch>,
) -> Result<Json<PublicUser>, AuthError> {
    let id = parse_id(&id)?;

    if let Some(email) = patch.email.as_mut() {
        *email = email.trim().to_lowercase();
        if !is_valid_email(email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::Validation("invalid email".into()));
        }
    }

    // patched passwords go through the KDF so every stored value stays
    // in salt.hash form
    if let Some(plain) = patch.password.take() {
        patch.password = Some(hash_password(&plain)?);
    }

    let user = state.users.update(id, patch).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn remove_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, AuthError> {
    let id = parse_id(&id)?;
    let user = state.users.remove(id).await?;
    Ok(Json(user.into()))
}
