use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use tracing::{info, warn};

use galeries_db::models::UserRow;
use galeries_db::users::{NewUser, SignupOutcome};
use galeries_types::api::{AuthResponse, Envelope, LoginRequest, SignupRequest, TokenResponse};

use crate::error::ApiError;
use crate::extract::{Body, CurrentUser};
use crate::state::{AppState, run};
use crate::tokens::ACCESS_TOKEN_MINUTES;
use crate::validation::{Validator, field_error};
use crate::views;

pub const REFRESH_COOKIE: &str = "refreshToken";
const REFRESH_COOKIE_PATH: &str = "/users";

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("stored hash is invalid: {}", e))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

fn refresh_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(state.secure_cookies)
        .build()
}

pub(crate) fn clear_refresh_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(REFRESH_COOKIE).path(REFRESH_COOKIE_PATH))
}

/// Issue both tokens for a freshly authenticated user.
fn authenticate(state: &AppState, jar: CookieJar, user: &UserRow) -> Result<(CookieJar, AuthResponse), ApiError> {
    let token = state.keys.issue_access(user)?;
    let refresh = state.keys.issue_refresh(user)?;

    let response = AuthResponse {
        user: views::me(user),
        token,
        expires_in: ACCESS_TOKEN_MINUTES * 60,
    };
    Ok((jar.add(refresh_cookie(state, refresh)), response))
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Body(req): Body<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .length("user_name", &req.user_name, 3, 30)
        .identifier("user_name", &req.user_name)
        .length("pseudonym", &req.pseudonym, 3, 50)
        .email("email", &req.email)
        .password("password", &req.password)
        .length("beta_key", &req.beta_key, 1, 100)
        .finish()?;

    let outcome = run(&state, move |db| {
        let new = NewUser {
            user_name: req.user_name.trim().to_string(),
            pseudonym: req.pseudonym.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            password_hash: hash_password(&req.password)?,
        };
        Ok(db.signup(&new, req.beta_key.trim(), Utc::now())?)
    })
    .await?;

    let user = match outcome {
        SignupOutcome::Created(user) => user,
        SignupOutcome::InvalidBetaKey => return Err(field_error("beta_key", "not valid")),
        SignupOutcome::UserNameTaken => return Err(field_error("user_name", "already taken")),
        SignupOutcome::EmailTaken => return Err(field_error("email", "already used")),
    };

    let (jar, response) = authenticate(&state, jar, &user)?;
    Ok((StatusCode::CREATED, jar, Json(Envelope::new("POST", response))))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Body(req): Body<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .length("user_name_or_email", &req.user_name_or_email, 1, 100)
        .length("password", &req.password, 1, 100)
        .finish()?;

    let user = run(&state, move |db| {
        let login = req.user_name_or_email.trim().to_string();
        let Some(user) = db.get_user_by_login(&login)? else {
            return Err(ApiError::unauthorized("user name or password not accepted"));
        };
        if !verify_password(&req.password, &user.password)? {
            warn!("Failed login for {}", user.id);
            return Err(ApiError::unauthorized("user name or password not accepted"));
        }
        if db.check_black_list(&user.id, Utc::now())? {
            return Err(ApiError::unauthorized("you are black listed"));
        }
        Ok(user)
    })
    .await?;

    info!("User {} logged in", user.id);
    let (jar, response) = authenticate(&state, jar, &user)?;
    Ok((jar, Json(Envelope::new("POST", response))))
}

/// Trade the refresh cookie for a new access token.
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse, ApiError> {
    let cookie = jar
        .get(REFRESH_COOKIE)
        .ok_or_else(|| ApiError::unauthorized("refresh token not found"))?;
    let claims = state
        .keys
        .verify_refresh(cookie.value())
        .map_err(|_| ApiError::unauthorized("refresh token not valid"))?;

    let user_id = claims.sub.to_string();
    let user = run(&state, move |db| {
        let user = db
            .get_user(&user_id)?
            .filter(|user| user.auth_token_version == claims.ver)
            .ok_or_else(|| ApiError::unauthorized("refresh token not valid"))?;
        if db.check_black_list(&user.id, Utc::now())? {
            return Err(ApiError::unauthorized("you are black listed"));
        }
        Ok(user)
    })
    .await?;

    let response = TokenResponse {
        token: state.keys.issue_access(&user)?,
        expires_in: ACCESS_TOKEN_MINUTES * 60,
    };
    Ok(Json(Envelope::new("GET", response)))
}

/// Revoke every refresh token of the caller and drop the cookie.
pub async fn logout(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    run(&state, move |db| Ok(db.bump_token_version(&user_id, Utc::now())?)).await?;

    info!("User {} logged out", me.id);
    Ok((clear_refresh_cookie(jar), Json(Envelope::new("POST", ()))))
}
