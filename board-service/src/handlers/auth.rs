use crate::{
    dtos::auth::{AuthResponse, LoginRequest, MessageResponse, SignupRequest},
    middleware::SESSION_COOKIE,
    startup::AppState,
    utils::ValidatedJson,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.signup(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User created successfully".to_string(),
            user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let (user, token) = state.auth.login(req).await?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(state.config.session.cookie_secure)
        .max_age(time::Duration::days(state.sessions.ttl_days()))
        .build();

    Ok((
        jar.add(cookie),
        Json(AuthResponse {
            message: "Logged in successfully".to_string(),
            user,
        }),
    ))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}
