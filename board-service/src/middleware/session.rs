use crate::{services::ServiceError, startup::AppState};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

pub const SESSION_COOKIE: &str = "session";

/// The user behind a valid `session` cookie.
///
/// Missing, tampered and expired sessions are all rejected with 401.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: String,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| ServiceError::Authentication("Not signed in".to_string()))?;

        let claims = state.sessions.validate(&token)?;

        let user = SessionUser {
            user_id: claims.user_id().to_string(),
            username: claims.username,
        };

        let span = tracing::Span::current();
        span.record("user_id", user.user_id.as_str());
        span.record("username", user.username.as_str());

        Ok(user)
    }
}
