use crate::{
    dtos::auth::{LoginRequest, SignupRequest},
    models::{SanitizedUser, User},
    services::{store::StoreError, EntityStore, ServiceError, SessionGate},
    utils::{hash_password, verify_password, Password, PasswordHashString},
};
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn EntityStore>,
    sessions: Arc<dyn SessionGate>,
}

impl AuthService {
    pub fn new(store: Arc<dyn EntityStore>, sessions: Arc<dyn SessionGate>) -> Self {
        Self { store, sessions }
    }

    pub async fn signup(&self, req: SignupRequest) -> Result<SanitizedUser, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let username = req.username.trim().to_string();
        let email = req.email.trim().to_lowercase();
        if username.is_empty() {
            return Err(ServiceError::Validation("Username is required".to_string()));
        }

        if self
            .store
            .find_user_by_login(&username, &email)
            .await?
            .is_some()
        {
            return Err(ServiceError::UserAlreadyExists);
        }

        let password_hash = hash_password(&Password::new(req.password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        let user = User::new(username, email, password_hash.into_string());

        // The unique indexes catch a signup racing past the lookup above.
        self.store.insert_user(&user).await.map_err(|e| match e {
            StoreError::Duplicate(_) => ServiceError::UserAlreadyExists,
            other => other.into(),
        })?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(user.sanitized())
    }

    /// Check credentials and mint a session token.
    pub async fn login(&self, req: LoginRequest) -> Result<(SanitizedUser, String), ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let email = req.email.trim().to_lowercase();
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        verify_password(
            &Password::new(req.password),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .map_err(|_| ServiceError::InvalidCredentials)?;

        let token = self.sessions.issue(&user)?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok((user.sanitized(), token))
    }

    pub fn sessions(&self) -> &Arc<dyn SessionGate> {
        &self.sessions
    }
}
