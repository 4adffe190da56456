//! Axum route handlers for recruiter accounts.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_password, issue_token, verify_password, RecruiterIdentity};
use crate::errors::AppError;
use crate::models::recruiter::RecruiterRow;
use crate::state::AppState;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub company_name: String,
    pub recruiter_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), AppError> {
        let required = [
            ("companyName", &self.company_name),
            ("recruiterName", &self.recruiter_name),
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(AppError::Validation(format!("{field} is required")));
        }
        if !self.email.contains('@') {
            return Err(AppError::Validation("email is not valid".to_string()));
        }
        Ok(())
    }
}

/// POST /auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    req.validate()?;

    let password = req.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let id = Uuid::new_v4();
    let result = sqlx::query(
        r#"
        INSERT INTO recruiters (id, company_name, recruiter_name, username, email, password_hash)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(req.company_name.trim())
    .bind(req.recruiter_name.trim())
    .bind(req.username.trim())
    .bind(req.email.trim().to_lowercase())
    .bind(&password_hash)
    .execute(&state.db)
    .await;

    match result {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            return Err(AppError::Validation(
                "Username or email is already registered".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    info!("Registered recruiter {id}");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Recruiter registered successfully".to_string(),
        }),
    ))
}

/// POST /auth/login
///
/// Unknown email and wrong password produce the same 401.
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let recruiter = sqlx::query_as::<_, RecruiterRow>("SELECT * FROM recruiters WHERE email = $1")
        .bind(req.email.trim().to_lowercase())
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let hash = recruiter.password_hash.clone();
    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    if !matches {
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_token(recruiter.id, &state.config.jwt_secret)?;
    info!("Recruiter {} logged in", recruiter.id);
    Ok(Json(LoginResponse { token }))
}

/// GET /recruiter/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    identity: RecruiterIdentity,
) -> Result<Json<RecruiterRow>, AppError> {
    let recruiter = sqlx::query_as::<_, RecruiterRow>("SELECT * FROM recruiters WHERE id = $1")
        .bind(identity.recruiter_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Recruiter {} not found", identity.recruiter_id)))?;
    Ok(Json(recruiter))
}
