pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::auth::handlers as auth;
use crate::intake::handlers::{self as intake, MAX_BATCH_FILES, MAX_FILE_BYTES};
use crate::screening::handlers as screening;
use crate::state::AppState;

/// Room for a full batch of maximum-size files plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_BATCH_FILES * MAX_FILE_BYTES + 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Accounts
        .route("/auth/register", post(auth::handle_register))
        .route("/auth/login", post(auth::handle_login))
        // Intake
        .route("/resumes", post(intake::handle_upload))
        .route("/resumes/batch", post(intake::handle_batch_upload))
        // Single-resume analyses
        .route("/analysis/match", post(analysis::handle_match))
        .route("/analysis/summary", post(analysis::handle_summary))
        .route("/analysis/skills", post(analysis::handle_skills))
        .route("/analysis/keywords", post(analysis::handle_keywords))
        // Recruiter screening
        .route("/recruiter/dashboard", get(auth::handle_dashboard))
        .route("/recruiter/analyze-batch", post(screening::handle_analyze_batch))
        .route("/recruiter/screen", post(screening::handle_screen))
        .route("/recruiter/shortlist", get(screening::handle_get_shortlist))
        .route(
            "/recruiter/shortlisted-resumes",
            get(screening::handle_shortlisted_resumes),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(state)
}
