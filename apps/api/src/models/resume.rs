use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Long-term record of one analyzed resume.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecordRow {
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub filename: String,
    pub text: String,
    pub match_percentage: i32,
    pub missing_skills: Vec<String>,
    pub is_shortlisted: bool,
    pub created_at: DateTime<Utc>,
}
