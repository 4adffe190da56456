use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::resume::ResumeRecordRow;
use crate::screening::batch::BatchItem;

/// Saves every analyzed item of a batch for `recruiter_id`. Failures are
/// logged per row and never surface to the caller. Returns the rows saved.
pub async fn save_batch_records(pool: &PgPool, recruiter_id: Uuid, items: &[BatchItem]) -> usize {
    let mut saved = 0;
    for item in items {
        let BatchItem::Analyzed {
            filename,
            analysis,
            text,
        } = item
        else {
            continue;
        };

        let result = sqlx::query(
            r#"
            INSERT INTO resume_records
                (id, recruiter_id, filename, text, match_percentage, missing_skills, is_shortlisted)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recruiter_id)
        .bind(filename)
        .bind(text)
        .bind(i32::from(analysis.match_percentage()))
        .bind(&analysis.weaknesses)
        .bind(analysis.is_shortlisted())
        .execute(pool)
        .await;

        match result {
            Ok(_) => saved += 1,
            Err(e) => warn!("Failed to save resume record for {filename}: {e}"),
        }
    }

    info!("Saved {saved} resume records for recruiter {recruiter_id}");
    saved
}

/// Shortlisted records of one recruiter, newest first.
pub async fn shortlisted_records(pool: &PgPool, recruiter_id: Uuid) -> Result<Vec<ResumeRecordRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRecordRow>(
        r#"
        SELECT * FROM resume_records
        WHERE recruiter_id = $1 AND is_shortlisted = true
        ORDER BY created_at DESC
        "#,
    )
    .bind(recruiter_id)
    .fetch_all(pool)
    .await
}
