//! Axum route handlers for the Review API.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::AppError;
use crate::extract::extract_text;
use crate::review::models::ReviewResult;
use crate::state::AppState;

const FILE_PART: &str = "file";
const VACANCY_PART: &str = "vacancyDescription";

/// The CV document as received in the multipart body.
struct UploadedFile {
    data: Bytes,
    content_type: Option<String>,
    file_name: Option<String>,
}

/// POST /api/v1/reviews
///
/// Multipart form: `file` (CV document, required) and `vacancyDescription`
/// (optional text). Returns the review verdict as JSON.
pub async fn handle_review(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ReviewResult>), AppError> {
    let review_id = Uuid::new_v4();
    let span = info_span!("review", %review_id, user = %principal.subject);

    run_review(state, principal, multipart)
        .instrument(span)
        .await
}

async fn run_review(
    state: AppState,
    principal: Principal,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ReviewResult>), AppError> {
    debug!("Caller authorities: {:?}", principal.roles);

    let (file, vacancy) = read_form(multipart).await?;
    let file = file.ok_or_else(|| AppError::Validation("file part is required".to_string()))?;

    let text = extract_text(
        file.data,
        file.content_type.as_deref(),
        file.file_name.as_deref(),
    )
    .await;

    if text.is_empty() {
        info!("No text could be extracted from the uploaded file");
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ReviewResult::unreadable_document()),
        ));
    }

    info!("File received. Length of text extracted: {}", text.chars().count());

    let result = state
        .reviewer
        .review(Some(&text), vacancy.as_deref())
        .await?;

    info!("Review completed (score: {})", result.score);
    Ok((StatusCode::OK, Json(result)))
}

async fn read_form(
    mut multipart: Multipart,
) -> Result<(Option<UploadedFile>, Option<String>), AppError> {
    let mut file = None;
    let mut vacancy = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_PART) => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read file part: {e}")))?;
                file = Some(UploadedFile {
                    data,
                    content_type,
                    file_name,
                });
            }
            Some(VACANCY_PART) => {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Could not read {VACANCY_PART}: {e}"))
                })?;
                vacancy = Some(text);
            }
            other => debug!("Ignoring unexpected form field {:?}", other),
        }
    }

    Ok((file, vacancy))
}
