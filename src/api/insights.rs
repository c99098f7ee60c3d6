// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Meeting insight upload.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{auth::Auth, error::ApiError, state::AppState};

/// Multipart field carrying the audio.
pub const FILE_FIELD: &str = "file";

/// Used when the upload part has no content type.
pub const DEFAULT_AUDIO_MIME: &str = "audio/wav";

#[derive(Debug, Serialize, ToSchema)]
pub struct InsightsResponse {
    /// Markdown text produced by the insight service
    pub insights: String,
}

/// OpenAPI description of the multipart form.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadAudioForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// Upload a meeting recording and get summary, action items and decisions.
#[utoipa::path(
    post,
    path = "/api/insights/upload-audio",
    tag = "Insights",
    security(("bearer" = [])),
    request_body(content = UploadAudioForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Generated insights", body = InsightsResponse),
        (status = 400, description = "Missing or empty file"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "ROLE_USER or ROLE_ADMIN required"),
        (status = 413, description = "Upload too large"),
        (status = 502, description = "Insight service failed"),
        (status = 503, description = "Insight service not configured")
    )
)]
pub async fn upload_audio(
    Auth(user): Auth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<InsightsResponse>, ApiError> {
    let client = state.insights.clone().ok_or_else(ApiError::insights_unavailable)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), "invalid_multipart", e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let mime_type = field
            .content_type()
            .unwrap_or(DEFAULT_AUDIO_MIME)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), "invalid_multipart", e.body_text()))?;
        upload = Some((bytes, mime_type));
        break;
    }

    let (audio, mime_type) =
        upload.ok_or_else(|| ApiError::bad_request("multipart field 'file' is required"))?;
    tracing::info!(
        subject = %user.subject,
        bytes = audio.len(),
        mime_type = %mime_type,
        "meeting audio received"
    );

    let insights = client.generate_insights(&audio, &mime_type).await?;
    Ok(Json(InsightsResponse { insights }))
}
