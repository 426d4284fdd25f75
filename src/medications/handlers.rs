use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{RangeQuery, ToggleRequest};
use super::model::{MedicationPatch, MedicationRecord, NewMedication};
use super::services::Evidence;
use crate::{
    adherence::period::Period,
    auth::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/medications", get(list_medications).post(create_medication))
        .route(
            "/medications/:id",
            patch(update_medication).delete(delete_medication),
        )
        .route("/medications/:id/taken", post(mark_taken))
        .route(
            "/medications/:id/taken/photo",
            post(mark_taken_with_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES)),
        )
        .route("/medications/:id/toggle", post(toggle_taken))
        .route("/medications/:id/photo", get(get_presigned_photo))
}

#[instrument(skip(state))]
pub async fn list_medications(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Query(q): Query<RangeQuery>,
) -> AppResult<Json<Vec<MedicationRecord>>> {
    let range = Period::from_params(q.from.as_deref(), q.to.as_deref())?;
    Ok(Json(state.intake.list(owner, range).await?))
}

#[instrument(skip(state))]
pub async fn create_medication(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Json(body): Json<NewMedication>,
) -> AppResult<impl IntoResponse> {
    let record = state.intake.insert(owner, body).await?;
    let location = format!("/api/v1/medications/{}", record.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(record),
    ))
}

#[instrument(skip(state))]
pub async fn update_medication(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<MedicationPatch>,
) -> AppResult<Json<MedicationRecord>> {
    Ok(Json(state.intake.update(owner, id, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_medication(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.intake.delete(owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn mark_taken(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MedicationRecord>> {
    Ok(Json(state.intake.mark_taken(owner, id, None).await?))
}

/// POST /medications/:id/taken/photo (multipart, field `photo`)
#[instrument(skip(state, mp))]
pub async fn mark_taken_with_photo(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> AppResult<Json<MedicationRecord>> {
    let mut evidence = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(e.to_string()))?
    {
        if field.name() != Some("photo") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(e.to_string()))?;
        evidence = Some(Evidence { body, content_type });
        break;
    }
    let evidence = evidence.ok_or_else(|| AppError::validation("photo is required"))?;
    if evidence.body.is_empty() {
        return Err(AppError::validation("photo is empty"));
    }

    Ok(Json(state.intake.mark_taken(owner, id, Some(evidence)).await?))
}

#[instrument(skip(state))]
pub async fn toggle_taken(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleRequest>,
) -> AppResult<Json<MedicationRecord>> {
    Ok(Json(state.intake.toggle_taken(owner, id, body.taken).await?))
}

/// 307 to a presigned URL of the evidence photo.
#[instrument(skip(state))]
pub async fn get_presigned_photo(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Redirect> {
    let ttl = state.config.storage.url_ttl_secs;
    let url = state.intake.photo_url(owner, id, ttl).await?;
    Ok(Redirect::temporary(&url))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::app::build_app;
    use crate::state::AppState;

    async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
        let res = build_app(state.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn json_req(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_req(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn create(state: &AppState, token: &str) -> Value {
        let (status, body) = send(
            state,
            json_req(
                "POST",
                "/api/v1/medications",
                token,
                json!({
                    "name": "Levothyroxine",
                    "dosage": "50mcg",
                    "scheduled_date": "2026-10-19",
                    "scheduled_time": "07:00"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    #[tokio::test]
    async fn requests_without_token_are_rejected() {
        let state = AppState::fake();
        let req = Request::builder()
            .uri("/api/v1/medications")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "auth_required");
    }

    #[tokio::test]
    async fn create_then_list() {
        let state = AppState::fake();
        let token = state.token_for(Uuid::new_v4());
        let created = create(&state, &token).await;
        assert_eq!(created["taken"], false);
        assert_eq!(created["scheduled_date"], "2026-10-19");

        let (status, body) = send(
            &state,
            empty_req("GET", "/api/v1/medications?from=2026-10-01&to=2026-10-31", &token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_with_missing_field_is_bad_request() {
        let state = AppState::fake();
        let token = state.token_for(Uuid::new_v4());
        let (status, body) = send(
            &state,
            json_req("POST", "/api/v1/medications", &token, json!({ "name": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn mark_and_toggle_flow() {
        let state = AppState::fake();
        let token = state.token_for(Uuid::new_v4());
        let id = create(&state, &token).await["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &state,
            empty_req("POST", &format!("/api/v1/medications/{id}/taken"), &token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["taken"], true);
        assert!(body["taken_at"].is_string());
        assert!(body["photo_ref"].is_null());

        let (status, body) = send(
            &state,
            json_req(
                "POST",
                &format!("/api/v1/medications/{id}/toggle"),
                &token,
                json!({ "taken": true }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["taken"], false);
        assert!(body["taken_at"].is_null());
    }

    #[tokio::test]
    async fn photo_evidence_upload_and_redirect() {
        let state = AppState::fake();
        let token = state.token_for(Uuid::new_v4());
        let id = create(&state, &token).await["id"].as_str().unwrap().to_string();

        let boundary = "XBOUNDARYX";
        let payload = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"photo\"; filename=\"pill.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             PNGDATA\r\n\
             --{boundary}--\r\n"
        );
        let req = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/medications/{id}/taken/photo"))
            .header("authorization", format!("Bearer {token}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(payload))
            .unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let photo_ref = body["photo_ref"].as_str().unwrap().to_string();
        assert!(photo_ref.ends_with(".png"));

        let res = build_app(state.clone())
            .oneshot(empty_req("GET", &format!("/api/v1/medications/{id}/photo"), &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = res.headers()["location"].to_str().unwrap();
        assert!(location.ends_with(&photo_ref));
    }

    #[tokio::test]
    async fn other_owners_records_are_not_found() {
        let state = AppState::fake();
        let owner_token = state.token_for(Uuid::new_v4());
        let intruder_token = state.token_for(Uuid::new_v4());
        let id = create(&state, &owner_token).await["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &state,
            empty_req("POST", &format!("/api/v1/medications/{id}/taken"), &intruder_token),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &state,
            empty_req("DELETE", &format!("/api/v1/medications/{id}"), &intruder_token),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &state,
            empty_req("DELETE", &format!("/api/v1/medications/{id}"), &owner_token),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
