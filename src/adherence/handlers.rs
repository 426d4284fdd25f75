use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use time::{Date, Duration, OffsetDateTime};
use tracing::{debug, instrument};

use super::dto::{AdherenceQuery, AdherenceResponse};
use super::engine::{compute, STREAK_CAP};
use super::period::{parse_date_param, Period};
use crate::{auth::AuthUser, error::AppResult, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/adherence", get(get_adherence))
}

/// GET /adherence?from=&to=&today=
///
/// Defaults: `today` is the current UTC date, the period is its month.
#[instrument(skip(state))]
pub async fn get_adherence(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Query(q): Query<AdherenceQuery>,
) -> AppResult<Json<AdherenceResponse>> {
    let reference = match q.today.as_deref() {
        Some(v) => parse_date_param("today", v)?,
        None => OffsetDateTime::now_utc().date(),
    };
    let period = Period::from_params(q.from.as_deref(), q.to.as_deref())?
        .unwrap_or_else(|| Period::month_of(reference));

    let mut records = Vec::new();
    for range in fetch_ranges(period, reference) {
        records.extend(state.intake.list(owner, Some(range)).await?);
    }
    debug!(%owner, count = records.len(), "computing adherence");

    Ok(Json(compute(&records, reference, period).into()))
}

/// The period plus the streak walk ending at `reference`, merged when they
/// overlap or touch. Disjoint ranges are fetched separately.
fn fetch_ranges(period: Period, reference: Date) -> Vec<Period> {
    let streak = Period {
        start: reference
            .checked_sub(Duration::days(i64::from(STREAK_CAP) - 1))
            .unwrap_or(Date::MIN),
        end: reference,
    };
    let touches = |a: Period, b: Period| a.start <= b.end.next_day().unwrap_or(Date::MAX);
    if touches(streak, period) && touches(period, streak) {
        vec![Period {
            start: period.start.min(streak.start),
            end: period.end.max(streak.end),
        }]
    } else {
        vec![period, streak]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use time::macros::date;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::app::build_app;
    use crate::medications::model::MedicationRecord;

    fn dose(owner: Uuid, day: Date, taken: bool) -> MedicationRecord {
        MedicationRecord {
            id: Uuid::new_v4(),
            user_id: owner,
            name: "Amlodipine".into(),
            dosage: "5mg".into(),
            scheduled_date: day,
            scheduled_time: "09:00".into(),
            taken,
            taken_at: taken.then(OffsetDateTime::now_utc),
            photo_ref: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    async fn get_json(state: &AppState, uri: &str, token: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let res = build_app(state.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn fetch_ranges_reach_back_a_full_streak() {
        let reference = date!(2026 - 10 - 03);
        let ranges = fetch_ranges(Period::month_of(reference), reference);
        assert_eq!(
            ranges,
            vec![Period {
                start: date!(2026 - 09 - 04),
                end: date!(2026 - 10 - 31),
            }]
        );
    }

    #[test]
    fn fetch_ranges_merge_adjacent_ranges() {
        let reference = date!(2026 - 10 - 30);
        let ranges = fetch_ranges(Period::month_of(date!(2026 - 09 - 10)), reference);
        assert_eq!(
            ranges,
            vec![Period {
                start: date!(2026 - 09 - 01),
                end: reference,
            }]
        );
    }

    #[test]
    fn fetch_ranges_keep_distant_period_separate() {
        let reference = date!(2026 - 10 - 19);
        let august = Period::month_of(date!(2026 - 08 - 10));
        let ranges = fetch_ranges(august, reference);
        assert_eq!(
            ranges,
            vec![
                august,
                Period {
                    start: date!(2026 - 09 - 20),
                    end: reference,
                },
            ]
        );
    }

    #[test]
    fn fetch_ranges_stop_at_earliest_date() {
        let reference = Date::MIN.next_day().unwrap();
        let ranges = fetch_ranges(Period::month_of(reference), reference);
        assert_eq!(ranges[0].start, Date::MIN);
    }

    #[tokio::test]
    async fn summary_for_month() {
        let owner = Uuid::new_v4();
        let state = AppState::fake_with(vec![
            dose(owner, date!(2026 - 09 - 30), true),
            dose(owner, date!(2026 - 10 - 01), true),
            dose(owner, date!(2026 - 10 - 02), true),
            dose(owner, date!(2026 - 10 - 02), false),
            dose(owner, date!(2026 - 10 - 03), true),
            dose(owner, date!(2026 - 10 - 04), true),
            dose(Uuid::new_v4(), date!(2026 - 10 - 02), true),
        ]);
        let token = state.token_for(owner);

        let (status, body) = get_json(&state, "/api/v1/adherence?today=2026-10-04", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["period"]["start"], "2026-10-01");
        assert_eq!(body["period"]["end"], "2026-10-31");
        assert_eq!(body["streak"], 2);
        // 3 of 4 elapsed days.
        assert_eq!(body["adherence_rate"], 75);
        assert_eq!(body["today_taken"], true);
        assert_eq!(body["missed_dates"], serde_json::json!(["2026-10-02"]));
        assert_eq!(body["days"].as_array().unwrap().len(), 31);
        assert_eq!(body["days"][1]["date"], "2026-10-02");
        assert_eq!(body["days"][1]["status"], "missed");
        assert_eq!(body["days"][10]["status"], "none");
    }

    #[tokio::test]
    async fn empty_history_is_all_zero() {
        let state = AppState::fake();
        let token = state.token_for(Uuid::new_v4());
        let (status, body) = get_json(
            &state,
            "/api/v1/adherence?today=2026-10-19&from=2026-10-01&to=2026-10-19",
            &token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["streak"], 0);
        assert_eq!(body["adherence_rate"], 0);
        assert_eq!(body["days"].as_array().unwrap().len(), 19);
    }

    #[tokio::test]
    async fn bad_dates_are_rejected() {
        let state = AppState::fake();
        let token = state.token_for(Uuid::new_v4());
        let (status, body) = get_json(&state, "/api/v1/adherence?today=19.10.2026", &token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");

        let (status, _) = get_json(
            &state,
            "/api/v1/adherence?from=2026-10-31&to=2026-10-01",
            &token,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn earliest_representable_today_is_served() {
        let state = AppState::fake();
        let token = state.token_for(Uuid::new_v4());
        let (status, body) = get_json(&state, "/api/v1/adherence?today=-9999-01-05", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["streak"], 0);
        assert_eq!(body["adherence_rate"], 0);
    }

    #[tokio::test]
    async fn unbounded_period_is_rejected() {
        let state = AppState::fake();
        let token = state.token_for(Uuid::new_v4());
        let (status, body) = get_json(
            &state,
            "/api/v1/adherence?today=2026-10-19&from=-9999-01-01&to=9999-12-31",
            &token,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }
}
