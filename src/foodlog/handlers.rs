use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{auth::jwt::AuthUser, catalog::repo::FoodItem, error::ApiError, state::AppState};

use super::dto::{
    CreateLogEntryRequest, DailySummaryResponse, ListLogsQuery, LogEntryResponse, SummaryQuery,
    UpdateLogEntryRequest, parse_log_date, parse_quantity,
};
use super::nutrition::{compute_consumed, sum_totals};
use super::repo::{self, LogEntryValues};

/// Summaries are cached per (user, date) with no invalidation on entry
/// writes; a write followed by a read inside this window can be stale.
pub const SUMMARY_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/foodtracker/logs", get(list_logs).post(create_log))
        .route(
            "/foodtracker/logs/:id",
            get(get_log)
                .put(update_log)
                .patch(update_log)
                .delete(delete_log),
        )
        .route("/foodtracker/summary", get(daily_summary))
}

/// Look up the referenced food item for a write; a dangling reference is a
/// field-level validation error rather than a 404.
async fn resolve_food_item(
    state: &AppState,
    food_item: Option<Uuid>,
) -> Result<Option<FoodItem>, ApiError> {
    match food_item {
        Some(id) => match FoodItem::find_by_id(&state.db, id).await? {
            Some(item) => Ok(Some(item)),
            None => Err(ApiError::validation("food_item", "Food item not found.")),
        },
        None => Ok(None),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateLogEntryRequest>,
) -> Result<(StatusCode, Json<LogEntryResponse>), ApiError> {
    let quantity = parse_quantity(payload.quantity.as_ref())?;

    let quantity_unit = payload
        .quantity_unit
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::validation("quantity_unit", "This field is required."))?
        .to_string();

    let client_food_name = payload
        .food_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::validation("food_name", "This field is required."))?
        .to_string();

    let food_item = resolve_food_item(&state, payload.food_item).await?;

    // The item's catalog name wins over whatever the client sent.
    let food_name = match &food_item {
        Some(item) => item.name.clone(),
        None => client_food_name,
    };

    let log_date = match payload.log_date.as_deref() {
        Some(raw) => parse_log_date(raw, "log_date")?,
        None => OffsetDateTime::now_utc().date(),
    };

    let consumed = compute_consumed(food_item.as_ref(), quantity);

    let entry = repo::insert(
        &state.db,
        user_id,
        &LogEntryValues {
            food_item_id: food_item.map(|i| i.id),
            food_name,
            quantity,
            quantity_unit,
            consumed,
            log_date,
        },
    )
    .await?;

    info!(entry_id = %entry.id, user_id = %user_id, "food log entry created");
    Ok((StatusCode::CREATED, Json(entry.into())))
}

#[instrument(skip(state))]
pub async fn list_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<ListLogsQuery>,
) -> Result<Json<Vec<LogEntryResponse>>, ApiError> {
    let log_date = match params.date.as_deref() {
        Some(raw) => Some(parse_log_date(raw, "date")?),
        None => None,
    };

    let entries = repo::list_for_user(&state.db, user_id, log_date).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LogEntryResponse>, ApiError> {
    let entry = repo::find_for_user(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food log entry not found.".into()))?;
    Ok(Json(entry.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLogEntryRequest>,
) -> Result<Json<LogEntryResponse>, ApiError> {
    if payload.user.is_some() {
        return Err(ApiError::validation("user", "User cannot be changed."));
    }

    let existing = repo::find_for_user(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food log entry not found.".into()))?;

    // Switching the referenced item re-derives name and nutrients from it;
    // otherwise the entry's current reference (if still alive) is used.
    let switching = payload.food_item.is_some();
    let food_item = if switching {
        resolve_food_item(&state, payload.food_item).await?
    } else {
        match existing.food_item_id {
            Some(item_id) => FoodItem::find_by_id(&state.db, item_id).await?,
            None => None,
        }
    };

    let quantity = match payload.quantity.as_ref() {
        Some(raw) => parse_quantity(Some(raw))?,
        None => existing.quantity,
    };

    let quantity_unit = match payload.quantity_unit.as_deref().map(str::trim) {
        Some(unit) if !unit.is_empty() => unit.to_string(),
        _ => existing.quantity_unit.clone(),
    };

    let food_name = if switching {
        match &food_item {
            Some(item) => item.name.clone(),
            None => existing.food_name.clone(),
        }
    } else {
        match payload.food_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => existing.food_name.clone(),
        }
    };

    let log_date = match payload.log_date.as_deref() {
        Some(raw) => parse_log_date(raw, "log_date")?,
        None => existing.log_date,
    };

    // Same computation as on create, over the effective item and quantity.
    let consumed = compute_consumed(food_item.as_ref(), quantity);

    let entry = repo::update(
        &state.db,
        user_id,
        id,
        &LogEntryValues {
            food_item_id: food_item.map(|i| i.id),
            food_name,
            quantity,
            quantity_unit,
            consumed,
            log_date,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Food log entry not found.".into()))?;

    info!(entry_id = %entry.id, user_id = %user_id, "food log entry updated");
    Ok(Json(entry.into()))
}

#[instrument(skip(state))]
pub async fn delete_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = repo::delete_for_user(&state.db, user_id, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Food log entry not found.".into()));
    }
    info!(entry_id = %id, user_id = %user_id, "food log entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn daily_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<SummaryQuery>,
) -> Result<Json<DailySummaryResponse>, ApiError> {
    let date = match params.date.as_deref() {
        Some(raw) => parse_log_date(raw, "date")?,
        None => OffsetDateTime::now_utc().date(),
    };

    let cache_key = (user_id, date);
    if let Some(cached) = state.summary_cache.get(&cache_key).await {
        return Ok(Json(cached));
    }

    let entries = repo::list_for_user(&state.db, user_id, Some(date)).await?;
    let consumed: Vec<_> = entries.iter().map(|e| e.consumed()).collect();
    let totals = sum_totals(consumed.iter());

    let response = DailySummaryResponse::new(
        date,
        totals,
        entries.into_iter().map(Into::into).collect(),
    );

    state
        .summary_cache
        .insert(cache_key, response.clone(), SUMMARY_CACHE_TTL)
        .await;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use serde_json::json;

    // These exercise the validation paths that run before any query; the
    // fake state's pool is lazy and never connects.

    #[tokio::test]
    async fn update_rejects_attempts_to_change_the_owner() {
        let state = AppState::fake();
        let payload = UpdateLogEntryRequest {
            food_item: None,
            food_name: None,
            quantity: None,
            quantity_unit: None,
            log_date: None,
            user: Some(json!("a2c5e9a0-0000-0000-0000-000000000000")),
        };
        let err = update_log(
            State(state),
            AuthUser(Uuid::new_v4()),
            Path(Uuid::new_v4()),
            Json(payload),
        )
        .await
        .unwrap_err();

        match err {
            ApiError::Validation { field, message } => {
                assert_eq!(field, "user");
                assert_eq!(message, "User cannot be changed.");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_rejects_calendar_invalid_date_filter() {
        let state = AppState::fake();
        let err = list_logs(
            State(state),
            AuthUser(Uuid::new_v4()),
            Query(ListLogsQuery {
                date: Some("2024-13-40".into()),
            }),
        )
        .await
        .unwrap_err();

        match err {
            ApiError::Validation { field, .. } => assert_eq!(field, "date"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn summary_rejects_invalid_date() {
        let state = AppState::fake();
        let err = daily_summary(
            State(state),
            AuthUser(Uuid::new_v4()),
            Query(SummaryQuery {
                date: Some("not-a-date".into()),
            }),
        )
        .await
        .unwrap_err();

        match err {
            ApiError::Validation { field, .. } => assert_eq!(field, "date"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_rejects_unparseable_quantity() {
        let state = AppState::fake();
        let payload = CreateLogEntryRequest {
            food_item: None,
            food_name: Some("Apple".into()),
            quantity: Some(json!("three hundred")),
            quantity_unit: Some("g".into()),
            log_date: None,
        };
        let err = create_log(State(state), AuthUser(Uuid::new_v4()), Json(payload))
            .await
            .unwrap_err();

        match err {
            ApiError::Validation { field, message } => {
                assert_eq!(field, "quantity");
                assert_eq!(message, "Quantity must be a valid number.");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
