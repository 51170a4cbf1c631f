use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{auth::jwt::AuthUser, error::ApiError, state::AppState};

use super::dto::{CreateFoodItemRequest, ImportFoodItemRequest, SearchQuery};
use super::openfoodfacts::{FoodCandidate, SEARCH_PAGE_SIZE};
use super::repo::{FoodItem, NewFoodItem};

/// Search results are cached per (user, query); the per-user keying wastes
/// cache space for identical queries but is kept as-is.
pub const SEARCH_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/foodtracker/search", get(search))
        .route(
            "/foodtracker/fooditems",
            get(list_food_items).post(create_food_item),
        )
        .route("/foodtracker/fooditems/import", post(import_food_item))
        .route(
            "/foodtracker/fooditems/:id",
            get(get_food_item).delete(delete_food_item),
        )
}

#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<FoodCandidate>>, ApiError> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::validation("query", "This field is required."))?
        .to_string();

    let cache_key = (user_id, query.clone());
    if let Some(cached) = state.search_cache.get(&cache_key).await {
        return Ok(Json(cached));
    }

    // Fail-open: an unreachable or misbehaving food database means an empty
    // result list, never an error to the caller.
    let mut results = match state.food_db.search(&query).await {
        Ok(foods) => foods,
        Err(e) => {
            warn!(error = %e, query = %query, "food database search failed");
            Vec::new()
        }
    };
    results.truncate(SEARCH_PAGE_SIZE);

    state
        .search_cache
        .insert(cache_key, results.clone(), SEARCH_CACHE_TTL)
        .await;
    Ok(Json(results))
}

#[instrument(skip(state))]
pub async fn list_food_items(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Vec<FoodItem>>, ApiError> {
    let items = FoodItem::list(&state.db).await?;
    Ok(Json(items))
}

#[instrument(skip(state, payload))]
pub async fn create_food_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateFoodItemRequest>,
) -> Result<(StatusCode, Json<FoodItem>), ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name", "This field is required."));
    }
    if FoodItem::name_exists(&state.db, name).await? {
        return Err(ApiError::validation(
            "name",
            "A food item with this name already exists.",
        ));
    }

    let item = FoodItem::create(
        &state.db,
        &NewFoodItem {
            name: name.to_string(),
            calories: payload.calories,
            protein: payload.protein,
            carbs: payload.carbs,
            fat: payload.fat,
            sugars: payload.sugars,
            fiber: payload.fiber,
            unit: payload.unit.unwrap_or_else(|| "g".to_string()),
            external_api_id: None,
            created_by: Some(user_id),
        },
    )
    .await?;

    info!(item_id = %item.id, name = %item.name, "food item created");
    Ok((StatusCode::CREATED, Json(item)))
}

/// Pull a single product from the external database and store it in the
/// catalog. Unlike search this backs a write, so failures surface.
#[instrument(skip(state, payload))]
pub async fn import_food_item(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Json(payload): Json<ImportFoodItemRequest>,
) -> Result<(StatusCode, Json<FoodItem>), ApiError> {
    let code = payload.code.trim();
    if code.is_empty() {
        return Err(ApiError::validation("code", "This field is required."));
    }

    let candidate = match state.food_db.product(code).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return Err(ApiError::validation("code", "Food product not found."));
        }
        Err(e) => {
            warn!(error = %e, code = %code, "food database product fetch failed");
            return Err(ApiError::validation("code", "Food product not found."));
        }
    };

    let item = FoodItem::upsert_by_name(
        &state.db,
        &NewFoodItem {
            name: candidate.name,
            calories: candidate.calories,
            protein: candidate.protein,
            carbs: candidate.carbs,
            fat: candidate.fat,
            sugars: candidate.sugars,
            fiber: candidate.fiber,
            unit: candidate.unit,
            external_api_id: candidate.external_api_id,
            created_by: None,
        },
    )
    .await?;

    info!(item_id = %item.id, name = %item.name, "food item imported");
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state))]
pub async fn get_food_item(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FoodItem>, ApiError> {
    let item = FoodItem::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food item not found.".into()))?;
    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn delete_food_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let item = FoodItem::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food item not found.".into()))?;

    if item.created_by != Some(user_id) {
        return Err(ApiError::Forbidden(
            "Only the creator can delete a custom food item.".into(),
        ));
    }

    FoodItem::delete(&state.db, id).await?;
    info!(item_id = %id, "food item deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::async_trait;

    use super::*;
    use crate::catalog::openfoodfacts::FoodDatabase;

    fn candidate(name: &str) -> FoodCandidate {
        FoodCandidate {
            name: name.to_string(),
            external_api_id: Some("123".into()),
            calories: Some(rust_decimal::Decimal::from(100)),
            protein: None,
            carbs: None,
            fat: None,
            sugars: None,
            fiber: None,
            unit: "g".into(),
        }
    }

    struct ErroringFoodDb;
    #[async_trait]
    impl FoodDatabase for ErroringFoodDb {
        async fn search(&self, _query: &str) -> anyhow::Result<Vec<FoodCandidate>> {
            anyhow::bail!("connection timed out")
        }
        async fn product(&self, _code: &str) -> anyhow::Result<Option<FoodCandidate>> {
            anyhow::bail!("connection timed out")
        }
    }

    struct CountingFoodDb {
        calls: AtomicUsize,
        results: Vec<FoodCandidate>,
    }
    #[async_trait]
    impl FoodDatabase for CountingFoodDb {
        async fn search(&self, _query: &str) -> anyhow::Result<Vec<FoodCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.clone())
        }
        async fn product(&self, _code: &str) -> anyhow::Result<Option<FoodCandidate>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn search_swallows_upstream_errors_and_returns_empty_list() {
        let mut state = AppState::fake();
        state.food_db = Arc::new(ErroringFoodDb);

        let Json(results) = search(
            State(state),
            AuthUser(Uuid::new_v4()),
            Query(SearchQuery {
                query: Some("xyz-nonexistent-query".into()),
            }),
        )
        .await
        .expect("search must not propagate upstream failures");

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_requires_a_query() {
        let state = AppState::fake();
        let err = search(
            State(state),
            AuthUser(Uuid::new_v4()),
            Query(SearchQuery { query: None }),
        )
        .await
        .unwrap_err();

        match err {
            ApiError::Validation { field, .. } => assert_eq!(field, "query"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_truncates_to_the_page_size() {
        let mut state = AppState::fake();
        let results = (0..30).map(|i| candidate(&format!("Food {i}"))).collect();
        state.food_db = Arc::new(CountingFoodDb {
            calls: AtomicUsize::new(0),
            results,
        });

        let Json(results) = search(
            State(state),
            AuthUser(Uuid::new_v4()),
            Query(SearchQuery {
                query: Some("food".into()),
            }),
        )
        .await
        .expect("search should succeed");

        assert_eq!(results.len(), SEARCH_PAGE_SIZE);
    }

    #[tokio::test]
    async fn repeated_searches_hit_the_per_user_cache() {
        let mut state = AppState::fake();
        let db = Arc::new(CountingFoodDb {
            calls: AtomicUsize::new(0),
            results: vec![candidate("Oats")],
        });
        state.food_db = db.clone();

        let user_id = Uuid::new_v4();
        for _ in 0..3 {
            let Json(results) = search(
                State(state.clone()),
                AuthUser(user_id),
                Query(SearchQuery {
                    query: Some("oats".into()),
                }),
            )
            .await
            .expect("search should succeed");
            assert_eq!(results.len(), 1);
        }
        assert_eq!(db.calls.load(Ordering::SeqCst), 1);

        // a different user misses the cache even for the same query
        let Json(_) = search(
            State(state),
            AuthUser(Uuid::new_v4()),
            Query(SearchQuery {
                query: Some("oats".into()),
            }),
        )
        .await
        .expect("search should succeed");
        assert_eq!(db.calls.load(Ordering::SeqCst), 2);
    }
}
