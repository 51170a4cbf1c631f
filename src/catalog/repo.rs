use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Reference food item: nutrient values per 100g of the food.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FoodItem {
    pub id: Uuid,
    pub name: String,
    pub calories: Option<Decimal>,
    pub protein: Option<Decimal>,
    pub carbs: Option<Decimal>,
    pub fat: Option<Decimal>,
    pub sugars: Option<Decimal>,
    pub fiber: Option<Decimal>,
    pub unit: String,
    pub external_api_id: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Column-order twin of the insert/select statements below.
#[derive(Debug, Clone)]
pub struct NewFoodItem {
    pub name: String,
    pub calories: Option<Decimal>,
    pub protein: Option<Decimal>,
    pub carbs: Option<Decimal>,
    pub fat: Option<Decimal>,
    pub sugars: Option<Decimal>,
    pub fiber: Option<Decimal>,
    pub unit: String,
    pub external_api_id: Option<String>,
    pub created_by: Option<Uuid>,
}

impl FoodItem {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<FoodItem>> {
        let item = sqlx::query_as::<_, FoodItem>(
            r#"
            SELECT id, name, calories, protein, carbs, fat, sugars, fiber,
                   unit, external_api_id, created_by, created_at, updated_at
            FROM food_items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(item)
    }

    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<FoodItem>> {
        let items = sqlx::query_as::<_, FoodItem>(
            r#"
            SELECT id, name, calories, protein, carbs, fat, sugars, fiber,
                   unit, external_api_id, created_by, created_at, updated_at
            FROM food_items
            ORDER BY name
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(items)
    }

    pub async fn create(db: &PgPool, new: &NewFoodItem) -> anyhow::Result<FoodItem> {
        let item = sqlx::query_as::<_, FoodItem>(
            r#"
            INSERT INTO food_items
                (name, calories, protein, carbs, fat, sugars, fiber, unit, external_api_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, name, calories, protein, carbs, fat, sugars, fiber,
                      unit, external_api_id, created_by, created_at, updated_at
            "#,
        )
        .bind(&new.name)
        .bind(new.calories)
        .bind(new.protein)
        .bind(new.carbs)
        .bind(new.fat)
        .bind(new.sugars)
        .bind(new.fiber)
        .bind(&new.unit)
        .bind(&new.external_api_id)
        .bind(new.created_by)
        .fetch_one(db)
        .await?;
        Ok(item)
    }

    /// Import path: the catalog keys items by name, so a re-import of the
    /// same product refreshes its nutrient values in place.
    pub async fn upsert_by_name(db: &PgPool, new: &NewFoodItem) -> anyhow::Result<FoodItem> {
        let item = sqlx::query_as::<_, FoodItem>(
            r#"
            INSERT INTO food_items
                (name, calories, protein, carbs, fat, sugars, fiber, unit, external_api_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (name) DO UPDATE SET
                calories = EXCLUDED.calories,
                protein = EXCLUDED.protein,
                carbs = EXCLUDED.carbs,
                fat = EXCLUDED.fat,
                sugars = EXCLUDED.sugars,
                fiber = EXCLUDED.fiber,
                unit = EXCLUDED.unit,
                external_api_id = EXCLUDED.external_api_id,
                updated_at = now()
            RETURNING id, name, calories, protein, carbs, fat, sugars, fiber,
                      unit, external_api_id, created_by, created_at, updated_at
            "#,
        )
        .bind(&new.name)
        .bind(new.calories)
        .bind(new.protein)
        .bind(new.carbs)
        .bind(new.fat)
        .bind(new.sugars)
        .bind(new.fiber)
        .bind(&new.unit)
        .bind(&new.external_api_id)
        .bind(new.created_by)
        .fetch_one(db)
        .await?;
        Ok(item)
    }

    pub async fn name_exists(db: &PgPool, name: &str) -> anyhow::Result<bool> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM food_items WHERE name = $1")
            .bind(name)
            .fetch_optional(db)
            .await?;
        Ok(exists.is_some())
    }

    /// Referencing log entries keep their copied name and consumed values;
    /// the FK nulls their `food_item_id`.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM food_items WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
