use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::nutrition::ConsumedNutrients;

/// A food log entry as fetched for serialization: table columns plus the
/// joined owner and food-item names. `food_item_id` is a weak reference;
/// deleting the item nulls it while the copied name and consumed values
/// remain as the historical record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FoodLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub food_item_id: Option<Uuid>,
    pub food_item_name: Option<String>,
    pub food_name: String,
    pub quantity: Decimal,
    pub quantity_unit: String,
    pub calories_consumed: Decimal,
    pub protein_consumed: Decimal,
    pub carbs_consumed: Decimal,
    pub fat_consumed: Decimal,
    pub sugars_consumed: Decimal,
    pub fiber_consumed: Decimal,
    pub log_date: Date,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl FoodLogEntry {
    pub fn consumed(&self) -> ConsumedNutrients {
        ConsumedNutrients {
            calories: self.calories_consumed,
            protein: self.protein_consumed,
            carbs: self.carbs_consumed,
            fat: self.fat_consumed,
            sugars: self.sugars_consumed,
            fiber: self.fiber_consumed,
        }
    }
}

/// Values for an insert or full-row update; the handler derives them.
#[derive(Debug, Clone)]
pub struct LogEntryValues {
    pub food_item_id: Option<Uuid>,
    pub food_name: String,
    pub quantity: Decimal,
    pub quantity_unit: String,
    pub consumed: ConsumedNutrients,
    pub log_date: Date,
}

const SELECT_ENTRY: &str = r#"
    SELECT e.id, e.user_id, u.name AS user_name,
           e.food_item_id, f.name AS food_item_name,
           e.food_name, e.quantity, e.quantity_unit,
           e.calories_consumed, e.protein_consumed, e.carbs_consumed,
           e.fat_consumed, e.sugars_consumed, e.fiber_consumed,
           e.log_date, e.created_at, e.updated_at
    FROM food_log_entries e
    JOIN users u ON u.id = e.user_id
    LEFT JOIN food_items f ON f.id = e.food_item_id
"#;

/// List a user's entries, optionally restricted to one log date.
pub async fn list_for_user(
    db: &PgPool,
    user_id: Uuid,
    log_date: Option<Date>,
) -> anyhow::Result<Vec<FoodLogEntry>> {
    let entries = match log_date {
        Some(date) => {
            sqlx::query_as::<_, FoodLogEntry>(&format!(
                "{SELECT_ENTRY} WHERE e.user_id = $1 AND e.log_date = $2 \
                 ORDER BY e.log_date DESC, e.created_at DESC"
            ))
            .bind(user_id)
            .bind(date)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_as::<_, FoodLogEntry>(&format!(
                "{SELECT_ENTRY} WHERE e.user_id = $1 \
                 ORDER BY e.log_date DESC, e.created_at DESC"
            ))
            .bind(user_id)
            .fetch_all(db)
            .await?
        }
    };
    Ok(entries)
}

pub async fn find_for_user(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> anyhow::Result<Option<FoodLogEntry>> {
    let entry = sqlx::query_as::<_, FoodLogEntry>(&format!(
        "{SELECT_ENTRY} WHERE e.id = $1 AND e.user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(entry)
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    values: &LogEntryValues,
) -> anyhow::Result<FoodLogEntry> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO food_log_entries
            (user_id, food_item_id, food_name, quantity, quantity_unit,
             calories_consumed, protein_consumed, carbs_consumed,
             fat_consumed, sugars_consumed, fiber_consumed, log_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(values.food_item_id)
    .bind(&values.food_name)
    .bind(values.quantity)
    .bind(&values.quantity_unit)
    .bind(values.consumed.calories)
    .bind(values.consumed.protein)
    .bind(values.consumed.carbs)
    .bind(values.consumed.fat)
    .bind(values.consumed.sugars)
    .bind(values.consumed.fiber)
    .bind(values.log_date)
    .fetch_one(db)
    .await?;

    let entry = find_for_user(db, user_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("inserted food log entry {id} not found"))?;
    Ok(entry)
}

/// Full-row update; the owner never changes.
pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    values: &LogEntryValues,
) -> anyhow::Result<Option<FoodLogEntry>> {
    let updated: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE food_log_entries
        SET food_item_id = $3, food_name = $4, quantity = $5, quantity_unit = $6,
            calories_consumed = $7, protein_consumed = $8, carbs_consumed = $9,
            fat_consumed = $10, sugars_consumed = $11, fiber_consumed = $12,
            log_date = $13, updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(values.food_item_id)
    .bind(&values.food_name)
    .bind(values.quantity)
    .bind(&values.quantity_unit)
    .bind(values.consumed.calories)
    .bind(values.consumed.protein)
    .bind(values.consumed.carbs)
    .bind(values.consumed.fat)
    .bind(values.consumed.sugars)
    .bind(values.consumed.fiber)
    .bind(values.log_date)
    .fetch_optional(db)
    .await?;

    match updated {
        Some(id) => find_for_user(db, user_id, id).await,
        None => Ok(None),
    }
}

pub async fn delete_for_user(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM food_log_entries WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
