use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;

use super::nutrition::DailyTotals;
use super::repo::FoodLogEntry;

#[derive(Debug, Deserialize)]
pub struct CreateLogEntryRequest {
    pub food_item: Option<Uuid>,
    pub food_name: Option<String>,
    /// Parsed by hand so a malformed value fails naming the field instead
    /// of rejecting the whole body.
    pub quantity: Option<serde_json::Value>,
    pub quantity_unit: Option<String>,
    pub log_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLogEntryRequest {
    pub food_item: Option<Uuid>,
    pub food_name: Option<String>,
    pub quantity: Option<serde_json::Value>,
    pub quantity_unit: Option<String>,
    pub log_date: Option<String>,
    /// The owner is immutable; any attempt to send it is rejected.
    pub user: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListLogsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<String>,
}

/// Wire shape of a log entry, matching the field names clients know.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntryResponse {
    pub id: Uuid,
    pub user: Uuid,
    pub user_name: String,
    pub food_item: Option<Uuid>,
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

impl From<FoodLogEntry> for LogEntryResponse {
    fn from(e: FoodLogEntry) -> Self {
        Self {
            id: e.id,
            user: e.user_id,
            user_name: e.user_name,
            food_item: e.food_item_id,
            food_item_name: e.food_item_name,
            food_name: e.food_name,
            quantity: e.quantity,
            quantity_unit: e.quantity_unit,
            calories_consumed: e.calories_consumed,
            protein_consumed: e.protein_consumed,
            carbs_consumed: e.carbs_consumed,
            fat_consumed: e.fat_consumed,
            sugars_consumed: e.sugars_consumed,
            fiber_consumed: e.fiber_consumed,
            log_date: e.log_date,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummaryResponse {
    pub date: Date,
    pub total_calories: Decimal,
    pub total_protein: Decimal,
    pub total_carbs: Decimal,
    pub total_fat: Decimal,
    pub total_sugars: Decimal,
    pub total_fiber: Decimal,
    pub log_entries: Vec<LogEntryResponse>,
}

impl DailySummaryResponse {
    pub fn new(date: Date, totals: DailyTotals, log_entries: Vec<LogEntryResponse>) -> Self {
        Self {
            date,
            total_calories: totals.calories,
            total_protein: totals.protein,
            total_carbs: totals.carbs,
            total_fat: totals.fat,
            total_sugars: totals.sugars,
            total_fiber: totals.fiber,
            log_entries,
        }
    }
}

/// Strict `YYYY-MM-DD`; calendar-invalid dates fail too.
pub fn parse_log_date(raw: &str, field: &str) -> Result<Date, ApiError> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), &format)
        .map_err(|_| ApiError::validation(field, "Invalid date format. Use YYYY-MM-DD."))
}

/// Quantity arrives as a JSON number or string; anything else, or anything
/// unparseable, names the field in the error.
pub fn parse_quantity(raw: Option<&serde_json::Value>) -> Result<Decimal, ApiError> {
    let value = match raw {
        None | Some(serde_json::Value::Null) => {
            return Err(ApiError::validation("quantity", "This field is required."));
        }
        Some(v) => v,
    };
    let parsed = match value {
        serde_json::Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        serde_json::Value::String(s) => s.trim().parse::<Decimal>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ApiError::validation("quantity", "Quantity must be a valid number."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_valid_dates() {
        let date = parse_log_date("2024-02-29", "date").expect("leap day is valid");
        assert_eq!(date.to_string(), "2024-02-29");
    }

    #[test]
    fn rejects_calendar_invalid_dates() {
        assert!(parse_log_date("2024-13-40", "date").is_err());
        assert!(parse_log_date("2023-02-29", "date").is_err());
    }

    #[test]
    fn rejects_wrong_date_shapes() {
        assert!(parse_log_date("29-02-2024", "date").is_err());
        assert!(parse_log_date("2024/02/29", "date").is_err());
        assert!(parse_log_date("today", "date").is_err());
    }

    #[test]
    fn quantity_accepts_numbers_and_numeric_strings() {
        assert_eq!(
            parse_quantity(Some(&json!(150))).unwrap(),
            Decimal::from(150)
        );
        assert_eq!(
            parse_quantity(Some(&json!(12.5))).unwrap(),
            "12.5".parse::<Decimal>().unwrap()
        );
        assert_eq!(
            parse_quantity(Some(&json!("42.25"))).unwrap(),
            "42.25".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn quantity_rejects_garbage_naming_the_field() {
        let err = parse_quantity(Some(&json!("not-a-number"))).unwrap_err();
        assert!(err.to_string().contains("valid number"));
        assert!(parse_quantity(Some(&json!(["150"]))).is_err());
        assert!(parse_quantity(Some(&json!(true))).is_err());
    }

    #[test]
    fn quantity_is_required() {
        assert!(parse_quantity(None).is_err());
        assert!(parse_quantity(Some(&serde_json::Value::Null)).is_err());
    }
}
