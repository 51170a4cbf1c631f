use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: Option<String>,
}

/// Manual catalog entry. Nutrients are per 100g of the food.
#[derive(Debug, Deserialize)]
pub struct CreateFoodItemRequest {
    pub name: String,
    pub calories: Option<Decimal>,
    pub protein: Option<Decimal>,
    pub carbs: Option<Decimal>,
    pub fat: Option<Decimal>,
    pub sugars: Option<Decimal>,
    pub fiber: Option<Decimal>,
    pub unit: Option<String>,
}

/// Import a product from the external database by its product code.
#[derive(Debug, Deserialize)]
pub struct ImportFoodItemRequest {
    pub code: String,
}
