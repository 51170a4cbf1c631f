use std::time::Duration;

use axum::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FoodApiConfig;

/// A food record as returned by the external database: nutrient values per
/// 100 g, plus the product code for later detail lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodCandidate {
    pub name: String,
    pub external_api_id: Option<String>,
    pub calories: Option<Decimal>,
    pub protein: Option<Decimal>,
    pub carbs: Option<Decimal>,
    pub fat: Option<Decimal>,
    pub sugars: Option<Decimal>,
    pub fiber: Option<Decimal>,
    pub unit: String,
}

/// External food database seam. The search handler swallows errors
/// (fail-open); the import handler surfaces them.
#[async_trait]
pub trait FoodDatabase: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<FoodCandidate>>;
    async fn product(&self, code: &str) -> anyhow::Result<Option<FoodCandidate>>;
}

/// Open Food Facts client.
pub struct OpenFoodFacts {
    client: reqwest::Client,
    search_url: String,
    product_url: String,
}

pub const SEARCH_PAGE_SIZE: usize = 20;

impl OpenFoodFacts {
    pub fn new(config: &FoodApiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            search_url: config.search_url.clone(),
            product_url: config.product_url.clone(),
        })
    }
}

#[async_trait]
impl FoodDatabase for OpenFoodFacts {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<FoodCandidate>> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("search_terms", query),
                ("json", "1"),
                ("page_size", "20"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: SearchResponse = response.json().await?;
        let foods = map_products(body.products.unwrap_or_default());
        debug!(query = %query, results = foods.len(), "open food facts search");
        Ok(foods)
    }

    async fn product(&self, code: &str) -> anyhow::Result<Option<FoodCandidate>> {
        let url = format!("{}/{}.json", self.product_url, code);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: ProductResponse = response.json().await?;
        Ok(body.product.and_then(|p| p.into_candidate()))
    }
}

// --- wire types ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    products: Option<Vec<Product>>,
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    product: Option<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    product_name: Option<String>,
    product_name_en: Option<String>,
    generic_name: Option<String>,
    code: Option<String>,
    #[serde(default)]
    nutriments: Nutriments,
}

/// Per-100g nutrient block. Open Food Facts serves these keys as numbers or
/// strings depending on the product, hence `NutrimentValue`.
#[derive(Debug, Default, Deserialize)]
struct Nutriments {
    #[serde(rename = "energy-kcal_100g")]
    energy_kcal_100g: Option<NutrimentValue>,
    proteins_100g: Option<NutrimentValue>,
    carbohydrates_100g: Option<NutrimentValue>,
    fat_100g: Option<NutrimentValue>,
    sugars_100g: Option<NutrimentValue>,
    fiber_100g: Option<NutrimentValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NutrimentValue {
    Number(f64),
    Text(String),
}

impl NutrimentValue {
    fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => Decimal::from_f64_retain(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn decimal(value: &Option<NutrimentValue>) -> Option<Decimal> {
    value.as_ref().and_then(NutrimentValue::to_decimal)
}

impl Product {
    /// Products without any usable name are dropped.
    fn into_candidate(self) -> Option<FoodCandidate> {
        let name = [&self.product_name, &self.product_name_en, &self.generic_name]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())?
            .to_string();

        Some(FoodCandidate {
            name,
            external_api_id: self.code,
            calories: decimal(&self.nutriments.energy_kcal_100g),
            protein: decimal(&self.nutriments.proteins_100g),
            carbs: decimal(&self.nutriments.carbohydrates_100g),
            fat: decimal(&self.nutriments.fat_100g),
            sugars: decimal(&self.nutriments.sugars_100g),
            fiber: decimal(&self.nutriments.fiber_100g),
            // Open Food Facts reports nutrients per 100g
            unit: "g".to_string(),
        })
    }
}

fn map_products(products: Vec<Product>) -> Vec<FoodCandidate> {
    products
        .into_iter()
        .filter_map(Product::into_candidate)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_products_with_numeric_and_string_nutrients() {
        let raw = serde_json::json!({
            "products": [
                {
                    "product_name": "Oat flakes",
                    "code": "737628064502",
                    "nutriments": {
                        "energy-kcal_100g": 375.0,
                        "proteins_100g": "13.5",
                        "carbohydrates_100g": 67,
                        "fat_100g": 7.0
                    }
                }
            ]
        });
        let body: SearchResponse = serde_json::from_value(raw).unwrap();
        let foods = map_products(body.products.unwrap());

        assert_eq!(foods.len(), 1);
        let food = &foods[0];
        assert_eq!(food.name, "Oat flakes");
        assert_eq!(food.external_api_id.as_deref(), Some("737628064502"));
        assert_eq!(food.calories, Some(Decimal::from(375)));
        assert_eq!(food.protein, "13.5".parse().ok());
        assert_eq!(food.sugars, None);
        assert_eq!(food.unit, "g");
    }

    #[test]
    fn products_without_any_name_are_skipped() {
        let raw = serde_json::json!({
            "products": [
                { "code": "111", "nutriments": { "fat_100g": 1.0 } },
                { "product_name": "", "generic_name": "Fallback name", "code": "222" }
            ]
        });
        let body: SearchResponse = serde_json::from_value(raw).unwrap();
        let foods = map_products(body.products.unwrap());

        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].name, "Fallback name");
    }

    #[test]
    fn missing_products_key_yields_empty_list() {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(map_products(body.products.unwrap_or_default()).is_empty());
    }

    #[test]
    fn name_preference_order_is_product_name_first() {
        let raw = serde_json::json!({
            "products": [{
                "product_name": "Primary",
                "product_name_en": "English",
                "generic_name": "Generic",
                "code": "333"
            }]
        });
        let body: SearchResponse = serde_json::from_value(raw).unwrap();
        let foods = map_products(body.products.unwrap());
        assert_eq!(foods[0].name, "Primary");
    }

    #[test]
    fn unparseable_string_nutrients_become_none() {
        let value = NutrimentValue::Text("n/a".into());
        assert_eq!(value.to_decimal(), None);
    }
}
