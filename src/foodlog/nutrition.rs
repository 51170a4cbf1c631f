use rust_decimal::{Decimal, RoundingStrategy};

use crate::catalog::repo::FoodItem;

/// Nutrient amounts attributed to one logged quantity, derived from the
/// food item's per-100g reference values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConsumedNutrients {
    pub calories: Decimal,
    pub protein: Decimal,
    pub carbs: Decimal,
    pub fat: Decimal,
    pub sugars: Decimal,
    pub fiber: Decimal,
}

/// Daily totals, each rounded half-up to two decimal places.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyTotals {
    pub calories: Decimal,
    pub protein: Decimal,
    pub carbs: Decimal,
    pub fat: Decimal,
    pub sugars: Decimal,
    pub fiber: Decimal,
}

/// Scale one per-100g reference value to the consumed quantity.
///
/// Divide by 100 first, then multiply; keep this order.
fn scale(per_100g: Option<Decimal>, quantity: Decimal) -> Decimal {
    match per_100g {
        Some(value) => (value / Decimal::ONE_HUNDRED) * quantity,
        None => Decimal::ZERO,
    }
}

/// Derive consumed nutrients for a quantity of a food item.
///
/// Without a food item every value is zero: client-supplied nutrient totals
/// are not trusted. Fields missing on the item also contribute zero.
pub fn compute_consumed(food_item: Option<&FoodItem>, quantity: Decimal) -> ConsumedNutrients {
    let Some(item) = food_item else {
        return ConsumedNutrients::default();
    };
    ConsumedNutrients {
        calories: scale(item.calories, quantity),
        protein: scale(item.protein, quantity),
        carbs: scale(item.carbs, quantity),
        fat: scale(item.fat, quantity),
        sugars: scale(item.sugars, quantity),
        fiber: scale(item.fiber, quantity),
    }
}

fn round_total(total: Decimal) -> Decimal {
    let mut rounded = total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Sum consumed nutrients across a day's entries.
///
/// An empty set sums to 0.00 for every field; rounding happens only here,
/// at the aggregate level.
pub fn sum_totals<'a, I>(entries: I) -> DailyTotals
where
    I: IntoIterator<Item = &'a ConsumedNutrients>,
{
    let mut calories = Decimal::ZERO;
    let mut protein = Decimal::ZERO;
    let mut carbs = Decimal::ZERO;
    let mut fat = Decimal::ZERO;
    let mut sugars = Decimal::ZERO;
    let mut fiber = Decimal::ZERO;

    for entry in entries {
        calories += entry.calories;
        protein += entry.protein;
        carbs += entry.carbs;
        fat += entry.fat;
        sugars += entry.sugars;
        fiber += entry.fiber;
    }

    DailyTotals {
        calories: round_total(calories),
        protein: round_total(protein),
        carbs: round_total(carbs),
        fat: round_total(fat),
        sugars: round_total(sugars),
        fiber: round_total(fiber),
    }
}
