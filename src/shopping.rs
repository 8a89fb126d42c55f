// 🛒 Shopping List - aggregate recipe amounts over planned days

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A planned, in-home day with a meal
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDay {
    pub meal_id: Uuid,
    pub batch_id: Option<Uuid>,
}

/// One recipe row joined with its ingredient
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeLine {
    pub meal_id: Uuid,
    pub ingredient_id: Uuid,
    pub name: String,
    pub unit: String,
    pub category: String,
    pub base_amount: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShoppingItem {
    pub ingredient_id: Uuid,
    pub name: String,
    pub amount: f64,
    pub unit: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShoppingList {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub items: Vec<ShoppingItem>,
}

/// Sum `base_amount * servings` per ingredient over every planned day.
///
/// With `scale_by_two_days` off, the days of one batch are cooked once and
/// counted once. Items come back sorted by (category, name).
pub fn build_shopping_list(
    days: &[PlannedDay],
    recipes: &[RecipeLine],
    servings: u32,
    scale_by_two_days: bool,
) -> Vec<ShoppingItem> {
    let mut by_meal: HashMap<Uuid, Vec<&RecipeLine>> = HashMap::new();
    for line in recipes {
        by_meal.entry(line.meal_id).or_default().push(line);
    }

    let mut seen_batches: HashSet<Uuid> = HashSet::new();
    let mut totals: HashMap<Uuid, ShoppingItem> = HashMap::new();

    for day in days {
        if !scale_by_two_days {
            if let Some(batch) = day.batch_id {
                if !seen_batches.insert(batch) {
                    continue;
                }
            }
        }

        let Some(lines) = by_meal.get(&day.meal_id) else {
            continue;
        };
        for line in lines {
            let item = totals.entry(line.ingredient_id).or_insert_with(|| ShoppingItem {
                ingredient_id: line.ingredient_id,
                name: line.name.clone(),
                amount: 0.0,
                unit: line.unit.clone(),
                category: line.category.clone(),
            });
            item.amount += line.base_amount * f64::from(servings);
        }
    }

    let mut items: Vec<ShoppingItem> = totals.into_values().collect();
    items.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(meal_id: Uuid, ingredient_id: Uuid, name: &str, category: &str, amount: f64) -> RecipeLine {
        RecipeLine {
            meal_id,
            ingredient_id,
            name: name.to_string(),
            unit: "g".to_string(),
            category: category.to_string(),
            base_amount: amount,
        }
    }

    #[test]
    fn test_amounts_scale_with_servings_and_days() {
        let stew = Uuid::new_v4();
        let soup = Uuid::new_v4();
        let onion = Uuid::new_v4();
        let beef = Uuid::new_v4();
        let recipes = vec![
            line(stew, onion, "Onion", "Vegetables", 100.0),
            line(stew, beef, "Beef", "Meat", 200.0),
            line(soup, onion, "Onion", "Vegetables", 50.0),
        ];
        let days = vec![
            PlannedDay { meal_id: stew, batch_id: None },
            PlannedDay { meal_id: soup, batch_id: None },
        ];

        let items = build_shopping_list(&days, &recipes, 2, true);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Beef", "Meat sorts before Vegetables");
        assert_eq!(items[0].amount, 400.0);
        assert_eq!(items[1].amount, 300.0);
    }

    #[test]
    fn test_two_day_batch_counted_once_without_scaling() {
        let stew = Uuid::new_v4();
        let onion = Uuid::new_v4();
        let batch = Some(Uuid::new_v4());
        let recipes = vec![line(stew, onion, "Onion", "Vegetables", 100.0)];
        let days = vec![
            PlannedDay { meal_id: stew, batch_id: batch },
            PlannedDay { meal_id: stew, batch_id: batch },
        ];

        assert_eq!(build_shopping_list(&days, &recipes, 1, true)[0].amount, 200.0);
        assert_eq!(build_shopping_list(&days, &recipes, 1, false)[0].amount, 100.0);
    }

    #[test]
    fn test_meals_without_recipes_are_ignored() {
        let days = vec![PlannedDay { meal_id: Uuid::new_v4(), batch_id: None }];
        assert!(build_shopping_list(&days, &[], 2, true).is_empty());
    }
}
