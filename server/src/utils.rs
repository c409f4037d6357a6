use std::collections::HashSet;

use serde::Deserialize;

use aid::model::RequestItem;

use crate::error::AppError;

/// Submission forms cap each line at a few units so one request cannot drain
/// a bank.
pub const MAX_ITEM_QUANTITY: i64 = 3;

/// Line item as the client sends it. Quantity rides as a signed integer so a
/// negative value reaches the validator instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemPayload {
    pub food_item_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

pub fn validate_items(items: &[ItemPayload]) -> Result<Vec<RequestItem>, AppError> {
    if items.is_empty() {
        return Err(AppError::Validation(
            "at least one food item is required".into(),
        ));
    }

    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity < 1 || item.quantity > MAX_ITEM_QUANTITY {
            return Err(AppError::Validation(format!(
                "item quantity must be between 1 and {MAX_ITEM_QUANTITY}"
            )));
        }
        if !seen.insert(item.food_item_id) {
            return Err(AppError::Validation(
                "duplicate food item in submission".into(),
            ));
        }
        validated.push(RequestItem {
            food_item_id: item.food_item_id,
            quantity: item.quantity as u32,
        });
    }
    Ok(validated)
}

/// Trimmed, non-empty, or a `ValidationError` naming the field.
pub fn require_field(value: &str, name: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{name} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional field, folding whitespace-only input to `None`.
pub fn optional_field(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(food_item_id: i64, quantity: i64) -> ItemPayload {
        ItemPayload {
            food_item_id,
            quantity,
        }
    }

    #[test]
    fn accepts_quantities_inside_the_cap() {
        let validated = validate_items(&[item(1, 1), item(2, 3)]).unwrap();
        assert_eq!(validated.len(), 2);
        assert_eq!(validated[1].quantity, 3);
    }

    #[test]
    fn rejects_empty_zero_negative_and_oversized() {
        assert!(validate_items(&[]).is_err());
        assert!(validate_items(&[item(1, 0)]).is_err());
        assert!(validate_items(&[item(1, -2)]).is_err());
        assert!(validate_items(&[item(1, MAX_ITEM_QUANTITY + 1)]).is_err());
    }

    #[test]
    fn rejects_duplicate_food_items() {
        assert!(validate_items(&[item(1, 1), item(1, 2)]).is_err());
    }

    #[test]
    fn required_and_optional_fields_trim() {
        assert_eq!(require_field("  Petaling  ", "district").unwrap(), "Petaling");
        assert!(require_field("   ", "district").is_err());
        assert_eq!(optional_field(Some("  012-345 ".into())), Some("012-345".into()));
        assert_eq!(optional_field(Some("   ".into())), None);
        assert_eq!(optional_field(None), None);
    }
}
