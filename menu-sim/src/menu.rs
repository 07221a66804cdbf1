// Menu boundary validation and lookups

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{MenuItem, Price};

/// Lower bound of the change interval collaborators should accept.
pub const MIN_PERCENTAGE_CHANGE: f64 = -1.0;
/// Upper bound of the change interval collaborators should accept.
pub const MAX_PERCENTAGE_CHANGE: f64 = 10.0;

/// Check every item once at the boundary and return an owned copy.
///
/// Rejects empty ids and names, ids repeated within the call, and prices
/// that are negative or not finite. The first offending item is reported.
pub fn validate_menu(items: &[MenuItem]) -> Result<Vec<MenuItem>, ValidationError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        if item.id.trim().is_empty() {
            return Err(ValidationError::EmptyId { index });
        }
        if item.name.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                index,
                id: item.id.clone(),
            });
        }
        if !item.price.is_finite() || item.price < 0.0 {
            return Err(ValidationError::InvalidPrice {
                index,
                id: item.id.clone(),
                price: item.price,
            });
        }
        if !seen.insert(item.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                index,
                id: item.id.clone(),
            });
        }
    }

    Ok(items.to_vec())
}

/// Parse a JSON array of `{id, name, price}` objects and validate it.
///
/// Missing fields and non-numeric prices surface as
/// [`ValidationError::Malformed`].
pub fn menu_from_json(json: &str) -> Result<Vec<MenuItem>, ValidationError> {
    let items: Vec<MenuItem> =
        serde_json::from_str(json).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    validate_menu(&items)
}

pub fn find_item<'a>(menu: &'a [MenuItem], item_id: &str) -> Option<&'a MenuItem> {
    menu.iter().find(|item| item.id == item_id)
}

/// Round to currency precision, halves away from zero.
pub fn round_price(price: Price) -> Price {
    (price * 100.0).round() / 100.0
}

/// Price after applying a fractional change, rounded to cents.
pub fn apply_change(base_price: Price, percentage_change: f64) -> Price {
    round_price(base_price * (1.0 + percentage_change))
}

/// Whether a fractional price change lies in the open interval callers are
/// expected to accept (-100% exclusive up to +1000% exclusive).
pub fn is_reasonable_change(percentage_change: f64) -> bool {
    percentage_change > MIN_PERCENTAGE_CHANGE && percentage_change < MAX_PERCENTAGE_CHANGE
}
