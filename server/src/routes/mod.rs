pub mod foodbanks;
pub mod org;
pub mod public;
pub mod requests;
pub mod users;

use aid::model::RequestItem;

use crate::{error::AppError, state::AppState};

/// Every submitted line must point at known reference data.
pub(crate) async fn ensure_food_items_exist(
    state: &AppState,
    items: &[RequestItem],
) -> Result<(), AppError> {
    for item in items {
        if state
            .store
            .food_item_by_id(item.food_item_id)
            .await?
            .is_none()
        {
            return Err(AppError::Validation(format!(
                "unknown food item {}",
                item.food_item_id
            )));
        }
    }
    Ok(())
}
