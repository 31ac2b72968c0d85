pub mod auth;
pub mod boards;
pub mod cards;
pub mod lists;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Body of a move request. `from_index`, when present, must match the
/// child's current index.
#[derive(Debug, serde::Deserialize, validator::Validate)]
pub struct MoveRequest {
    #[validate(range(min = 0, message = "to_index must not be negative"))]
    pub to_index: i64,

    #[validate(range(min = 0, message = "from_index must not be negative"))]
    pub from_index: Option<i64>,
}
