use serde::{Deserialize, Serialize};

pub const RECORDS_ROUTE: &str = "/records";
pub const HEALTH_ROUTE: &str = "/healthz";

/// Query string of the PUT and DELETE record routes. `id` stays optional here so the
/// server can answer a missing id with its own error body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordIdQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
