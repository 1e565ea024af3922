pub mod listing;
pub mod review;
pub mod search;
pub mod service;

pub use listing::{HostelInput, HostelUpdate, RoomInput, RoomUpdate};
pub use review::{summarize, ReviewInput};
pub use search::HostelSearch;
pub use service::{CatalogService, HostelDetails, HostelReviews};

/// Rejected listing or review input. Maps to a 400 at the API boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct InputError(pub String);

impl From<InputError> for hostel_core::CoreError {
    fn from(err: InputError) -> Self {
        hostel_core::CoreError::ValidationError(err.0)
    }
}

pub(crate) fn required(field: &str, value: Option<String>) -> Result<String, InputError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(InputError(format!("{} is required", field))),
    }
}
