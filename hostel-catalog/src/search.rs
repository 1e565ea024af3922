use hostel_core::listing::HostelFilter;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::InputError;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Raw `GET /api/hostels` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostelSearch {
    pub search: Option<String>,
    pub location: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl HostelSearch {
    /// Public browse: only approved hostels, blank terms dropped, paging
    /// clamped.
    pub fn into_filter(self) -> Result<HostelFilter, InputError> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(InputError("min_price cannot exceed max_price".to_string()));
            }
        }
        if self.min_price.is_some_and(|p| p < Decimal::ZERO) || self.max_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(InputError("prices cannot be negative".to_string()));
        }

        Ok(HostelFilter {
            search: non_blank(self.search),
            location: non_blank(self.location),
            min_price: self.min_price,
            max_price: self.max_price,
            approved_only: true,
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
