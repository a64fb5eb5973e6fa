//! Pagination query parameters and the paginated response wrapper

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Max page size accepted by list endpoints
pub const MAX_LIMIT: usize = 100;

/// Parse a number from a query string; an empty value yields `None`
fn parse_optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    use serde::de::Error;
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if !s.is_empty() => s.parse().map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

/// `limit`, falling back to the default page size when empty
fn deserialize_limit<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_optional(deserializer)?.unwrap_or_else(default_limit))
}

/// `offset`, falling back to 0 when empty
fn deserialize_offset<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_optional(deserializer)?.unwrap_or_default())
}

/// Pagination parameters for list endpoints
#[derive(Debug, Deserialize, Clone)]
pub struct PaginationParams {
    /// Max items to return (default: 50, max: 100)
    #[serde(default = "default_limit", deserialize_with = "deserialize_limit")]
    pub limit: usize,
    /// Items to skip (default: 0)
    #[serde(default, deserialize_with = "deserialize_offset")]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl PaginationParams {
    /// Validate pagination parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.limit > MAX_LIMIT {
            return Err(format!("limit cannot exceed {}", MAX_LIMIT));
        }
        Ok(())
    }

    /// Get validated limit (capped at 100)
    pub fn validated_limit(&self) -> usize {
        self.limit.min(MAX_LIMIT)
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total count of items matching the filter
    pub total: usize,
    /// Maximum items per page (as requested)
    pub limit: usize,
    /// Number of items skipped
    pub offset: usize,
    /// Whether there are more items after this page
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: usize, limit: usize, offset: usize) -> Self {
        Self {
            has_more: offset + items.len() < total,
            items,
            total,
            limit,
            offset,
        }
    }
}
