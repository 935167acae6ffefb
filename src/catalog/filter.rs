//! Pattern matching for catalog filtering
//!
//! Filters are exact strings unless they contain glob characters
//! (`*`, `?`, `[`), in which case they are matched as glob patterns.

use glob::Pattern;

use super::CatalogError;

/// Check if a filter string contains glob pattern characters
pub fn is_glob_pattern(filter: &str) -> bool {
    filter.contains('*') || filter.contains('?') || filter.contains('[')
}

/// Match a value against one filter, exact or glob
pub fn matches_filter(value: &str, filter: &str) -> bool {
    if is_glob_pattern(filter) {
        match Pattern::new(filter) {
            Ok(pattern) => pattern.matches(value),
            // Invalid patterns are rejected up front; compare literally
            Err(_) => value == filter,
        }
    } else {
        value == filter
    }
}

/// True when no filters are given, or any value matches any filter
pub fn any_matches<'a, I>(values: I, filters: &[String]) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    if filters.is_empty() {
        return true;
    }

    values
        .into_iter()
        .any(|value| filters.iter().any(|filter| matches_filter(value, filter)))
}

/// Validate that all glob filters are syntactically correct
pub fn validate_filters(filters: &[String]) -> Result<(), CatalogError> {
    for filter in filters {
        if is_glob_pattern(filter) {
            Pattern::new(filter).map_err(|e| CatalogError::InvalidFilter {
                filter: filter.clone(),
                reason: e.to_string(),
            })?;
        }
    }
    Ok(())
}
