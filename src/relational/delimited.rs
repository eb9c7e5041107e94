//! Decoding of `STRING_AGG`-style columns.
//!
//! Some reads fold a one-to-many relation into a single text column
//! (`'ROLE_ADMIN, ROLE_STAFF'`). Only names survive that aggregation, so the
//! children built here carry no identifiers.

use crate::db::{Row, StoreError};

fn is_delimiter(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

/// Splits on commas and whitespace, dropping empty tokens from delimiter runs.
pub fn split_names(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(is_delimiter)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_children<T>(value: Option<&str>, make: impl FnMut(String) -> T) -> Vec<T> {
    split_names(value).into_iter().map(make).collect()
}

/// Reads a nullable aggregate column and decodes it into children.
pub fn read_children<T>(
    row: &Row,
    column: &str,
    make: impl FnMut(String) -> T,
) -> Result<Vec<T>, StoreError> {
    let value: Option<String> = row.try_get(column)?;
    Ok(parse_children(value.as_deref(), make))
}
