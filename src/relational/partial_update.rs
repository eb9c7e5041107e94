//! UPDATE statements for sparse input.
//!
//! Assignments are collected as `(column, value)` pairs and rendered with one
//! numbered placeholder each; the key is always the last parameter. Column
//! names come from code, values only ever travel as parameters.

use crate::db::{SqlValue, Statement};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct PartialUpdate {
    table: &'static str,
    key_column: &'static str,
    assignments: Vec<(&'static str, SqlValue)>,
    touch: Option<&'static str>,
}

impl PartialUpdate {
    pub fn new(table: &'static str, key_column: &'static str) -> Self {
        Self {
            table,
            key_column,
            assignments: Vec::new(),
            touch: None,
        }
    }

    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.assignments.push((column, value.into()));
        self
    }

    /// Assigns the column only when the caller supplied a value.
    pub fn set_if_present<T: Into<SqlValue>>(self, column: &'static str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.set(column, value),
            None => self,
        }
    }

    /// Also sets `column = NOW()` when the update runs. Not counted as a field.
    pub fn touch(mut self, column: &'static str) -> Self {
        self.touch = Some(column);
        self
    }

    pub fn columns(&self) -> Vec<&'static str> {
        self.assignments.iter().map(|(column, _)| *column).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn build(&self, key: i64) -> AppResult<Statement> {
        if self.assignments.is_empty() {
            return Err(AppError::InvalidArgument(format!(
                "No field to update on {}",
                self.table
            )));
        }

        let mut clauses: Vec<String> = self
            .assignments
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ${}", column, i + 1))
            .collect();
        if let Some(column) = self.touch {
            clauses.push(format!("{} = NOW()", column));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ${}",
            self.table,
            clauses.join(", "),
            self.key_column,
            self.assignments.len() + 1
        );

        let statement = self
            .assignments
            .iter()
            .fold(Statement::new(sql), |statement, (_, value)| {
                statement.bind(value.clone())
            });
        Ok(statement.bind(key))
    }
}
