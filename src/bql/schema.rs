use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Error, Result};
use crate::bql::types::DataType;

/// Table schema definition
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    /// Checks a schema as declared by create table
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::Internal(format!(
                "table {} has no columns",
                self.name
            )));
        }

        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(CatalogError::DuplicateField(column.name.clone()).into());
            }
        }

        Ok(())
    }

    /// Returns the position of a named column in the schema
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Field schema definition
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
}
