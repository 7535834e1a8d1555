use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::DataType;

/// Represents a single column in a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

/// Fixed-width schema of a heap file's tuples.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    /// Map from column name to column index for fast lookup
    name_to_index: HashMap<String, usize>,
    /// Sum of all column widths
    tuple_size: usize,
}

impl Schema {
    /// Creates a new schema from a list of columns.
    pub fn new(columns: Vec<Column>) -> Self {
        let mut name_to_index = HashMap::new();
        for (i, col) in columns.iter().enumerate() {
            name_to_index.entry(col.name.clone()).or_insert(i);
        }
        let tuple_size = columns.iter().map(|c| c.data_type.size()).sum();

        Self {
            columns,
            name_to_index,
            tuple_size,
        }
    }

    /// Creates a schema builder for fluent construction.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Returns the number of columns in the schema.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the index of the first column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Returns the width of one serialized tuple in bytes.
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Returns the width of one serialized tuple in bits.
    pub fn tuple_size_bits(&self) -> usize {
        self.tuple_size * 8
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{}({})", c.name, c.data_type))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Builder for constructing schemas fluently.
#[derive(Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}
