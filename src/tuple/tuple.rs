use std::fmt;
use std::sync::Arc;

use crate::common::{RecordId, Result, StorageError};

use super::{Schema, Value};

/// A single row of a heap file.
///
/// The serialized form is the concatenation of each column's fixed-width
/// encoding in schema order, so every tuple of a schema is exactly
/// `schema.tuple_size()` bytes.
///
/// A tuple read from a page carries the [`RecordId`] of the slot it came
/// from; that ID is what [`delete_tuple`](crate::storage::DbFile::delete_tuple)
/// uses to find it again.
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple, checking every value against its column type.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.column_count() {
            return Err(StorageError::SchemaMismatch(format!(
                "expected {} values, got {}",
                schema.column_count(),
                values.len()
            )));
        }
        for (value, col) in values.iter().zip(schema.columns()) {
            if !value.fits(col.data_type()) {
                return Err(StorageError::SchemaMismatch(format!(
                    "value {} does not fit column {} of type {}",
                    value,
                    col.name(),
                    col.data_type()
                )));
            }
        }
        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Decodes a tuple from exactly `schema.tuple_size()` bytes.
    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Option<Self> {
        if data.len() < schema.tuple_size() {
            return None;
        }
        let mut values = Vec::with_capacity(schema.column_count());
        let mut offset = 0;
        for col in schema.columns() {
            values.push(Value::read_from(&data[offset..], col.data_type())?);
            offset += col.data_type().size();
        }
        Some(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Encodes the tuple into its fixed-width form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.schema.tuple_size());
        for (value, col) in self.values.iter().zip(self.schema.columns()) {
            // Values were checked against the schema on construction.
            value.write_to(col.data_type(), &mut bytes);
        }
        bytes
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the slot this tuple was read from or inserted into.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    pub fn with_record_id(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }
}

/// Tuples compare by schema and values; the record ID is ignored.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join("\t"))
    }
}

/// Builder for constructing tuples fluently.
pub struct TupleBuilder {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl TupleBuilder {
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.column_count();
        Self {
            schema,
            values: Vec::with_capacity(count),
        }
    }

    /// Appends the value for the next column.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn build(self) -> Result<Tuple> {
        Tuple::new(self.schema, self.values)
    }
}
