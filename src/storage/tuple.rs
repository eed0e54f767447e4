//! Fixed-width tuples and their schema.
//!
//! Every record of a table has the same width, fixed by its [`Schema`]:
//! ```text
//! Int:  4 bytes, little-endian i32
//! Str:  4-byte little-endian length + STRING_LEN bytes (zero padded)
//! ```
//! Records are packed into page slots back to back in field order.

use std::fmt;

use crate::common::config::STRING_LEN;
use crate::common::{Error, RecordId, Result};

/// Type of a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Str,
}

impl FieldType {
    /// Encoded width of a value of this type, in bytes.
    #[inline]
    pub const fn width(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str => 4 + STRING_LEN,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::Str => write!(f, "STRING"),
        }
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Str(_) => FieldType::Str,
        }
    }

    fn encode_into(&self, buf: &mut [u8]) {
        match self {
            Field::Int(v) => buf[..4].copy_from_slice(&v.to_le_bytes()),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                buf[..4].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
                buf[4..4 + bytes.len()].copy_from_slice(bytes);
                buf[4 + bytes.len()..FieldType::Str.width()].fill(0);
            }
        }
    }

    fn decode(field_type: FieldType, buf: &[u8]) -> Result<Field> {
        match field_type {
            FieldType::Int => Ok(Field::Int(i32::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3],
            ]))),
            FieldType::Str => {
                let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
                if len > STRING_LEN {
                    return Err(Error::Corrupted(format!(
                        "string length {} exceeds {}",
                        len, STRING_LEN
                    )));
                }
                let s = std::str::from_utf8(&buf[4..4 + len])
                    .map_err(|e| Error::Corrupted(format!("invalid utf-8 in string field: {}", e)))?;
                Ok(Field::Str(s.to_string()))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Int(v)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Str(s.to_string())
    }
}

/// A named, typed column of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub field_type: FieldType,
}

/// The record layout of one table.
///
/// Two schemas are [compatible](Schema::is_compatible) when their column
/// types agree position by position; names are informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Build a schema from `(type, name)` pairs.
    ///
    /// # Panics
    /// Panics if `columns` is empty.
    pub fn new<S: Into<String>>(columns: Vec<(FieldType, S)>) -> Self {
        assert!(!columns.is_empty(), "schema must have at least one column");
        Self {
            columns: columns
                .into_iter()
                .map(|(field_type, name)| Column {
                    name: name.into(),
                    field_type,
                })
                .collect(),
        }
    }

    /// Build a schema with anonymous columns `f0`, `f1`, ...
    pub fn from_types(types: &[FieldType]) -> Self {
        Self::new(
            types
                .iter()
                .enumerate()
                .map(|(i, t)| (*t, format!("f{}", i)))
                .collect(),
        )
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn field_type(&self, i: usize) -> Option<FieldType> {
        self.columns.get(i).map(|c| c.field_type)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.columns.get(i).map(|c| c.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Encoded width of one record, in bytes.
    pub fn record_width(&self) -> usize {
        self.columns.iter().map(|c| c.field_type.width()).sum()
    }

    pub fn is_compatible(&self, other: &Schema) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.field_type == b.field_type)
    }

    /// Verify that `tuple` can be stored under this schema.
    ///
    /// # Errors
    /// `Error::SchemaMismatch` on wrong arity, wrong field type, or a string
    /// longer than [`STRING_LEN`].
    pub fn check(&self, tuple: &Tuple) -> Result<()> {
        if tuple.len() != self.len() {
            return Err(Error::SchemaMismatch(format!(
                "expected {} fields, got {}",
                self.len(),
                tuple.len()
            )));
        }
        for (i, (field, column)) in tuple.fields().iter().zip(&self.columns).enumerate() {
            if field.field_type() != column.field_type {
                return Err(Error::SchemaMismatch(format!(
                    "field {} ('{}'): expected {}, got {}",
                    i,
                    column.name,
                    column.field_type,
                    field.field_type()
                )));
            }
            if let Field::Str(s) = field {
                if s.len() > STRING_LEN {
                    return Err(Error::SchemaMismatch(format!(
                        "field {} ('{}'): string of {} bytes exceeds {}",
                        i,
                        column.name,
                        s.len(),
                        STRING_LEN
                    )));
                }
            }
        }
        Ok(())
    }

    /// Encode `tuple` into `buf`, which must be exactly one record wide.
    pub fn encode(&self, tuple: &Tuple, buf: &mut [u8]) -> Result<()> {
        self.check(tuple)?;
        debug_assert_eq!(buf.len(), self.record_width());

        let mut offset = 0;
        for field in tuple.fields() {
            let width = field.field_type().width();
            field.encode_into(&mut buf[offset..offset + width]);
            offset += width;
        }
        Ok(())
    }

    /// Decode one record from `buf`.
    pub fn decode(&self, buf: &[u8]) -> Result<Tuple> {
        let mut fields = Vec::with_capacity(self.len());
        let mut offset = 0;
        for column in &self.columns {
            let width = column.field_type.width();
            fields.push(Field::decode(column.field_type, &buf[offset..offset + width])?);
            offset += width;
        }
        Ok(Tuple::new(fields))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.field_type))
            .collect();
        write!(f, "({})", cols.join(", "))
    }
}

/// One row: its field values plus, once stored, where it lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            record_id: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    /// Replace the value of field `i`.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    pub fn set_field(&mut self, i: usize, field: Field) {
        assert!(i < self.fields.len(), "field index {} out of range", i);
        self.fields[i] = field;
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.fields.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", values.join(" "))
    }
}
