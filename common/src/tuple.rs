//! Tuples, schemas and the executor-facing tuple slot.
//!
//! Values are encoded little-endian with a one byte null flag in front of each
//! value. The same per-value encoding is used by row blocks (whole tuples) and by
//! column blocks (one column of many tuples).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Integer,
    BigInt,
    /// Variable length string with a declared maximum length.
    Varchar(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: Type,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: Type) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i32),
    BigInt(i64),
    Varchar(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Appends the encoding of this value, checked against `column_type`.
    pub fn encode(&self, column_type: Type, out: &mut Vec<u8>) -> Result<(), TupleError> {
        match (self, column_type) {
            (Value::Null, _) => out.push(1),
            (Value::Integer(val), Type::Integer) => {
                out.push(0);
                out.extend_from_slice(&val.to_le_bytes());
            }
            (Value::BigInt(val), Type::BigInt) => {
                out.push(0);
                out.extend_from_slice(&val.to_le_bytes());
            }
            (Value::Varchar(val), Type::Varchar(max_len)) => {
                if val.len() > max_len as usize {
                    return Err(TupleError::ValueTooLong {
                        len: val.len(),
                        max_len,
                    });
                }
                out.push(0);
                out.extend_from_slice(&(val.len() as u32).to_le_bytes());
                out.extend_from_slice(val.as_bytes());
            }
            (value, column_type) => {
                return Err(TupleError::TypeMismatch {
                    value: value.clone(),
                    column_type,
                })
            }
        }
        Ok(())
    }

    /// Decodes one value starting at `*offset`, advancing the offset past it.
    pub fn decode(bytes: &[u8], offset: &mut usize, column_type: Type) -> Result<Self, TupleError> {
        let flag = take(bytes, offset, 1)?[0];
        if flag == 1 {
            return Ok(Value::Null);
        }
        let value = match column_type {
            Type::Integer => {
                let raw = take(bytes, offset, 4)?;
                Value::Integer(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
            Type::BigInt => {
                let raw = take(bytes, offset, 8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(raw);
                Value::BigInt(i64::from_le_bytes(buf))
            }
            Type::Varchar(_) => {
                let raw = take(bytes, offset, 4)?;
                let len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
                let raw = take(bytes, offset, len)?;
                let val = std::str::from_utf8(raw).map_err(|_| TupleError::InvalidUtf8)?;
                Value::Varchar(val.to_string())
            }
        };
        Ok(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::BigInt(i) => write!(f, "{}", i),
            Value::Varchar(s) => write!(f, "{}", s),
            Value::Null => write!(f, "NULL"),
        }
    }
}

fn take<'a>(bytes: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8], TupleError> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or(TupleError::Truncated {
            offset: *offset,
            needed: len,
        })?;
    let slice = &bytes[*offset..end];
    *offset = end;
    Ok(slice)
}

/// Errors raised while encoding or decoding tuples.
#[derive(Debug, thiserror::Error)]
pub enum TupleError {
    #[error("value {value:?} does not match column type {column_type:?}")]
    TypeMismatch { value: Value, column_type: Type },

    #[error("value of length {len} exceeds varchar({max_len})")]
    ValueTooLong { len: usize, max_len: u32 },

    #[error("tuple has {actual} values but the schema has {expected} columns")]
    Arity { expected: usize, actual: usize },

    #[error("truncated tuple data: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("invalid utf-8 in varchar value")]
    InvalidUtf8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn serialize(&self, schema: &Schema) -> Result<Vec<u8>, TupleError> {
        let mut bytes = Vec::new();
        self.serialize_into(schema, &mut bytes)?;
        Ok(bytes)
    }

    pub fn serialize_into(&self, schema: &Schema, bytes: &mut Vec<u8>) -> Result<(), TupleError> {
        if self.values.len() != schema.column_count() {
            return Err(TupleError::Arity {
                expected: schema.column_count(),
                actual: self.values.len(),
            });
        }
        for (value, col) in self.values.iter().zip(&schema.columns) {
            value.encode(col.column_type, bytes)?;
        }
        Ok(())
    }

    pub fn deserialize(bytes: &[u8], schema: &Schema) -> Result<Self, TupleError> {
        let mut offset = 0;
        let mut values = Vec::with_capacity(schema.column_count());
        for col in &schema.columns {
            values.push(Value::decode(bytes, &mut offset, col.column_type)?);
        }
        Ok(Tuple { values })
    }
}

/// The buffer a scan stores its current row into.
///
/// An empty slot is how a scan reports exhaustion; callers check
/// [`TupleSlot::is_empty`] rather than expecting an error.
#[derive(Debug, Clone)]
pub struct TupleSlot {
    values: Vec<Value>,
    empty: bool,
}

impl TupleSlot {
    pub fn new(column_count: usize) -> Self {
        Self {
            values: vec![Value::Null; column_count],
            empty: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn clear(&mut self) {
        self.empty = true;
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    /// Replaces the slot contents with a whole tuple.
    pub fn store(&mut self, tuple: Tuple) {
        self.values = tuple.values;
        self.empty = false;
    }

    /// Gives mutable access to the values for in-place filling. The slot is
    /// marked non-empty; every value is reset to NULL first.
    pub fn fill(&mut self) -> &mut [Value] {
        for value in &mut self.values {
            *value = Value::Null;
        }
        self.empty = false;
        &mut self.values
    }

    pub fn values(&self) -> Option<&[Value]> {
        if self.empty {
            None
        } else {
            Some(&self.values)
        }
    }

    pub fn to_tuple(&self) -> Option<Tuple> {
        self.values().map(|values| Tuple::new(values.to_vec()))
    }
}
