use serde_json::{Number, Value};

/// One structured input record: nested maps and sequences ending in scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredRecord {
    /// Entries in declaration order.
    Map(Vec<(String, StructuredRecord)>),
    Sequence(Vec<StructuredRecord>),
    Scalar(Scalar),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Raw binary payload. Has no canonical text form.
    Bytes(Vec<u8>),
}

impl Scalar {
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Number(_) => "number",
            Scalar::String(_) => "string",
            Scalar::Bytes(_) => "bytes",
        }
    }
}

impl StructuredRecord {
    /// Number of scalar leaves reachable from this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            StructuredRecord::Map(entries) => entries.iter().map(|(_, v)| v.leaf_count()).sum(),
            StructuredRecord::Sequence(items) => items.iter().map(StructuredRecord::leaf_count).sum(),
            StructuredRecord::Scalar(_) => 1,
        }
    }
}

impl From<Value> for StructuredRecord {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => StructuredRecord::Map(
                map.into_iter()
                    .map(|(k, v)| (k, StructuredRecord::from(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                StructuredRecord::Sequence(items.into_iter().map(StructuredRecord::from).collect())
            }
            Value::Null => StructuredRecord::Scalar(Scalar::Null),
            Value::Bool(b) => StructuredRecord::Scalar(Scalar::Bool(b)),
            Value::Number(n) => StructuredRecord::Scalar(Scalar::Number(n)),
            Value::String(s) => StructuredRecord::Scalar(Scalar::String(s)),
        }
    }
}
