//! Flattening of nested records into `path: value` lines.
//!
//! Map keys are joined with `.`, sequence elements append `[index]` to the
//! current path. Keys are not escaped, so a key that itself contains `.`,
//! `[` or `]` yields a path that cannot be told apart from a deeper one.

use std::fmt;
use std::sync::Arc;

use crate::document::record::{Scalar, StructuredRecord};
use crate::error::PipelineError;

/// One scalar leaf and the path that reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatLine {
    pub path: String,
    pub value: String,
}

impl fmt::Display for FlatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.value)
    }
}

/// What to emit for an empty map or sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyContainerPolicy {
    /// Emit nothing.
    #[default]
    Skip,
    /// Emit the container's path with `{}` or `[]` as value.
    Placeholder,
}

impl std::str::FromStr for EmptyContainerPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "placeholder" => Ok(Self::Placeholder),
            other => Err(PipelineError::InvalidConfiguration(format!(
                "unknown empty container policy `{}` (expected skip or placeholder)",
                other
            ))),
        }
    }
}

pub type BytesConverter = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

#[derive(Clone)]
pub struct Flattener {
    null_literal: String,
    empty_containers: EmptyContainerPolicy,
    bytes_converter: Option<BytesConverter>,
}

impl Default for Flattener {
    fn default() -> Self {
        Self {
            null_literal: "None".to_string(),
            empty_containers: EmptyContainerPolicy::Skip,
            bytes_converter: None,
        }
    }
}

impl fmt::Debug for Flattener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flattener")
            .field("null_literal", &self.null_literal)
            .field("empty_containers", &self.empty_containers)
            .field("bytes_converter", &self.bytes_converter.is_some())
            .finish()
    }
}

impl Flattener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_null_literal(mut self, literal: impl Into<String>) -> Self {
        self.null_literal = literal.into();
        self
    }

    pub fn with_empty_containers(mut self, policy: EmptyContainerPolicy) -> Self {
        self.empty_containers = policy;
        self
    }

    /// Installs the conversion used for binary scalars. Without one, binary
    /// scalars fail with `UnsupportedScalarType`.
    pub fn with_bytes_converter(
        mut self,
        converter: impl Fn(&[u8]) -> String + Send + Sync + 'static,
    ) -> Self {
        self.bytes_converter = Some(Arc::new(converter));
        self
    }

    /// Depth-first walk emitting one line per scalar leaf, maps in
    /// declaration order and sequences in index order.
    pub fn flatten(&self, record: &StructuredRecord) -> Result<Vec<FlatLine>, PipelineError> {
        let mut lines = Vec::with_capacity(record.leaf_count());
        let mut path = String::new();
        self.walk(record, &mut path, &mut lines)?;
        Ok(lines)
    }

    /// Flattens one record into newline-joined `path: value` text.
    pub fn flatten_to_text(&self, record: &StructuredRecord) -> Result<String, PipelineError> {
        Ok(render(&self.flatten(record)?))
    }

    /// Flattens several records and concatenates their text, one line per leaf.
    pub fn flatten_all(&self, records: &[StructuredRecord]) -> Result<String, PipelineError> {
        let mut lines = Vec::new();
        for record in records {
            lines.extend(self.flatten(record)?);
        }
        Ok(render(&lines))
    }

    fn walk(
        &self,
        node: &StructuredRecord,
        path: &mut String,
        out: &mut Vec<FlatLine>,
    ) -> Result<(), PipelineError> {
        match node {
            StructuredRecord::Map(entries) => {
                if entries.is_empty() {
                    self.emit_empty(path, "{}", out);
                }
                for (key, value) in entries {
                    let mark = path.len();
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(key);
                    self.walk(value, path, out)?;
                    path.truncate(mark);
                }
            }
            StructuredRecord::Sequence(items) => {
                if items.is_empty() {
                    self.emit_empty(path, "[]", out);
                }
                for (i, item) in items.iter().enumerate() {
                    let mark = path.len();
                    path.push('[');
                    path.push_str(&i.to_string());
                    path.push(']');
                    self.walk(item, path, out)?;
                    path.truncate(mark);
                }
            }
            StructuredRecord::Scalar(scalar) => {
                let value = self.stringify(scalar, path)?;
                out.push(FlatLine {
                    path: path.clone(),
                    value,
                });
            }
        }
        Ok(())
    }

    fn emit_empty(&self, path: &str, placeholder: &str, out: &mut Vec<FlatLine>) {
        if self.empty_containers == EmptyContainerPolicy::Placeholder {
            out.push(FlatLine {
                path: path.to_string(),
                value: placeholder.to_string(),
            });
        }
    }

    fn stringify(&self, scalar: &Scalar, path: &str) -> Result<String, PipelineError> {
        match scalar {
            Scalar::Null => Ok(self.null_literal.clone()),
            Scalar::Bool(b) => Ok(b.to_string()),
            Scalar::Number(n) => Ok(n.to_string()),
            Scalar::String(s) => Ok(s.clone()),
            Scalar::Bytes(bytes) => match &self.bytes_converter {
                Some(convert) => Ok(convert(bytes)),
                None => Err(PipelineError::UnsupportedScalarType {
                    path: path.to_string(),
                    kind: scalar.kind().to_string(),
                }),
            },
        }
    }
}

/// Joins lines as `path: value`, one per line.
pub fn render(lines: &[FlatLine]) -> String {
    lines
        .iter()
        .map(|line| line.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
