//! Record schemas
//!
//! Each record kind (tool, prompt, todo) maps positionally onto the cells of a
//! worksheet row. A [`Schema`] owns both directions of that mapping:
//! `validate` turns raw cells into a typed record and `serialize` turns a
//! record back into a full-width row. Both are pure.
//!
//! - `coerce`: one parse/format function per field type
//! - `tool`, `prompt`, `todo`: the three record kinds

pub mod coerce;
mod prompt;
mod todo;
mod tool;

pub use prompt::{Prompt, PromptPatch, PromptSchema};
pub use todo::{Priority, Status, Todo, TodoDraft, TodoPatch, TodoSchema};
pub use tool::{Tool, ToolPatch, ToolSchema, DEFAULT_CATEGORIES};

/// One worksheet row as it travels over the wire: ordered text cells.
pub type Row = Vec<String>;

/// A row or draft that does not satisfy its record kind's invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("invalid value '{value}' for '{field}': expected {expected}")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("duplicate key '{0}'")]
    DuplicateKey(String),
}

/// Mapping between one record kind and its worksheet rows.
pub trait Schema: Send + Sync {
    type Record: Clone + std::fmt::Debug + PartialEq + Send + Sync;
    /// Caller-supplied fields for `create`.
    type Draft: Send;
    /// Partial fields for `update`; `None` leaves a field untouched.
    type Patch: Send;

    /// Human-readable kind name used in errors and logs.
    fn kind(&self) -> &'static str;

    /// Header row written to an empty worksheet.
    fn headers(&self) -> &'static [&'static str];

    fn validate(&self, raw: &[String]) -> Result<Self::Record, ValidationError>;

    fn serialize(&self, record: &Self::Record) -> Row;

    /// Turn a draft into a complete record, filling generated fields.
    fn build(&self, draft: Self::Draft) -> Result<Self::Record, ValidationError>;

    fn merge(&self, record: &mut Self::Record, patch: Self::Patch);

    /// Stable key column, for kinds that have one.
    fn key<'a>(&self, _record: &'a Self::Record) -> Option<&'a str> {
        None
    }

    /// Canonicalize a record by sending it through the wire form once.
    fn normalize(&self, record: &Self::Record) -> Result<Self::Record, ValidationError> {
        self.validate(&self.serialize(record))
    }
}

#[cfg(test)]
pub(crate) fn row(cells: &[&str]) -> Row {
    cells.iter().map(|c| c.to_string()).collect()
}
