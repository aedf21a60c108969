use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Structural(#[from] StructuralViolation),

    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// The document is not well-formed XML.
///
/// `line` is 1-based and points at the reader position where parsing gave up;
/// the repair pipeline uses it to locate the offending cell block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("XML parse error at line {line}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Stable identifiers for the structural invariants, in check-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    MalformedXml,
    NestedCell,
    DuplicateId,
    MissingParent,
    InvalidParentRef,
    InvalidEdgeRef,
    InvalidWaypoint,
}

impl ViolationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationCode::MalformedXml => "MALFORMED_XML",
            ViolationCode::NestedCell => "NESTED_CELL",
            ViolationCode::DuplicateId => "DUPLICATE_ID",
            ViolationCode::MissingParent => "MISSING_PARENT",
            ViolationCode::InvalidParentRef => "INVALID_PARENT_REF",
            ViolationCode::InvalidEdgeRef => "INVALID_EDGE_REF",
            ViolationCode::InvalidWaypoint => "INVALID_WAYPOINT",
        }
    }
}

impl std::fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single violated structural invariant.
///
/// `ids` carries at most [`StructuralViolation::MAX_IDS`] offending cell ids;
/// `hint` is worded as an instruction the caller (human or model) can act on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct StructuralViolation {
    pub code: ViolationCode,
    pub message: String,
    #[serde(default)]
    pub ids: Vec<String>,
    pub hint: String,
}

impl StructuralViolation {
    pub const MAX_IDS: usize = 5;

    pub fn new(
        code: ViolationCode,
        message: impl Into<String>,
        ids: Vec<String>,
        hint: impl Into<String>,
    ) -> Self {
        let mut ids = ids;
        ids.truncate(Self::MAX_IDS);
        Self {
            code,
            message: message.into(),
            ids,
            hint: hint.into(),
        }
    }
}

/// A named edit operation failed; the whole batch it belonged to is discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("{op}: no cell with id [{id}] exists in the document")]
    CellNotFound { op: &'static str, id: String },

    #[error("{op}: a cell with id [{id}] already exists; pick an unused id")]
    IdCollision { op: &'static str, id: String },

    #[error(
        "addCell: declared parent [{parent}] of cell [{id}] does not exist; reference an existing cell or the default layer \"1\""
    )]
    UnknownParent { id: String, parent: String },

    #[error(
        "connectComponents: endpoint [{endpoint}] of connector [{id}] does not resolve to an existing component"
    )]
    MissingEndpoint { id: String, endpoint: String },

    #[error("{op}: cell [{id}] is not an edge")]
    NotAnEdge { op: &'static str, id: String },
}
