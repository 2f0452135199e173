//! Error taxonomy for discovery and queries.
//!
//! Every failure surfaces immediately; nothing in the library retries or
//! degrades to a partial result.

use crate::tools::ToolError;

pub type Result<T> = std::result::Result<T, OwnerError>;

#[derive(Debug, thiserror::Error)]
pub enum OwnerError {
    /// Selectors from more than one exclusive group, or conflicting cardinality options.
    #[error("incorrect filter combination: {0}")]
    IncorrectFilterCombination(String),

    /// Empty filtered set, missing name or out-of-range index.
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("unsupported OS: {0}")]
    UnsupportedOs(String),

    /// A reclassification stage expected a matching record that was not there.
    #[error("correlation failure: {0}")]
    CorrelationFailure(String),

    #[error("command `{command}` returned {return_code} (expected one of {expected:?}): {stderr}")]
    UnexpectedReturnCode {
        command: String,
        return_code: i32,
        expected: Vec<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("unrecognized speed format: '{0}'")]
    InvalidSpeed(String),

    #[error("cannot order interfaces: {0} has no PCI address")]
    Incomparable(String),

    #[error("failed to parse {what} from '{input}'")]
    Parse { what: &'static str, input: String },

    #[error("connection failure: {0}")]
    Io(#[from] std::io::Error),
}

impl OwnerError {
    pub fn parse(what: &'static str, input: impl Into<String>) -> Self {
        OwnerError::Parse {
            what,
            input: input.into(),
        }
    }
}
