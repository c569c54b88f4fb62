use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read error: {0}")]
    Io(#[from] io::Error),

    #[error("expected `{expected}` at byte {offset}, found `{found}`")]
    UnexpectedToken {
        expected: &'static str,
        found: char,
        offset: u64,
    },

    #[error("unexpected end of input at byte {offset}, expected {expected}")]
    UnexpectedEof { expected: &'static str, offset: u64 },

    #[error("array element {index} is malformed: {source}")]
    Element {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("reference file has no header row")]
    MissingHeader,

    #[error("reference header must start with `location,item`, found {found:?}")]
    InvalidHeader { found: Vec<String> },

    #[error("reference row at line {line} is missing column {column}")]
    MissingColumn { line: u64, column: usize },
}

impl ParserError {
    /// True when the failure came from the underlying reader rather than the
    /// content of the document.
    pub fn is_io(&self) -> bool {
        match self {
            ParserError::Open { .. } | ParserError::Io(_) => true,
            ParserError::Csv(err) => err.is_io_error(),
            _ => false,
        }
    }
}
