use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    #[error("cannot read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("malformed matrix: {0}")]
    Shape(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AlgorithmError {
    #[error("similarity threshold {0} is outside [0, 1]")]
    InvalidThreshold(f32),

    #[error("input has no inverted index; it must be built before running")]
    MissingIndex,

    #[error("inverted index covers {found} columns, matrix has {expected}")]
    IndexMismatch { expected: usize, found: usize },
}
