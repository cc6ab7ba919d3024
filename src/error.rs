use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeatingError {
    #[error("invalid seat id: {0:?}")]
    InvalidSeatId(String),

    #[error("row {0} is outside A..Z")]
    RowOutOfRange(usize),

    #[error("seat {0} is not a seat in the current layout")]
    NotASeat(String),

    #[error("student {0} is not on the class roster")]
    UnknownStudent(String),

    #[error("unknown layout template: {0}")]
    UnknownLayout(String),

    #[error("seat pattern has {actual} cells, expected {rows}x{cols}")]
    PatternMismatch {
        rows: usize,
        cols: usize,
        actual: usize,
    },

    #[error("layout has {0} rows; seat labels only reach Z")]
    TooManyRows(usize),

    #[error("student {student} is not at {origin}")]
    DragOriginMismatch { student: String, origin: String },

    #[error("teacher {0} has no primary class")]
    NoPrimaryClass(String),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("seating chart not found: {0}")]
    ChartNotFound(String),

    #[error("workspace path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SeatingError {
    /// Stable code reported on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            SeatingError::InvalidSeatId(_)
            | SeatingError::RowOutOfRange(_)
            | SeatingError::NotASeat(_) => "invalid_seat",
            SeatingError::UnknownStudent(_) => "unknown_student",
            SeatingError::UnknownLayout(_)
            | SeatingError::PatternMismatch { .. }
            | SeatingError::TooManyRows(_) => "bad_layout",
            SeatingError::DragOriginMismatch { .. } => "bad_drag",
            SeatingError::NoPrimaryClass(_) => "no_primary_class",
            SeatingError::ClassNotFound(_) | SeatingError::ChartNotFound(_) => "not_found",
            SeatingError::NotADirectory(_) => "bad_config",
            SeatingError::Db(_) => "db_query_failed",
            SeatingError::Json(_) => "bad_json",
        }
    }
}

pub type Result<T> = std::result::Result<T, SeatingError>;
