use thiserror::Error;

/// Sheet-level failure of the grid stage.
///
/// Candidate-level rejections (filaments, combs, clusters, peaks, columns,
/// groups) are never errors: they are discarded silently and logged at debug
/// level. Only conditions that make the whole sheet unusable surface here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("image is empty ({width}x{height})")]
    EmptyImage { width: usize, height: usize },

    #[error("invalid scale: {0}")]
    InvalidScale(String),

    #[error("sheet has no staff lines ({kept} filaments left, {min} required)")]
    NoStaffLines { kept: usize, min: usize },

    #[error("no system could be built from {staves} staves")]
    NoSystems { staves: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl GridError {
    /// True for the conditions that flag a sheet as containing no music.
    pub fn is_sheet_removal(&self) -> bool {
        matches!(self, GridError::NoStaffLines { .. })
    }
}

pub type Result<T> = std::result::Result<T, GridError>;
