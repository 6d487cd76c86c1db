use std::path::PathBuf;

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Feiltyper for kjernen.
///
/// Manglende *valgfrie* data (stream-fil, kolonner, tomt datasett) er aldri
/// en feil – de gir tomt/nøytralt resultat hos kalleren.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Påkrevd datafil finnes ikke ved lasting.
    #[error("data file not found: {0}")]
    DataNotFound(PathBuf),

    /// Ugyldig input til målberegninger (f.eks. vekt <= 0).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Mål med ugyldig tidslinje eller W/kg-spenn.
    #[error("malformed goal: {0}")]
    MalformedGoal(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid data in {path}: {reason}")]
    InvalidData { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_data(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CoreError::InvalidData {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
