use thiserror::Error;

/// Result alias for `canopy`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by graph construction, community detection and hierarchy building.
#[derive(Debug, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Vector dimension mismatch.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// Community detection was asked to partition a graph without edges.
    #[error("graph has no edges")]
    EmptyGraph,

    /// A finished hierarchy violated one of its structural invariants.
    #[error("hierarchy failed validation: {0}")]
    InvalidHierarchy(String),

    /// Lookup of a node id that is not in the tree.
    #[error("unknown cluster id '{0}'")]
    UnknownNode(String),

    /// Two structures that must cover the same documents do not.
    #[error("document count mismatch: {left} vs {right}")]
    DocumentCountMismatch {
        /// Documents on the left-hand side.
        left: usize,
        /// Documents on the right-hand side.
        right: usize,
    },

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error while reading configuration.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
