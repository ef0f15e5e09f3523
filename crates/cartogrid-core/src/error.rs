use nalgebra::{DMatrix, Scalar};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The master attribute cannot drive a cartogram (e.g. every value is zero).
    #[error("attribute `{attribute}` of layer `{layer}` cannot drive a cartogram: {message}")]
    DataFormat {
        layer: String,
        attribute: String,
        message: String,
    },

    /// Cancellation was requested and observed at a poll point.
    #[error("computation cancelled")]
    Interrupted,

    #[error("not enough memory to allocate {what}; reduce the grid size or increase available memory")]
    ResourceExhausted { what: String },

    #[error("{phase} did not converge within {iterations} iterations")]
    NonConvergence {
        phase: &'static str,
        iterations: usize,
    },

    #[error("invalid parameter `{name}`: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("unsupported geometry type: {kind}")]
    UnsupportedGeometry { kind: String },
}

/// Coarse classification used by callers to decide how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataFormat,
    /// Not a failure: the user asked to stop.
    Interrupted,
    ResourceExhaustion,
    InvalidInput,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DataFormat { .. } => ErrorKind::DataFormat,
            Error::Interrupted => ErrorKind::Interrupted,
            Error::ResourceExhausted { .. } | Error::NonConvergence { .. } => {
                ErrorKind::ResourceExhaustion
            }
            Error::InvalidParameter { .. } | Error::UnsupportedGeometry { .. } => {
                ErrorKind::InvalidInput
            }
        }
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind() == ErrorKind::Interrupted
    }
}

/// Allocates a filled vector, turning allocation failure into [`Error::ResourceExhausted`].
pub fn try_filled<T: Clone>(len: usize, value: T, what: &str) -> Result<Vec<T>> {
    let mut out: Vec<T> = Vec::new();
    out.try_reserve_exact(len)
        .map_err(|_| Error::ResourceExhausted {
            what: what.to_string(),
        })?;
    out.resize(len, value);
    Ok(out)
}

/// Allocates an `nrows × ncols` matrix filled with `value`, failing fast when memory runs out.
pub fn try_matrix<T: Scalar>(nrows: usize, ncols: usize, value: T, what: &str) -> Result<DMatrix<T>> {
    let len = nrows
        .checked_mul(ncols)
        .ok_or_else(|| Error::ResourceExhausted {
            what: what.to_string(),
        })?;
    Ok(DMatrix::from_vec(nrows, ncols, try_filled(len, value, what)?))
}
