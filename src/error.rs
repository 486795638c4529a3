//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. Constructor-level
//! invariants (for example `Tensor::new` with a data length that does not
//! match its shape) are programming errors and still panic.

use thiserror::Error;

/// Errors produced by datasets, tensor ops and the tape
#[derive(Debug, Error)]
pub enum Error {
    /// Dataset index outside `0..len`
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Operand shapes incompatible with the requested op
    #[error("shape mismatch in {op}: {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    /// Beam group whose members are not copies of the first member
    #[error("beam group {group} is not replicated across the beam")]
    BeamReplication { group: usize },

    /// Variable id not recorded on this tape
    #[error("variable {0} is not recorded on this tape")]
    UnknownVariable(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(op: &'static str, lhs: &[usize], rhs: &[usize]) -> Self {
        Error::ShapeMismatch {
            op,
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        }
    }
}
