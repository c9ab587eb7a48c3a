use crate::metadata::Format;

/// Result type for ivsparse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building, converting, loading or indexing a matrix.
///
/// Everything except `Io` is detected by validation at a construction or load
/// boundary, before any payload byte is interpreted.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header format tag does not match the codec that was asked to decode it
    #[error("format mismatch: expected {expected:?}, found tag {found}")]
    FormatMismatch {
        /// Format of the decoding codec
        expected: Format,
        /// Tag found in the header
        found: u32,
    },

    /// A field of the type descriptor (or the index width) disagrees with the instantiated types
    #[error("type mismatch in {field}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Name of the disagreeing field
        field: &'static str,
        /// Value required by the instantiated types
        expected: u32,
        /// Value found in the header
        found: u32,
    },

    /// Matrices need at least one row and one column
    #[error("invalid dimensions: {rows} x {cols}")]
    InvalidDimensions {
        /// Requested rows
        rows: usize,
        /// Requested columns
        cols: usize,
    },

    /// A dimension or count does not fit the configured index width
    #[error("{dim} does not fit the index width (max {max})")]
    IndexWidthOverflow {
        /// Offending dimension or count
        dim: usize,
        /// Largest value the index type can hold
        max: u64,
    },

    /// Input that violates a construction precondition
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Dense operand whose length does not match the matrix
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Length required by the matrix shape
        expected: usize,
        /// Length of the operand
        found: usize,
    },

    /// Coefficient, vector or range access outside the matrix
    #[error("index {index} out of range (bound {bound})")]
    OutOfRange {
        /// Requested position
        index: usize,
        /// Exclusive upper bound
        bound: usize,
    },

    /// A loaded payload that does not decode cleanly
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// Failure of the underlying reader or writer
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
