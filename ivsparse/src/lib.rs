//! # ivsparse: Compressed, read-mostly sparse matrices.
//!
//! Sparse matrices with many repeated values (count data, quantized or categorical
//! measurements) waste most of a standard compressed sparse layout on storing the
//! same value over and over. `ivsparse` stores each outer vector in one of three
//! formats:
//! - `PlainCsc`: standard compressed sparse storage, one value and one index per entry.
//! - `ValueGrouped`: each distinct value once, with a count and the list of its indices.
//! - `DeltaRunLength`: one run per distinct value, indices delta encoded with the
//!   narrowest of 1, 2, 4 or 8 bytes that fits the run.
//!
//! Matrices are built from a compressed triple, a `sprs` matrix, a triplet list, a
//! dense array or a file, can be grown by appending vectors, and are otherwise
//! read only. Conversion between formats and transposition decode and re-encode
//! through the codecs, losslessly. Products with dense vectors and matrices
//! iterate the encoded vectors directly.

#![deny(missing_docs)]
#![deny(warnings)]

/// Errors and the crate `Result`
pub mod error;

/// Element and index types, and the packed type descriptor
pub mod element;

/// Storage formats and the serialized matrix header
pub mod metadata;

/// Minimal byte width selection and fixed-width words
pub mod width;

#[macro_use]
/// Per-format encoders and decoders of outer vectors
pub mod codec;

/// Compressed sparse matrices, comprised of encoded outer vectors
pub mod mat;

/// Single compressed sparse vectors
pub mod vec;

/// Conversion between formats, and transposition
pub mod convert;

/// Products of compressed matrices with dense vectors and matrices
pub mod prod;

/// Binary file format
pub mod io;

/// Methods for generating random sparse vectors and matrices. Useful for testing and benchmarking
pub mod gen_rand;

pub use codec::{InnerIter, Run, RunState};
pub use element::{Element, IndexType, TypeDescriptor};
pub use error::{Error, Result};
pub use io::read_header;
pub use mat::{EncodeOptions, Matrix};
pub use metadata::{Format, MetadataHeader};
pub use sprs::CompressedStorage;
pub use vec::Vector;
