use crate::element::{Element, IndexType};
use crate::error::Result;
use crate::mat::{EncodeOptions, Matrix};
use crate::metadata::Format;
use crate::vec::Vector;
use rand::prelude::Rng;
use sprs::CompressedStorage;

/// Random sparse entries of a vector of length `len`. Each position is stored with
/// probability `density`, holding one of `distinct` values `1..=distinct`. Repeated
/// values are what the compressed formats exploit.
pub fn random_entries<T: Element + From<u8>>(
    rng: &mut impl Rng,
    len: usize,
    density: f64,
    distinct: u8,
) -> Vec<(usize, T)> {
    let density = density.clamp(0.0, 1.0);
    let distinct = distinct.max(1);

    let mut entries = Vec::new();
    for i in 0..len {
        if rng.gen_bool(density) {
            entries.push((i, T::from(rng.gen_range(1..=distinct))));
        }
    }
    entries
}

/// Random compressed triple `(indptr, indices, values)` of `outer_dim` vectors of
/// length `inner_dim`
pub fn random_compressed<T: Element + From<u8>, I: IndexType>(
    rng: &mut impl Rng,
    inner_dim: usize,
    outer_dim: usize,
    density: f64,
    distinct: u8,
) -> (Vec<usize>, Vec<I>, Vec<T>) {
    let mut indptr = Vec::with_capacity(outer_dim + 1);
    let mut indices = Vec::new();
    let mut values = Vec::new();

    indptr.push(0);
    for _ in 0..outer_dim {
        for (i, v) in random_entries::<T>(rng, inner_dim, density, distinct) {
            indices.push(I::from_usize(i));
            values.push(v);
        }
        indptr.push(values.len());
    }

    (indptr, indices, values)
}

/// Generate a random sparse matrix of size `(rows, cols)` in `format`. The storage
/// order is random unless given.
pub fn random_matrix<T: Element + From<u8>, I: IndexType>(
    rng: &mut impl Rng,
    format: Format,
    order: Option<CompressedStorage>,
    rows: usize,
    cols: usize,
    density: f64,
    distinct: u8,
) -> Result<Matrix<T, I>> {
    let storage = order.unwrap_or(if rng.gen_bool(0.5) {
        CompressedStorage::CSR
    } else {
        CompressedStorage::CSC
    });

    let (inner_dim, outer_dim) = match storage {
        CompressedStorage::CSC => (rows, cols),
        CompressedStorage::CSR => (cols, rows),
    };

    let (indptr, indices, values) = random_compressed::<T, I>(rng, inner_dim, outer_dim, density, distinct);
    Matrix::from_compressed(
        format,
        storage,
        (rows, cols),
        &indptr,
        &indices,
        &values,
        EncodeOptions::default(),
    )
}

/// Generate a random sparse vector of length `len` in `format`
pub fn random_vector<T: Element + From<u8>, I: IndexType>(
    rng: &mut impl Rng,
    format: Format,
    len: usize,
    density: f64,
    distinct: u8,
) -> Result<Vector<T, I>> {
    let (indices, values): (Vec<I>, Vec<T>) = random_entries::<T>(rng, len, density, distinct)
        .into_iter()
        .map(|(i, v)| (I::from_usize(i), v))
        .unzip();

    Vector::from_sparse(format, len, &indices, &values)
}
