use crate::codec::{InnerIter, Run, Store};
use crate::element::{Element, IndexType, TypeDescriptor};
use crate::error::{Error, Result};
use crate::metadata::{Format, MetadataHeader, META_DATA_SIZE};
use crate::vec::Vector;
use itertools::Itertools;
use log::debug;
use ndarray::{Array2, ArrayView2};
use sprs::CompressedStorage;

/// Options controlling how outer vectors are encoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Encode outer vectors on the rayon thread pool. The output is identical to
    /// the sequential encoding.
    pub parallel: bool,
}

impl EncodeOptions {
    /// Options for column-parallel encoding
    pub fn parallel() -> EncodeOptions {
        EncodeOptions { parallel: true }
    }
}

/// Largest dimension admissible for index type `I`. Dimensions are also stored
/// as 32-bit header words.
pub(crate) fn dim_limit<I: IndexType>() -> u64 {
    I::max_u64().min(u32::MAX as u64)
}

/// Check that `dim` fits index type `I` and the header
pub(crate) fn check_dim<I: IndexType>(dim: usize) -> Result<()> {
    let max = dim_limit::<I>();
    if dim as u64 > max {
        return Err(Error::IndexWidthOverflow { dim, max });
    }
    Ok(())
}

/// Check that a matrix of `rows` x `cols` is non-empty and fits index type `I`
pub(crate) fn check_dims<I: IndexType>(rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions { rows, cols });
    }
    check_dim::<I>(rows)?;
    check_dim::<I>(cols)
}

/// Check that a stored entry count fits the header's nnz word
pub(crate) fn check_nnz(nnz: usize) -> Result<()> {
    if nnz as u64 > u32::MAX as u64 {
        return Err(Error::IndexWidthOverflow {
            dim: nnz,
            max: u32::MAX as u64,
        });
    }
    Ok(())
}

/// Check that `indptr`, `indices`, `values` form a valid compressed triple with
/// `outer_dim` vectors of length `inner_dim` and strictly increasing indices.
fn validate_compressed<T, I: IndexType>(
    inner_dim: usize,
    outer_dim: usize,
    indptr: &[usize],
    indices: &[I],
    values: &[T],
) -> Result<()> {
    if indptr.len() != outer_dim + 1 {
        return Err(Error::MalformedInput(format!(
            "pointer array has {} entries, expected {}",
            indptr.len(),
            outer_dim + 1
        )));
    }

    if indices.len() != values.len() {
        return Err(Error::MalformedInput(format!(
            "{} indices but {} values",
            indices.len(),
            values.len()
        )));
    }

    if indptr[0] != 0 || indptr[outer_dim] != values.len() {
        return Err(Error::MalformedInput(format!(
            "pointer array spans {}..{}, expected 0..{}",
            indptr[0],
            indptr[outer_dim],
            values.len()
        )));
    }

    for (outer, range) in indptr.windows(2).enumerate() {
        if range[1] < range[0] {
            return Err(Error::MalformedInput(format!("pointer array decreases at vector {outer}")));
        }
        if range[1] > indices.len() {
            return Err(Error::MalformedInput(format!(
                "pointer {} of vector {outer} exceeds {} entries",
                range[1],
                indices.len()
            )));
        }

        let mut prev = None;
        for &i in &indices[range[0]..range[1]] {
            let i = i.index();
            if i >= inner_dim {
                return Err(Error::MalformedInput(format!(
                    "index {i} in vector {outer} exceeds length {inner_dim}"
                )));
            }
            if prev >= Some(i) {
                return Err(Error::MalformedInput(format!("indices of vector {outer} are not strictly increasing")));
            }
            prev = Some(i);
        }
    }

    Ok(())
}

/// Read-mostly sparse matrix stored in one of three compressed formats. Each outer
/// vector (a column in CSC order, a row in CSR order) is encoded independently;
/// the format, element type `T`, index type `I` and storage order are fixed at
/// construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix<T, I = u32> {
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub(crate) storage: CompressedStorage,
    pub(crate) nnz: usize,
    pub(crate) store: Store<T, I>,
}

impl<T: Element, I: IndexType> Matrix<T, I> {
    /// Wrap an encoded store. Dimensions must already be validated.
    pub(crate) fn from_store(rows: usize, cols: usize, storage: CompressedStorage, store: Store<T, I>) -> Matrix<T, I> {
        let nnz = (0..store.outer_dim()).map(|j| store.vector_nnz(j)).sum();
        Matrix {
            rows,
            cols,
            storage,
            nnz,
            store,
        }
    }

    /// Build from a compressed triple in `storage` order. `shape` is `(rows, cols)`;
    /// vector `j` holds `indices[indptr[j]..indptr[j + 1]]` with matching `values`.
    /// Indices must be strictly increasing within each vector. Explicit zeros are stored.
    pub fn from_compressed(
        format: Format,
        storage: CompressedStorage,
        shape: (usize, usize),
        indptr: &[usize],
        indices: &[I],
        values: &[T],
        options: EncodeOptions,
    ) -> Result<Matrix<T, I>> {
        let (rows, cols) = shape;
        check_dims::<I>(rows, cols)?;
        check_nnz(values.len())?;

        let (inner_dim, outer_dim) = match storage {
            CompressedStorage::CSC => (rows, cols),
            CompressedStorage::CSR => (cols, rows),
        };
        validate_compressed(inner_dim, outer_dim, indptr, indices, values)?;

        let store = Store::build(format, outer_dim, options.parallel, |j| {
            let range = indptr[j]..indptr[j + 1];
            indices[range.clone()]
                .iter()
                .map(|i| i.index())
                .zip(values[range].iter().copied())
        });

        let mat = Matrix {
            rows,
            cols,
            storage,
            nnz: values.len(),
            store,
        };

        debug!(
            "encoded {} x {} {} matrix: nnz {}, {} bytes",
            rows,
            cols,
            format,
            mat.nnz,
            mat.byte_size()
        );
        Ok(mat)
    }

    /// Build from a classic CSC triple (column pointers, row indices, values)
    pub fn from_csc(
        format: Format,
        rows: usize,
        cols: usize,
        indptr: &[usize],
        indices: &[I],
        values: &[T],
    ) -> Result<Matrix<T, I>> {
        Matrix::from_compressed(
            format,
            CompressedStorage::CSC,
            (rows, cols),
            indptr,
            indices,
            values,
            EncodeOptions::default(),
        )
    }

    /// Create a `Matrix` from a `sprs::CsMatI`, keeping its storage order
    pub fn from_csmat<Iptr: sprs::SpIndex>(format: Format, mat: &sprs::CsMatI<T, I, Iptr>) -> Result<Matrix<T, I>>
    where
        I: sprs::SpIndex,
    {
        let mut indptr = Vec::with_capacity(mat.outer_dims() + 1);
        let mut indices = Vec::with_capacity(mat.nnz());
        let mut values = Vec::with_capacity(mat.nnz());

        indptr.push(0);
        for v in mat.outer_iterator() {
            indices.extend_from_slice(v.indices());
            values.extend_from_slice(v.data());
            indptr.push(indices.len());
        }

        Matrix::from_compressed(
            format,
            mat.storage(),
            mat.shape(),
            &indptr,
            &indices,
            &values,
            EncodeOptions::default(),
        )
    }

    /// Build a CSC matrix from `(row, col, value)` triplets in any order. Duplicate
    /// coordinates are rejected. The input is not modified.
    pub fn from_triplets(format: Format, rows: usize, cols: usize, triplets: &[(usize, usize, T)]) -> Result<Matrix<T, I>> {
        check_dims::<I>(rows, cols)?;

        let mut sorted: Vec<(usize, usize, T)> = Vec::with_capacity(triplets.len());
        for &(row, col, value) in triplets {
            if row >= rows || col >= cols {
                return Err(Error::MalformedInput(format!(
                    "triplet ({row}, {col}) outside a {rows} x {cols} matrix"
                )));
            }
            sorted.push((col, row, value));
        }
        sorted.sort_unstable_by_key(|&(col, row, _)| (col, row));

        if let Some((a, _)) = sorted.iter().tuple_windows().find(|(a, b)| (a.0, a.1) == (b.0, b.1)) {
            return Err(Error::MalformedInput(format!("duplicate triplet at ({}, {})", a.1, a.0)));
        }

        let mut indptr = vec![0usize; cols + 1];
        for &(col, _, _) in &sorted {
            indptr[col + 1] += 1;
        }
        for j in 0..cols {
            indptr[j + 1] += indptr[j];
        }

        let indices: Vec<I> = sorted.iter().map(|&(_, row, _)| I::from_usize(row)).collect();
        let values: Vec<T> = sorted.iter().map(|&(_, _, v)| v).collect();

        Matrix::from_csc(format, rows, cols, &indptr, &indices, &values)
    }

    /// Create a matrix from a dense array, storing its non-zero entries
    pub fn from_dense(format: Format, storage: CompressedStorage, arr: ArrayView2<T>) -> Result<Matrix<T, I>> {
        let (rows, cols) = arr.dim();
        check_dims::<I>(rows, cols)?;

        let (inner_dim, outer_dim) = match storage {
            CompressedStorage::CSC => (rows, cols),
            CompressedStorage::CSR => (cols, rows),
        };

        let mut indptr = Vec::with_capacity(outer_dim + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);

        for outer in 0..outer_dim {
            for inner in 0..inner_dim {
                let v = match storage {
                    CompressedStorage::CSC => arr[(inner, outer)],
                    CompressedStorage::CSR => arr[(outer, inner)],
                };
                if v != T::zero() {
                    indices.push(I::from_usize(inner));
                    values.push(v);
                }
            }
            indptr.push(values.len());
        }

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

    /// Empty shell with vectors of length `inner_dim` and no outer vectors, to be
    /// grown with `append`.
    pub fn empty(format: Format, storage: CompressedStorage, inner_dim: usize) -> Result<Matrix<T, I>> {
        let (rows, cols) = match storage {
            CompressedStorage::CSC => (inner_dim, 0),
            CompressedStorage::CSR => (0, inner_dim),
        };
        if inner_dim == 0 {
            return Err(Error::InvalidDimensions { rows, cols });
        }
        check_dim::<I>(inner_dim)?;

        Ok(Matrix {
            rows,
            cols,
            storage,
            nnz: 0,
            store: Store::new(format),
        })
    }

    /// All-zero matrix of the given shape. Allocates only the offset tables.
    pub fn with_shape(format: Format, storage: CompressedStorage, rows: usize, cols: usize) -> Result<Matrix<T, I>> {
        check_dims::<I>(rows, cols)?;

        let outer_dim = if storage == CompressedStorage::CSC { cols } else { rows };
        let mut store = Store::new(format);
        for _ in 0..outer_dim {
            store.push_empty();
        }

        Ok(Matrix {
            rows,
            cols,
            storage,
            nnz: 0,
            store,
        })
    }

    /// Build a matrix whose outer vectors are copies of `vectors`, in order. All
    /// vectors must share one format and length.
    pub fn from_vectors(storage: CompressedStorage, vectors: &[Vector<T, I>]) -> Result<Matrix<T, I>> {
        let first = vectors
            .first()
            .ok_or_else(|| Error::MalformedInput("no vectors given".to_string()))?;

        let mut mat = Matrix::empty(first.format(), storage, first.len())?;
        for v in vectors {
            mat.append(v)?;
        }
        Ok(mat)
    }

    /// Number of rows in the matrix
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns in the matrix
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shape in (rows, cols) of the matrix
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Length of each outer vector
    pub fn inner_dim(&self) -> usize {
        match self.storage {
            CompressedStorage::CSC => self.rows,
            CompressedStorage::CSR => self.cols,
        }
    }

    /// Number of outer vectors
    pub fn outer_dim(&self) -> usize {
        match self.storage {
            CompressedStorage::CSC => self.cols,
            CompressedStorage::CSR => self.rows,
        }
    }

    /// Number of stored entries, explicit zeros included
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Footprint in bytes: the header, an 8-byte length record per outer vector,
    /// and the encoded payload. Always reflects the current buffers.
    pub fn byte_size(&self) -> usize {
        META_DATA_SIZE + 8 * self.outer_dim() + self.store.payload_bytes()
    }

    /// Storage format
    pub fn format(&self) -> Format {
        self.store.format()
    }

    /// Storage order
    pub fn storage(&self) -> CompressedStorage {
        self.storage
    }

    /// Is the matrix laid out column-major / compressed sparse column (CSC) layout.
    pub fn is_csc(&self) -> bool {
        self.storage == CompressedStorage::CSC
    }

    /// Is the matrix laid out row-major / compressed sparse row (CSR) layout.
    pub fn is_csr(&self) -> bool {
        self.storage == CompressedStorage::CSR
    }

    /// Descriptor of the element type and storage order
    pub fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::of::<T>(self.storage)
    }

    /// Header describing the matrix
    pub fn metadata(&self) -> MetadataHeader {
        MetadataHeader {
            format_tag: self.format().tag(),
            inner_dim: self.inner_dim() as u32,
            outer_dim: self.outer_dim() as u32,
            nnz: self.nnz as u32,
            value_type: self.type_descriptor(),
            index_width: I::width() as u32,
        }
    }

    fn check_outer(&self, outer: usize) -> Result<()> {
        if outer >= self.outer_dim() {
            return Err(Error::OutOfRange {
                index: outer,
                bound: self.outer_dim(),
            });
        }
        Ok(())
    }

    /// Forward-only iterator over the `(inner index, value)` entries of vector `outer`
    pub fn inner_iter(&self, outer: usize) -> Result<InnerIter<'_, T, I>> {
        self.check_outer(outer)?;
        Ok(self.store.inner_iter(outer))
    }

    /// Iterate over all stored `(row, col, value)` entries, vector by vector
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let csc = self.is_csc();
        (0..self.outer_dim()).flat_map(move |outer| {
            self.store.inner_iter(outer).map(move |(inner, v)| {
                if csc {
                    (inner, outer, v)
                } else {
                    (outer, inner, v)
                }
            })
        })
    }

    /// Value at `(row, col)`, zero if not stored. Scans the owning vector.
    pub fn coeff(&self, row: usize, col: usize) -> Result<T> {
        if row >= self.rows {
            return Err(Error::OutOfRange {
                index: row,
                bound: self.rows,
            });
        }
        if col >= self.cols {
            return Err(Error::OutOfRange {
                index: col,
                bound: self.cols,
            });
        }

        let (inner, outer) = if self.is_csc() { (row, col) } else { (col, row) };
        Ok(self
            .store
            .inner_iter(outer)
            .find(|&(i, _)| i == inner)
            .map_or_else(T::zero, |(_, v)| v))
    }

    /// Independent copy of outer vector `outer`
    pub fn vector(&self, outer: usize) -> Result<Vector<T, I>> {
        self.check_outer(outer)?;
        Ok(Vector::copy_of(&self.store, outer, self.inner_dim()))
    }

    /// Distinct values, counts and indices of vector `outer` of a value-grouped matrix
    pub fn grouped_column(&self, outer: usize) -> Result<(&[T], &[I], &[I])> {
        self.check_outer(outer)?;
        match &self.store {
            Store::Grouped(s) => Ok((s.values(outer), s.counts(outer), s.indices(outer))),
            other => Err(Error::FormatMismatch {
                expected: Format::ValueGrouped,
                found: other.format().tag(),
            }),
        }
    }

    /// Decoded runs of vector `outer` of a delta run-length matrix
    pub fn delta_runs(&self, outer: usize) -> Result<Vec<Run<T>>> {
        self.check_outer(outer)?;
        match &self.store {
            Store::Delta(s) => Ok(s.runs(outer)),
            other => Err(Error::FormatMismatch {
                expected: Format::DeltaRunLength,
                found: other.format().tag(),
            }),
        }
    }

    /// Append a copy of `v` as a new outer vector. An empty vector allocates nothing.
    pub fn append(&mut self, v: &Vector<T, I>) -> Result<()> {
        if v.len() != self.inner_dim() {
            return Err(Error::MalformedInput(format!(
                "vector of length {} appended to vectors of length {}",
                v.len(),
                self.inner_dim()
            )));
        }
        check_dim::<I>(self.outer_dim() + 1)?;
        check_nnz(self.nnz + v.nnz())?;

        if !self.store.push_copy(&v.store, 0) {
            return Err(Error::FormatMismatch {
                expected: self.format(),
                found: v.format().tag(),
            });
        }

        match self.storage {
            CompressedStorage::CSC => self.cols += 1,
            CompressedStorage::CSR => self.rows += 1,
        }
        self.nnz += v.nnz();
        Ok(())
    }

    /// New matrix holding copies of the outer vectors `start..end`. The entry count
    /// is recomputed by decoding the copied vectors.
    pub fn slice(&self, start: usize, end: usize) -> Result<Matrix<T, I>> {
        if end > self.outer_dim() {
            return Err(Error::OutOfRange {
                index: end,
                bound: self.outer_dim(),
            });
        }
        if start > end {
            return Err(Error::OutOfRange { index: start, bound: end });
        }

        let mut store = Store::new(self.format());
        let mut nnz = 0;
        for outer in start..end {
            store.push_copy(&self.store, outer);
            nnz += store.inner_iter(outer - start).count();
        }

        let (rows, cols) = match self.storage {
            CompressedStorage::CSC => (self.rows, end - start),
            CompressedStorage::CSR => (end - start, self.cols),
        };

        Ok(Matrix {
            rows,
            cols,
            storage: self.storage,
            nnz,
            store,
        })
    }

    /// Multiply every stored value by `s` in place. Compressed formats touch one
    /// slot per distinct value and vector. Integer values wrap on overflow.
    pub fn scale_values(&mut self, s: T) {
        self.store.scale_values(s);
    }

    /// Copy of the matrix with every stored value multiplied by `s`, wrapping on
    /// integer overflow
    pub fn scalar_multiply(&self, s: T) -> Matrix<T, I> {
        let mut m = self.clone();
        m.scale_values(s);
        m
    }

    /// Convert the matrix to a dense 2D array
    pub fn to_dense(&self) -> Array2<T> {
        let mut arr = Array2::zeros((self.rows, self.cols));
        for (row, col, v) in self.iter() {
            arr[(row, col)] = v;
        }
        arr
    }

    /// Create a `sprs::CsMatI` with the same storage order and sorted inner indices
    pub fn to_csmat(&self) -> Result<sprs::CsMatI<T, I, usize>>
    where
        I: sprs::SpIndex,
    {
        let mut indptr = Vec::with_capacity(self.outer_dim() + 1);
        let mut indices = Vec::with_capacity(self.nnz);
        let mut values = Vec::with_capacity(self.nnz);
        let mut entries: Vec<(usize, T)> = Vec::new();

        indptr.push(0);
        for outer in 0..self.outer_dim() {
            entries.clear();
            entries.extend(self.store.inner_iter(outer));
            entries.sort_unstable_by_key(|&(i, _)| i);

            indices.extend(entries.iter().map(|&(i, _)| <I as IndexType>::from_usize(i)));
            values.extend(entries.iter().map(|&(_, v)| v));
            indptr.push(values.len());
        }

        let shape = (self.rows, self.cols);
        let mat = match self.storage {
            CompressedStorage::CSR => sprs::CsMatI::try_new(shape, indptr, indices, values),
            CompressedStorage::CSC => sprs::CsMatI::try_new_csc(shape, indptr, indices, values),
        };
        mat.map_err(|(_, _, _, e)| Error::Corrupt(format!("{e:?}")))
    }

    /// True if both matrices have the same shape and the same stored entries, bit for
    /// bit, regardless of format, storage order or index type.
    pub fn logically_eq<J: IndexType>(&self, other: &Matrix<T, J>) -> bool {
        if self.shape() != other.shape() || self.nnz != other.nnz {
            return false;
        }

        let sorted = |entries: Vec<(usize, usize, T)>| {
            let mut keyed: Vec<(usize, usize, u64)> = entries.into_iter().map(|(r, c, v)| (r, c, v.bits())).collect();
            keyed.sort_unstable();
            keyed
        };

        sorted(self.iter().collect()) == sorted(other.iter().collect())
    }
}
