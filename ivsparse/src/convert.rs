use crate::codec::Store;
use crate::element::{Element, IndexType};
use crate::mat::{EncodeOptions, Matrix};
use crate::metadata::Format;
use log::info;
use std::collections::BTreeMap;
use std::time::Instant;

impl<T: Element, I: IndexType> Matrix<T, I> {
    /// Re-encode the matrix in `format`. Shape, storage order, entry count and values
    /// are unchanged; the source matrix is left untouched.
    pub fn to_format(&self, format: Format) -> Matrix<T, I> {
        self.to_format_with(format, EncodeOptions::default())
    }

    /// Re-encode the matrix in `format` with explicit encode options.
    pub fn to_format_with(&self, format: Format, options: EncodeOptions) -> Matrix<T, I> {
        let tick = Instant::now();

        // decoded vectors come out grouped by value; the map restores index order
        let vectors: Vec<BTreeMap<usize, T>> = (0..self.outer_dim())
            .map(|outer| self.store.inner_iter(outer).collect())
            .collect();

        let store = Store::build(format, vectors.len(), options.parallel, |j| {
            vectors[j].iter().map(|(&i, &v)| (i, v))
        });

        let mat = Matrix {
            rows: self.rows,
            cols: self.cols,
            storage: self.storage,
            nnz: self.nnz,
            store,
        };

        info!(
            "converted {} x {} matrix from {} to {}: {} -> {} bytes, took {:.3}s",
            self.rows,
            self.cols,
            self.format(),
            format,
            self.byte_size(),
            mat.byte_size(),
            tick.elapsed().as_millis() as f64 / 1000.0
        );
        mat
    }

    /// Transposed copy of the matrix in the same format and storage order. Run
    /// widths are derived again for the new orientation.
    pub fn transpose(&self) -> Matrix<T, I> {
        let tick = Instant::now();

        // scanning old vectors in outer order keeps every new vector sorted
        let mut vectors: Vec<Vec<(usize, T)>> = vec![Vec::new(); self.inner_dim()];
        for outer in 0..self.outer_dim() {
            for (inner, v) in self.store.inner_iter(outer) {
                vectors[inner].push((outer, v));
            }
        }

        let store = Store::build(self.format(), vectors.len(), false, |j| vectors[j].iter().copied());

        let mat = Matrix {
            rows: self.cols,
            cols: self.rows,
            storage: self.storage,
            nnz: self.nnz,
            store,
        };

        info!(
            "transposed {} x {} {} matrix, nnz {}, took {:.3}s",
            self.rows,
            self.cols,
            self.format(),
            self.nnz,
            tick.elapsed().as_millis() as f64 / 1000.0
        );
        mat
    }
}
