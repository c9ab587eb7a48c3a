use crate::codec::{InnerIter, Run, Store};
use crate::element::{Element, IndexType};
use crate::error::{Error, Result};
use crate::mat::{check_dim, check_nnz};
use crate::metadata::Format;
use ndarray::Array1;

/// A single compressed sparse vector that owns its encoded bytes. Used to grow a
/// `Matrix` with `append`, or as an independent copy of one of its outer vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct Vector<T, I = u32> {
    pub(crate) len: usize,
    pub(crate) nnz: usize,
    pub(crate) store: Store<T, I>,
}

impl<T: Element, I: IndexType> Vector<T, I> {
    /// Encode a vector of length `len` from strictly increasing `indices` and
    /// matching `values`.
    pub fn from_sparse(format: Format, len: usize, indices: &[I], values: &[T]) -> Result<Vector<T, I>> {
        if len == 0 {
            return Err(Error::MalformedInput("vector length must be positive".to_string()));
        }
        check_dim::<I>(len)?;
        check_nnz(values.len())?;

        if indices.len() != values.len() {
            return Err(Error::MalformedInput(format!(
                "{} indices but {} values",
                indices.len(),
                values.len()
            )));
        }

        for pair in indices.windows(2) {
            if pair[0] >= pair[1] {
                return Err(Error::MalformedInput("indices are not strictly increasing".to_string()));
            }
        }
        if let Some(&last) = indices.last() {
            if last.index() >= len {
                return Err(Error::MalformedInput(format!(
                    "index {} exceeds length {len}",
                    last.index()
                )));
            }
        }

        let mut store = Store::new(format);
        store.push_vector(indices.iter().map(|i| i.index()).zip(values.iter().copied()));

        Ok(Vector {
            len,
            nnz: values.len(),
            store,
        })
    }

    /// Deep copy of vector `outer` of `store`
    pub(crate) fn copy_of(store: &Store<T, I>, outer: usize, len: usize) -> Vector<T, I> {
        let mut own = Store::new(store.format());
        own.push_copy(store, outer);

        Vector {
            len,
            nnz: store.vector_nnz(outer),
            store: own,
        }
    }

    /// Length of the vector
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the vector stores no entries
    pub fn is_empty(&self) -> bool {
        self.nnz == 0
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Storage format
    pub fn format(&self) -> Format {
        self.store.format()
    }

    /// Encoded size in bytes
    pub fn byte_size(&self) -> usize {
        self.store.vector_bytes(0)
    }

    /// Forward-only iterator over the stored `(index, value)` entries
    pub fn iter(&self) -> InnerIter<'_, T, I> {
        self.store.inner_iter(0)
    }

    /// Value at position `i`, zero if not stored
    pub fn coeff(&self, i: usize) -> Result<T> {
        if i >= self.len {
            return Err(Error::OutOfRange {
                index: i,
                bound: self.len,
            });
        }
        Ok(self.iter().find(|&(j, _)| j == i).map_or_else(T::zero, |(_, v)| v))
    }

    /// Distinct values, their counts and the grouped indices of a value-grouped vector
    pub fn grouped_parts(&self) -> Result<(&[T], &[I], &[I])> {
        match &self.store {
            Store::Grouped(s) => Ok((s.values(0), s.counts(0), s.indices(0))),
            other => Err(Error::FormatMismatch {
                expected: Format::ValueGrouped,
                found: other.format().tag(),
            }),
        }
    }

    /// Decoded runs of a delta run-length vector
    pub fn runs(&self) -> Result<Vec<Run<T>>> {
        match &self.store {
            Store::Delta(s) => Ok(s.runs(0)),
            other => Err(Error::FormatMismatch {
                expected: Format::DeltaRunLength,
                found: other.format().tag(),
            }),
        }
    }

    /// Re-encode the vector in another format
    pub fn to_format(&self, format: Format) -> Vector<T, I> {
        let mut entries: Vec<(usize, T)> = self.iter().collect();
        entries.sort_unstable_by_key(|&(i, _)| i);

        let mut store = Store::new(format);
        store.push_vector(entries);

        Vector {
            len: self.len,
            nnz: self.nnz,
            store,
        }
    }

    /// Convert to a dense array
    pub fn to_dense(&self) -> Array1<T> {
        let mut arr = Array1::zeros(self.len);
        for (i, v) in self.iter() {
            arr[i] = v;
        }
        arr
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gen_rand::random_vector;
    use ndarray::arr1;
    use rand::prelude::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    #[test]
    fn construction() {
        let v: Vector<u8, u16> = Vector::from_sparse(Format::ValueGrouped, 10, &[1, 4, 9], &[3, 2, 3]).unwrap();
        assert_eq!(v.len(), 10);
        assert_eq!(v.nnz(), 3);
        assert!(!v.is_empty());
        assert_eq!(v.coeff(9).unwrap(), 3);
        assert_eq!(v.coeff(5).unwrap(), 0);
        assert!(v.coeff(10).is_err());

        let (values, counts, indices) = v.grouped_parts().unwrap();
        assert_eq!(values, &[3, 2]);
        assert_eq!(counts, &[2, 1]);
        assert_eq!(indices, &[1, 9, 4]);
        assert!(v.runs().is_err());

        assert_eq!(v.to_dense(), arr1(&[0, 3, 0, 0, 2, 0, 0, 0, 0, 3]));
    }

    #[test]
    fn invalid_vectors() {
        let r: Result<Vector<u8, u8>> = Vector::from_sparse(Format::PlainCsc, 0, &[], &[]);
        assert!(r.is_err());

        let r: Result<Vector<u8, u8>> = Vector::from_sparse(Format::PlainCsc, 256, &[], &[]);
        assert!(matches!(r, Err(Error::IndexWidthOverflow { .. })));

        let r: Result<Vector<u8, u8>> = Vector::from_sparse(Format::PlainCsc, 5, &[3, 3], &[1, 1]);
        assert!(matches!(r, Err(Error::MalformedInput(_))));

        let r: Result<Vector<u8, u8>> = Vector::from_sparse(Format::PlainCsc, 5, &[5], &[1]);
        assert!(matches!(r, Err(Error::MalformedInput(_))));

        let r: Result<Vector<u8, u8>> = Vector::from_sparse(Format::PlainCsc, 5, &[1], &[1, 2]);
        assert!(matches!(r, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn empty_vector_has_no_bytes() {
        for format in Format::ALL {
            let v: Vector<f64> = Vector::from_sparse(format, 100, &[], &[]).unwrap();
            assert!(v.is_empty());
            assert_eq!(v.byte_size(), 0);
            assert_eq!(v.iter().count(), 0);
        }
    }

    #[test]
    fn format_changes() {
        let rng = &mut Pcg64Mcg::seed_from_u64(42);

        for _ in 0..20 {
            let v: Vector<i64> = random_vector(rng, Format::PlainCsc, 500, 0.3, 6).unwrap();
            let dense = v.to_dense();

            for format in Format::ALL {
                let w = v.to_format(format);
                assert_eq!(w.format(), format);
                assert_eq!(w.nnz(), v.nnz());
                assert_eq!(w.to_dense(), dense);
                assert_eq!(w.to_format(Format::PlainCsc), v);
            }
        }
    }

    #[test]
    fn delta_vector_runs() {
        let v: Vector<i32> = Vector::from_sparse(Format::DeltaRunLength, 1000, &[2, 300, 301], &[1, 1, 2]).unwrap();
        let runs = v.runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].width, 2);
        assert_eq!(runs[0].indices, vec![2, 300]);
        assert_eq!(runs[1].width, 2);
        assert_eq!(runs[1].indices, vec![301]);
    }
}
