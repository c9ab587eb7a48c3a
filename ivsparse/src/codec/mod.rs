//! Per-vector encoders and decoders for the three storage formats.
//!
//! Every store keeps all of its outer vectors in one contiguous arena plus an
//! offset table, so a matrix owns O(1) allocations regardless of its outer
//! dimension. Outer vectors never share bytes, which keeps encoding of
//! distinct vectors independent and safe to run in parallel.

use crate::element::{Element, IndexType};
use crate::metadata::Format;
use fxhash::FxHashMap;
use rayon::prelude::*;
use std::fmt::Debug;

/// Delta run-length codec
pub mod delta;

/// Value-grouped codec
pub mod grouped;

/// Plain compressed sparse codec
pub mod plain;

pub use delta::{DeltaIter, DeltaStore, Run, RunState};
pub use grouped::{GroupedIter, GroupedStore};
pub use plain::{PlainIter, PlainStore};

/// Storage for a sequence of encoded outer vectors.
pub trait VectorStore<T: Element>: Clone + Debug + PartialEq + Send + Sync {
    /// Forward-only decoder over one outer vector
    type Iter<'a>: Iterator<Item = (usize, T)>
    where
        Self: 'a;

    /// Format implemented by this store
    const FORMAT: Format;

    /// Store with no outer vectors
    fn new() -> Self;

    /// Encode one outer vector and append it. `entries` are `(inner index, value)`
    /// pairs with strictly increasing inner index.
    fn push_vector<E: IntoIterator<Item = (usize, T)>>(&mut self, entries: E);

    /// Append a deep copy of outer vector `outer` of `other`
    fn push_copy(&mut self, other: &Self, outer: usize);

    /// Number of outer vectors
    fn outer_dim(&self) -> usize;

    /// Number of stored entries in outer vector `outer`
    fn vector_nnz(&self, outer: usize) -> usize;

    /// Decode outer vector `outer`
    fn vector_iter(&self, outer: usize) -> Self::Iter<'_>;

    /// Encoded size of outer vector `outer` in bytes
    fn vector_bytes(&self, outer: usize) -> usize;

    /// Total encoded size of all outer vectors in bytes
    fn payload_bytes(&self) -> usize;

    /// Multiply every stored value by `s`, wrapping on integer overflow
    fn scale_values(&mut self, s: T);

    /// Append an empty outer vector; allocates nothing
    fn push_empty(&mut self) {
        self.push_vector(std::iter::empty());
    }
}

/// All row positions sharing one value within an outer vector
#[derive(Clone, Debug, PartialEq)]
pub struct ValueGroup<T> {
    /// The shared value
    pub value: T,

    /// Inner indices holding `value`, in input order
    pub indices: Vec<usize>,
}

/// Group `(index, value)` entries by value. Groups appear in order of first
/// occurrence and the indices of each group keep their input order, so sorted
/// input yields strictly increasing indices per group. Each entry is consumed
/// exactly once and the caller's data is never modified.
pub fn group_by_value<T: Element>(entries: impl IntoIterator<Item = (usize, T)>) -> Vec<ValueGroup<T>> {
    let mut slots: FxHashMap<u64, usize> = FxHashMap::default();
    let mut groups: Vec<ValueGroup<T>> = Vec::new();

    for (index, value) in entries {
        let slot = *slots.entry(value.bits()).or_insert_with(|| {
            groups.push(ValueGroup {
                value,
                indices: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].indices.push(index);
    }

    groups
}

/// Build a store of `outer_dim` vectors, where `entries(j)` yields the sorted
/// entries of vector `j`. With `parallel`, vectors are encoded on the rayon pool
/// and concatenated in outer order, giving the same bytes as the sequential path.
pub fn build_store<S, T, F, E>(outer_dim: usize, parallel: bool, entries: F) -> S
where
    S: VectorStore<T>,
    T: Element,
    F: Fn(usize) -> E + Sync,
    E: IntoIterator<Item = (usize, T)>,
{
    let mut store = S::new();

    if parallel {
        let parts: Vec<S> = (0..outer_dim)
            .into_par_iter()
            .map(|j| {
                let mut part = S::new();
                part.push_vector(entries(j));
                part
            })
            .collect();

        for part in &parts {
            store.push_copy(part, 0);
        }
    } else {
        for j in 0..outer_dim {
            store.push_vector(entries(j));
        }
    }

    store
}

/// Encoded outer vectors in one of the three formats
#[derive(Clone, Debug, PartialEq)]
pub enum Store<T, I> {
    /// Plain compressed sparse storage
    Plain(PlainStore<T, I>),

    /// Value-grouped storage
    Grouped(GroupedStore<T, I>),

    /// Delta run-length storage
    Delta(DeltaStore<T>),
}

#[macro_export]
/// Execute an expression over all variants of a `Store`. Expression `e` should treat
/// `v` as an `impl VectorStore`.
macro_rules! store_expand {
    ($input:expr, $v:ident, $e:expr) => {{
        use $crate::codec::Store::*;
        match $input {
            Plain($v) => $e,
            Grouped($v) => $e,
            Delta($v) => $e,
        }
    }};
}

impl<T: Element, I: IndexType> Store<T, I> {
    /// Empty store of the given format
    pub fn new(format: Format) -> Store<T, I> {
        match format {
            Format::PlainCsc => Store::Plain(PlainStore::new()),
            Format::ValueGrouped => Store::Grouped(GroupedStore::new()),
            Format::DeltaRunLength => Store::Delta(DeltaStore::new()),
        }
    }

    /// Build a store of the given format, see `build_store`
    pub fn build<F, E>(format: Format, outer_dim: usize, parallel: bool, entries: F) -> Store<T, I>
    where
        F: Fn(usize) -> E + Sync,
        E: IntoIterator<Item = (usize, T)>,
    {
        match format {
            Format::PlainCsc => Store::Plain(build_store(outer_dim, parallel, entries)),
            Format::ValueGrouped => Store::Grouped(build_store(outer_dim, parallel, entries)),
            Format::DeltaRunLength => Store::Delta(build_store(outer_dim, parallel, entries)),
        }
    }

    /// Format of the store
    pub fn format(&self) -> Format {
        match self {
            Store::Plain(_) => Format::PlainCsc,
            Store::Grouped(_) => Format::ValueGrouped,
            Store::Delta(_) => Format::DeltaRunLength,
        }
    }

    /// Append one encoded outer vector
    pub fn push_vector<E: IntoIterator<Item = (usize, T)>>(&mut self, entries: E) {
        store_expand!(self, s, s.push_vector(entries))
    }

    /// Append an empty outer vector
    pub fn push_empty(&mut self) {
        store_expand!(self, s, s.push_empty())
    }

    /// Append a copy of vector `outer` of `other`. Returns false, leaving `self`
    /// untouched, when the formats differ.
    pub fn push_copy(&mut self, other: &Store<T, I>, outer: usize) -> bool {
        match (self, other) {
            (Store::Plain(a), Store::Plain(b)) => a.push_copy(b, outer),
            (Store::Grouped(a), Store::Grouped(b)) => a.push_copy(b, outer),
            (Store::Delta(a), Store::Delta(b)) => a.push_copy(b, outer),
            _ => return false,
        }
        true
    }

    /// Number of outer vectors
    pub fn outer_dim(&self) -> usize {
        store_expand!(self, s, s.outer_dim())
    }

    /// Stored entries of vector `outer`
    pub fn vector_nnz(&self, outer: usize) -> usize {
        store_expand!(self, s, s.vector_nnz(outer))
    }

    /// Encoded bytes of vector `outer`
    pub fn vector_bytes(&self, outer: usize) -> usize {
        store_expand!(self, s, s.vector_bytes(outer))
    }

    /// Encoded bytes of all vectors
    pub fn payload_bytes(&self) -> usize {
        store_expand!(self, s, s.payload_bytes())
    }

    /// Multiply every stored value by `s`
    pub fn scale_values(&mut self, scalar: T) {
        store_expand!(self, s, s.scale_values(scalar))
    }

    /// Decode vector `outer`
    pub fn inner_iter(&self, outer: usize) -> InnerIter<'_, T, I> {
        match self {
            Store::Plain(s) => InnerIter::Plain(s.vector_iter(outer)),
            Store::Grouped(s) => InnerIter::Grouped(s.vector_iter(outer)),
            Store::Delta(s) => InnerIter::Delta(s.vector_iter(outer)),
        }
    }
}

/// Forward-only iterator over the `(inner index, value)` entries of one outer vector.
/// Plain vectors yield entries in index order; the compressed formats yield them
/// grouped by value, in first-seen value order.
#[derive(Clone, Debug)]
pub enum InnerIter<'a, T, I> {
    /// Iterator over a plain vector
    Plain(PlainIter<'a, T, I>),

    /// Iterator over a value-grouped vector
    Grouped(GroupedIter<'a, T, I>),

    /// Iterator over a delta run-length vector
    Delta(DeltaIter<'a, T>),
}

impl<'a, T: Element, I: IndexType> Iterator for InnerIter<'a, T, I> {
    type Item = (usize, T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match self {
            InnerIter::Plain(v) => v.next(),
            InnerIter::Grouped(v) => v.next(),
            InnerIter::Delta(v) => v.next(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn grouping_first_seen() {
        let entries = vec![(0usize, 5i32), (1, 7), (2, 5), (4, 3), (6, 7)];
        let groups = group_by_value(entries.iter().copied());

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].value, 5);
        assert_eq!(groups[0].indices, vec![0, 2]);
        assert_eq!(groups[1].value, 7);
        assert_eq!(groups[1].indices, vec![1, 6]);
        assert_eq!(groups[2].value, 3);
        assert_eq!(groups[2].indices, vec![4]);

        // input untouched
        assert_eq!(entries[2], (2, 5));
    }

    #[test]
    fn grouping_by_bit_pattern() {
        let groups = group_by_value(vec![(0usize, 0.0f64), (1, -0.0), (2, 0.0)]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].indices, vec![0, 2]);
        assert!(groups[1].value.is_sign_negative());
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let vectors: Vec<Vec<(usize, u32)>> = (0..40)
            .map(|j| (0..j).filter(|i| i % 3 != 0).map(|i| (i, (i % 4) as u32 + 1)).collect())
            .collect();

        for format in Format::ALL {
            let seq: Store<u32, u32> = Store::build(format, vectors.len(), false, |j| vectors[j].iter().copied());
            let par: Store<u32, u32> = Store::build(format, vectors.len(), true, |j| vectors[j].iter().copied());
            assert_eq!(seq, par);
            assert_eq!(seq.outer_dim(), 40);
        }
    }

    #[test]
    fn mixed_format_copy_rejected() {
        let mut a: Store<u8, u16> = Store::new(Format::PlainCsc);
        let mut b: Store<u8, u16> = Store::new(Format::DeltaRunLength);
        b.push_vector(vec![(1, 2u8)]);

        assert!(!a.push_copy(&b, 0));
        assert_eq!(a.outer_dim(), 0);

        a.push_empty();
        assert_eq!(a.outer_dim(), 1);
        assert_eq!(a.payload_bytes(), 0);
    }
}
