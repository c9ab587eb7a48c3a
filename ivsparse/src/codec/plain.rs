use super::VectorStore;
use crate::element::{Element, IndexType};
use crate::metadata::Format;
use std::mem::size_of;

/// Standard compressed sparse storage: parallel value and index arrays for all
/// outer vectors, with `outer_ptr[j]..outer_ptr[j + 1]` delimiting vector `j`.
#[derive(Clone, Debug, PartialEq)]
pub struct PlainStore<T, I> {
    pub(crate) values: Vec<T>,
    pub(crate) indices: Vec<I>,
    pub(crate) outer_ptr: Vec<usize>,
}

impl<T: Element, I: IndexType> PlainStore<T, I> {
    /// Values of vector `outer`, in index order
    pub fn values(&self, outer: usize) -> &[T] {
        &self.values[self.outer_ptr[outer]..self.outer_ptr[outer + 1]]
    }

    /// Inner indices of vector `outer`, strictly increasing
    pub fn indices(&self, outer: usize) -> &[I] {
        &self.indices[self.outer_ptr[outer]..self.outer_ptr[outer + 1]]
    }

    /// Append a vector given as parallel slices, already in index order.
    pub(crate) fn push_slices(&mut self, indices: &[I], values: &[T]) {
        debug_assert_eq!(indices.len(), values.len());
        self.indices.extend_from_slice(indices);
        self.values.extend_from_slice(values);
        self.outer_ptr.push(self.values.len());
    }
}

impl<T: Element, I: IndexType> VectorStore<T> for PlainStore<T, I> {
    type Iter<'a> = PlainIter<'a, T, I> where Self: 'a;

    const FORMAT: Format = Format::PlainCsc;

    fn new() -> Self {
        PlainStore {
            values: Vec::new(),
            indices: Vec::new(),
            outer_ptr: vec![0],
        }
    }

    fn push_vector<E: IntoIterator<Item = (usize, T)>>(&mut self, entries: E) {
        let start = self.values.len();
        for (index, value) in entries {
            debug_assert!(self.indices.len() == start || self.indices[self.indices.len() - 1].index() < index);
            self.indices.push(I::from_usize(index));
            self.values.push(value);
        }
        self.outer_ptr.push(self.values.len());
    }

    fn push_copy(&mut self, other: &Self, outer: usize) {
        self.push_slices(other.indices(outer), other.values(outer));
    }

    fn outer_dim(&self) -> usize {
        self.outer_ptr.len() - 1
    }

    fn vector_nnz(&self, outer: usize) -> usize {
        self.outer_ptr[outer + 1] - self.outer_ptr[outer]
    }

    fn vector_iter(&self, outer: usize) -> PlainIter<'_, T, I> {
        PlainIter {
            indices: self.indices(outer),
            values: self.values(outer),
            pos: 0,
        }
    }

    fn vector_bytes(&self, outer: usize) -> usize {
        self.vector_nnz(outer) * (size_of::<T>() + size_of::<I>())
    }

    fn payload_bytes(&self) -> usize {
        self.values.len() * (size_of::<T>() + size_of::<I>())
    }

    fn scale_values(&mut self, s: T) {
        for v in self.values.iter_mut() {
            *v = v.scale(s);
        }
    }
}

/// Iterator over a plain vector, in index order
#[derive(Clone, Debug)]
pub struct PlainIter<'a, T, I> {
    indices: &'a [I],
    values: &'a [T],
    pos: usize,
}

impl<'a, T: Element, I: IndexType> Iterator for PlainIter<'a, T, I> {
    type Item = (usize, T);

    #[inline]
    fn next(&mut self) -> Option<(usize, T)> {
        let index = self.indices.get(self.pos)?;
        let value = self.values[self.pos];
        self.pos += 1;
        Some((index.index(), value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.indices.len() - self.pos;
        (left, Some(left))
    }
}

impl<'a, T: Element, I: IndexType> ExactSizeIterator for PlainIter<'a, T, I> {}
