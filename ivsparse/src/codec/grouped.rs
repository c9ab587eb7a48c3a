use super::{group_by_value, VectorStore};
use crate::element::{Element, IndexType};
use crate::metadata::Format;
use std::mem::size_of;

/// Value-grouped storage. Each outer vector stores its distinct values in
/// first-seen order, one count per value, and the inner indices of all values
/// concatenated in the same order. Indices are stored flat, not delta encoded.
///
/// Vector `j` owns `values[value_ptr[j]..value_ptr[j + 1]]`, the matching counts,
/// and `indices[index_ptr[j]..index_ptr[j + 1]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupedStore<T, I> {
    pub(crate) values: Vec<T>,
    pub(crate) counts: Vec<I>,
    pub(crate) indices: Vec<I>,
    pub(crate) value_ptr: Vec<usize>,
    pub(crate) index_ptr: Vec<usize>,
}

impl<T: Element, I: IndexType> GroupedStore<T, I> {
    /// Distinct values of vector `outer`, in first-seen order
    pub fn values(&self, outer: usize) -> &[T] {
        &self.values[self.value_ptr[outer]..self.value_ptr[outer + 1]]
    }

    /// Occurrence count of each distinct value of vector `outer`
    pub fn counts(&self, outer: usize) -> &[I] {
        &self.counts[self.value_ptr[outer]..self.value_ptr[outer + 1]]
    }

    /// Inner indices of vector `outer`, grouped by value
    pub fn indices(&self, outer: usize) -> &[I] {
        &self.indices[self.index_ptr[outer]..self.index_ptr[outer + 1]]
    }

    /// Number of distinct values in vector `outer`
    pub fn unique_values(&self, outer: usize) -> usize {
        self.value_ptr[outer + 1] - self.value_ptr[outer]
    }

    /// Append a vector from its three parts, which must be mutually consistent.
    pub(crate) fn push_parts(&mut self, values: &[T], counts: &[I], indices: &[I]) {
        self.values.extend_from_slice(values);
        self.counts.extend_from_slice(counts);
        self.indices.extend_from_slice(indices);
        self.value_ptr.push(self.values.len());
        self.index_ptr.push(self.indices.len());
    }
}

impl<T: Element, I: IndexType> VectorStore<T> for GroupedStore<T, I> {
    type Iter<'a> = GroupedIter<'a, T, I> where Self: 'a;

    const FORMAT: Format = Format::ValueGrouped;

    fn new() -> Self {
        GroupedStore {
            values: Vec::new(),
            counts: Vec::new(),
            indices: Vec::new(),
            value_ptr: vec![0],
            index_ptr: vec![0],
        }
    }

    fn push_vector<E: IntoIterator<Item = (usize, T)>>(&mut self, entries: E) {
        for group in group_by_value(entries) {
            self.values.push(group.value);
            self.counts.push(I::from_usize(group.indices.len()));
            self.indices.extend(group.indices.iter().map(|&i| I::from_usize(i)));
        }
        self.value_ptr.push(self.values.len());
        self.index_ptr.push(self.indices.len());
    }

    fn push_copy(&mut self, other: &Self, outer: usize) {
        self.push_parts(other.values(outer), other.counts(outer), other.indices(outer));
    }

    fn outer_dim(&self) -> usize {
        self.value_ptr.len() - 1
    }

    fn vector_nnz(&self, outer: usize) -> usize {
        self.index_ptr[outer + 1] - self.index_ptr[outer]
    }

    fn vector_iter(&self, outer: usize) -> GroupedIter<'_, T, I> {
        GroupedIter {
            values: self.values(outer),
            counts: self.counts(outer),
            indices: self.indices(outer),
            slot: 0,
            left_in_slot: 0,
            pos: 0,
        }
    }

    fn vector_bytes(&self, outer: usize) -> usize {
        self.unique_values(outer) * (size_of::<T>() + size_of::<I>()) + self.vector_nnz(outer) * size_of::<I>()
    }

    fn payload_bytes(&self) -> usize {
        self.values.len() * (size_of::<T>() + size_of::<I>()) + self.indices.len() * size_of::<I>()
    }

    fn scale_values(&mut self, s: T) {
        // only the distinct values change; counts and indices are untouched
        for v in self.values.iter_mut() {
            *v = v.scale(s);
        }
    }
}

/// Iterator over a value-grouped vector. Yields all indices of the first value,
/// then all of the second, and so on.
#[derive(Clone, Debug)]
pub struct GroupedIter<'a, T, I> {
    values: &'a [T],
    counts: &'a [I],
    indices: &'a [I],
    slot: usize,
    left_in_slot: usize,
    pos: usize,
}

impl<'a, T: Element, I: IndexType> Iterator for GroupedIter<'a, T, I> {
    type Item = (usize, T);

    #[inline]
    fn next(&mut self) -> Option<(usize, T)> {
        // every stored count is at least one
        if self.left_in_slot == 0 {
            let count = self.counts.get(self.slot)?;
            self.left_in_slot = count.index();
            self.slot += 1;
        }

        let index = self.indices[self.pos].index();
        self.pos += 1;
        self.left_in_slot -= 1;
        Some((index, self.values[self.slot - 1]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.indices.len() - self.pos;
        (left, Some(left))
    }
}

impl<'a, T: Element, I: IndexType> ExactSizeIterator for GroupedIter<'a, T, I> {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn grouped_layout() {
        // column 0 of a 4 x 3 matrix with 5 at rows 0 and 2
        let mut s: GroupedStore<i32, u32> = GroupedStore::new();
        s.push_vector(vec![(0, 5), (2, 5)]);
        s.push_vector(vec![(1, 7), (2, 3), (3, 7)]);

        assert_eq!(s.values(0), &[5]);
        assert_eq!(s.counts(0), &[2]);
        assert_eq!(s.indices(0), &[0, 2]);

        assert_eq!(s.values(1), &[7, 3]);
        assert_eq!(s.counts(1), &[2, 1]);
        assert_eq!(s.indices(1), &[1, 3, 2]);
        assert_eq!(s.unique_values(1), 2);

        // 2 values * (4 + 4) + 3 indices * 4
        assert_eq!(s.vector_bytes(1), 28);

        let v: Vec<_> = s.vector_iter(1).collect();
        assert_eq!(v, vec![(1, 7), (3, 7), (2, 3)]);
        assert_eq!(s.vector_iter(1).len(), 3);
    }

    #[test]
    fn grouped_scale_touches_values_only() {
        let mut s: GroupedStore<u16, u8> = GroupedStore::new();
        s.push_vector(vec![(0, 2), (1, 2), (5, 4)]);
        s.push_empty();
        s.scale_values(3);

        assert_eq!(s.values(0), &[6, 12]);
        assert_eq!(s.counts(0), &[2, 1]);
        assert_eq!(s.indices(0), &[0, 1, 5]);
        assert_eq!(s.vector_iter(1).next(), None);
        assert_eq!(s.vector_bytes(1), 0);
    }
}
