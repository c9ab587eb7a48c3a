//! Delta run-length codec.
//!
//! An outer vector is a sequence of runs, one per distinct value in first-seen
//! order. Each run is laid out as
//!
//! ```text
//! value (size_of::<T>() bytes) | width w (1 byte) | first index | delta | ... | delta | 0
//! ```
//!
//! where every word after the width byte is `w` bytes little-endian. The first
//! index is absolute and may be zero; the remaining words are differences between
//! consecutive indices and are therefore at least one, so the single zero word
//! that follows them delimits the run. `w` is the smallest of 1, 2, 4 and 8 bytes
//! that holds the first index and every delta of the run. An empty vector
//! encodes to zero bytes.

use super::{group_by_value, VectorStore};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::metadata::Format;
use crate::width::{byte_width, is_valid_width, read_word, write_word};
use std::marker::PhantomData;
use std::mem::size_of;

/// Word terminating a run
const DELIMITER: u64 = 0;

/// Delta run-length storage: the byte streams of all outer vectors in one arena,
/// vector `j` occupying `data[outer_ptr[j]..outer_ptr[j + 1]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct DeltaStore<T> {
    pub(crate) data: Vec<u8>,
    pub(crate) outer_ptr: Vec<usize>,
    _t: PhantomData<T>,
}

/// One decoded run: a value, the word width used to encode it, and its absolute indices
#[derive(Clone, Debug, PartialEq)]
pub struct Run<T> {
    /// Value shared by every index of the run
    pub value: T,

    /// Byte width of the index words
    pub width: u8,

    /// Strictly increasing inner indices
    pub indices: Vec<usize>,
}

/// Width of the words needed for a run over sorted `indices`
fn run_width(indices: &[usize]) -> u8 {
    let mut max = indices.first().copied().unwrap_or(0) as u64;
    for pair in indices.windows(2) {
        max = max.max((pair[1] - pair[0]) as u64);
    }
    byte_width(max)
}

impl<T: Element> DeltaStore<T> {
    /// Encoded bytes of vector `outer`
    pub fn vector_data(&self, outer: usize) -> &[u8] {
        &self.data[self.outer_ptr[outer]..self.outer_ptr[outer + 1]]
    }

    /// Decode vector `outer` into its runs
    pub fn runs(&self, outer: usize) -> Vec<Run<T>> {
        let mut runs: Vec<Run<T>> = Vec::new();
        let mut iter = self.vector_iter(outer);

        while let Some((index, value)) = iter.next() {
            if iter.is_new_run() {
                runs.push(Run {
                    value,
                    width: iter.run_width(),
                    indices: Vec::new(),
                });
            }
            if let Some(run) = runs.last_mut() {
                run.indices.push(index);
            }
        }

        runs
    }

    /// Append an already-validated encoded vector.
    pub(crate) fn push_raw(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.outer_ptr.push(self.data.len());
    }
}

impl<T: Element> VectorStore<T> for DeltaStore<T> {
    type Iter<'a> = DeltaIter<'a, T> where Self: 'a;

    const FORMAT: Format = Format::DeltaRunLength;

    fn new() -> Self {
        DeltaStore {
            data: Vec::new(),
            outer_ptr: vec![0],
            _t: PhantomData,
        }
    }

    fn push_vector<E: IntoIterator<Item = (usize, T)>>(&mut self, entries: E) {
        let groups = group_by_value(entries);
        let widths: Vec<u8> = groups.iter().map(|g| run_width(&g.indices)).collect();

        let len: usize = groups
            .iter()
            .zip(&widths)
            .map(|(g, &w)| size_of::<T>() + 1 + (g.indices.len() + 1) * w as usize)
            .sum();

        let mut pos = self.data.len();
        self.data.resize(pos + len, 0);
        let buf = &mut self.data;

        for (group, &width) in groups.iter().zip(&widths) {
            let w = width as usize;

            group.value.write_le(&mut buf[pos..]);
            pos += size_of::<T>();
            buf[pos] = width;
            pos += 1;

            let mut prev = 0;
            for (k, &index) in group.indices.iter().enumerate() {
                let word = if k == 0 { index } else { index - prev };
                write_word(&mut buf[pos..], width, word as u64);
                prev = index;
                pos += w;
            }

            write_word(&mut buf[pos..], width, DELIMITER);
            pos += w;
        }

        debug_assert_eq!(pos, self.data.len());
        self.outer_ptr.push(self.data.len());
    }

    fn push_copy(&mut self, other: &Self, outer: usize) {
        self.push_raw(other.vector_data(outer));
    }

    fn outer_dim(&self) -> usize {
        self.outer_ptr.len() - 1
    }

    fn vector_nnz(&self, outer: usize) -> usize {
        self.vector_iter(outer).count()
    }

    fn vector_iter(&self, outer: usize) -> DeltaIter<'_, T> {
        DeltaIter::new(self.vector_data(outer))
    }

    fn vector_bytes(&self, outer: usize) -> usize {
        self.outer_ptr[outer + 1] - self.outer_ptr[outer]
    }

    fn payload_bytes(&self) -> usize {
        self.data.len()
    }

    fn scale_values(&mut self, s: T) {
        // rewrite the value slot of each run in place; index words are untouched
        let mut pos = 0;
        while pos < self.data.len() {
            let value = T::read_le(&self.data[pos..]);
            value.scale(s).write_le(&mut self.data[pos..]);
            pos += size_of::<T>();

            let width = self.data[pos];
            let w = width as usize;
            pos += 1 + w;

            loop {
                let word = read_word(&self.data[pos..], width);
                pos += w;
                if word == DELIMITER {
                    break;
                }
            }
        }
    }
}

/// Position of a `DeltaIter` relative to the run structure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Next bytes are a run header, or the end of the vector
    AtBoundary,

    /// Next word is a delta within the current run, or its delimiter
    InRun,
}

impl RunState {
    /// State after consuming index word `word` within a run
    #[inline]
    pub fn after_word(word: u64) -> RunState {
        if word == DELIMITER {
            RunState::AtBoundary
        } else {
            RunState::InRun
        }
    }
}

/// Forward-only decoder over one delta run-length vector. Entries come out run by
/// run, with increasing indices inside each run.
#[derive(Clone, Debug)]
pub struct DeltaIter<'a, T> {
    buf: &'a [u8],
    pos: usize,
    state: RunState,
    value: T,
    width: u8,
    index: usize,
    new_run: bool,
}

impl<'a, T: Element> DeltaIter<'a, T> {
    /// Iterator over an encoded vector of length `inner_dim`. The buffer is checked
    /// structurally first, so a malformed one is an error instead of a panic.
    pub fn from_encoded(buf: &'a [u8], inner_dim: usize) -> Result<DeltaIter<'a, T>> {
        validate_vector::<T>(buf, inner_dim)?;
        Ok(DeltaIter::new(buf))
    }

    /// Iterator over an encoded vector. `buf` must hold whole, well-formed runs.
    pub(crate) fn new(buf: &'a [u8]) -> DeltaIter<'a, T> {
        DeltaIter {
            buf,
            pos: 0,
            state: RunState::AtBoundary,
            value: T::zero(),
            width: 1,
            index: 0,
            new_run: false,
        }
    }

    /// True if the last entry returned was the first of its run
    pub fn is_new_run(&self) -> bool {
        self.new_run
    }

    /// Word width of the current run
    pub fn run_width(&self) -> u8 {
        self.width
    }

    /// Current decoder state
    pub fn state(&self) -> RunState {
        self.state
    }
}

impl<'a, T: Element> Iterator for DeltaIter<'a, T> {
    type Item = (usize, T);

    #[inline]
    fn next(&mut self) -> Option<(usize, T)> {
        loop {
            match self.state {
                RunState::AtBoundary => {
                    if self.pos >= self.buf.len() {
                        return None;
                    }

                    self.value = T::read_le(&self.buf[self.pos..]);
                    self.pos += size_of::<T>();
                    self.width = self.buf[self.pos];
                    self.pos += 1;

                    // the first index is absolute and may be zero, so it is never a delimiter
                    self.index = read_word(&self.buf[self.pos..], self.width) as usize;
                    self.pos += self.width as usize;

                    self.state = RunState::InRun;
                    self.new_run = true;
                    return Some((self.index, self.value));
                }
                RunState::InRun => {
                    let word = read_word(&self.buf[self.pos..], self.width);
                    self.pos += self.width as usize;
                    self.state = RunState::after_word(word);

                    if self.state == RunState::InRun {
                        self.index += word as usize;
                        self.new_run = false;
                        return Some((self.index, self.value));
                    }
                }
            }
        }
    }
}

/// Check that `buf` is a well-formed encoded vector of length `inner_dim`, holding
/// element type `T`. Returns the number of entries.
pub fn validate_vector<T: Element>(buf: &[u8], inner_dim: usize) -> Result<usize> {
    let corrupt = |msg: &str, pos: usize| Error::Corrupt(format!("{msg} at byte {pos}"));

    let mut seen: Vec<usize> = Vec::new();
    let mut pos = 0;

    while pos < buf.len() {
        if pos + size_of::<T>() + 1 > buf.len() {
            return Err(corrupt("truncated run header", pos));
        }
        pos += size_of::<T>();

        let width = buf[pos];
        if !is_valid_width(width) {
            return Err(corrupt(&format!("invalid run width {width}"), pos));
        }
        pos += 1;
        let w = width as usize;

        let mut first = true;
        let mut index: u64 = 0;
        loop {
            if pos + w > buf.len() {
                return Err(corrupt("unterminated run", pos));
            }
            let word = read_word(&buf[pos..], width);
            pos += w;

            if !first && word == DELIMITER {
                break;
            }

            index = if first {
                word
            } else {
                index.checked_add(word).ok_or_else(|| corrupt("index overflow", pos))?
            };
            first = false;

            if index >= inner_dim as u64 {
                return Err(Error::Corrupt(format!(
                    "index {index} out of range for vector length {inner_dim}"
                )));
            }
            seen.push(index as usize);
        }
    }

    seen.sort_unstable();
    if seen.windows(2).any(|p| p[0] == p[1]) {
        return Err(Error::Corrupt("index stored in more than one run".to_string()));
    }

    Ok(seen.len())
}
