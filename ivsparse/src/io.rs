use crate::codec::delta::validate_vector;
use crate::codec::{DeltaStore, GroupedStore, PlainStore, Store, VectorStore};
use crate::element::{Element, IndexType};
use crate::error::{Error, Result};
use crate::mat::{check_dim, Matrix};
use crate::metadata::{Format, MetadataHeader};
use crate::width::{read_word, write_word};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use sprs::CompressedStorage;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::mem::size_of;
use std::path::Path;
use std::time::Instant;

fn encode_values<T: Element>(values: &[T], out: &mut Vec<u8>) {
    let start = out.len();
    out.resize(start + values.len() * size_of::<T>(), 0);
    for (chunk, v) in out[start..].chunks_exact_mut(size_of::<T>()).zip(values) {
        v.write_le(chunk);
    }
}

fn encode_indices<I: IndexType>(indices: &[I], out: &mut Vec<u8>) {
    let width = I::width();
    let start = out.len();
    out.resize(start + indices.len() * width, 0);
    for (chunk, i) in out[start..].chunks_exact_mut(width).zip(indices) {
        write_word(chunk, width as u8, i.index() as u64);
    }
}

fn decode_values<T: Element>(buf: &[u8]) -> Vec<T> {
    buf.chunks_exact(size_of::<T>()).map(T::read_le).collect()
}

fn decode_indices<I: IndexType>(buf: &[u8]) -> Vec<I> {
    let width = I::width();
    buf.chunks_exact(width)
        .map(|chunk| I::from_usize(read_word(chunk, width as u8) as usize))
        .collect()
}

/// Words of a length table read per chunk. Tables grow with the bytes actually
/// read, so a corrupt header cannot force a large allocation up front.
const TABLE_CHUNK: usize = 1 << 16;

fn read_bytes<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len.min(TABLE_CHUNK));
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(Error::Io(ErrorKind::UnexpectedEof.into()));
    }
    Ok(buf)
}

fn read_table<W: Copy + Default, R: Read>(
    r: &mut R,
    len: usize,
    mut read_into: impl FnMut(&mut R, &mut [W]) -> std::io::Result<()>,
) -> Result<Vec<W>> {
    let mut table = Vec::with_capacity(len.min(TABLE_CHUNK));
    let mut chunk = vec![W::default(); len.min(TABLE_CHUNK)];

    let mut left = len;
    while left > 0 {
        let n = left.min(TABLE_CHUNK);
        read_into(r, &mut chunk[..n])?;
        table.extend_from_slice(&chunk[..n]);
        left -= n;
    }
    Ok(table)
}

/// Check that `indices` are strictly increasing and below `inner_dim`
fn check_sorted<I: IndexType>(indices: &[I], inner_dim: usize, outer: usize) -> Result<()> {
    let mut prev = None;
    for i in indices {
        let i = i.index();
        if i >= inner_dim || prev >= Some(i) {
            return Err(Error::Corrupt(format!(
                "vector {outer}: index {i} out of order or beyond length {inner_dim}"
            )));
        }
        prev = Some(i);
    }
    Ok(())
}

/// Read just the header of a matrix file
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<MetadataHeader> {
    let mut r = BufReader::new(File::open(path)?);
    MetadataHeader::read_from(&mut r)
}

impl<T: Element, I: IndexType> Matrix<T, I> {
    /// Write the matrix to `path`, replacing any existing file
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let tick = Instant::now();
        let mut w = BufWriter::new(File::create(path.as_ref())?);
        self.write_to(&mut w)?;
        w.flush()?;

        info!(
            "wrote {} x {} {} matrix to {:?}, took {:.3}s",
            self.rows,
            self.cols,
            self.format(),
            path.as_ref(),
            tick.elapsed().as_millis() as f64 / 1000.0
        );
        Ok(())
    }

    /// Serialize the matrix: the header, a per-vector length table and the payload
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        self.metadata().write_to(w)?;
        let outer_dim = self.outer_dim();
        let mut buf = Vec::new();

        match &self.store {
            Store::Grouped(s) => {
                for j in 0..outer_dim {
                    w.write_u32::<LittleEndian>(s.unique_values(j) as u32)?;
                }
                for j in 0..outer_dim {
                    w.write_u32::<LittleEndian>(s.vector_nnz(j) as u32)?;
                }

                encode_values(&s.values, &mut buf);
                encode_indices(&s.counts, &mut buf);
                encode_indices(&s.indices, &mut buf);
                w.write_all(&buf)?;
            }
            Store::Plain(s) => {
                for j in 0..outer_dim {
                    w.write_u64::<LittleEndian>(s.vector_bytes(j) as u64)?;
                }
                for j in 0..outer_dim {
                    buf.clear();
                    encode_values(s.values(j), &mut buf);
                    encode_indices(s.indices(j), &mut buf);
                    w.write_all(&buf)?;
                }
            }
            Store::Delta(s) => {
                for j in 0..outer_dim {
                    w.write_u64::<LittleEndian>(s.vector_bytes(j) as u64)?;
                }
                w.write_all(&s.data)?;
            }
        }

        Ok(())
    }

    /// Load a matrix written by `write`, expecting the given format and storage order.
    pub fn read<P: AsRef<Path>>(path: P, format: Format, storage: CompressedStorage) -> Result<Matrix<T, I>> {
        let tick = Instant::now();
        let mut r = BufReader::new(File::open(path.as_ref())?);
        let mat = Matrix::read_from(&mut r, format, storage)?;

        info!(
            "read {} x {} {} matrix from {:?}, nnz {}, took {:.3}s",
            mat.rows,
            mat.cols,
            format,
            path.as_ref(),
            mat.nnz,
            tick.elapsed().as_millis() as f64 / 1000.0
        );
        Ok(mat)
    }

    /// Deserialize a matrix. The header is validated against `format`, `T`, `I` and
    /// `storage` before any payload byte is read, and every vector is checked
    /// structurally before it is accepted.
    pub fn read_from<R: Read>(r: &mut R, format: Format, storage: CompressedStorage) -> Result<Matrix<T, I>> {
        let header = MetadataHeader::read_from(r)?;
        header.validate::<T, I>(format, storage)?;

        let inner_dim = header.inner_dim as usize;
        let outer_dim = header.outer_dim as usize;
        let (rows, cols) = match storage {
            CompressedStorage::CSC => (inner_dim, outer_dim),
            CompressedStorage::CSR => (outer_dim, inner_dim),
        };
        if inner_dim == 0 {
            return Err(Error::InvalidDimensions { rows, cols });
        }
        check_dim::<I>(inner_dim)?;
        check_dim::<I>(outer_dim)?;

        let store = match format {
            Format::ValueGrouped => Store::Grouped(read_grouped(r, inner_dim, outer_dim)?),
            Format::PlainCsc => Store::Plain(read_plain(r, inner_dim, outer_dim)?),
            Format::DeltaRunLength => Store::Delta(read_delta(r, inner_dim, outer_dim)?),
        };

        let mat = Matrix::from_store(rows, cols, storage, store);
        if mat.nnz != header.nnz as usize {
            return Err(Error::Corrupt(format!(
                "header records {} entries, payload holds {}",
                header.nnz, mat.nnz
            )));
        }

        debug!("loaded {} x {} {} matrix, {} bytes", rows, cols, format, mat.byte_size());
        Ok(mat)
    }
}

fn read_lengths<R: Read>(r: &mut R, outer_dim: usize, max_len: usize) -> Result<Vec<usize>> {
    let lengths = read_table(r, outer_dim, |r, buf| r.read_u64_into::<LittleEndian>(buf))?;

    lengths
        .into_iter()
        .enumerate()
        .map(|(j, len)| {
            if len > max_len as u64 {
                Err(Error::Corrupt(format!("vector {j} claims {len} bytes, at most {max_len} possible")))
            } else {
                Ok(len as usize)
            }
        })
        .collect()
}

fn read_plain<T: Element, I: IndexType, R: Read>(
    r: &mut R,
    inner_dim: usize,
    outer_dim: usize,
) -> Result<PlainStore<T, I>> {
    let entry = size_of::<T>() + size_of::<I>();
    let lengths = read_lengths(r, outer_dim, inner_dim * entry)?;

    let mut store = PlainStore::new();
    for (outer, &len) in lengths.iter().enumerate() {
        if len % entry != 0 {
            return Err(Error::Corrupt(format!("vector {outer}: {len} bytes is not a whole number of entries")));
        }
        let nnz = len / entry;
        let buf = read_bytes(r, len)?;
        let (value_bytes, index_bytes) = buf.split_at(nnz * size_of::<T>());

        let indices: Vec<I> = decode_indices(index_bytes);
        check_sorted(&indices, inner_dim, outer)?;
        store.push_slices(&indices, &decode_values(value_bytes));
    }
    Ok(store)
}

fn read_delta<T: Element, R: Read>(r: &mut R, inner_dim: usize, outer_dim: usize) -> Result<DeltaStore<T>> {
    // every entry costs at most one 8-byte word, every run one header and delimiter
    let max_len = inner_dim * (size_of::<T>() + 1 + 16);
    let lengths = read_lengths(r, outer_dim, max_len)?;

    let mut store = DeltaStore::new();
    for (outer, &len) in lengths.iter().enumerate() {
        let buf = read_bytes(r, len)?;
        validate_vector::<T>(&buf, inner_dim).map_err(|e| Error::Corrupt(format!("vector {outer}: {e}")))?;
        store.push_raw(&buf);
    }
    Ok(store)
}

fn read_grouped<T: Element, I: IndexType, R: Read>(
    r: &mut R,
    inner_dim: usize,
    outer_dim: usize,
) -> Result<GroupedStore<T, I>> {
    let value_counts = read_table(r, outer_dim, |r, buf| r.read_u32_into::<LittleEndian>(buf))?;
    let index_counts = read_table(r, outer_dim, |r, buf| r.read_u32_into::<LittleEndian>(buf))?;

    for (outer, (&nv, &ni)) in value_counts.iter().zip(&index_counts).enumerate() {
        if ni as usize > inner_dim || nv > ni || (nv == 0) != (ni == 0) {
            return Err(Error::Corrupt(format!(
                "vector {outer}: {nv} values and {ni} indices in a vector of length {inner_dim}"
            )));
        }
    }

    let total_values: usize = value_counts.iter().map(|&c| c as usize).sum();
    let total_indices: usize = index_counts.iter().map(|&c| c as usize).sum();

    let values: Vec<T> = decode_values(&read_bytes(r, total_values * size_of::<T>())?);
    let counts: Vec<I> = decode_indices(&read_bytes(r, total_values * I::width())?);
    let indices: Vec<I> = decode_indices(&read_bytes(r, total_indices * I::width())?);

    let mut store = GroupedStore::new();
    let (mut v0, mut i0) = (0, 0);
    let mut seen: Vec<usize> = Vec::new();

    for outer in 0..outer_dim {
        let v1 = v0 + value_counts[outer] as usize;
        let i1 = i0 + index_counts[outer] as usize;
        let col_counts = &counts[v0..v1];
        let col_indices = &indices[i0..i1];

        let summed: usize = col_counts.iter().map(|c| c.index()).sum();
        if summed != col_indices.len() || col_counts.iter().any(|c| c.index() == 0) {
            return Err(Error::Corrupt(format!("vector {outer}: value counts do not cover its indices")));
        }

        let mut start = 0;
        for c in col_counts {
            let end = start + c.index();
            check_sorted(&col_indices[start..end], inner_dim, outer)?;
            start = end;
        }

        seen.clear();
        seen.extend(col_indices.iter().map(|i| i.index()));
        seen.sort_unstable();
        if seen.windows(2).any(|p| p[0] == p[1]) {
            return Err(Error::Corrupt(format!("vector {outer}: index stored under two values")));
        }

        store.push_parts(&values[v0..v1], col_counts, col_indices);
        v0 = v1;
        i0 = i1;
    }

    Ok(store)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gen_rand::random_matrix;
    use crate::metadata::META_DATA_SIZE;
    use rand::prelude::SeedableRng;
    use rand_pcg::Pcg64Mcg;
    use std::io::Cursor;

    fn scenario(format: Format) -> Matrix<i32> {
        let indptr = [0, 2, 3, 6];
        let indices = [0u32, 2, 1, 0, 1, 2];
        let values = [5, 5, 7, 5, 5, 5];
        Matrix::from_csc(format, 4, 3, &indptr, &indices, &values).unwrap()
    }

    fn to_bytes<T: Element, I: IndexType>(m: &Matrix<T, I>) -> Vec<u8> {
        let mut buf = Vec::new();
        m.write_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let rng = &mut Pcg64Mcg::seed_from_u64(42);

        for format in Format::ALL {
            for storage in [CompressedStorage::CSC, CompressedStorage::CSR] {
                let m: Matrix<f64, u16> = random_matrix(rng, format, Some(storage), 70, 300, 0.2, 8).unwrap();
                let path = dir.path().join(format!("{format}-{storage:?}.bin"));
                m.write(&path).unwrap();

                let back: Matrix<f64, u16> = Matrix::read(&path, format, storage).unwrap();
                assert_eq!(back, m);

                let header = read_header(&path).unwrap();
                assert_eq!(header, m.metadata());
            }
        }
    }

    #[test]
    fn stream_sizes() {
        // file length matches the reported footprint
        for format in Format::ALL {
            let m = scenario(format);
            assert_eq!(to_bytes(&m).len(), m.byte_size());
        }

        let m: Matrix<u8> = Matrix::with_shape(Format::DeltaRunLength, CompressedStorage::CSC, 5, 5).unwrap();
        let bytes = to_bytes(&m);
        assert_eq!(bytes.len(), META_DATA_SIZE + 5 * 8);
        let back: Matrix<u8> = Matrix::read_from(&mut Cursor::new(bytes), Format::DeltaRunLength, CompressedStorage::CSC).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn header_checked_first() {
        let bytes = to_bytes(&scenario(Format::ValueGrouped));

        let r: Result<Matrix<i32>> = Matrix::read_from(&mut Cursor::new(&bytes), Format::DeltaRunLength, CompressedStorage::CSC);
        assert!(matches!(r, Err(Error::FormatMismatch { found: 2, .. })));

        let r: Result<Matrix<f32>> = Matrix::read_from(&mut Cursor::new(&bytes), Format::ValueGrouped, CompressedStorage::CSC);
        assert!(matches!(r, Err(Error::TypeMismatch { .. })));

        let r: Result<Matrix<i32, u64>> = Matrix::read_from(&mut Cursor::new(&bytes), Format::ValueGrouped, CompressedStorage::CSC);
        assert!(matches!(r, Err(Error::TypeMismatch { field: "index width", .. })));

        let r: Result<Matrix<i32>> = Matrix::read_from(&mut Cursor::new(&bytes), Format::ValueGrouped, CompressedStorage::CSR);
        assert!(matches!(r, Err(Error::TypeMismatch { field: "storage order", .. })));

        // header alone, payload missing
        let r: Result<Matrix<i32>> = Matrix::read_from(&mut Cursor::new(&bytes[..30]), Format::ValueGrouped, CompressedStorage::CSC);
        assert!(matches!(r, Err(Error::Io(_))));
    }

    #[test]
    fn corrupt_payloads() {
        let m = scenario(Format::DeltaRunLength);
        let bytes = to_bytes(&m);
        let payload = META_DATA_SIZE + 3 * 8;

        // width byte of the first run
        let mut bad = bytes.clone();
        bad[payload + 4] = 3;
        let r: Result<Matrix<i32>> = Matrix::read_from(&mut Cursor::new(bad), Format::DeltaRunLength, CompressedStorage::CSC);
        assert!(matches!(r, Err(Error::Corrupt(_))));

        // second index of the first run pushed past the last row
        let mut bad = bytes.clone();
        bad[payload + 6] = 9;
        let r: Result<Matrix<i32>> = Matrix::read_from(&mut Cursor::new(bad), Format::DeltaRunLength, CompressedStorage::CSC);
        assert!(matches!(r, Err(Error::Corrupt(_))));

        // header nnz disagrees with the payload
        let mut bad = bytes.clone();
        bad[12] = 7;
        let r: Result<Matrix<i32>> = Matrix::read_from(&mut Cursor::new(bad), Format::DeltaRunLength, CompressedStorage::CSC);
        assert!(matches!(r, Err(Error::Corrupt(_))));

        // unsorted plain indices: swap the two row indices of column 0
        let plain = to_bytes(&scenario(Format::PlainCsc));
        let mut bad = plain.clone();
        let idx = META_DATA_SIZE + 3 * 8 + 2 * 4;
        bad.swap(idx, idx + 4);
        let r: Result<Matrix<i32>> = Matrix::read_from(&mut Cursor::new(bad), Format::PlainCsc, CompressedStorage::CSC);
        assert!(matches!(r, Err(Error::Corrupt(_))));

        // a zero count in the value-grouped payload
        let grouped = to_bytes(&scenario(Format::ValueGrouped));
        let mut bad = grouped.clone();
        let counts = META_DATA_SIZE + 3 * 8 + 3 * 4;
        bad[counts] = 0;
        let r: Result<Matrix<i32>> = Matrix::read_from(&mut Cursor::new(bad), Format::ValueGrouped, CompressedStorage::CSC);
        assert!(matches!(r, Err(Error::Corrupt(_))));
    }

    #[test]
    fn truncated_tables() {
        for format in Format::ALL {
            // header claims u32::MAX outer vectors, stream ends right after it
            let mut bytes = to_bytes(&scenario(format));
            bytes.truncate(META_DATA_SIZE);
            bytes[8..12].copy_from_slice(&u32::MAX.to_le_bytes());

            let r: Result<Matrix<i32>> = Matrix::read_from(&mut Cursor::new(bytes), format, CompressedStorage::CSC);
            assert!(matches!(r, Err(Error::Io(_))), "{format}");
        }

        // payload shorter than its length table promises
        let bytes = to_bytes(&scenario(Format::DeltaRunLength));
        let short = bytes[..bytes.len() - 3].to_vec();
        let r: Result<Matrix<i32>> =
            Matrix::read_from(&mut Cursor::new(short), Format::DeltaRunLength, CompressedStorage::CSC);
        assert!(matches!(r, Err(Error::Io(_))));
    }
}
