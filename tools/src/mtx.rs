use anyhow::{bail, format_err, Context, Error};
use flate2::bufread::MultiGzDecoder;
use ivsparse::{Format, Matrix};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Load a CSC matrix from MTX format, gzipped if the file name ends in `.gz`
pub fn load_mtx(path: impl AsRef<Path>, format: Format) -> Result<Matrix<f64>, Error> {
    let path = path.as_ref();
    let file = BufReader::new(File::open(path).with_context(|| path.display().to_string())?);

    if path.extension().is_some_and(|ext| ext == "gz") {
        read_mtx(BufReader::new(MultiGzDecoder::new(file)), format)
    } else {
        read_mtx(file, format)
    }
}

/// Parse MTX coordinate text. Pattern matrices (no value column) store 1.0.
pub fn read_mtx(mut input: impl BufRead, format: Format) -> Result<Matrix<f64>, Error> {
    let mut line = String::new();
    let mut shape: Option<(usize, usize)> = None;
    let mut triplets = Vec::new();

    while input.read_line(&mut line)? > 0 {
        if line.starts_with('%') || line.trim().is_empty() {
            line.clear();
            continue;
        }
        let mut data = line.split_whitespace();
        if shape.is_none() {
            let nrow = data.next().ok_or_else(|| format_err!("no NROW"))?.parse::<usize>()?;
            let ncol = data.next().ok_or_else(|| format_err!("no NCOL"))?.parse::<usize>()?;
            let nnz = data.next().ok_or_else(|| format_err!("no NNZ"))?.parse::<usize>()?;
            shape = Some((nrow, ncol));
            triplets.reserve(nnz);
        } else {
            let row = data.next().ok_or_else(|| format_err!("missing ROW"))?.parse::<usize>()?;
            let col = data.next().ok_or_else(|| format_err!("missing COL"))?.parse::<usize>()?;
            let val = match data.next() {
                Some(v) => v.parse::<f64>()?,
                None => 1.0,
            };
            if row == 0 || col == 0 {
                bail!("MTX coordinates are 1-based, got ({row}, {col})");
            }
            triplets.push((row - 1, col - 1, val));
        }
        line.clear();
    }

    let Some((rows, cols)) = shape else { bail!("no matrix found") };
    Ok(Matrix::from_triplets(format, rows, cols, &triplets)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    const MTX: &str = "%%MatrixMarket matrix coordinate integer general\n\
                       % generated\n\
                       4 3 6\n\
                       1 1 5\n\
                       3 1 5\n\
                       2 2 7\n\
                       4 2 7\n\
                       1 3 5\n\
                       4 3 9\n";

    #[test]
    fn parse_mtx() {
        for format in Format::ALL {
            let m = read_mtx(Cursor::new(MTX), format).unwrap();
            assert_eq!(m.shape(), (4, 3));
            assert_eq!(m.nnz(), 6);
            assert_eq!(m.coeff(2, 0).unwrap(), 5.0);
            assert_eq!(m.coeff(3, 2).unwrap(), 9.0);
            assert_eq!(m.coeff(1, 0).unwrap(), 0.0);
        }
    }

    #[test]
    fn bad_mtx() {
        assert!(read_mtx(Cursor::new("% only comments\n"), Format::PlainCsc).is_err());
        assert!(read_mtx(Cursor::new("2 2 1\n0 1 3\n"), Format::PlainCsc).is_err());
        assert!(read_mtx(Cursor::new("2 2 1\n3 1 3\n"), Format::PlainCsc).is_err());
    }
}
