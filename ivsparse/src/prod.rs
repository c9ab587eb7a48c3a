use crate::element::{Element, IndexType};
use crate::error::{Error, Result};
use crate::mat::Matrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use sprs::CompressedStorage;

fn check_len(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::DimensionMismatch { expected, found });
    }
    Ok(())
}

impl<T: Element, I: IndexType> Matrix<T, I> {
    /// Multiply the matrix by the dense vector `x` of length `cols`, giving a vector of
    /// length `rows`. Integer products wrap on overflow.
    pub fn vector_multiply(&self, x: ArrayView1<T>) -> Result<Array1<T>> {
        check_len(self.cols, x.len())?;
        let mut out: Array1<T> = Array1::zeros(self.rows);

        match self.storage {
            CompressedStorage::CSC => {
                for col in 0..self.cols {
                    let xv = x[col];
                    for (row, v) in self.store.inner_iter(col) {
                        out[row] = out[row].mul_acc(v, xv);
                    }
                }
            }
            CompressedStorage::CSR => {
                // entries arrive grouped by value, so each group costs one multiply
                for (row, o) in out.iter_mut().enumerate() {
                    let mut acc = T::zero();
                    let mut group: Option<(T, T)> = None;

                    for (col, v) in self.store.inner_iter(row) {
                        group = match group {
                            Some((value, sum)) if value.bits() == v.bits() => Some((value, sum.mul_acc(T::one(), x[col]))),
                            Some((value, sum)) => {
                                acc = acc.mul_acc(value, sum);
                                Some((v, x[col]))
                            }
                            None => Some((v, x[col])),
                        };
                    }
                    if let Some((value, sum)) = group {
                        acc = acc.mul_acc(value, sum);
                    }
                    *o = acc;
                }
            }
        }

        Ok(out)
    }

    /// Multiply the matrix by the dense matrix `rhs` with `cols` rows, giving a
    /// `rows` x `rhs.ncols()` matrix. Integer products wrap on overflow.
    pub fn matrix_multiply(&self, rhs: ArrayView2<T>) -> Result<Array2<T>> {
        check_len(self.cols, rhs.nrows())?;
        let mut out: Array2<T> = Array2::zeros((self.rows, rhs.ncols()));

        for outer in 0..self.outer_dim() {
            for (inner, v) in self.store.inner_iter(outer) {
                let (row, col) = if self.is_csc() { (inner, outer) } else { (outer, inner) };

                let mut oline = out.row_mut(row);
                for (o, &r) in oline.iter_mut().zip(rhs.row(col).iter()) {
                    *o = o.mul_acc(v, r);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gen_rand::random_matrix;
    use crate::metadata::Format;
    use ndarray::{arr1, arr2, Array};
    use rand::prelude::{Rng, SeedableRng};
    use rand_pcg::Pcg64Mcg;

    fn scenario(format: Format, storage: CompressedStorage) -> Matrix<i32> {
        let dense = arr2(&[[5, 0, 5], [0, 7, 5], [5, 0, 5], [0, 0, 0]]);
        Matrix::from_dense(format, storage, dense.view()).unwrap()
    }

    #[test]
    fn small_products() {
        for format in Format::ALL {
            for storage in [CompressedStorage::CSC, CompressedStorage::CSR] {
                let m = scenario(format, storage);

                let y = m.vector_multiply(arr1(&[1, 2, 3]).view()).unwrap();
                assert_eq!(y, arr1(&[20, 29, 20, 0]));

                let b = arr2(&[[1, 0], [0, 1], [1, 1]]);
                let p = m.matrix_multiply(b.view()).unwrap();
                assert_eq!(p, arr2(&[[10, 5], [5, 12], [10, 5], [0, 0]]));
            }
        }
    }

    #[test]
    fn products_match_dense() {
        let rng = &mut Pcg64Mcg::seed_from_u64(42);

        for _ in 0..20 {
            let rows = rng.gen_range(1..60);
            let cols = rng.gen_range(1..60);
            let k = rng.gen_range(1..6);
            let format = Format::ALL[rng.gen_range(0..3)];
            let m: Matrix<i64> = random_matrix(rng, format, None, rows, cols, 0.3, 4).unwrap();
            let dense = m.to_dense();

            let x = Array::from_shape_fn(cols, |i| (i % 7) as i64 - 3);
            assert_eq!(m.vector_multiply(x.view()).unwrap(), dense.dot(&x));

            let b = Array::from_shape_fn((cols, k), |(i, j)| ((i + 2 * j) % 5) as i64 - 2);
            assert_eq!(m.matrix_multiply(b.view()).unwrap(), dense.dot(&b));
        }
    }

    #[test]
    fn float_products() {
        let rng = &mut Pcg64Mcg::seed_from_u64(5);
        for format in Format::ALL {
            let m: Matrix<f64> = random_matrix(rng, format, Some(CompressedStorage::CSR), 30, 20, 0.4, 3).unwrap();
            let x = Array::from_shape_fn(20, |i| i as f64 * 0.5);
            // small integer values times halves sum exactly
            assert_eq!(m.vector_multiply(x.view()).unwrap(), m.to_dense().dot(&x));
        }
    }

    #[test]
    fn product_shapes_checked() {
        let m = scenario(Format::DeltaRunLength, CompressedStorage::CSC);
        assert!(matches!(
            m.vector_multiply(arr1(&[1, 2]).view()),
            Err(Error::DimensionMismatch { expected: 3, found: 2 })
        ));
        assert!(matches!(
            m.matrix_multiply(Array2::<i32>::zeros((4, 2)).view()),
            Err(Error::DimensionMismatch { expected: 3, found: 4 })
        ));
    }

    #[test]
    fn integer_products_wrap() {
        for storage in [CompressedStorage::CSC, CompressedStorage::CSR] {
            let m: Matrix<u8> = Matrix::from_dense(Format::ValueGrouped, storage, arr2(&[[200u8, 200]]).view()).unwrap();
            let y = m.vector_multiply(arr1(&[1u8, 1]).view()).unwrap();
            assert_eq!(y, arr1(&[144u8]));
        }
    }
}
