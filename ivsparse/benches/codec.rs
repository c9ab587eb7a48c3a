use criterion::{criterion_group, criterion_main, Criterion};
use ivsparse::{gen_rand, EncodeOptions, Format, Matrix};
use ndarray::Array;
use rand::prelude::SeedableRng;
use rand_pcg::Pcg64Mcg;
use sprs::CompressedStorage;

fn criterion_benchmark(c: &mut Criterion) {
    let rng = &mut Pcg64Mcg::seed_from_u64(42);

    let rows = 10000;
    let cols = 1000;
    let density = 0.1;
    let distinct = 8;

    let (indptr, indices, values) = gen_rand::random_compressed::<f64, u32>(rng, rows, cols, density, distinct);

    for format in Format::ALL {
        c.bench_function(&format!("encode-{format} 10k x 1k"), |b| {
            b.iter(|| Matrix::from_csc(format, rows, cols, &indptr, &indices, &values).unwrap())
        });

        c.bench_function(&format!("encode-par-{format} 10k x 1k"), |b| {
            b.iter(|| {
                Matrix::from_compressed(
                    format,
                    CompressedStorage::CSC,
                    (rows, cols),
                    &indptr,
                    &indices,
                    &values,
                    EncodeOptions::parallel(),
                )
                .unwrap()
            })
        });

        let m: Matrix<f64> = Matrix::from_csc(format, rows, cols, &indptr, &indices, &values).unwrap();

        c.bench_function(&format!("decode-{format} 10k x 1k"), |b| {
            b.iter(|| m.iter().map(|(_, _, v)| v).sum::<f64>())
        });

        c.bench_function(&format!("transpose-{format} 10k x 1k"), |b| b.iter(|| m.transpose()));

        let x = Array::from_shape_fn(cols, |i| (i % 13) as f64);
        c.bench_function(&format!("vector-multiply-{format} 10k x 1k"), |b| {
            b.iter(|| m.vector_multiply(x.view()).unwrap())
        });

        let rhs = Array::from_shape_fn((cols, 8), |(i, j)| ((i + j) % 13) as f64);
        c.bench_function(&format!("matrix-multiply-{format} 10k x 1k x 8"), |b| {
            b.iter(|| m.matrix_multiply(rhs.view()).unwrap())
        });
    }

    let plain: Matrix<f64> = Matrix::from_csc(Format::PlainCsc, rows, cols, &indptr, &indices, &values).unwrap();
    c.bench_function("convert csc -> ivcsc 10k x 1k", |b| {
        b.iter(|| plain.to_format(Format::DeltaRunLength))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = criterion_benchmark,
}

criterion_main!(benches);
