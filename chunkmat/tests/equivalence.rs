//! Every extraction path and both facades agree with the matrix they read

use std::sync::Arc;

use chunkmat::stats::{counts, medians, ranges, sums, variances};
use chunkmat::{
    ChunkedDenseMatrix, ChunkedMatrixOptions, ChunkedSparseMatrix, DenseBytesBlob, DenseVecBlob, ExtractOptions,
    FixedOracle, Matrix, Selection, SimpleDenseChunk, SimpleSparseChunk, SparseVecBlob, StatsOptions,
    SubsettedDenseChunk, SubsettedSparseChunk,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Row-major matrix with about half of its entries zero
struct Reference {
    nrow: usize,
    ncol: usize,
    data: Vec<f64>,
}

impl Reference {
    fn random(rng: &mut StdRng, nrow: usize, ncol: usize) -> Self {
        let data = (0..nrow * ncol)
            .map(|_| if rng.gen_bool(0.5) { 0.0 } else { rng.gen_range(-10..=10) as f64 })
            .collect();
        Self { nrow, ncol, data }
    }

    fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.ncol + c]
    }

    fn line(&self, row: bool, i: usize, positions: &[usize]) -> Vec<f64> {
        positions
            .iter()
            .map(|&j| if row { self.get(i, j) } else { self.get(j, i) })
            .collect()
    }

    fn full_line(&self, row: bool, i: usize) -> Vec<f64> {
        let extent = if row { self.ncol } else { self.nrow };
        self.line(row, i, &(0..extent).collect::<Vec<_>>())
    }

    /// Tiles in grid order, each as row-major data
    fn tiles(&self, chunk_nrow: usize, chunk_ncol: usize, row_major_grid: bool) -> Vec<(usize, usize, Vec<f64>)> {
        let row_starts: Vec<usize> = (0..self.nrow).step_by(chunk_nrow).collect();
        let col_starts: Vec<usize> = (0..self.ncol).step_by(chunk_ncol).collect();
        let mut coords = Vec::new();
        if row_major_grid {
            for &r0 in &row_starts {
                for &c0 in &col_starts {
                    coords.push((r0, c0));
                }
            }
        } else {
            for &c0 in &col_starts {
                for &r0 in &row_starts {
                    coords.push((r0, c0));
                }
            }
        }
        coords
            .into_iter()
            .map(|(r0, c0)| {
                let nr = chunk_nrow.min(self.nrow - r0);
                let nc = chunk_ncol.min(self.ncol - c0);
                let tile = (r0..r0 + nr)
                    .flat_map(|r| (c0..c0 + nc).map(move |c| (r, c)))
                    .map(|(r, c)| self.get(r, c))
                    .collect();
                (nr, nc, tile)
            })
            .collect()
    }
}

fn transpose(nr: usize, nc: usize, tile: &[f64]) -> Vec<f64> {
    (0..nc).flat_map(|c| (0..nr).map(move |r| tile[r * nc + c])).collect()
}

/// Every facade and chunk flavor over the same reference
fn build_all(reference: &Reference, chunk_nrow: usize, chunk_ncol: usize, cache: usize) -> Vec<Box<dyn Matrix<Element = f64>>> {
    let (nrow, ncol) = (reference.nrow, reference.ncol);
    let options = ChunkedMatrixOptions::default().with_maximum_cache_size(cache);
    let mut out: Vec<Box<dyn Matrix<Element = f64>>> = Vec::new();

    let row_tiles = reference.tiles(chunk_nrow, chunk_ncol, true);
    let col_tiles = reference.tiles(chunk_nrow, chunk_ncol, false);

    let chunks = row_tiles
        .iter()
        .map(|(nr, nc, tile)| SimpleDenseChunk::new(DenseVecBlob::new(*nr, *nc, true, tile.clone()).unwrap()))
        .collect();
    out.push(Box::new(
        ChunkedDenseMatrix::new(nrow, ncol, chunk_nrow, chunk_ncol, chunks, true, &options).unwrap(),
    ));

    let chunks = col_tiles
        .iter()
        .map(|(nr, nc, tile)| {
            SubsettedDenseChunk::new(DenseVecBlob::new(*nr, *nc, false, transpose(*nr, *nc, tile)).unwrap())
        })
        .collect();
    out.push(Box::new(
        ChunkedDenseMatrix::new(nrow, ncol, chunk_nrow, chunk_ncol, chunks, false, &options).unwrap(),
    ));

    let chunks = row_tiles
        .iter()
        .map(|(nr, nc, tile)| SimpleDenseChunk::new(DenseBytesBlob::encode(*nr, *nc, true, tile).unwrap()))
        .collect();
    out.push(Box::new(
        ChunkedDenseMatrix::new(nrow, ncol, chunk_nrow, chunk_ncol, chunks, true, &options).unwrap(),
    ));

    let chunks = row_tiles
        .iter()
        .map(|(nr, nc, tile)| SimpleSparseChunk::new(SparseVecBlob::from_dense(*nr, *nc, true, tile).unwrap()))
        .collect();
    out.push(Box::new(
        ChunkedSparseMatrix::new(nrow, ncol, chunk_nrow, chunk_ncol, chunks, true, &options).unwrap(),
    ));

    let chunks = col_tiles
        .iter()
        .map(|(nr, nc, tile)| SubsettedSparseChunk::new(SparseVecBlob::from_dense(*nr, *nc, false, tile).unwrap()))
        .collect();
    out.push(Box::new(
        ChunkedSparseMatrix::new(nrow, ncol, chunk_nrow, chunk_ncol, chunks, false, &options).unwrap(),
    ));

    out
}

fn selections(rng: &mut StdRng, extent: usize) -> Vec<Selection> {
    let start = rng.gen_range(0..=extent);
    let length = rng.gen_range(0..=extent - start);
    let indices = (0..extent).filter(|_| rng.gen_bool(0.4)).collect();
    vec![Selection::Full, Selection::Block { start, length }, Selection::Index(indices)]
}

fn positions(selection: &Selection, extent: usize) -> Vec<usize> {
    match selection {
        Selection::Full => (0..extent).collect(),
        Selection::Block { start, length } => (*start..*start + *length).collect(),
        Selection::Index(indices) => indices.clone(),
    }
}

fn check_matrix(matrix: &dyn Matrix<Element = f64>, reference: &Reference, rng: &mut StdRng) {
    for row in [true, false] {
        let dim = matrix.target_dim(row);
        let extent = matrix.non_target_dim(row);
        let order: Vec<usize> = (0..dim * 2).map(|_| rng.gen_range(0..dim)).collect();

        for selection in selections(rng, extent) {
            let wanted = positions(&selection, extent);
            let mut buffer = vec![0.0; wanted.len()];
            let mut values = vec![0.0; wanted.len()];
            let mut indices = vec![0; wanted.len()];

            // Myopic, in a shuffled order.
            let mut dense = matrix.dense(row, selection.clone(), &ExtractOptions::default()).unwrap();
            for &i in &order {
                let got = dense.fetch(i, &mut buffer).unwrap();
                assert_eq!(got, reference.line(row, i, &wanted).as_slice(), "row={row} i={i} {selection:?}");
            }

            // Oracular, following the same order.
            let oracle = Arc::new(FixedOracle::new(order.clone()));
            let mut dense = matrix
                .dense_oracular(row, oracle, selection.clone(), &ExtractOptions::default())
                .unwrap();
            for &i in &order {
                let got = dense.fetch(0, &mut buffer).unwrap();
                assert_eq!(got, reference.line(row, i, &wanted).as_slice(), "row={row} i={i} {selection:?}");
            }

            // Sparse view of the same request.
            let oracle = Arc::new(FixedOracle::new(order.clone()));
            let mut sparse = matrix
                .sparse_oracular(row, oracle, selection.clone(), &ExtractOptions::default())
                .unwrap();
            for &i in &order {
                let range = sparse.fetch(0, &mut values, &mut indices).unwrap();
                let got_values = range.values.unwrap();
                let got_indices = range.indices.unwrap();
                assert_eq!(got_values.len(), range.number);
                assert!(got_indices.windows(2).all(|w| w[0] < w[1]));
                let mut dense_line = vec![0.0; wanted.len()];
                for (&v, &j) in got_values.iter().zip(got_indices) {
                    let k = wanted.binary_search(&j).unwrap();
                    dense_line[k] = v;
                }
                assert_eq!(dense_line, reference.line(row, i, &wanted));
            }
        }
    }
}

#[test]
fn all_paths_match_reference() {
    let mut rng = StdRng::seed_from_u64(42);
    for (nrow, ncol, chunk_nrow, chunk_ncol) in [(7, 9, 3, 4), (10, 5, 10, 2), (6, 6, 1, 6), (8, 11, 5, 5)] {
        let reference = Reference::random(&mut rng, nrow, ncol);
        // No cache, a single slab, and everything.
        for cache in [0, 40, 1 << 20] {
            for matrix in build_all(&reference, chunk_nrow, chunk_ncol, cache) {
                check_matrix(matrix.as_ref(), &reference, &mut rng);
            }
        }
    }
}

#[test]
fn sparse_options_drop_values_or_indices() {
    let mut rng = StdRng::seed_from_u64(7);
    let reference = Reference::random(&mut rng, 6, 7);
    for matrix in build_all(&reference, 4, 3, 1 << 20) {
        let mut values = vec![0.0; 7];
        let mut indices = vec![0; 7];

        let options = ExtractOptions::default().with_sparse_extract_value(false);
        let mut ext = matrix.sparse(true, Selection::Full, &options).unwrap();
        let range = ext.fetch(2, &mut values, &mut indices).unwrap();
        assert!(range.values.is_none());
        assert_eq!(range.indices.map(<[usize]>::len), Some(range.number));

        let options = ExtractOptions::default().with_sparse_extract_index(false);
        let mut ext = matrix.sparse(true, Selection::Full, &options).unwrap();
        let range = ext.fetch(2, &mut values, &mut indices).unwrap();
        assert!(range.indices.is_none());
        let expected: f64 = reference.full_line(true, 2).iter().sum();
        assert_eq!(range.values.unwrap().iter().sum::<f64>(), expected);
    }
}

fn assert_close(got: &[f64], want: &[f64]) {
    assert_eq!(got.len(), want.len());
    for (g, w) in got.iter().zip(want) {
        assert!((g - w).abs() <= 1e-9 * w.abs().max(1.0) || (g.is_nan() && w.is_nan()), "{got:?} != {want:?}");
    }
}

fn reference_median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

fn reference_variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0)
}

#[test]
fn statistics_match_reference() {
    let mut rng = StdRng::seed_from_u64(2024);
    for (nrow, ncol, chunk_nrow, chunk_ncol) in [(9, 13, 4, 3), (12, 4, 12, 1), (5, 8, 2, 8)] {
        let reference = Reference::random(&mut rng, nrow, ncol);
        for threads in [1, 3] {
            let options = StatsOptions::default().with_num_threads(threads);
            for cache in [0, 1 << 20] {
                for matrix in build_all(&reference, chunk_nrow, chunk_ncol, cache) {
                    let matrix = matrix.as_ref();
                    for row in [true, false] {
                        let lines: Vec<Vec<f64>> = (0..matrix.target_dim(row))
                            .map(|i| reference.full_line(row, i))
                            .collect();

                        let want: Vec<f64> = lines.iter().map(|l| l.iter().sum()).collect();
                        assert_close(&sums::apply(row, matrix, &options).unwrap(), &want);

                        let want: Vec<f64> = lines.iter().map(|l| reference_variance(l)).collect();
                        assert_close(&variances::apply(row, matrix, &options).unwrap(), &want);

                        let (mins, maxs) = ranges::apply(row, matrix, &options).unwrap();
                        let want: Vec<f64> = lines.iter().map(|l| l.iter().copied().fold(f64::INFINITY, f64::min)).collect();
                        assert_close(&mins, &want);
                        let want: Vec<f64> = lines
                            .iter()
                            .map(|l| l.iter().copied().fold(f64::NEG_INFINITY, f64::max))
                            .collect();
                        assert_close(&maxs, &want);

                        let want: Vec<f64> = lines.iter().map(|l| reference_median(l.clone())).collect();
                        assert_close(&medians::apply(row, matrix, &options).unwrap(), &want);

                        let want: Vec<usize> = lines.iter().map(|l| l.iter().filter(|&&v| v == 0.0).count()).collect();
                        assert_eq!(counts::apply(row, matrix, threads, |v| v == 0.0).unwrap(), want);
                    }
                }
            }
        }
    }
}
