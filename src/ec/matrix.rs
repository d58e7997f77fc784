//! Generator Matrix Construction
//!
//! Builds the classic Vandermonde-derived Reed-Solomon coding matrix over
//! GF(2^w) and provides the exact matrix algebra (row selection, product,
//! Gauss-Jordan inversion) the decoder needs.

use tracing::debug;

use crate::config::validate_shape;
use crate::error::{Error, Result};
use crate::gf::{FieldWidth, GaloisField};

// =============================================================================
// Dense Matrix
// =============================================================================

/// Row-major matrix of field elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u32>,
}

impl Matrix {
    /// All-zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    /// n x n identity.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1);
        }
        m
    }

    /// Build from row-major elements.
    pub fn from_rows(rows: usize, cols: usize, data: Vec<u32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidEcConfig(format!(
                "matrix {}x{} needs {} elements, got {}",
                rows,
                cols,
                rows * cols,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row-major elements.
    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> u32 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, val: u32) {
        self.data[r * self.cols + c] = val;
    }

    pub fn row(&self, r: usize) -> &[u32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// New matrix made of the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Matrix> {
        let mut data = Vec::with_capacity(rows.len() * self.cols);
        for &r in rows {
            if r >= self.rows {
                return Err(Error::InvalidEcConfig(format!(
                    "row {} out of range for {}x{} matrix",
                    r, self.rows, self.cols
                )));
            }
            data.extend_from_slice(self.row(r));
        }
        Ok(Matrix {
            rows: rows.len(),
            cols: self.cols,
            data,
        })
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for c in 0..self.cols {
            self.data.swap(a * self.cols + c, b * self.cols + c);
        }
    }

    /// Product `self * other`.
    pub fn multiply(&self, other: &Matrix, field: &dyn GaloisField) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(Error::InvalidEcConfig(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }

        let mut out = Matrix::zeros(self.rows, other.cols);
        for r in 0..self.rows {
            for c in 0..other.cols {
                let mut acc = 0u32;
                for i in 0..self.cols {
                    acc ^= field.mul(self.get(r, i), other.get(i, c));
                }
                out.set(r, c, acc);
            }
        }
        Ok(out)
    }

    /// Gauss-Jordan inverse of a square matrix.
    ///
    /// A missing pivot is reported as [`Error::SingularMatrix`] naming the
    /// offending column.
    pub fn invert(&self, field: &dyn GaloisField) -> Result<Matrix> {
        if self.rows != self.cols {
            return Err(Error::InvalidEcConfig(format!(
                "cannot invert non-square {}x{} matrix",
                self.rows, self.cols
            )));
        }

        let n = self.rows;
        let mut work = self.clone();
        let mut inv = Matrix::identity(n);

        for i in 0..n {
            // Pivot: first row at or below i with a non-zero in column i
            let pivot = (i..n)
                .find(|&r| work.get(r, i) != 0)
                .ok_or_else(|| Error::SingularMatrix { rows: vec![i] })?;
            work.swap_rows(i, pivot);
            inv.swap_rows(i, pivot);

            let diag = work.get(i, i);
            if diag != 1 {
                let scale = field.inv(diag)?;
                for c in 0..n {
                    work.set(i, c, field.mul(work.get(i, c), scale));
                    inv.set(i, c, field.mul(inv.get(i, c), scale));
                }
            }

            for r in 0..n {
                let factor = work.get(r, i);
                if r == i || factor == 0 {
                    continue;
                }
                for c in 0..n {
                    work.set(r, c, work.get(r, c) ^ field.mul(factor, work.get(i, c)));
                    inv.set(r, c, inv.get(r, c) ^ field.mul(factor, inv.get(i, c)));
                }
            }
        }

        Ok(inv)
    }
}

// =============================================================================
// Vandermonde Construction
// =============================================================================

/// (rows x cols) extended Vandermonde matrix: first row e0, last row
/// e(cols-1), row i in between holds i^0, i^1, ..., i^(cols-1).
fn extended_vandermonde(rows: usize, cols: usize, field: &dyn GaloisField) -> Matrix {
    let mut vdm = Matrix::zeros(rows, cols);
    vdm.set(0, 0, 1);
    if rows == 1 {
        return vdm;
    }
    vdm.set(rows - 1, cols - 1, 1);

    for i in 1..rows - 1 {
        let mut term = 1u32;
        for j in 0..cols {
            vdm.set(i, j, term);
            term = field.mul(term, i as u32);
        }
    }
    vdm
}

/// Column-reduce the extended Vandermonde matrix until its top `cols` rows
/// are the identity, then normalise the coding block so its first row and
/// first column are all ones. Column operations preserve the property that
/// every `cols` rows are independent.
fn distribution_matrix(rows: usize, cols: usize, field: &dyn GaloisField) -> Result<Matrix> {
    let mut dist = extended_vandermonde(rows, cols, field);

    for i in 1..cols {
        let pivot = (i..rows)
            .find(|&r| dist.get(r, i) != 0)
            .ok_or_else(|| Error::SingularMatrix { rows: vec![i] })?;
        dist.swap_rows(i, pivot);

        let diag = dist.get(i, i);
        if diag != 1 {
            let scale = field.inv(diag)?;
            for r in 0..rows {
                dist.set(r, i, field.mul(scale, dist.get(r, i)));
            }
        }

        for j in 0..cols {
            let e = dist.get(i, j);
            if j == i || e == 0 {
                continue;
            }
            for r in 0..rows {
                dist.set(r, j, dist.get(r, j) ^ field.mul(e, dist.get(r, i)));
            }
        }
    }

    // Row `cols` (first coding row) -> all ones
    for j in 0..cols {
        let e = dist.get(cols, j);
        if e == 1 {
            continue;
        }
        let scale = field
            .inv(e)
            .map_err(|_| Error::SingularMatrix { rows: vec![cols] })?;
        for r in cols..rows {
            dist.set(r, j, field.mul(scale, dist.get(r, j)));
        }
    }

    // Column 0 of the remaining coding rows -> all ones
    for r in cols + 1..rows {
        let e = dist.get(r, 0);
        if e == 1 {
            continue;
        }
        let scale = field
            .inv(e)
            .map_err(|_| Error::SingularMatrix { rows: vec![r] })?;
        for j in 0..cols {
            dist.set(r, j, field.mul(dist.get(r, j), scale));
        }
    }

    Ok(dist)
}

// =============================================================================
// Generator Matrix
// =============================================================================

/// The (k+m) x k coding matrix. The top k rows are an implicit identity;
/// only the bottom m x k coding block is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorMatrix {
    data_shards: usize,
    coding_shards: usize,
    width: FieldWidth,
    coding: Matrix,
}

impl GeneratorMatrix {
    /// Build the Vandermonde-derived coding matrix for k data and m coding
    /// shards over GF(2^w).
    ///
    /// Fails if k or m is zero, or if k + m exceeds 2^w for w <= 16.
    pub fn vandermonde(data_shards: usize, coding_shards: usize, width: FieldWidth) -> Result<Self> {
        validate_shape(data_shards, coding_shards, width)?;

        let rows = data_shards + coding_shards;
        let dist = distribution_matrix(rows, data_shards, width.field())?;

        let coding_rows: Vec<u32> = dist.as_slice()[data_shards * data_shards..].to_vec();
        let coding = Matrix::from_rows(coding_shards, data_shards, coding_rows)?;

        debug!(
            k = data_shards,
            m = coding_shards,
            w = width.bits(),
            "built vandermonde coding matrix"
        );

        Ok(Self {
            data_shards,
            coding_shards,
            width,
            coding,
        })
    }

    /// Wrap an explicit m x k coding block.
    pub fn from_coding_rows(coding: Matrix, width: FieldWidth) -> Result<Self> {
        validate_shape(coding.cols(), coding.rows(), width)?;
        if let Some(&bad) = coding.as_slice().iter().find(|&&e| e > width.max_element()) {
            return Err(Error::InvalidEcConfig(format!(
                "element {bad:#x} does not fit in {width}"
            )));
        }
        Ok(Self {
            data_shards: coding.cols(),
            coding_shards: coding.rows(),
            width,
            coding,
        })
    }

    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    pub fn coding_shards(&self) -> usize {
        self.coding_shards
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards + self.coding_shards
    }

    pub fn width(&self) -> FieldWidth {
        self.width
    }

    pub fn field(&self) -> &'static dyn GaloisField {
        self.width.field()
    }

    /// The m x k coding block.
    pub fn coding(&self) -> &Matrix {
        &self.coding
    }

    /// Coding row `i` (0..m).
    pub fn coding_row(&self, i: usize) -> &[u32] {
        self.coding.row(i)
    }

    /// Row `index` of the full (k+m) x k matrix.
    pub fn row(&self, index: usize) -> Vec<u32> {
        if index < self.data_shards {
            let mut row = vec![0; self.data_shards];
            row[index] = 1;
            row
        } else {
            self.coding.row(index - self.data_shards).to_vec()
        }
    }

    /// The full (k+m) x k matrix with the identity rows materialised.
    pub fn full(&self) -> Matrix {
        let k = self.data_shards;
        let mut data = Vec::with_capacity(self.total_shards() * k);
        for index in 0..self.total_shards() {
            data.extend(self.row(index));
        }
        Matrix {
            rows: self.total_shards(),
            cols: k,
            data,
        }
    }

    /// Select the given k shard rows and invert them.
    pub fn decoding_matrix(&self, survivors: &[usize]) -> Result<Matrix> {
        let k = self.data_shards;
        if survivors.len() != k {
            return Err(Error::ShardCountMismatch {
                role: "surviving",
                expected: k,
                actual: survivors.len(),
            });
        }

        if let Some(&index) = survivors.iter().find(|&&i| i >= self.total_shards()) {
            return Err(Error::InvalidErasure(format!(
                "shard index {} out of range (max {})",
                index,
                self.total_shards() - 1
            )));
        }

        let selected = self.full().select_rows(survivors)?;
        selected.invert(self.field()).map_err(|e| match e {
            Error::SingularMatrix { .. } => Error::SingularMatrix {
                rows: survivors.to_vec(),
            },
            other => other,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
