//! Shard Rotation
//!
//! Redistributes coding shards across the instances of a batch. The batch's
//! coding shards form an m x m grid (instance x coding index); output cell
//! `(row, col)` takes input cell `(col, (col + row) mod m)`, so each output
//! row gathers one coding shard from every instance along a shifted
//! diagonal.
//!
//! The result is a [`RotatedView`] borrowing the batch's stripes. Nothing is
//! copied; the view cannot outlive the batch.

use crate::ec::shard::{Batch, ShardAddr, Stripe};
use crate::error::{Error, Result};

/// The cyclic-diagonal permutation on an m x m grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    size: usize,
}

impl Rotation {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    /// Grid dimension (m).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Input cell feeding output cell `(row, col)`.
    #[inline]
    pub fn source(&self, row: usize, col: usize) -> (usize, usize) {
        (col, (col + row) % self.size)
    }

    /// Reject any grid that is not `size x size`.
    pub fn check_square<T>(&self, grid: &[Vec<T>]) -> Result<()> {
        if grid.len() != self.size {
            return Err(Error::InstanceCountMismatch {
                expected: self.size,
                actual: grid.len(),
            });
        }
        if let Some((instance, row)) = grid.iter().enumerate().find(|(_, r)| r.len() != self.size) {
            return Err(Error::NonSquareGrid {
                instances: grid.len(),
                instance,
                coding_shards: row.len(),
            });
        }
        Ok(())
    }

    /// Apply the permutation to any square grid of cloneable cells.
    pub fn permute<T: Clone>(&self, grid: &[Vec<T>]) -> Result<Vec<Vec<T>>> {
        self.check_square(grid)?;
        Ok((0..self.size)
            .map(|row| {
                (0..self.size)
                    .map(|col| {
                        let (r, c) = self.source(row, col);
                        grid[r][c].clone()
                    })
                    .collect()
            })
            .collect())
    }

    /// Rotate the coding grid of `batch`, borrowing its stripes.
    ///
    /// The batch must hold exactly m instances of m coding shards each.
    pub fn apply<'a>(&self, batch: &'a Batch) -> Result<RotatedView<'a>> {
        if batch.len() != self.size {
            return Err(Error::InstanceCountMismatch {
                expected: self.size,
                actual: batch.len(),
            });
        }
        if let Some((instance, set)) = batch
            .sets()
            .iter()
            .enumerate()
            .find(|(_, set)| set.coding.len() != self.size)
        {
            return Err(Error::NonSquareGrid {
                instances: batch.len(),
                instance,
                coding_shards: set.coding.len(),
            });
        }

        let addrs: Vec<Vec<ShardAddr>> = (0..self.size)
            .map(|row| {
                (0..self.size)
                    .map(|col| {
                        let (instance, index) = self.source(row, col);
                        ShardAddr::coding(instance, index)
                    })
                    .collect()
            })
            .collect();

        let cells = addrs
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&addr| {
                        batch.stripe(addr).ok_or_else(|| {
                            Error::Internal(format!("rotation source {addr} missing"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RotatedView { addrs, cells })
    }

    /// Number of applications after which every cell is back in place
    /// (the order of the permutation).
    pub fn order(&self) -> usize {
        let n = self.size;
        if n == 0 {
            return 1;
        }
        let mut seen = vec![false; n * n];
        let mut order = 1usize;
        for start in 0..n * n {
            if seen[start] {
                continue;
            }
            let mut len = 0usize;
            let mut cell = start;
            while !seen[cell] {
                seen[cell] = true;
                len += 1;
                let (r, c) = self.source(cell / n, cell % n);
                cell = r * n + c;
            }
            order = lcm(order, len);
        }
        order
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}

/// A rotated coding grid borrowing stripes from a [`Batch`].
#[derive(Debug, Clone)]
pub struct RotatedView<'a> {
    addrs: Vec<Vec<ShardAddr>>,
    cells: Vec<Vec<&'a Stripe>>,
}

impl<'a> RotatedView<'a> {
    /// Grid dimension.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&'a Stripe> {
        self.cells.get(row)?.get(col).copied()
    }

    /// Batch address the cell `(row, col)` refers to.
    pub fn addr(&self, row: usize, col: usize) -> Option<ShardAddr> {
        self.addrs.get(row)?.get(col).copied()
    }

    pub fn rows(&self) -> &[Vec<&'a Stripe>] {
        &self.cells
    }
}

// =============================================================================
// Tests
// =============================================================================
