//! Shard-Set Copier
//!
//! Snapshots a rotated coding grid into owned buffers and folds a bounded
//! span of every cell back into a batch's coding stripes.
//!
//! The snapshot is taken before any write, so copying a rotated view of a
//! batch back into the same batch behaves as a simultaneous assignment: no
//! cell observes a value already overwritten by an earlier cell.

use tracing::{debug, instrument};

use crate::config::MACHINE_WORD;
use crate::ec::rotation::RotatedView;
use crate::ec::shard::{Batch, ShardAddr, Stripe};
use crate::error::{Error, Result};

/// Owned m x m grid of coding stripes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingGrid {
    cells: Vec<Vec<Stripe>>,
}

impl CodingGrid {
    pub fn new(cells: Vec<Vec<Stripe>>) -> Self {
        Self { cells }
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Stripe> {
        self.cells.get(row)?.get(col)
    }

    pub fn rows(&self) -> &[Vec<Stripe>] {
        &self.cells
    }
}

/// Copies the first `span` bytes of each grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardCopier {
    span: usize,
}

impl Default for ShardCopier {
    fn default() -> Self {
        Self { span: MACHINE_WORD }
    }
}

impl ShardCopier {
    pub fn new(span: usize) -> Result<Self> {
        if span == 0 {
            return Err(Error::SpanOutOfRange {
                span,
                stripe_size: 0,
            });
        }
        Ok(Self { span })
    }

    /// Bytes copied per cell.
    pub fn span(&self) -> usize {
        self.span
    }

    /// Deep copy of every stripe the view refers to.
    pub fn snapshot(&self, view: &RotatedView<'_>) -> CodingGrid {
        CodingGrid::new(
            view.rows()
                .iter()
                .map(|row| row.iter().map(|&stripe| stripe.clone()).collect())
                .collect(),
        )
    }

    /// Check `grid` against the coding grid of `batch`: both m x m, and
    /// every stripe long enough for the span.
    fn check(&self, batch: &Batch, grid: &CodingGrid) -> Result<()> {
        let m = grid.size();
        let square = |instances: usize, instance: usize, coding_shards: usize| Error::NonSquareGrid {
            instances,
            instance,
            coding_shards,
        };

        if let Some((row, cells)) = grid.rows().iter().enumerate().find(|(_, r)| r.len() != m) {
            return Err(square(m, row, cells.len()));
        }
        if batch.len() != m {
            return Err(Error::InstanceCountMismatch {
                expected: m,
                actual: batch.len(),
            });
        }
        for (instance, set) in batch.sets().iter().enumerate() {
            if set.coding.len() != m {
                return Err(square(m, instance, set.coding.len()));
            }
            if let Some(short) = set.coding.iter().chain(&grid.rows()[instance]).find(|s| s.len() < self.span) {
                return Err(Error::SpanOutOfRange {
                    span: self.span,
                    stripe_size: short.len(),
                });
            }
        }
        Ok(())
    }

    /// Copy cell `(i, j)` of `grid` into coding stripe j of instance i,
    /// limited to the first `span` bytes.
    #[instrument(skip(self, batch, grid), fields(span = self.span))]
    pub fn copy_into(&self, batch: &mut Batch, grid: &CodingGrid) -> Result<()> {
        self.check(batch, grid)?;

        for (set, row) in batch.sets_mut().iter_mut().zip(grid.rows()) {
            for (dst, src) in set.coding.iter_mut().zip(row) {
                dst[..self.span].copy_from_slice(&src[..self.span]);
            }
        }

        debug!("Copied {} cells of {} bytes", grid.size() * grid.size(), self.span);
        Ok(())
    }

    /// Addresses whose first `span` bytes differ from the grid.
    pub fn verify(&self, batch: &Batch, grid: &CodingGrid) -> Vec<ShardAddr> {
        let mut mismatches = Vec::new();
        for (i, row) in grid.rows().iter().enumerate() {
            for (j, expected) in row.iter().enumerate() {
                let addr = ShardAddr::coding(i, j);
                let matches = batch.stripe(addr).is_some_and(|actual| {
                    actual.len() >= self.span
                        && expected.len() >= self.span
                        && actual[..self.span] == expected[..self.span]
                });
                if !matches {
                    mismatches.push(addr);
                }
            }
        }
        mismatches
    }
}
