//! Matrix Encoder
//!
//! Computes the m coding stripes of an instance as field-weighted sums of
//! its k data stripes, one generator row per coding stripe.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::ec::matrix::GeneratorMatrix;
use crate::ec::shard::{check_stripe_sizes, ShardSet, Stripe};
use crate::error::{Error, Result};

/// `dst = sum_j coeffs[j] * sources[j]` over the field of `generator`.
///
/// Coefficient 0 contributes nothing and coefficient 1 is a plain XOR.
pub(crate) fn dot_product(
    generator: &GeneratorMatrix,
    coeffs: &[u32],
    sources: &[&[u8]],
    dst: &mut [u8],
) -> Result<()> {
    let field = generator.field();
    dst.fill(0);
    for (&coeff, src) in coeffs.iter().zip(sources) {
        match coeff {
            0 => {}
            1 => {
                if src.len() != dst.len() {
                    return Err(Error::StripeSizeMismatch {
                        what: "source region".to_string(),
                        actual: src.len(),
                        expected: dst.len(),
                    });
                }
                for (d, s) in dst.iter_mut().zip(src.iter()) {
                    *d ^= *s;
                }
            }
            c => field.region_multiply(src, dst, c, true)?,
        }
    }
    Ok(())
}

// =============================================================================
// Matrix Encoder
// =============================================================================

/// Erasure coding encoder producing coding stripes from data stripes
#[derive(Debug, Clone)]
pub struct MatrixEncoder {
    /// Shared read-only generator matrix
    generator: Arc<GeneratorMatrix>,
}

impl MatrixEncoder {
    /// Create an encoder over `generator`.
    pub fn new(generator: Arc<GeneratorMatrix>) -> Self {
        Self { generator }
    }

    /// Get the generator matrix
    pub fn generator(&self) -> &GeneratorMatrix {
        &self.generator
    }

    /// Get the number of data shards
    pub fn data_shards(&self) -> usize {
        self.generator.data_shards()
    }

    /// Get the number of coding shards
    pub fn coding_shards(&self) -> usize {
        self.generator.coding_shards()
    }

    /// Check a data slice: k stripes, equal sizes, word-aligned.
    fn validate_data(&self, data: &[Stripe]) -> Result<usize> {
        if data.len() != self.data_shards() {
            return Err(Error::ShardCountMismatch {
                role: "data",
                expected: self.data_shards(),
                actual: data.len(),
            });
        }

        let stripe_size = data[0].len();
        check_stripe_sizes(data, "data", stripe_size)?;
        self.generator.width().check_aligned(stripe_size)?;
        Ok(stripe_size)
    }

    /// Encode k data stripes into m new coding stripes.
    ///
    /// # Arguments
    /// * `data` - The k data stripes, all the same word-aligned size
    ///
    /// # Returns
    /// The m coding stripes, or an error with nothing produced
    #[instrument(skip(self, data), fields(k = self.data_shards(), m = self.coding_shards()))]
    pub fn encode(&self, data: &[Stripe]) -> Result<Vec<Stripe>> {
        let stripe_size = self.validate_data(data)?;
        let sources: Vec<&[u8]> = data.iter().map(|s| &s[..]).collect();

        let mut coding = Vec::with_capacity(self.coding_shards());
        for i in 0..self.coding_shards() {
            let mut stripe = Stripe::zeroed(stripe_size);
            dot_product(
                &self.generator,
                self.generator.coding_row(i),
                &sources,
                &mut stripe,
            )?;
            coding.push(stripe);
        }

        debug!(
            "Encoded {} data stripes into {} coding stripes of {} bytes each",
            data.len(),
            coding.len(),
            stripe_size
        );

        Ok(coding)
    }

    /// Recompute the coding stripes of `set` in place.
    #[instrument(skip(self, set))]
    pub fn encode_set(&self, set: &mut ShardSet) -> Result<()> {
        if set.coding.len() != self.coding_shards() {
            return Err(Error::ShardCountMismatch {
                role: "coding",
                expected: self.coding_shards(),
                actual: set.coding.len(),
            });
        }
        set.coding = self.encode(&set.data)?;
        Ok(())
    }

    /// Verify that the coding stripes of `set` match its data stripes
    ///
    /// # Returns
    /// true if every coding stripe is consistent, false otherwise
    pub fn verify(&self, set: &ShardSet) -> Result<bool> {
        if set.coding.len() != self.coding_shards() {
            return Err(Error::ShardCountMismatch {
                role: "coding",
                expected: self.coding_shards(),
                actual: set.coding.len(),
            });
        }
        let expected = self.encode(&set.data)?;
        Ok(expected == set.coding)
    }
}

// =============================================================================
// Tests
// =============================================================================
