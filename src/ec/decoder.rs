//! Matrix Decoder
//!
//! Reconstructs erased shards of one instance. Erased data stripes are
//! solved from k survivors through the inverse of their generator rows;
//! erased coding stripes are then re-encoded from the completed data.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::ec::encoder::dot_product;
use crate::ec::matrix::GeneratorMatrix;
use crate::ec::shard::{check_stripe_sizes, ErasureList, ShardSet, Stripe};
use crate::error::{Error, Result};

/// Erasure decoder sharing a generator matrix with its encoder.
#[derive(Debug, Clone)]
pub struct MatrixDecoder {
    generator: Arc<GeneratorMatrix>,
}

impl MatrixDecoder {
    pub fn new(generator: Arc<GeneratorMatrix>) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &GeneratorMatrix {
        &self.generator
    }

    /// Validate the shard set and erasure list before touching any stripe.
    fn validate(&self, set: &ShardSet, erasures: &ErasureList) -> Result<usize> {
        let k = self.generator.data_shards();
        let m = self.generator.coding_shards();
        let n = k + m;

        if erasures.len() > m {
            return Err(Error::TooManyErasures {
                erased: erasures.len(),
                max: m,
            });
        }

        if let Some(index) = erasures.iter().find(|&i| i >= n) {
            return Err(Error::InvalidErasure(format!(
                "shard index {} out of range (max {})",
                index,
                n - 1
            )));
        }

        if set.data.len() != k {
            return Err(Error::ShardCountMismatch {
                role: "data",
                expected: k,
                actual: set.data.len(),
            });
        }
        if set.coding.len() != m {
            return Err(Error::ShardCountMismatch {
                role: "coding",
                expected: m,
                actual: set.coding.len(),
            });
        }

        let stripe_size = set.stripe_size();
        check_stripe_sizes(&set.data, "data", stripe_size)?;
        check_stripe_sizes(&set.coding, "coding", stripe_size)?;
        self.generator.width().check_aligned(stripe_size)?;
        Ok(stripe_size)
    }

    /// Reconstruct every erased shard of `set` in place.
    ///
    /// Surviving shards are never written. On any error, including more
    /// erasures than coding shards, `set` is left exactly as received.
    #[instrument(skip(self, set, erasures), fields(erased = ?erasures.indices()))]
    pub fn decode(&self, set: &mut ShardSet, erasures: &ErasureList) -> Result<()> {
        if let Err(e) = self.validate(set, erasures) {
            warn!("Decode rejected: {}", e);
            return Err(e);
        }
        if erasures.is_empty() {
            return Ok(());
        }

        let k = self.generator.data_shards();
        let n = self.generator.total_shards();
        let stripe_size = set.stripe_size();

        // Solve erased data rows from the first k survivors
        let mut recovered_data: Vec<(usize, Stripe)> = Vec::new();
        if erasures.iter().any(|i| i < k) {
            let survivors: Vec<usize> = (0..n).filter(|&i| !erasures.contains(i)).take(k).collect();
            let inverse = self.generator.decoding_matrix(&survivors)?;

            let mut sources: Vec<&[u8]> = Vec::with_capacity(k);
            for &index in &survivors {
                let stripe = set
                    .shard(index)
                    .ok_or_else(|| Error::Internal(format!("survivor {index} missing")))?;
                sources.push(stripe);
            }

            for index in erasures.iter().filter(|&i| i < k) {
                let mut stripe = Stripe::zeroed(stripe_size);
                dot_product(&self.generator, inverse.row(index), &sources, &mut stripe)?;
                recovered_data.push((index, stripe));
            }
        }

        // Re-encode erased coding rows from the completed data
        let mut recovered_coding: Vec<(usize, Stripe)> = Vec::new();
        {
            let data: Vec<&[u8]> = (0..k)
                .map(|j| {
                    recovered_data
                        .iter()
                        .find(|(index, _)| *index == j)
                        .map_or(&set.data[j][..], |(_, stripe)| &stripe[..])
                })
                .collect();

            for index in erasures.iter().filter(|&i| i >= k) {
                let mut stripe = Stripe::zeroed(stripe_size);
                dot_product(
                    &self.generator,
                    self.generator.coding_row(index - k),
                    &data,
                    &mut stripe,
                )?;
                recovered_coding.push((index - k, stripe));
            }
        }

        debug!(
            "Recovered {} data and {} coding stripes",
            recovered_data.len(),
            recovered_coding.len()
        );

        for (index, stripe) in recovered_data {
            set.data[index] = stripe;
        }
        for (index, stripe) in recovered_coding {
            set.coding[index] = stripe;
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use crate::ec::encoder::MatrixEncoder;
    use crate::ec::matrix::Matrix;
    use crate::ec::shard::InstanceRng;
    use crate::gf::FieldWidth;
    use assert_matches::assert_matches;

    fn encoded(k: usize, m: usize, width: FieldWidth, seed: u32) -> (Arc<GeneratorMatrix>, ShardSet) {
        let generator = Arc::new(GeneratorMatrix::vandermonde(k, m, width).unwrap());
        let config = CodecConfig::new(k, m, width, 16);
        let mut set = ShardSet::random(&config, &mut InstanceRng::new(seed));
        MatrixEncoder::new(generator.clone()).encode_set(&mut set).unwrap();
        (generator, set)
    }

    fn erase(set: &mut ShardSet, erasures: &ErasureList) {
        for index in erasures.iter() {
            set.shard_mut(index).unwrap().zero();
        }
    }

    #[test]
    fn test_decode_without_erasures_is_noop() {
        let (generator, original) = encoded(4, 2, FieldWidth::W8, 1);
        let mut set = original.clone();
        MatrixDecoder::new(generator)
            .decode(&mut set, &ErasureList::none())
            .unwrap();
        assert_eq!(set, original);
    }

    #[test]
    fn test_recover_data_and_coding() {
        let (generator, original) = encoded(4, 2, FieldWidth::W8, 5);
        let decoder = MatrixDecoder::new(generator);

        let erasures = ErasureList::new(vec![1, 5], 6).unwrap();
        let mut set = original.clone();
        erase(&mut set, &erasures);
        assert_ne!(set, original);

        decoder.decode(&mut set, &erasures).unwrap();
        assert_eq!(set, original);
    }

    #[test]
    fn test_recover_all_data_erasures_every_width() {
        for width in [FieldWidth::W8, FieldWidth::W16, FieldWidth::W32] {
            let (generator, original) = encoded(3, 3, width, 9);
            let decoder = MatrixDecoder::new(generator);

            let erasures = ErasureList::new(vec![2, 0, 1], 6).unwrap();
            let mut set = original.clone();
            erase(&mut set, &erasures);

            decoder.decode(&mut set, &erasures).unwrap();
            assert_eq!(set, original, "{width}");
        }
    }

    #[test]
    fn test_coding_only_erasures_are_reencoded() {
        let (generator, original) = encoded(2, 3, FieldWidth::W16, 3);
        let decoder = MatrixDecoder::new(generator);

        let erasures = ErasureList::new(vec![4, 2], 5).unwrap();
        let mut set = original.clone();
        erase(&mut set, &erasures);

        decoder.decode(&mut set, &erasures).unwrap();
        assert_eq!(set, original);
    }

    #[test]
    fn test_too_many_erasures_leaves_set_untouched() {
        let (generator, original) = encoded(4, 2, FieldWidth::W8, 7);
        let decoder = MatrixDecoder::new(generator);

        let erasures = ErasureList::new(vec![0, 1, 2], 6).unwrap();
        let mut set = original.clone();
        erase(&mut set, &erasures);
        let before = set.clone();

        assert_matches!(
            decoder.decode(&mut set, &erasures),
            Err(Error::TooManyErasures { erased: 3, max: 2 })
        );
        assert_eq!(set, before);
    }

    #[test]
    fn test_singular_generator_reported_and_set_untouched() {
        // Both coding rows are equal, so losing both data shards is unrecoverable
        let coding = Matrix::from_rows(2, 2, vec![1, 1, 1, 1]).unwrap();
        let generator = Arc::new(GeneratorMatrix::from_coding_rows(coding, FieldWidth::W8).unwrap());

        let data = vec![Stripe::from(vec![1, 2, 3, 4]), Stripe::from(vec![5, 6, 7, 8])];
        let mut set = ShardSet::with_data(data, 2);
        MatrixEncoder::new(generator.clone()).encode_set(&mut set).unwrap();

        let erasures = ErasureList::new(vec![0, 1], 4).unwrap();
        erase(&mut set, &erasures);
        let before = set.clone();

        let err = MatrixDecoder::new(generator)
            .decode(&mut set, &erasures)
            .unwrap_err();
        assert_matches!(err, Error::SingularMatrix { ref rows } if rows == &vec![2, 3]);
        assert!(err.is_consistency_violation());
        assert_eq!(set, before);
    }

    #[test]
    fn test_out_of_range_erasure_rejected() {
        let (generator, mut set) = encoded(2, 2, FieldWidth::W8, 7);
        let erasures = ErasureList::new(vec![5], 8).unwrap();
        assert_matches!(
            MatrixDecoder::new(generator).decode(&mut set, &erasures),
            Err(Error::InvalidErasure(_))
        );
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let (generator, mut set) = encoded(3, 2, FieldWidth::W8, 2);
        set.coding.pop();
        let erasures = ErasureList::new(vec![0], 5).unwrap();
        assert_matches!(
            MatrixDecoder::new(generator).decode(&mut set, &erasures),
            Err(Error::ShardCountMismatch { role: "coding", .. })
        );
    }
}
