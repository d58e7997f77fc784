//! Batch Driver
//!
//! Runs m independent encode instances over one shared generator matrix,
//! then rotates, mutates and folds back their coding shards, writing a
//! report of every phase. An optional decode check erases random shards of
//! pristine encoded copies and compares the reconstruction with the
//! retained originals.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::DriverConfig;
use crate::ec::copier::{CodingGrid, ShardCopier};
use crate::ec::decoder::MatrixDecoder;
use crate::ec::encoder::MatrixEncoder;
use crate::ec::matrix::GeneratorMatrix;
use crate::ec::mutate::ScalarMutator;
use crate::ec::rotation::Rotation;
use crate::ec::shard::{diff_sets, Batch, ErasureList, InstanceRng, ShardAddr, ShardSet};
use crate::error::{Error, Result};
use crate::report;

/// Everything a batch run produced.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Shared generator matrix
    pub generator: Arc<GeneratorMatrix>,

    /// Batch as encoded, before any transform
    pub original: Batch,

    /// Rotated coding grid after mutation, as folded back
    pub rotated: CodingGrid,

    /// Batch after the copy-back
    pub batch: Batch,

    /// Coding cells whose copied span does not match the rotated grid
    pub copy_mismatches: Vec<ShardAddr>,

    /// Per-instance decode failures
    pub failures: Vec<Error>,
}

impl BatchOutcome {
    /// True when the copy-back verified and every decode check passed.
    pub fn is_success(&self) -> bool {
        self.copy_mismatches.is_empty() && self.failures.is_empty()
    }
}

// =============================================================================
// Batch Driver
// =============================================================================

/// Sequences the encode, rotate, mutate, copy and decode phases.
#[derive(Debug, Clone)]
pub struct BatchDriver {
    config: DriverConfig,
}

impl BatchDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run every phase, writing the report to `out`.
    ///
    /// Configuration and transform errors abort the run. Decode-check
    /// failures are collected per instance in [`BatchOutcome::failures`].
    #[instrument(skip(self, out), fields(
        k = self.config.codec.data_shards,
        m = self.config.codec.coding_shards,
        w = self.config.codec.width.bits(),
        seed = self.config.seed
    ))]
    pub fn run<W: Write>(&self, out: &mut W) -> Result<BatchOutcome> {
        self.config.validate()?;
        let codec = &self.config.codec;
        let m = codec.coding_shards;

        let generator = Arc::new(GeneratorMatrix::vandermonde(
            codec.data_shards,
            m,
            codec.width,
        )?);
        let encoder = MatrixEncoder::new(generator.clone());

        report::write_header(out, &self.config)?;
        report::write_phase(out, "Last m rows of the generator Matrix (G^T):")?;
        report::write_matrix(out, generator.coding(), codec.width)?;

        // Phase 1: encode
        let (sets, mut rngs): (Vec<ShardSet>, Vec<InstanceRng>) =
            self.encode_instances(&encoder)?.into_iter().unzip();
        let mut batch = Batch::new(sets);
        for (i, set) in batch.sets().iter().enumerate() {
            report::write_phase(out, &format!("Encoding Complete {i}:"))?;
            report::write_data_and_coding(out, codec.width, &set.data, &set.coding)?;
        }
        let original = batch.clone();
        info!("Encoded {} instances", batch.len());

        // Phase 2: rotate
        let rotation = Rotation::new(m);
        let target = {
            let view = rotation.apply(&batch)?;
            report::write_phase(out, "Data and parities after permutations:")?;
            for (set, row) in batch.sets().iter().zip(view.rows()) {
                report::write_data_and_coding(out, codec.width, &set.data, row)?;
            }
            view.addr(0, 0)
                .ok_or_else(|| Error::Internal("rotated grid is empty".into()))?
        };

        // Phase 3: multiply rotated cell (0, 0) by 2
        let stripe = batch
            .stripe_mut(target)
            .ok_or_else(|| Error::Internal(format!("{target} missing")))?;
        ScalarMutator::new(codec.width).double(stripe, self.config.mutate_bytes)?;
        debug!(%target, bytes = self.config.mutate_bytes, "mutated rotated cell (0, 0)");

        let copier = ShardCopier::new(self.config.copy_span)?;
        let rotated = {
            let view = rotation.apply(&batch)?;
            report::write_phase(out, "After multiplying by 2:")?;
            for (set, row) in batch.sets().iter().zip(view.rows()) {
                report::write_data_and_coding(out, codec.width, &set.data, row)?;
            }
            copier.snapshot(&view)
        };

        // Phase 4: fold the rotated grid back and verify
        copier.copy_into(&mut batch, &rotated)?;
        let copy_mismatches = copier.verify(&batch, &rotated);
        if !copy_mismatches.is_empty() {
            warn!(cells = copy_mismatches.len(), "copy-back verification failed");
        }
        report::write_phase(out, "Test:")?;
        for set in batch.sets() {
            report::write_data_and_coding(out, codec.width, &set.data, &set.coding)?;
        }

        // Phase 5: decode check on pristine copies
        let mut failures = Vec::new();
        if let Some(count) = self.config.erasures {
            let decoder = MatrixDecoder::new(generator.clone());
            for (i, (expected, rng)) in original.sets().iter().zip(rngs.iter_mut()).enumerate() {
                match self.check_decode(out, &decoder, i, expected, rng, count) {
                    Ok(mismatches) => {
                        if !mismatches.is_empty() {
                            warn!(instance = i, shards = mismatches.len(), "decoded shards differ");
                        }
                        failures.extend(
                            mismatches
                                .into_iter()
                                .map(|addr| Error::DecodeMismatch(addr).for_instance(i)),
                        );
                    }
                    Err(e @ Error::Io(_)) => return Err(e),
                    Err(e) => {
                        warn!(instance = i, "decode check failed: {}", e);
                        failures.push(e.for_instance(i));
                    }
                }
            }
        }

        report::write_failures(out, &failures)?;
        report::write_footer(out)?;

        Ok(BatchOutcome {
            generator,
            original,
            rotated,
            batch,
            copy_mismatches,
            failures,
        })
    }

    /// Encode every instance, each with its own random source.
    fn encode_instances(&self, encoder: &MatrixEncoder) -> Result<Vec<(ShardSet, InstanceRng)>> {
        let instances = self.config.instances();

        if !self.config.parallel {
            return (0..instances)
                .map(|i| self.encode_instance(encoder, i))
                .collect();
        }

        crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = (0..instances)
                .map(|i| scope.spawn(move |_| self.encode_instance(encoder, i)))
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(i, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(Error::Internal("encode thread panicked".into()).for_instance(i))
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .unwrap_or_else(|_| Err(Error::Internal("encode scope panicked".into())))
    }

    fn encode_instance(&self, encoder: &MatrixEncoder, instance: usize) -> Result<(ShardSet, InstanceRng)> {
        let mut rng = InstanceRng::for_instance(self.config.seed, instance);
        let mut set = ShardSet::random(&self.config.codec, &mut rng);
        encoder
            .encode_set(&mut set)
            .map_err(|e| e.for_instance(instance))?;
        debug!(instance, seed = rng.seed(), "instance encoded");
        Ok((set, rng))
    }

    /// Erase `count` random shards of a copy of `expected`, decode, and
    /// return the address of every shard that differs from `expected`.
    fn check_decode<W: Write>(
        &self,
        out: &mut W,
        decoder: &MatrixDecoder,
        instance: usize,
        expected: &ShardSet,
        rng: &mut InstanceRng,
        count: usize,
    ) -> Result<Vec<ShardAddr>> {
        let width = self.config.codec.width;
        let erasures = ErasureList::random(rng, count, expected.total_shards())?;

        let mut set = expected.clone();
        for index in erasures.iter() {
            if let Some(stripe) = set.shard_mut(index) {
                stripe.zero();
            }
        }
        report::write_phase(
            out,
            &format!("Erased {} random devices of instance {}:", count, instance),
        )?;
        report::write_data_and_coding(out, width, &set.data, &set.coding)?;

        decoder.decode(&mut set, &erasures)?;
        report::write_phase(out, &format!("State of instance {instance} after decoding:"))?;
        report::write_data_and_coding(out, width, &set.data, &set.coding)?;

        Ok(diff_sets(instance, expected, &set))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use crate::gf::FieldWidth;
    use assert_matches::assert_matches;

    fn run(config: DriverConfig) -> (BatchOutcome, String) {
        let mut out = Vec::new();
        let outcome = BatchDriver::new(config).run(&mut out).unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_run_default_demo() {
        let config = DriverConfig::new(CodecConfig::new(3, 3, FieldWidth::W8, 8), 5);
        let (outcome, text) = run(config);

        assert!(outcome.is_success());
        assert_eq!(outcome.original.len(), 3);
        assert!(text.starts_with("<HTML><TITLE>serasure 3 3 8 5</title>"));
        assert!(text.contains("Encoding Complete 2:"));
        assert!(text.contains("After multiplying by 2:"));
        assert!(text.trim_end().ends_with("</pre>"));
    }

    #[test]
    fn test_copy_back_installs_mutated_rotation() {
        let config = DriverConfig::new(CodecConfig::new(2, 3, FieldWidth::W16, 8), 11);
        let (outcome, _) = run(config);

        let rotation = Rotation::new(3);
        for i in 0..3 {
            for j in 0..3 {
                let (si, sj) = rotation.source(i, j);
                let mut expected = outcome.original.sets()[si].coding[sj].clone();
                if (i, j) == (0, 0) {
                    ScalarMutator::new(FieldWidth::W16).double(&mut expected, 4).unwrap();
                }
                assert_eq!(outcome.batch.sets()[i].coding[j], expected, "cell ({i}, {j})");
            }
        }
        // data shards are never touched
        for (before, after) in outcome.original.sets().iter().zip(outcome.batch.sets()) {
            assert_eq!(before.data, after.data);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let codec = CodecConfig::new(4, 3, FieldWidth::W32, 16);
        let sequential = DriverConfig::new(codec.clone(), 42);
        let mut parallel = DriverConfig::new(codec, 42);
        parallel.parallel = true;

        let (a, text_a) = run(sequential);
        let (b, text_b) = run(parallel);
        assert_eq!(a.original, b.original);
        assert_eq!(a.batch, b.batch);
        assert_eq!(text_a, text_b);
    }

    #[test]
    fn test_decode_check_passes() {
        let mut config = DriverConfig::new(CodecConfig::new(4, 2, FieldWidth::W8, 8), 5);
        config.erasures = Some(2);
        let (outcome, text) = run(config);

        assert!(outcome.failures.is_empty());
        assert!(text.contains("State of instance 1 after decoding:"));
        assert!(!text.contains("ERROR:"));
    }

    #[test]
    fn test_invalid_config_rejected_before_output() {
        let config = DriverConfig::new(CodecConfig::new(250, 7, FieldWidth::W8, 8), 1);
        let mut out = Vec::new();
        assert_matches!(
            BatchDriver::new(config).run(&mut out),
            Err(Error::FieldCapacityExceeded { .. })
        );
        assert!(out.is_empty());
    }
}
