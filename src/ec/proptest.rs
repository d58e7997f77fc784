//! Property-Based Tests for Erasure Coding
//!
//! Uses proptest to check the coding engine across shapes, field widths and
//! data contents.
//!
//! # Test Properties
//!
//! 1. **Roundtrip Correctness**: decoding with no erasures changes nothing
//! 2. **Erasure Recovery**: any erasure set of size <= m is restored exactly
//! 3. **Over-erasure Rejection**: more than m erasures fail and mutate nothing
//! 4. **Rotation Bijectivity**: rotation relabels cells without loss and
//!    returns to the start after `order()` applications
//! 5. **Mutation Reversibility**: doubling then halving restores the bytes
//! 6. **Matrix Invertibility**: every k-row selection inverts

#![cfg(test)]

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use super::decoder::MatrixDecoder;
use super::encoder::MatrixEncoder;
use super::matrix::GeneratorMatrix;
use super::mutate::ScalarMutator;
use super::rotation::Rotation;
use super::shard::{ErasureList, ShardSet, Stripe};
use crate::error::Error;
use crate::gf::FieldWidth;

// =============================================================================
// Property Strategies
// =============================================================================

fn width_strategy() -> impl Strategy<Value = FieldWidth> {
    prop_oneof![
        Just(FieldWidth::W8),
        Just(FieldWidth::W16),
        Just(FieldWidth::W32),
    ]
}

/// Small k+m shapes. k: 1-6 data shards, m: 1-4 coding shards.
fn shape_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=6, 1usize..=4)
}

/// A shape, width and encoded shard set with 1-8 words per stripe.
fn encoded_strategy() -> impl Strategy<Value = (Arc<GeneratorMatrix>, ShardSet)> {
    (shape_strategy(), width_strategy(), 1usize..=8)
        .prop_flat_map(|((k, m), width, words)| {
            let size = words * width.word_bytes();
            (
                Just((k, m, width)),
                prop::collection::vec(prop::collection::vec(any::<u8>(), size), k),
            )
        })
        .prop_map(|((k, m, width), data)| {
            let generator = Arc::new(GeneratorMatrix::vandermonde(k, m, width).unwrap());
            let mut set = ShardSet::with_data(data.into_iter().map(Stripe::from).collect(), m);
            MatrixEncoder::new(generator.clone()).encode_set(&mut set).unwrap();
            (generator, set)
        })
}

/// Distinct erasure indices below `total`, at most `max` of them.
fn erasure_strategy(total: usize, max: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::btree_set(0..total, 0..=max.min(total))
        .prop_map(|set: BTreeSet<usize>| set.into_iter().collect())
        .prop_shuffle()
}

// =============================================================================
// Decode Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Decoding with an empty erasure list leaves every shard as is.
    #[test]
    fn prop_roundtrip_no_loss((generator, original) in encoded_strategy()) {
        let mut set = original.clone();
        MatrixDecoder::new(generator).decode(&mut set, &ErasureList::none())?;
        prop_assert_eq!(set, original);
    }

    /// Property: Any erasure set of size <= m is recovered exactly.
    #[test]
    fn prop_erasure_recovery(
        ((generator, original), erasures) in encoded_strategy().prop_flat_map(|(g, set)| {
            let total = g.total_shards();
            let m = g.coding_shards();
            (Just((g, set)), erasure_strategy(total, m))
        }),
    ) {
        let total = generator.total_shards();
        let erasures = ErasureList::new(erasures, total)?;

        let mut set = original.clone();
        for index in erasures.iter() {
            set.shard_mut(index).unwrap().zero();
        }

        MatrixDecoder::new(generator).decode(&mut set, &erasures)?;
        prop_assert_eq!(set, original, "erasures {:?}", erasures.indices());
    }

    /// Property: More than m erasures fail and touch nothing.
    #[test]
    fn prop_over_erasure_rejected(
        ((generator, original), extra) in encoded_strategy().prop_flat_map(|(g, set)| {
            let spare = g.data_shards();
            (Just((g, set)), 1usize..=spare)
        }),
    ) {
        let total = generator.total_shards();
        let erased = generator.coding_shards() + extra;
        let erasures = ErasureList::new((0..erased).collect(), total)?;

        let mut set = original.clone();
        let result = MatrixDecoder::new(generator).decode(&mut set, &erasures);
        let rejected = matches!(result, Err(Error::TooManyErasures { .. }));
        prop_assert!(rejected, "{} erasures accepted", erased);
        prop_assert_eq!(set, original);
    }
}

// =============================================================================
// Transform Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: Rotation is a bijection on the grid and cycles back after
    /// `order()` applications.
    #[test]
    fn prop_rotation_bijective(m in 1usize..=12) {
        let rotation = Rotation::new(m);
        let start: Vec<Vec<usize>> = (0..m).map(|i| (i * m..(i + 1) * m).collect()).collect();

        let once = rotation.permute(&start)?;
        let mut cells: Vec<usize> = once.iter().flatten().copied().collect();
        cells.sort_unstable();
        prop_assert_eq!(cells, (0..m * m).collect::<Vec<_>>());

        let mut grid = start.clone();
        for _ in 0..rotation.order() {
            grid = rotation.permute(&grid)?;
        }
        prop_assert_eq!(grid, start);
    }

    /// Property: Doubling a region then halving it restores the bytes.
    #[test]
    fn prop_mutation_reversible(
        width in width_strategy(),
        bytes in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let word = width.word_bytes();
        let len = bytes.len() / word * word;
        let original = bytes[..len].to_vec();

        let mutator = ScalarMutator::new(width);
        let mut buf = original.clone();
        mutator.double(&mut buf, len)?;
        mutator.halve(&mut buf, len)?;
        prop_assert_eq!(buf, original);
    }

    /// Property: Every k-row selection of the full matrix inverts, and the
    /// inverse really is one.
    #[test]
    fn prop_selected_rows_invertible(
        ((k, m), width, rows) in (shape_strategy(), width_strategy()).prop_flat_map(|((k, m), w)| {
            (Just((k, m)), Just(w), Just((0..k + m).collect::<Vec<_>>()).prop_shuffle())
        }),
    ) {
        let generator = GeneratorMatrix::vandermonde(k, m, width)?;
        let survivors = &rows[..k];

        let inverse = generator.decoding_matrix(survivors)?;
        let selected = generator.full().select_rows(survivors)?;
        let product = selected.multiply(&inverse, generator.field())?;
        prop_assert_eq!(product, super::matrix::Matrix::identity(k));
    }
}
