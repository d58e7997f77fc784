//! Shard Model
//!
//! Owned stripe buffers grouped into per-instance shard sets and batches,
//! addressed by `(instance, role, index)` instead of nested raw pointers.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Deref, DerefMut};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::CodecConfig;
use crate::error::{Error, Result};

// =============================================================================
// Stripe
// =============================================================================

/// Fixed-size payload of one shard.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Stripe(Box<[u8]>);

impl Stripe {
    /// Zero-filled stripe.
    pub fn zeroed(size: usize) -> Self {
        Self(vec![0u8; size].into_boxed_slice())
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }

    /// Overwrite every byte with zero.
    pub fn zero(&mut self) {
        self.0.fill(0);
    }
}

impl Deref for Stripe {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for Stripe {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl AsRef<[u8]> for Stripe {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Stripe {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

impl fmt::Debug for Stripe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stripe({})", hex::encode(&self.0))
    }
}

// =============================================================================
// Addressing
// =============================================================================

/// Whether a shard carries data or redundancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShardRole {
    Data,
    Coding,
}

impl fmt::Display for ShardRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardRole::Data => write!(f, "D"),
            ShardRole::Coding => write!(f, "C"),
        }
    }
}

/// Location of one stripe within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardAddr {
    pub instance: usize,
    pub role: ShardRole,
    pub index: usize,
}

impl ShardAddr {
    pub fn data(instance: usize, index: usize) -> Self {
        Self {
            instance,
            role: ShardRole::Data,
            index,
        }
    }

    pub fn coding(instance: usize, index: usize) -> Self {
        Self {
            instance,
            role: ShardRole::Coding,
            index,
        }
    }
}

impl fmt::Display for ShardAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance {} {}{}", self.instance, self.role, self.index)
    }
}

// =============================================================================
// Shard Set
// =============================================================================

/// The k data and m coding stripes of one encoding instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSet {
    pub data: Vec<Stripe>,
    pub coding: Vec<Stripe>,
}

impl ShardSet {
    /// Data stripes plus zeroed coding stripes of the same size.
    pub fn with_data(data: Vec<Stripe>, coding_shards: usize) -> Self {
        let size = data.first().map_or(0, |s| s.len());
        Self {
            data,
            coding: (0..coding_shards).map(|_| Stripe::zeroed(size)).collect(),
        }
    }

    /// k random data stripes drawn from `rng`, zeroed coding stripes.
    pub fn random(config: &CodecConfig, rng: &mut InstanceRng) -> Self {
        let data = (0..config.data_shards)
            .map(|_| rng.stripe(config.stripe_size))
            .collect();
        Self::with_data(data, config.coding_shards)
    }

    pub fn data_shards(&self) -> usize {
        self.data.len()
    }

    pub fn coding_shards(&self) -> usize {
        self.coding.len()
    }

    pub fn total_shards(&self) -> usize {
        self.data.len() + self.coding.len()
    }

    /// Size of the stripes, taken from the first one.
    pub fn stripe_size(&self) -> usize {
        self.data
            .first()
            .or_else(|| self.coding.first())
            .map_or(0, |s| s.len())
    }

    /// Shard by global index (data first, then coding).
    pub fn shard(&self, index: usize) -> Option<&Stripe> {
        let k = self.data.len();
        if index < k {
            self.data.get(index)
        } else {
            self.coding.get(index - k)
        }
    }

    pub fn shard_mut(&mut self, index: usize) -> Option<&mut Stripe> {
        let k = self.data.len();
        if index < k {
            self.data.get_mut(index)
        } else {
            self.coding.get_mut(index - k)
        }
    }

    /// Check the set matches `config` in shard counts and stripe sizes.
    pub fn check_shape(&self, config: &CodecConfig) -> Result<()> {
        if self.data.len() != config.data_shards {
            return Err(Error::ShardCountMismatch {
                role: "data",
                expected: config.data_shards,
                actual: self.data.len(),
            });
        }
        if self.coding.len() != config.coding_shards {
            return Err(Error::ShardCountMismatch {
                role: "coding",
                expected: config.coding_shards,
                actual: self.coding.len(),
            });
        }
        check_stripe_sizes(&self.data, "data", config.stripe_size)?;
        check_stripe_sizes(&self.coding, "coding", config.stripe_size)
    }
}

pub(crate) fn check_stripe_sizes(stripes: &[Stripe], role: &str, expected: usize) -> Result<()> {
    for (i, stripe) in stripes.iter().enumerate() {
        if stripe.len() != expected {
            return Err(Error::StripeSizeMismatch {
                what: format!("{role} shard {i}"),
                actual: stripe.len(),
                expected,
            });
        }
    }
    Ok(())
}

// =============================================================================
// Batch
// =============================================================================

/// Independent shard sets sharing one generator matrix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    sets: Vec<ShardSet>,
}

impl Batch {
    pub fn new(sets: Vec<ShardSet>) -> Self {
        Self { sets }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn sets(&self) -> &[ShardSet] {
        &self.sets
    }

    pub fn sets_mut(&mut self) -> &mut [ShardSet] {
        &mut self.sets
    }

    pub fn instance(&self, instance: usize) -> Option<&ShardSet> {
        self.sets.get(instance)
    }

    pub fn instance_mut(&mut self, instance: usize) -> Option<&mut ShardSet> {
        self.sets.get_mut(instance)
    }

    pub fn stripe(&self, addr: ShardAddr) -> Option<&Stripe> {
        let set = self.sets.get(addr.instance)?;
        match addr.role {
            ShardRole::Data => set.data.get(addr.index),
            ShardRole::Coding => set.coding.get(addr.index),
        }
    }

    pub fn stripe_mut(&mut self, addr: ShardAddr) -> Option<&mut Stripe> {
        let set = self.sets.get_mut(addr.instance)?;
        match addr.role {
            ShardRole::Data => set.data.get_mut(addr.index),
            ShardRole::Coding => set.coding.get_mut(addr.index),
        }
    }

    /// Every address in the batch, instance by instance, data before coding.
    pub fn addrs(&self) -> impl Iterator<Item = ShardAddr> + '_ {
        self.sets.iter().enumerate().flat_map(|(instance, set)| {
            (0..set.data.len())
                .map(move |i| ShardAddr::data(instance, i))
                .chain((0..set.coding.len()).map(move |i| ShardAddr::coding(instance, i)))
        })
    }

    pub fn into_sets(self) -> Vec<ShardSet> {
        self.sets
    }
}

/// Addresses whose stripes differ between two batches of the same shape.
/// Stripes present in only one of them count as different.
pub fn diff_batches(expected: &Batch, actual: &Batch) -> Vec<ShardAddr> {
    let mut addrs: BTreeSet<ShardAddr> = expected.addrs().collect();
    addrs.extend(actual.addrs());
    addrs
        .into_iter()
        .filter(|&addr| expected.stripe(addr) != actual.stripe(addr))
        .collect()
}

/// Addresses of every stripe of `actual` that differs from `expected`,
/// labelled with `instance`. Data stripes come first.
pub fn diff_sets(instance: usize, expected: &ShardSet, actual: &ShardSet) -> Vec<ShardAddr> {
    let k = expected.data_shards();
    let total = expected.total_shards().max(actual.total_shards());
    (0..total)
        .filter(|&index| expected.shard(index) != actual.shard(index))
        .map(|index| {
            if index < k {
                ShardAddr::data(instance, index)
            } else {
                ShardAddr::coding(instance, index - k)
            }
        })
        .collect()
}

// =============================================================================
// Erasure List
// =============================================================================

/// Distinct shard indices (0..k+m, data first) marked as missing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErasureList {
    indices: Vec<usize>,
}

impl ErasureList {
    /// Validate `indices` against a code with `total_shards` shards.
    ///
    /// Order is preserved; the count is checked against m by the decoder.
    pub fn new(indices: Vec<usize>, total_shards: usize) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for &index in &indices {
            if index >= total_shards {
                return Err(Error::InvalidErasure(format!(
                    "shard index {} out of range (max {})",
                    index,
                    total_shards.saturating_sub(1)
                )));
            }
            if !seen.insert(index) {
                return Err(Error::InvalidErasure(format!(
                    "shard index {index} listed twice"
                )));
            }
        }
        Ok(Self { indices })
    }

    /// No erasures.
    pub fn none() -> Self {
        Self::default()
    }

    /// `count` distinct indices below `total_shards`, by rejection sampling.
    pub fn random(rng: &mut InstanceRng, count: usize, total_shards: usize) -> Result<Self> {
        if count > total_shards {
            return Err(Error::InvalidErasure(format!(
                "cannot erase {count} of {total_shards} shards"
            )));
        }
        let mut erased = vec![false; total_shards];
        let mut indices = Vec::with_capacity(count);
        while indices.len() < count {
            let candidate = rng.index(total_shards);
            if !erased[candidate] {
                erased[candidate] = true;
                indices.push(candidate);
            }
        }
        Ok(Self { indices })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }
}

// =============================================================================
// Per-instance Random Source
// =============================================================================

/// Reproducible generator owned by one instance.
#[derive(Debug, Clone)]
pub struct InstanceRng {
    seed: u32,
    rng: ChaCha8Rng,
}

impl InstanceRng {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed as u64),
        }
    }

    /// Generator for `instance` of a batch seeded with `base`.
    pub fn for_instance(base: u32, instance: usize) -> Self {
        Self::new(instance_seed(base, instance))
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// A stripe of random bytes.
    pub fn stripe(&mut self, size: usize) -> Stripe {
        let mut bytes = vec![0u8; size];
        self.rng.fill_bytes(&mut bytes);
        Stripe::from_vec(bytes)
    }

    /// Uniform index in `0..bound`.
    pub fn index(&mut self, bound: usize) -> usize {
        self.rng.gen_range(0..bound)
    }
}

/// Seed of `instance`: the base seed advanced by 0, 1, ..., instance in turn.
pub fn instance_seed(base: u32, instance: usize) -> u32 {
    (0..=instance).fold(base, |seed, i| seed.wrapping_add(i as u32))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gf::FieldWidth;
    use assert_matches::assert_matches;

    fn small_set() -> ShardSet {
        ShardSet::with_data(
            vec![Stripe::from(vec![1, 2]), Stripe::from(vec![3, 4])],
            2,
        )
    }

    #[test]
    fn test_global_shard_indexing() {
        let mut set = small_set();
        assert_eq!(set.total_shards(), 4);
        assert_eq!(&**set.shard(1).unwrap(), &[3, 4]);
        assert_eq!(&**set.shard(2).unwrap(), &[0, 0]);
        assert!(set.shard(4).is_none());

        set.shard_mut(3).unwrap()[0] = 9;
        assert_eq!(set.coding[1][0], 9);
    }

    #[test]
    fn test_check_shape() {
        let config = CodecConfig::new(2, 2, FieldWidth::W8, 2);
        assert!(small_set().check_shape(&config).is_ok());

        let config = CodecConfig::new(2, 3, FieldWidth::W8, 2);
        assert_matches!(
            small_set().check_shape(&config),
            Err(Error::ShardCountMismatch { role: "coding", .. })
        );

        let config = CodecConfig::new(2, 2, FieldWidth::W8, 4);
        assert_matches!(
            small_set().check_shape(&config),
            Err(Error::StripeSizeMismatch { .. })
        );
    }

    #[test]
    fn test_batch_addressing() {
        let mut batch = Batch::new(vec![small_set(), small_set()]);
        let addr = ShardAddr::coding(1, 0);
        batch.stripe_mut(addr).unwrap()[1] = 7;

        assert_eq!(batch.stripe(addr).unwrap()[1], 7);
        assert_eq!(batch.stripe(ShardAddr::coding(0, 0)).unwrap()[1], 0);
        assert!(batch.stripe(ShardAddr::data(2, 0)).is_none());
        assert_eq!(batch.addrs().count(), 8);
        assert_eq!(format!("{addr}"), "instance 1 C0");
    }

    #[test]
    fn test_diff_batches() {
        let original = Batch::new(vec![small_set(), small_set()]);
        let mut changed = original.clone();
        assert!(diff_batches(&original, &changed).is_empty());

        changed.stripe_mut(ShardAddr::data(1, 1)).unwrap()[0] ^= 0xFF;
        assert_eq!(diff_batches(&original, &changed), vec![ShardAddr::data(1, 1)]);
    }

    #[test]
    fn test_diff_sets_lists_every_mismatch() {
        let expected = small_set();
        assert!(diff_sets(3, &expected, &expected).is_empty());

        let mut actual = expected.clone();
        actual.data[0][1] ^= 0x01;
        actual.coding[0][0] = 0xEE;
        actual.coding[1][1] = 0xEE;
        assert_eq!(
            diff_sets(3, &expected, &actual),
            vec![
                ShardAddr::data(3, 0),
                ShardAddr::coding(3, 0),
                ShardAddr::coding(3, 1),
            ]
        );
    }

    #[test]
    fn test_erasure_list_validation() {
        assert!(ErasureList::new(vec![1, 5], 6).is_ok());
        assert_matches!(ErasureList::new(vec![6], 6), Err(Error::InvalidErasure(_)));
        assert_matches!(ErasureList::new(vec![2, 2], 6), Err(Error::InvalidErasure(_)));
        assert!(ErasureList::none().is_empty());
    }

    #[test]
    fn test_random_erasures_are_distinct() {
        let mut rng = InstanceRng::new(11);
        let list = ErasureList::random(&mut rng, 4, 6).unwrap();
        assert_eq!(list.len(), 4);
        let unique: BTreeSet<_> = list.iter().collect();
        assert_eq!(unique.len(), 4);
        assert!(list.iter().all(|i| i < 6));
        assert!(ErasureList::random(&mut rng, 7, 6).is_err());
    }

    #[test]
    fn test_instance_rng_reproducible() {
        let a = InstanceRng::new(5).stripe(16);
        let b = InstanceRng::new(5).stripe(16);
        let c = InstanceRng::new(6).stripe(16);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_instance_seed_is_cumulative() {
        assert_eq!(instance_seed(5, 0), 5);
        assert_eq!(instance_seed(5, 1), 6);
        assert_eq!(instance_seed(5, 2), 8);
        assert_eq!(instance_seed(5, 3), 11);
        assert_eq!(instance_seed(u32::MAX, 1), 0);
    }
}
