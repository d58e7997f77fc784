//! Codec and Batch Configuration
//!
//! All configuration comes from the command line; these types carry it into
//! the library and validate it before any computation starts.

use crate::error::{Error, Result};
use crate::gf::FieldWidth;

/// Bytes in one machine word, the stripe and copy size used by the batch demo.
pub const MACHINE_WORD: usize = std::mem::size_of::<u64>();

// =============================================================================
// Codec Configuration
// =============================================================================

/// Shape of one encoding instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Number of data shards (k)
    pub data_shards: usize,

    /// Number of coding shards (m)
    pub coding_shards: usize,

    /// Field width (w)
    pub width: FieldWidth,

    /// Size of each stripe in bytes (multiple of w/8)
    pub stripe_size: usize,
}

impl CodecConfig {
    /// Create a new codec configuration.
    ///
    /// # Arguments
    ///
    /// * `data_shards` - Number of data shards (k), must be >= 1
    /// * `coding_shards` - Number of coding shards (m), must be >= 1
    /// * `width` - Field width
    /// * `stripe_size` - Size of each stripe in bytes
    pub fn new(data_shards: usize, coding_shards: usize, width: FieldWidth, stripe_size: usize) -> Self {
        Self {
            data_shards,
            coding_shards,
            width,
            stripe_size,
        }
    }

    /// Total number of shards (k + m).
    #[inline]
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.coding_shards
    }

    /// Storage overhead as a ratio (m / k).
    #[inline]
    pub fn overhead_ratio(&self) -> f64 {
        self.coding_shards as f64 / self.data_shards as f64
    }

    /// Storage efficiency as a percentage.
    #[inline]
    pub fn efficiency(&self) -> f64 {
        self.data_shards as f64 / self.total_shards() as f64 * 100.0
    }

    /// Validate the shard counts against the field.
    pub fn validate_shape(&self) -> Result<()> {
        validate_shape(self.data_shards, self.coding_shards, self.width)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.validate_shape()?;

        if self.stripe_size == 0 {
            return Err(Error::InvalidEcConfig("stripe_size must be > 0".into()));
        }

        if self.stripe_size % self.width.word_bytes() != 0 {
            return Err(Error::InvalidEcConfig(format!(
                "stripe_size must be a multiple of {} bytes for {}, got {}",
                self.width.word_bytes(),
                self.width,
                self.stripe_size
            )));
        }

        Ok(())
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            data_shards: 4,
            coding_shards: 2,
            width: FieldWidth::W8,
            stripe_size: MACHINE_WORD,
        }
    }
}

/// Check k >= 1, m >= 1 and, for w <= 16, k + m <= 2^w.
pub fn validate_shape(data_shards: usize, coding_shards: usize, width: FieldWidth) -> Result<()> {
    if data_shards == 0 {
        return Err(Error::InvalidEcConfig("data_shards must be >= 1".into()));
    }

    if coding_shards == 0 {
        return Err(Error::InvalidEcConfig("coding_shards must be >= 1".into()));
    }

    let total = data_shards
        .checked_add(coding_shards)
        .ok_or_else(|| Error::InvalidEcConfig("k + m overflows".into()))?;

    if let Some(capacity) = width.max_shards() {
        if total as u64 > capacity {
            return Err(Error::FieldCapacityExceeded {
                total,
                capacity,
                bits: width.bits(),
            });
        }
    } else if total as u64 > u32::MAX as u64 {
        return Err(Error::InvalidEcConfig(format!(
            "k + m = {total} does not fit in a field element"
        )));
    }

    Ok(())
}

// =============================================================================
// Driver Configuration
// =============================================================================

/// Configuration of a full batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Per-instance codec shape; the batch holds `coding_shards` instances
    pub codec: CodecConfig,

    /// Base seed for synthetic data
    pub seed: u32,

    /// Leading bytes of rotated cell (0, 0) multiplied by 2
    pub mutate_bytes: usize,

    /// Bytes copied per cell when folding the rotated grid back
    pub copy_span: usize,

    /// Number of shards to erase per instance in the decode check
    pub erasures: Option<usize>,

    /// Encode instances on separate threads
    pub parallel: bool,
}

impl DriverConfig {
    /// Create a driver configuration with the default transform parameters.
    pub fn new(codec: CodecConfig, seed: u32) -> Self {
        Self {
            codec,
            seed,
            ..Default::default()
        }
    }

    /// Number of instances in the batch (equal to m).
    #[inline]
    pub fn instances(&self) -> usize {
        self.codec.coding_shards
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.codec.validate()?;

        let stripe_size = self.codec.stripe_size;
        let word = self.codec.width.word_bytes();

        if self.mutate_bytes > stripe_size {
            return Err(Error::SpanOutOfRange {
                span: self.mutate_bytes,
                stripe_size,
            });
        }

        if self.mutate_bytes % word != 0 {
            return Err(Error::MisalignedRegion {
                len: self.mutate_bytes,
                word,
            });
        }

        if self.copy_span == 0 || self.copy_span > stripe_size {
            return Err(Error::SpanOutOfRange {
                span: self.copy_span,
                stripe_size,
            });
        }

        if let Some(erasures) = self.erasures {
            if erasures > self.codec.coding_shards {
                return Err(Error::TooManyErasures {
                    erased: erasures,
                    max: self.codec.coding_shards,
                });
            }
        }

        Ok(())
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            codec: CodecConfig::default(),
            seed: 0,
            mutate_bytes: 4,
            copy_span: MACHINE_WORD,
            erasures: None,
            parallel: false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
