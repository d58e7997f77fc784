//! Error types for the serasure erasure coding engine

use thiserror::Error;

use crate::ec::shard::ShardAddr;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, encoding, transforming or decoding
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error while writing a report
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Input Validation Errors
    // =========================================================================
    /// Invalid EC configuration
    #[error("Invalid EC configuration: {0}")]
    InvalidEcConfig(String),

    /// k + m does not fit in the field's element space
    #[error("k + m = {total} exceeds the {capacity} elements of GF(2^{bits})")]
    FieldCapacityExceeded {
        total: usize,
        capacity: u64,
        bits: u32,
    },

    /// Field width outside {8, 16, 32}
    #[error("Unsupported field width w={0} (must be 8, 16 or 32)")]
    UnsupportedFieldWidth(u32),

    // =========================================================================
    // Buffer Shape Errors
    // =========================================================================
    /// Region length is not a whole number of field words
    #[error("Region of {len} bytes is not a multiple of the {word}-byte field word")]
    MisalignedRegion { len: usize, word: usize },

    /// A stripe does not have the expected size
    #[error("{what} has size {actual}, expected {expected}")]
    StripeSizeMismatch {
        what: String,
        actual: usize,
        expected: usize,
    },

    /// Wrong number of shards handed to an operation
    #[error("Expected {expected} {role} shards, got {actual}")]
    ShardCountMismatch {
        role: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Rotation requires an m x m coding grid
    #[error("Rotation needs a square grid: {instances} instances but instance {instance} has {coding_shards} coding shards")]
    NonSquareGrid {
        instances: usize,
        instance: usize,
        coding_shards: usize,
    },

    /// Rotation and copy-back need exactly m instances
    #[error("Expected {expected} instances in the batch, got {actual}")]
    InstanceCountMismatch { expected: usize, actual: usize },

    /// Byte span does not fit inside the stripe
    #[error("Span of {span} bytes does not fit in a {stripe_size}-byte stripe")]
    SpanOutOfRange { span: usize, stripe_size: usize },

    // =========================================================================
    // Erasure Errors
    // =========================================================================
    /// More erasures than coding shards; nothing is reconstructed
    #[error("Too many erasures: {erased} erased, at most {max} recoverable")]
    TooManyErasures { erased: usize, max: usize },

    /// Erasure index out of range or duplicated
    #[error("Invalid erasure list: {0}")]
    InvalidErasure(String),

    // =========================================================================
    // Arithmetic Errors
    // =========================================================================
    /// Division by the zero element
    #[error("Division by zero in GF(2^{bits})")]
    DivisionByZero { bits: u32 },

    /// A decode or construction matrix has no inverse. The Vandermonde
    /// construction guarantees this never happens, so seeing it means the
    /// generator matrix is broken.
    #[error("Singular matrix over rows {rows:?}: generator matrix invariant violated")]
    SingularMatrix { rows: Vec<usize> },

    /// A decoded stripe differs from its value before erasure
    #[error("{0} after decoding does not match its state before decoding")]
    DecodeMismatch(ShardAddr),

    // =========================================================================
    // Batch Errors
    // =========================================================================
    /// A single batch instance failed
    #[error("Instance {instance} failed: {source}")]
    InstanceFailed {
        instance: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// True for failures that indicate a defect in the engine itself rather
    /// than bad input.
    pub fn is_consistency_violation(&self) -> bool {
        match self {
            Error::SingularMatrix { .. } | Error::DecodeMismatch(_) => true,
            Error::InstanceFailed { source, .. } => source.is_consistency_violation(),
            _ => false,
        }
    }

    /// Wrap an error with the batch instance it came from.
    pub fn for_instance(self, instance: usize) -> Self {
        Error::InstanceFailed {
            instance,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singular_is_consistency_violation() {
        let err = Error::SingularMatrix { rows: vec![0, 4] };
        assert!(err.is_consistency_violation());
        assert!(err.for_instance(2).is_consistency_violation());
    }

    #[test]
    fn test_input_errors_are_not_consistency_violations() {
        assert!(!Error::UnsupportedFieldWidth(12).is_consistency_violation());
        assert!(!Error::TooManyErasures { erased: 3, max: 2 }.is_consistency_violation());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::FieldCapacityExceeded {
            total: 300,
            capacity: 256,
            bits: 8,
        };
        assert_eq!(
            err.to_string(),
            "k + m = 300 exceeds the 256 elements of GF(2^8)"
        );

        let err = Error::TooManyErasures { erased: 3, max: 2 }.for_instance(1);
        assert_eq!(
            err.to_string(),
            "Instance 1 failed: Too many erasures: 3 erased, at most 2 recoverable"
        );

        let err = Error::DecodeMismatch(ShardAddr::data(0, 2));
        assert_eq!(
            err.to_string(),
            "instance 0 D2 after decoding does not match its state before decoding"
        );
        assert!(err.is_consistency_violation());
    }
}
