//! serasure - Vandermonde Reed-Solomon Erasure Coding over GF(2^w)
//!
//! Encodes k data shards into m coding shards over GF(2^w) for
//! w in {8, 16, 32}, reconstructs up to m erased shards, and runs a batch
//! demonstration that rotates, mutates and folds back coding shards across
//! m independent encode instances.
//!
//! # Architecture
//!
//! ```text
//! Field Arithmetic (gf) → Generator Matrix → Encoder / Decoder → Batch Driver → Report
//! ```
//!
//! # Modules
//!
//! - [`config`] - Codec and batch configuration
//! - [`ec`] - Matrix, encoder, decoder, shard model and batch transforms
//! - [`error`] - Error types
//! - [`gf`] - GF(2^w) arithmetic backends
//! - [`report`] - HTML-wrapped text report

pub mod config;
pub mod ec;
pub mod error;
pub mod gf;
pub mod report;

// Re-export commonly used types
pub use config::{CodecConfig, DriverConfig};
pub use ec::{BatchDriver, BatchOutcome, GeneratorMatrix, MatrixDecoder, MatrixEncoder};
pub use error::{Error, Result};
pub use gf::{FieldWidth, GaloisField};
