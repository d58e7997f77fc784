//! Erasure Coding Module
//!
//! Vandermonde Reed-Solomon coding over GF(2^w) and the batch transforms
//! built on it.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                          Batch Driver                               │
//! ├────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────────┐  │
//! │  │ Encoder  │──▶│ Rotation │──▶│  Mutate  │──▶│  Copier/Verifier │  │
//! │  └──────────┘   └──────────┘   └──────────┘   └──────────────────┘  │
//! │       │                                                             │
//! │       │         ┌──────────┐                                        │
//! │       └────────▶│ Decoder  │  (decode check on pristine copies)     │
//! │                 └──────────┘                                        │
//! │                                                                     │
//! │            Generator Matrix (shared, read-only)                     │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - **Matrix** (`matrix.rs`): dense field matrices, Gauss-Jordan inversion
//!   and the Vandermonde-derived generator matrix.
//! - **Shard model** (`shard.rs`): stripes, per-instance shard sets, batches,
//!   erasure lists and per-instance random sources.
//! - **Encoder/Decoder** (`encoder.rs`, `decoder.rs`): coding stripes from
//!   data stripes, and reconstruction of up to m erased shards.
//! - **Rotation** (`rotation.rs`): cyclic-diagonal redistribution of coding
//!   shards across the m instances of a batch, as a borrowed view.
//! - **Mutate** (`mutate.rs`): in-place multiply-by-2 of a leading region.
//! - **Copier** (`copier.rs`): owned snapshots and span-bounded copy-back.
//! - **Driver** (`driver.rs`): sequences the phases and writes the report.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use serasure::ec::{ErasureList, GeneratorMatrix, MatrixDecoder, MatrixEncoder, ShardSet, Stripe};
//! use serasure::gf::FieldWidth;
//!
//! let generator = Arc::new(GeneratorMatrix::vandermonde(4, 2, FieldWidth::W8)?);
//! let encoder = MatrixEncoder::new(generator.clone());
//! let decoder = MatrixDecoder::new(generator);
//!
//! let data = (0..4u8).map(|i| Stripe::from(vec![i; 8])).collect();
//! let mut set = ShardSet::with_data(data, 2);
//! encoder.encode_set(&mut set)?;
//! let original = set.clone();
//!
//! // Lose one data and one coding shard
//! let erasures = ErasureList::new(vec![1, 5], 6)?;
//! set.shard_mut(1).unwrap().zero();
//! set.shard_mut(5).unwrap().zero();
//!
//! decoder.decode(&mut set, &erasures)?;
//! assert_eq!(set, original);
//! # Ok::<(), serasure::Error>(())
//! ```

pub mod copier;
pub mod decoder;
pub mod driver;
pub mod encoder;
pub mod matrix;
pub mod mutate;
pub mod rotation;
pub mod shard;

#[cfg(test)]
mod proptest;

pub use copier::{CodingGrid, ShardCopier};
pub use decoder::MatrixDecoder;
pub use driver::{BatchDriver, BatchOutcome};
pub use encoder::MatrixEncoder;
pub use matrix::{GeneratorMatrix, Matrix};
pub use mutate::ScalarMutator;
pub use rotation::{RotatedView, Rotation};
pub use shard::{diff_batches, diff_sets, Batch, ErasureList, InstanceRng, ShardAddr, ShardRole, ShardSet, Stripe};
