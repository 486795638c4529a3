//! Seqkit: Sequence-Modeling Utilities
//!
//! Small, independent pieces used around encoder/decoder sequence models,
//! built on a minimal CPU tensor and tape.
//!
//! # Modules
//!
//! - [`data`] - Dataset trait and the item-size (`NumelDataset`) wrapper
//! - [`modules`] - `BeamableMM` (beam-search matmul) and `GradMultiply`
//!   (gradient scaling)
//! - [`autograd`] - Custom-gradient `Function` trait and a one-shot `Tape`
//! - [`tensor`] - Row-major `f32` tensor with single and batched matmul
//! - [`config`] - JSON-loadable settings
//!
//! # Example
//!
//! ```rust
//! use seqkit::modules::BeamableMM;
//! use seqkit::Tensor;
//!
//! // 2 sentences × beam 2, one query step each
//! let queries = Tensor::zeros(vec![4, 1, 8]);
//! let context = Tensor::zeros(vec![4, 5, 8]);
//!
//! let mut mm = BeamableMM::new(Some(2));
//! mm.eval();
//! let scores = mm.forward(&queries, &context)?;
//! assert_eq!(scores.shape, vec![4, 1, 5]);
//! # Ok::<(), seqkit::Error>(())
//! ```

pub mod autograd;
pub mod config;
pub mod data;
pub mod error;
pub mod modules;
pub mod tensor;

// Re-export main types for convenience
pub use autograd::{Function, FunctionGrads, Gradients, Tape, Var};
pub use config::{BeamableMMConfig, NumelDatasetConfig, SeqkitConfig};
pub use data::{Collated, Dataset, InMemoryDataset, Numel, NumelDataset};
pub use error::{Error, Result};
pub use modules::{BeamableMM, GradMultiply, GradMultiplyCtx};
pub use tensor::Tensor;
