//! Sequence-Model Modules
//!
//! Building blocks used by encoder/decoder models. Each one works on plain
//! [`Tensor`](crate::Tensor)s and carries at most a little configuration.
//!
//! - **beamable_mm**: batched matmul with a beam-search fast path
//! - **grad_multiply**: identity forward, scaled gradient backward

pub mod beamable_mm;
pub mod grad_multiply;

pub use beamable_mm::BeamableMM;
pub use grad_multiply::{GradMultiply, GradMultiplyCtx};
