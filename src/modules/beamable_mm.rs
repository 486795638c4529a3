//! Beam-Aware Batched Matrix Multiply
//!
//! During beam search every source sentence is repeated `beam` times along
//! the batch dimension, while each hypothesis contributes a single query
//! step. Attention scores are then
//!
//! ```text
//! queries:  [bsz, 1, nhu]
//! context:  [bsz, sz2, nhu]      (each group of `beam` rows identical)
//! scores:   [bsz, 1, sz2]        scores[b, 0, s] = Σ_h queries[b, 0, h] · context[b, s, h]
//! ```
//!
//! At inference time the replicated context only needs to be read once per
//! group, so the product is regrouped into fewer, larger matrices:
//!
//! ```text
//! queries  [bsz, 1, nhu]   -> [bsz/beam, beam, nhu]
//! context  [bsz, sz2, nhu] -> [bsz/beam, sz2, nhu]   (first copy of each group)
//! result   [bsz/beam, beam, sz2] -> [bsz, 1, sz2]
//! ```
//!
//! When `bsz == beam` there is only one group and a single (non-batched)
//! matmul is used.
//!
//! ## Replication Precondition
//!
//! The fast path assumes the context rows within each beam group are
//! identical and never looks at any copy but the first. If that does not hold
//! the result is silently wrong. `validate_replication` turns on a check that
//! compares every copy, at the cost of reading all of them.

use crate::config::BeamableMMConfig;
use crate::error::{Error, Result};
use crate::tensor::Tensor;
use log::trace;

/// Batched matmul with an inference fast path for beam-replicated inputs
#[derive(Clone, Debug)]
pub struct BeamableMM {
    pub beam_size: Option<usize>,
    pub training: bool,
    pub validate_replication: bool,
}

impl Default for BeamableMM {
    fn default() -> Self {
        Self::new(None)
    }
}

impl BeamableMM {
    /// Create a new module; starts in training mode
    pub fn new(beam_size: Option<usize>) -> Self {
        Self {
            beam_size,
            training: true,
            validate_replication: false,
        }
    }

    pub fn from_config(config: &BeamableMMConfig) -> Self {
        Self {
            validate_replication: config.validate_replication,
            ..Self::new(config.beam_size)
        }
    }

    /// Replace the beam width used by subsequent `forward` calls
    pub fn set_beam_size(&mut self, beam_size: usize) {
        self.beam_size = Some(beam_size);
    }

    /// Switch to training mode (always the plain batched path)
    pub fn train(&mut self) -> &mut Self {
        self.training = true;
        self
    }

    /// Switch to inference mode (fast path when a beam size is set)
    pub fn eval(&mut self) -> &mut Self {
        self.training = false;
        self
    }

    /// Multiply `input1 [bsz, 1, nhu]` with `input2 [bsz, sz2, nhu]`
    ///
    /// Returns `[bsz, 1, sz2]`. The grouped fast path is taken only in
    /// inference mode, with a beam size set, and when `input1` is 3-D with a
    /// middle dimension of 1; everything else is a plain batched multiply.
    ///
    /// # Errors
    ///
    /// - [`Error::ShapeMismatch`] for incompatible operands, including a
    ///   batch that is not a multiple of the beam size on the fast path
    /// - [`Error::BeamReplication`] when `validate_replication` is on and a
    ///   group of `input2` is not replicated
    pub fn forward(&self, input1: &Tensor, input2: &Tensor) -> Result<Tensor> {
        let beam = match self.beam_size {
            Some(beam)
                if beam > 0 && !self.training && input1.ndim() == 3 && input1.dim(1) == 1 =>
            {
                beam
            }
            _ => {
                trace!(
                    "BeamableMM batched path: {:?} x {:?}",
                    input1.shape,
                    input2.shape
                );
                return Self::batched(input1, input2);
            }
        };

        if input2.ndim() != 3 || input2.dim(2) != input1.dim(2) {
            return Err(Error::shape("beamable mm", &input1.shape, &input2.shape));
        }
        if self.validate_replication {
            check_replicated(input2, beam)?;
        }

        let bsz = input1.dim(0);
        let sz2 = input2.dim(1);

        // bsz x 1 x nhu --> bsz/beam x beam x nhu
        let queries = input1.select(1, 0)?.unfold(0, beam, beam).transpose(1, 2);

        // bsz x sz2 x nhu --> bsz/beam x nhu x sz2, first copy of each group
        let context = input2.unfold(0, beam, beam).select(3, 0)?.transpose(1, 2);

        let groups = queries.dim(0);
        trace!("BeamableMM grouped path: {} group(s) of beam {}", groups, beam);

        let output = if groups == 1 {
            queries.select(0, 0)?.matmul(&context.select(0, 0)?)?
        } else {
            queries.bmm(&context)?
        };
        output.reshape(&[bsz, 1, sz2])
    }

    /// `input1 [bsz, m, nhu] @ input2[bsz, sz2, nhu]ᵀ`
    fn batched(input1: &Tensor, input2: &Tensor) -> Result<Tensor> {
        if input2.ndim() != 3 {
            return Err(Error::shape("bmm", &input1.shape, &input2.shape));
        }
        input1.bmm(&input2.transpose(1, 2))
    }
}

/// Every member of each beam group of `[bsz, sz2, nhu]` equals the first
fn check_replicated(input: &Tensor, beam: usize) -> Result<()> {
    let block = input.dim(1) * input.dim(2);
    if block == 0 {
        return Ok(());
    }
    let group_len = block * beam;

    for (group, rows) in input.data.chunks_exact(group_len).enumerate() {
        let (first, rest) = rows.split_at(block);
        if rest.chunks_exact(block).any(|copy| copy != first) {
            return Err(Error::BeamReplication { group });
        }
    }
    Ok(())
}
