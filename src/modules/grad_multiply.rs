//! Gradient Scaling
//!
//! Identity on the forward pass, multiplies the incoming gradient by a fixed
//! factor on the backward pass. Used to damp (or amplify) the gradient that
//! flows into one part of a network without touching its activations, e.g.
//! scaling encoder gradients by `1 / (2 * num_attention_layers)`.
//!
//! ## Forward / Backward
//!
//! ```text
//! forward:  y = x                      ctx = { scale }
//! backward: grad_x = grad_y × scale    grad_scale = none
//! ```
//!
//! The forward output is a copy of `x`, so on a [`Tape`](crate::autograd::Tape)
//! the only way back to `x` is this rule.

use crate::autograd::{Function, FunctionGrads};
use crate::tensor::Tensor;

/// Pass-through operator with a scaled gradient
///
/// ```rust
/// use seqkit::autograd::Function;
/// use seqkit::modules::GradMultiply;
/// use seqkit::Tensor;
///
/// let x = Tensor::new(vec![1.0, 2.0], vec![2]);
/// let (y, ctx) = GradMultiply::forward(&x, 3.0);
/// assert_eq!(y, x);
///
/// let grads = GradMultiply::backward(ctx, &Tensor::new(vec![1.0, -1.0], vec![2]));
/// assert_eq!(grads.input.data, vec![3.0, -3.0]);
/// assert!(grads.args.is_none());
/// ```
pub struct GradMultiply;

/// Context saved by one [`GradMultiply`] forward call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradMultiplyCtx {
    scale: f32,
}

impl GradMultiplyCtx {
    pub fn scale(&self) -> f32 {
        self.scale
    }
}

impl Function for GradMultiply {
    type Args = f32;
    type Ctx = GradMultiplyCtx;

    fn forward(input: &Tensor, scale: f32) -> (Tensor, GradMultiplyCtx) {
        (input.clone(), GradMultiplyCtx { scale })
    }

    // The scale is configuration, not a learned value: no gradient for it.
    fn backward(ctx: GradMultiplyCtx, grad_output: &Tensor) -> FunctionGrads {
        FunctionGrads {
            input: grad_output.mul_scalar(ctx.scale),
            args: None,
        }
    }
}
