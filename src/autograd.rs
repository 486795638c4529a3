//! Reverse-Mode Autograd
//!
//! A small tape for composing forward computations and differentiating them
//! afterwards. Its main job is hosting custom [`Function`]s: operators that
//! bring their own backward rule instead of the one implied by their forward
//! computation.
//!
//! ## Custom Functions
//!
//! A `Function` follows the same pattern as the layers of a training stack:
//!
//! ```rust,ignore
//! fn forward(input: &Tensor, args: Args) -> (Tensor, Ctx);
//! fn backward(ctx: Ctx, grad_output: &Tensor) -> FunctionGrads;
//! ```
//!
//! `Ctx` holds whatever the backward pass needs. It is created once per
//! forward invocation and moved into `backward`, so it is consulted exactly
//! once and then dropped. Separate invocations never share a context.
//!
//! ## Recording
//!
//! ```text
//! x ──► apply(F) ──► y          y.grad ──► F::backward(ctx) ──► x.grad
//! ```
//!
//! The output of `apply` is a fresh node: its only edge back to the input is
//! the function's own backward rule.
//!
//! ## Example
//!
//! ```rust
//! use seqkit::autograd::Tape;
//! use seqkit::Tensor;
//!
//! let mut tape = Tape::new();
//! let x = tape.leaf(Tensor::new(vec![1.0, 2.0], vec![2]));
//! let y = tape.grad_multiply(x, 0.5).unwrap();
//! let loss = tape.sum(y).unwrap();
//!
//! let grads = tape.backward(loss, Tensor::new(vec![1.0], vec![])).unwrap();
//! assert_eq!(grads.get(x).unwrap().data, vec![0.5, 0.5]);
//! ```

use crate::error::{Error, Result};
use crate::modules::GradMultiply;
use crate::tensor::Tensor;
use std::collections::HashMap;

/// A differentiable operator with a hand-written backward rule
pub trait Function {
    /// Non-tensor arguments, fixed for one invocation
    type Args;
    /// Values saved by `forward` for `backward`
    type Ctx: 'static;

    fn forward(input: &Tensor, args: Self::Args) -> (Tensor, Self::Ctx);

    fn backward(ctx: Self::Ctx, grad_output: &Tensor) -> FunctionGrads;
}

/// Gradients returned by [`Function::backward`]
#[derive(Clone, Debug)]
pub struct FunctionGrads {
    /// Gradient with respect to the tensor input
    pub input: Tensor,
    /// Gradient with respect to `Args`; `None` when they are not differentiable
    ///
    /// [`Tape`] only records tensor inputs, so it drops this value during
    /// [`Tape::backward`]. Callers that need it must call `backward` directly.
    pub args: Option<Tensor>,
}

/// Handle to a value recorded on a [`Tape`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Var(usize);

impl Var {
    pub fn id(self) -> usize {
        self.0
    }
}

type BackwardFn = Box<dyn FnOnce(&Tensor) -> FunctionGrads>;

enum Op {
    Leaf,
    Add(Var, Var),
    MulScalar(Var, f32),
    Sum(Var),
    Custom { input: Var, backward: BackwardFn },
}

struct Node {
    value: Tensor,
    op: Op,
}

/// Records operations during the forward pass for one backward pass
#[derive(Default)]
pub struct Tape {
    nodes: Vec<Node>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded values
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, value: Tensor, op: Op) -> Var {
        self.nodes.push(Node { value, op });
        Var(self.nodes.len() - 1)
    }

    fn node(&self, var: Var) -> Result<&Node> {
        self.nodes.get(var.0).ok_or(Error::UnknownVariable(var.0))
    }

    /// Record an input that gradients are computed for
    pub fn leaf(&mut self, value: Tensor) -> Var {
        self.push(value, Op::Leaf)
    }

    /// Forward value of `var`
    pub fn value(&self, var: Var) -> Result<&Tensor> {
        Ok(&self.node(var)?.value)
    }

    pub fn add(&mut self, a: Var, b: Var) -> Result<Var> {
        let value = self.value(a)?.add(self.value(b)?)?;
        Ok(self.push(value, Op::Add(a, b)))
    }

    pub fn mul_scalar(&mut self, a: Var, scalar: f32) -> Result<Var> {
        let value = self.value(a)?.mul_scalar(scalar);
        Ok(self.push(value, Op::MulScalar(a, scalar)))
    }

    /// Sum of all elements, as a scalar
    pub fn sum(&mut self, a: Var) -> Result<Var> {
        let value = self.value(a)?.sum();
        Ok(self.push(value, Op::Sum(a)))
    }

    /// Run `F::forward` on `input` and record `F::backward` as its gradient rule
    pub fn apply<F: Function + 'static>(&mut self, input: Var, args: F::Args) -> Result<Var> {
        let (value, ctx) = F::forward(self.value(input)?, args);
        let backward: BackwardFn = Box::new(move |grad: &Tensor| F::backward(ctx, grad));
        Ok(self.push(value, Op::Custom { input, backward }))
    }

    /// Identity forward, gradient scaled by `scale` backward
    pub fn grad_multiply(&mut self, input: Var, scale: f32) -> Result<Var> {
        self.apply::<GradMultiply>(input, scale)
    }

    /// Backpropagate `seed` (the gradient of `output`) through the tape
    ///
    /// Consumes the tape: every recorded context is handed to its backward
    /// rule exactly once.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownVariable`] if `output` was not recorded here
    /// - [`Error::ShapeMismatch`] if `seed` does not match the output shape,
    ///   or a backward rule returns a gradient of the wrong shape
    pub fn backward(self, output: Var, seed: Tensor) -> Result<Gradients> {
        let out_shape = &self.node(output)?.value.shape;
        if seed.shape != *out_shape {
            return Err(Error::shape("backward seed", out_shape, &seed.shape));
        }

        let mut nodes = self.nodes;
        nodes.truncate(output.0 + 1);
        let shapes: Vec<Vec<usize>> = nodes.iter().map(|n| n.value.shape.clone()).collect();

        let mut grads: HashMap<Var, Tensor> = HashMap::new();
        grads.insert(output, seed);

        // Nodes only reference earlier nodes, so reverse order is topological.
        for (id, node) in nodes.into_iter().enumerate().rev() {
            let Some(grad) = grads.get(&Var(id)).cloned() else {
                continue;
            };

            match node.op {
                Op::Leaf => {}
                Op::Add(a, b) => {
                    accumulate(&mut grads, a, grad.clone())?;
                    accumulate(&mut grads, b, grad)?;
                }
                Op::MulScalar(a, scalar) => {
                    accumulate(&mut grads, a, grad.mul_scalar(scalar))?;
                }
                Op::Sum(a) => {
                    let spread = Tensor::full(shapes[a.0].clone(), grad.data[0]);
                    accumulate(&mut grads, a, spread)?;
                }
                Op::Custom { input, backward } => {
                    let FunctionGrads {
                        input: grad_input,
                        args,
                    } = backward(&grad);
                    if let Some(args) = args {
                        log::trace!(
                            "Tape dropping argument gradient {:?} of node {}",
                            args.shape,
                            id
                        );
                    }
                    if grad_input.shape != shapes[input.0] {
                        return Err(Error::shape(
                            "custom backward",
                            &shapes[input.0],
                            &grad_input.shape,
                        ));
                    }
                    accumulate(&mut grads, input, grad_input)?;
                }
            }
        }

        Ok(Gradients { grads })
    }
}

fn accumulate(grads: &mut HashMap<Var, Tensor>, var: Var, grad: Tensor) -> Result<()> {
    let total = match grads.remove(&var) {
        Some(existing) => existing.add(&grad)?,
        None => grad,
    };
    grads.insert(var, total);
    Ok(())
}

/// Gradients produced by [`Tape::backward`]
#[derive(Debug, Default)]
pub struct Gradients {
    grads: HashMap<Var, Tensor>,
}

impl Gradients {
    /// Gradient of the output with respect to `var`
    ///
    /// `None` when no path from `var` reaches the output.
    pub fn get(&self, var: Var) -> Option<&Tensor> {
        self.grads.get(&var)
    }
}
