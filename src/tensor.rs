//! Tensor Operations
//!
//! A minimal CPU tensor: the operations the sequence utilities need and
//! nothing more. Tensors store multi-dimensional arrays with shape and stride
//! information for efficient indexing and memory layout.
//!
//! ## Core Concepts
//!
//! - **Data**: Flat `Vec<f32>` storing all elements in row-major order
//! - **Shape**: Dimensions of the tensor (e.g., `[batch, seq, dim]`)
//! - **Strides**: Step sizes for each dimension to compute flat indices
//!
//! ## View Operations
//!
//! `reshape`, `transpose`, `select` and `unfold` have the semantics of views
//! over the same storage (they never change values, only how elements are
//! addressed) but materialise a contiguous result, so every tensor stays
//! row-major and the matmul kernels can read it directly.
//!
//! ```text
//! x: [6, 4]
//! x.unfold(0, 2, 2)      -> [3, 4, 2]   (3 windows of 2 rows, window axis last)
//! x.select(1, 0)         -> [6]         (column 0)
//! x.transpose(0, 1)      -> [4, 6]
//! ```
//!
//! ## Performance
//!
//! Matrix multiplication and element-wise ops run in parallel via Rayon:
//!
//! - **2-D matmul**: cache-blocked algorithm with parallel row blocks
//! - **Batched matmul**: one independent matrix product per batch entry
//!
//! ## Example
//!
//! ```rust
//! use seqkit::Tensor;
//!
//! let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
//! let b = Tensor::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![3, 2]);
//! let c = a.matmul(&b).unwrap();
//! assert_eq!(c.shape, vec![2, 2]);
//! ```

use crate::error::{Error, Result};
use rayon::prelude::*;

/// A multi-dimensional array of `f32`
///
/// All operations use row-major (C-style) memory layout.
///
/// # Memory Layout
///
/// For shape `[2, 3]`, data is stored as: `[row0_col0, row0_col1, row0_col2, row1_col0, row1_col1, row1_col2]`
///
/// Strides would be `[3, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Flat storage of all tensor elements
    pub data: Vec<f32>,
    /// Shape of the tensor (dimensions)
    pub shape: Vec<usize>,
    /// Strides for each dimension (computed from shape)
    pub strides: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor with given data and shape
    ///
    /// An empty shape is a scalar holding exactly one element.
    ///
    /// # Panics
    ///
    /// Panics if the product of shape dimensions doesn't equal data length
    ///
    /// # Example
    ///
    /// ```rust
    /// # use seqkit::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// assert_eq!(tensor.shape, vec![2, 2]);
    /// ```
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        let expected_size: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_size,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_size
        );

        let strides = Self::compute_strides(&shape);
        Self {
            data,
            shape,
            strides,
        }
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![0.0; size], shape)
    }

    /// Create a tensor whose element at multi-index `idx` is `f(idx)`
    ///
    /// ```rust
    /// # use seqkit::Tensor;
    /// let t = Tensor::from_fn(vec![2, 3], |idx| (idx[0] * 10 + idx[1]) as f32);
    /// assert_eq!(t.data, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    /// ```
    pub fn from_fn(shape: Vec<usize>, f: impl Fn(&[usize]) -> f32) -> Self {
        let strides = Self::compute_strides(&shape);
        let size: usize = shape.iter().product();
        let mut idx = vec![0; shape.len()];
        let data = (0..size)
            .map(|flat| {
                Self::unravel(flat, &strides, &mut idx);
                f(&idx)
            })
            .collect();
        Self::new(data, shape)
    }

    /// Total number of elements (product of all dimension extents)
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Extent of dimension `axis`
    ///
    /// # Panics
    ///
    /// Panics if `axis >= ndim()`
    pub fn dim(&self, axis: usize) -> usize {
        self.shape[axis]
    }

    /// Compute strides from shape (row-major layout)
    ///
    /// For shape `[d0, d1, d2]`, strides are `[d1*d2, d2, 1]`
    fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    /// Decompose a flat row-major index into a multi-index
    fn unravel(mut flat: usize, strides: &[usize], idx: &mut [usize]) {
        for (coord, &stride) in idx.iter_mut().zip(strides) {
            *coord = flat / stride;
            flat %= stride;
        }
    }

    /// Build a new tensor of `out_shape` where each output element is read
    /// from `self.data[src(multi_index)]`
    fn gather(&self, out_shape: Vec<usize>, src: impl Fn(&[usize]) -> usize + Sync) -> Tensor {
        let out_strides = Self::compute_strides(&out_shape);
        let size: usize = out_shape.iter().product();
        let ndim = out_shape.len();

        let data: Vec<f32> = (0..size)
            .into_par_iter()
            .map_init(
                || vec![0; ndim],
                |idx, flat| {
                    Self::unravel(flat, &out_strides, idx);
                    self.data[src(&idx[..])]
                },
            )
            .collect();

        Tensor::new(data, out_shape)
    }

    /// SIMD-friendly inner loop for matrix multiplication
    ///
    /// Computes: result[j] += a_val * b[j] for all j
    #[inline(always)]
    fn matmul_inner_simd(a_val: f32, b: &[f32], result: &mut [f32]) {
        // Simple loop that LLVM can auto-vectorize
        for (r, &b_val) in result.iter_mut().zip(b.iter()) {
            *r += a_val * b_val;
        }
    }

    /// Single (non-batched) matrix multiplication
    ///
    /// For `A @ B` where `A` is `[m, k]` and `B` is `[k, n]`:
    /// - Result shape: `[m, n]`
    /// - Each element `C[i,j] = sum(A[i,l] * B[l,j])` for all l
    ///
    /// # Performance
    ///
    /// - **Small matrices** (< 1K multiply-adds): Sequential computation
    /// - **Large matrices** (≥ 1K multiply-adds): Parallel cache-blocked algorithm
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] unless both operands are 2-D with matching
    /// inner dimensions.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use seqkit::Tensor;
    /// let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// let b = Tensor::new(vec![1.0, 0.0, 0.0, 1.0], vec![2, 2]);
    /// let c = a.matmul(&b).unwrap();
    /// assert_eq!(c.data, a.data);
    /// ```
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        if self.ndim() != 2 || other.ndim() != 2 || self.shape[1] != other.shape[0] {
            return Err(Error::shape("matmul", &self.shape, &other.shape));
        }

        let m = self.shape[0];
        let n = other.shape[1];
        let k = self.shape[1];

        // Work threshold balances parallel overhead against the speedup
        if m * n * k >= 1_000 {
            return Ok(self.matmul_parallel_blocked(other, m, n, k));
        }

        let mut result = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0;
                for l in 0..k {
                    sum += self.data[i * k + l] * other.data[l * n + j];
                }
                result[i * n + j] = sum;
            }
        }

        Ok(Tensor::new(result, vec![m, n]))
    }

    /// Parallel cache-blocked matrix multiplication
    ///
    /// Processes 8×8 blocks that fit in L1 cache and distributes row blocks
    /// across CPU cores via Rayon. Inner loops access memory sequentially.
    fn matmul_parallel_blocked(&self, other: &Tensor, m: usize, n: usize, k: usize) -> Tensor {
        const BLOCK_SIZE: usize = 8;

        let mut result = vec![0.0; m * n];

        result
            .par_chunks_mut(BLOCK_SIZE * n)
            .enumerate()
            .for_each(|(block_i, result_block)| {
                let i_start = block_i * BLOCK_SIZE;
                let i_end = (i_start + BLOCK_SIZE).min(m);

                for j_start in (0..n).step_by(BLOCK_SIZE) {
                    let j_end = (j_start + BLOCK_SIZE).min(n);

                    for k_start in (0..k).step_by(BLOCK_SIZE) {
                        let k_end = (k_start + BLOCK_SIZE).min(k);

                        for i in i_start..i_end {
                            let row_offset = (i - i_start) * n;
                            for k_idx in k_start..k_end {
                                let a_val = self.data[i * k + k_idx];
                                Self::matmul_inner_simd(
                                    a_val,
                                    &other.data[k_idx * n + j_start..k_idx * n + j_end],
                                    &mut result_block[row_offset + j_start..row_offset + j_end],
                                );
                            }
                        }
                    }
                }
            });

        Tensor::new(result, vec![m, n])
    }

    /// Batched matrix multiplication
    ///
    /// `[batch, m, k] @ [batch, k, n] -> [batch, m, n]`, one independent
    /// product per batch entry. Batch entries are processed in parallel.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] unless both operands are 3-D with equal batch
    /// extents and matching inner dimensions.
    pub fn bmm(&self, other: &Tensor) -> Result<Tensor> {
        if self.ndim() != 3
            || other.ndim() != 3
            || self.shape[0] != other.shape[0]
            || self.shape[2] != other.shape[1]
        {
            return Err(Error::shape("bmm", &self.shape, &other.shape));
        }

        let batch = self.shape[0];
        let m = self.shape[1];
        let k = self.shape[2];
        let n = other.shape[2];

        let mut result = vec![0.0; batch * m * n];
        if m * n > 0 {
            result
                .par_chunks_mut(m * n)
                .enumerate()
                .for_each(|(b, chunk)| {
                    let lhs = &self.data[b * m * k..(b + 1) * m * k];
                    let rhs = &other.data[b * k * n..(b + 1) * k * n];
                    for i in 0..m {
                        let row = &mut chunk[i * n..(i + 1) * n];
                        for l in 0..k {
                            Self::matmul_inner_simd(lhs[i * k + l], &rhs[l * n..(l + 1) * n], row);
                        }
                    }
                });
        }

        Ok(Tensor::new(result, vec![batch, m, n]))
    }

    /// Reshape tensor to new shape
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if the element count changes.
    ///
    /// ```rust
    /// # use seqkit::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
    /// let reshaped = tensor.reshape(&[3, 2]).unwrap();
    /// assert_eq!(reshaped.shape, vec![3, 2]);
    /// ```
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Tensor> {
        let new_size: usize = new_shape.iter().product();
        if new_size != self.numel() {
            return Err(Error::shape("reshape", &self.shape, new_shape));
        }
        Ok(Tensor::new(self.data.clone(), new_shape.to_vec()))
    }

    /// Swap two dimensions (supports negative indexing)
    ///
    /// # Panics
    ///
    /// Panics if either dimension is out of range
    pub fn transpose(&self, dim1: isize, dim2: isize) -> Tensor {
        let d1 = self.axis(dim1);
        let d2 = self.axis(dim2);

        let mut new_shape = self.shape.clone();
        new_shape.swap(d1, d2);
        let mut src_strides = self.strides.clone();
        src_strides.swap(d1, d2);

        self.gather(new_shape, |idx| {
            idx.iter().zip(&src_strides).map(|(i, s)| i * s).sum::<usize>()
        })
    }

    /// Pick entry `index` along `dim`, removing that dimension
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if `index >= shape[dim]`.
    pub fn select(&self, dim: usize, index: usize) -> Result<Tensor> {
        let len = self.shape[dim];
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }

        let mut new_shape = self.shape.clone();
        new_shape.remove(dim);
        let mut src_strides = self.strides.clone();
        src_strides.remove(dim);
        let base = index * self.strides[dim];

        Ok(self.gather(new_shape, |idx| {
            base + idx
                .iter()
                .zip(&src_strides)
                .map(|(i, s)| i * s)
                .sum::<usize>()
        }))
    }

    /// Sliding windows of length `size` taken every `step` along `dim`
    ///
    /// Dimension `dim` becomes the window count `(shape[dim] - size) / step + 1`
    /// and a trailing dimension of length `size` indexes inside each window.
    /// Elements past the last full window are dropped.
    ///
    /// ```rust
    /// # use seqkit::Tensor;
    /// // 6 rows of 4 -> 3 groups of 2 rows, group member on the last axis
    /// let x = Tensor::zeros(vec![6, 4]);
    /// assert_eq!(x.unfold(0, 2, 2).shape, vec![3, 4, 2]);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `size` or `step` is zero
    pub fn unfold(&self, dim: usize, size: usize, step: usize) -> Tensor {
        assert!(size > 0 && step > 0, "unfold size and step must be positive");

        let extent = self.shape[dim];
        let windows = if extent >= size {
            (extent - size) / step + 1
        } else {
            0
        };

        let mut new_shape = self.shape.clone();
        new_shape[dim] = windows;
        new_shape.push(size);
        let ndim = self.ndim();

        self.gather(new_shape, |idx| {
            let mut src = 0;
            for d in 0..ndim {
                let coord = if d == dim {
                    idx[d] * step + idx[ndim]
                } else {
                    idx[d]
                };
                src += coord * self.strides[d];
            }
            src
        })
    }

    /// Element-wise addition of two tensors of identical shape
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if the shapes differ.
    pub fn add(&self, other: &Tensor) -> Result<Tensor> {
        if self.shape != other.shape {
            return Err(Error::shape("add", &self.shape, &other.shape));
        }
        let result = self
            .data
            .par_iter()
            .zip(&other.data)
            .map(|(a, b)| a + b)
            .collect();
        Ok(Tensor::new(result, self.shape.clone()))
    }

    /// Multiply all elements by scalar
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        let result = self.data.par_iter().map(|&x| x * scalar).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Sum of all elements as a scalar (shape `[]`) tensor
    pub fn sum(&self) -> Tensor {
        Tensor::new(vec![self.data.par_iter().sum()], vec![])
    }

    /// Create a tensor of `shape` with every element set to `value`
    pub fn full(shape: Vec<usize>, value: f32) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![value; size], shape)
    }

    /// Same shape and every element within `tol` of `other`
    pub fn allclose(&self, other: &Tensor, tol: f32) -> bool {
        self.shape == other.shape
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() <= tol)
    }

    /// Resolve a possibly negative axis
    fn axis(&self, axis: isize) -> usize {
        let ndim = self.ndim() as isize;
        let pos = if axis < 0 { ndim + axis } else { axis };
        assert!(
            (0..ndim).contains(&pos),
            "axis {} out of range for {}-d tensor",
            axis,
            ndim
        );
        pos as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arange(shape: Vec<usize>) -> Tensor {
        let size: usize = shape.iter().product();
        Tensor::new((0..size).map(|i| i as f32).collect(), shape)
    }

    #[test]
    fn test_scalar_shape_has_one_element() {
        let t = Tensor::new(vec![2.5], vec![]);
        assert_eq!(t.numel(), 1);
        assert_eq!(t.ndim(), 0);
    }

    #[test]
    fn test_matmul_small() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        let b = Tensor::new(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], vec![3, 2]);
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.shape, vec![2, 2]);
        assert_eq!(c.data, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_blocked_matches_naive() {
        // 20 * 30 * 10 = 6000 multiply-adds takes the parallel path
        let a = Tensor::from_fn(vec![20, 10], |i| ((i[0] * 7 + i[1] * 3) % 11) as f32 - 5.0);
        let b = Tensor::from_fn(vec![10, 30], |i| ((i[0] * 5 + i[1]) % 13) as f32 * 0.5);
        let c = a.matmul(&b).unwrap();

        for i in 0..20 {
            for j in 0..30 {
                let expected: f32 = (0..10).map(|l| a.data[i * 10 + l] * b.data[l * 30 + j]).sum();
                assert!((c.data[i * 30 + j] - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_matmul_inner_mismatch() {
        let a = Tensor::zeros(vec![2, 3]);
        let b = Tensor::zeros(vec![2, 3]);
        assert!(matches!(
            a.matmul(&b),
            Err(Error::ShapeMismatch { op: "matmul", .. })
        ));
    }

    #[test]
    fn test_bmm_matches_per_batch_matmul() {
        let a = arange(vec![3, 2, 4]);
        let b = arange(vec![3, 4, 5]);
        let c = a.bmm(&b).unwrap();
        assert_eq!(c.shape, vec![3, 2, 5]);

        for batch in 0..3 {
            let lhs = a.select(0, batch).unwrap();
            let rhs = b.select(0, batch).unwrap();
            let expected = lhs.matmul(&rhs).unwrap();
            assert_eq!(c.select(0, batch).unwrap(), expected);
        }
    }

    #[test]
    fn test_bmm_batch_mismatch() {
        let a = Tensor::zeros(vec![2, 1, 4]);
        let b = Tensor::zeros(vec![3, 4, 5]);
        assert!(matches!(a.bmm(&b), Err(Error::ShapeMismatch { op: "bmm", .. })));
    }

    #[test]
    fn test_bmm_rejects_2d() {
        let a = Tensor::zeros(vec![2, 4]);
        let b = Tensor::zeros(vec![4, 5]);
        assert!(a.bmm(&b).is_err());
    }

    #[test]
    fn test_reshape_count_mismatch() {
        let t = arange(vec![2, 3]);
        assert!(t.reshape(&[4, 2]).is_err());
        assert_eq!(t.reshape(&[3, 2]).unwrap().data, t.data);
    }

    #[test]
    fn test_transpose_3d() {
        let t = arange(vec![2, 3, 4]);
        let tt = t.transpose(1, 2);
        assert_eq!(tt.shape, vec![2, 4, 3]);
        for b in 0..2 {
            for i in 0..3 {
                for j in 0..4 {
                    assert_eq!(tt.data[b * 12 + j * 3 + i], t.data[b * 12 + i * 4 + j]);
                }
            }
        }
    }

    #[test]
    fn test_transpose_negative_axes() {
        let t = arange(vec![2, 3]);
        let tt = t.transpose(-2, -1);
        assert_eq!(tt.shape, vec![3, 2]);
        assert_eq!(tt.data, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_select_middle_dim() {
        let t = arange(vec![2, 3, 2]);
        let s = t.select(1, 2).unwrap();
        assert_eq!(s.shape, vec![2, 2]);
        assert_eq!(s.data, vec![4.0, 5.0, 10.0, 11.0]);
    }

    #[test]
    fn test_select_out_of_range() {
        let t = arange(vec![2, 3]);
        assert!(matches!(
            t.select(0, 2),
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_unfold_groups_rows() {
        // rows r0..r5 of width 2, grouped in pairs
        let t = arange(vec![6, 2]);
        let u = t.unfold(0, 2, 2);
        assert_eq!(u.shape, vec![3, 2, 2]);
        // group 1, column 0: rows 2 and 3 -> values 4 and 6
        assert_eq!(u.data[4..6].to_vec(), vec![4.0, 6.0]);
        // group 1, column 1: rows 2 and 3 -> values 5 and 7
        assert_eq!(u.data[6..8].to_vec(), vec![5.0, 7.0]);
    }

    #[test]
    fn test_unfold_overlapping_and_remainder() {
        let t = arange(vec![5]);
        assert_eq!(t.unfold(0, 2, 1).data, vec![0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0]);
        let u = t.unfold(0, 2, 2);
        assert_eq!(u.shape, vec![2, 2]);
        assert_eq!(u.data, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_unfold_window_larger_than_dim() {
        let t = arange(vec![3, 2]);
        assert_eq!(t.unfold(0, 4, 4).shape, vec![0, 2, 4]);
    }

    #[test]
    fn test_add_and_scale() {
        let a = arange(vec![2, 2]);
        let b = Tensor::full(vec![2, 2], 1.0);
        assert_eq!(a.add(&b).unwrap().data, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(a.mul_scalar(2.0).data, vec![0.0, 2.0, 4.0, 6.0]);
        assert!(a.add(&Tensor::zeros(vec![4])).is_err());
    }

    #[test]
    fn test_sum_is_scalar() {
        let s = arange(vec![2, 3]).sum();
        assert_eq!(s.shape, Vec::<usize>::new());
        assert_eq!(s.data, vec![15.0]);
    }
}
