//! Item-Size Dataset
//!
//! Wraps another dataset and reports, for each index, how many elements the
//! wrapped item holds. Typical use is feeding per-example sizes into a batch
//! alongside the examples themselves, either as one total (`reduce`) or as
//! one size per example.
//!
//! ```rust
//! use seqkit::data::{Collated, InMemoryDataset, NumelDataset};
//! use seqkit::Tensor;
//!
//! let items = InMemoryDataset::new(vec![
//!     Tensor::zeros(vec![2, 3]),
//!     Tensor::zeros(vec![4]),
//! ]);
//! let sizes = NumelDataset::new(&items, false);
//!
//! assert_eq!(sizes.size_at(0).unwrap(), 6);
//! assert_eq!(sizes.aggregate(&[6, 4]), Collated::Sizes(vec![6, 4]));
//! ```

use super::dataset::{check_index, Dataset, Numel};
use crate::config::NumelDatasetConfig;
use crate::error::Result;

/// Result of collating a batch of item sizes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Collated {
    /// Sum of all sizes (reduce mode)
    Total(usize),
    /// Sizes in sample order
    Sizes(Vec<usize>),
}

impl Collated {
    /// Total element count regardless of mode
    pub fn total(&self) -> usize {
        match self {
            Collated::Total(total) => *total,
            Collated::Sizes(sizes) => sizes.iter().sum(),
        }
    }
}

/// Reports the element count of each item of the wrapped dataset
///
/// `D` is usually a borrow: `&items` leaves the store with its owner, and
/// `&mut items` additionally lets `set_epoch` reach it.
pub struct NumelDataset<D> {
    dataset: D,
    reduce: bool,
}

impl<D> NumelDataset<D>
where
    D: Dataset,
    D::Item: Numel,
{
    pub fn new(dataset: D, reduce: bool) -> Self {
        Self { dataset, reduce }
    }

    pub fn from_config(dataset: D, config: &NumelDatasetConfig) -> Self {
        Self::new(dataset, config.reduce)
    }

    /// Number of items in the wrapped dataset
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn reduce(&self) -> bool {
        self.reduce
    }

    /// Unwrap, returning the inner dataset
    pub fn into_inner(self) -> D {
        self.dataset
    }

    /// Element count of item `index`, computed on every call
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`](crate::Error::IndexOutOfRange) when `index`
    /// is past the end of the wrapped dataset.
    pub fn size_at(&self, index: usize) -> Result<usize> {
        check_index(index, self.dataset.len())?;
        let item = self.dataset.get(index)?;
        Ok(item.numel())
    }

    /// Collate per-item sizes: summed in reduce mode, otherwise kept in order
    pub fn aggregate(&self, samples: &[usize]) -> Collated {
        if self.reduce {
            Collated::Total(samples.iter().sum())
        } else {
            Collated::Sizes(samples.to_vec())
        }
    }

    /// Size every index in `indices` and collate the results
    pub fn collate_indices(&self, indices: &[usize]) -> Result<Collated> {
        let samples = indices
            .iter()
            .map(|&index| self.size_at(index))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.aggregate(&samples))
    }
}

impl<D> Dataset for NumelDataset<D>
where
    D: Dataset,
    D::Item: Numel,
{
    type Item = usize;

    fn len(&self) -> usize {
        self.dataset.len()
    }

    fn get(&self, index: usize) -> Result<usize> {
        self.size_at(index)
    }

    fn num_tokens(&self, index: usize) -> usize {
        self.dataset.num_tokens(index)
    }

    fn size(&self, index: usize) -> usize {
        self.dataset.size(index)
    }

    fn ordered_indices(&self) -> Vec<usize> {
        self.dataset.ordered_indices()
    }

    fn set_epoch(&mut self, epoch: usize) {
        log::trace!("NumelDataset forwarding set_epoch({epoch})");
        self.dataset.set_epoch(epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryDataset;
    use crate::error::Error;
    use crate::tensor::Tensor;

    fn tensors() -> InMemoryDataset<Tensor> {
        InMemoryDataset::new(vec![
            Tensor::zeros(vec![2, 3]),
            Tensor::zeros(vec![5]),
            Tensor::zeros(vec![1, 2, 2]),
        ])
    }

    #[test]
    fn test_size_at_matches_item_numel() {
        let items = tensors();
        let sizes = NumelDataset::new(&items, false);
        assert_eq!(sizes.len(), 3);
        for i in 0..items.len() {
            assert_eq!(sizes.size_at(i).unwrap(), items.get(i).unwrap().numel());
        }
    }

    #[test]
    fn test_size_at_out_of_range() {
        let items = tensors();
        let sizes = NumelDataset::new(&items, false);
        assert!(matches!(
            sizes.size_at(3),
            Err(Error::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_unstructured_items() {
        let items = InMemoryDataset::new(vec![vec![1u32, 2, 3], vec![], vec![7]]);
        let sizes = NumelDataset::new(&items, false);
        assert_eq!(sizes.size_at(0).unwrap(), 3);
        assert_eq!(sizes.size_at(1).unwrap(), 0);
        assert_eq!(sizes.size_at(2).unwrap(), 1);
    }

    #[test]
    fn test_aggregate_reduce() {
        let items = tensors();
        let sizes = NumelDataset::new(&items, true);
        assert_eq!(sizes.aggregate(&[2, 3, 4]), Collated::Total(9));
        assert_eq!(sizes.aggregate(&[]), Collated::Total(0));
    }

    #[test]
    fn test_aggregate_keeps_order() {
        let items = tensors();
        let sizes = NumelDataset::new(&items, false);
        let collated = sizes.aggregate(&[2, 3, 4]);
        assert_eq!(collated, Collated::Sizes(vec![2, 3, 4]));
        assert_eq!(collated.total(), 9);
    }

    #[test]
    fn test_collate_indices() {
        let items = tensors();
        let config = NumelDatasetConfig { reduce: true };
        let sizes = NumelDataset::from_config(&items, &config);
        assert!(sizes.reduce());
        assert_eq!(sizes.collate_indices(&[0, 2]).unwrap(), Collated::Total(10));
        assert!(sizes.collate_indices(&[0, 9]).is_err());
    }

    #[test]
    fn test_wrapper_delegates_batching_helpers() {
        let items = InMemoryDataset::new(vec![vec![0u8; 3], vec![0u8; 8]]);
        let sizes = NumelDataset::new(&items, false);
        assert_eq!(Dataset::get(&sizes, 1).unwrap(), 8);
        assert_eq!(sizes.num_tokens(1), 8);
        assert_eq!(sizes.size(0), 3);
        assert_eq!(sizes.ordered_indices(), vec![0, 1]);
    }

    #[test]
    fn test_set_epoch_reaches_wrapped_dataset() {
        let mut items = tensors();
        {
            let mut sizes = NumelDataset::new(&mut items, false);
            sizes.set_epoch(7);
            assert_eq!(sizes.size_at(0).unwrap(), 6);
        }
        assert_eq!(items.epoch(), 7);

        let mut owned = NumelDataset::new(tensors(), true);
        owned.set_epoch(2);
        assert_eq!(owned.into_inner().epoch(), 2);
    }
}
