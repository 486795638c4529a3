//! Dataset Capability Interface
//!
//! Anything that can report its length and fetch an item by index is a
//! [`Dataset`]. Wrappers such as [`NumelDataset`](super::NumelDataset) are
//! written against this trait, so the backing store (an in-memory `Vec`, a
//! memory-mapped file, another wrapper) can be swapped freely.
//!
//! The batching helpers (`num_tokens`, `size`, `ordered_indices`,
//! `set_epoch`) have defaults so a plain store only has to implement `len`
//! and `get`. Wrappers forward them to the dataset they wrap.
//!
//! `&D` and `&mut D` are datasets too, so a wrapper can own its inner
//! dataset or borrow it. Only a `&mut D` borrow forwards `set_epoch`.

use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// An indexable, finite sequence of items
pub trait Dataset {
    type Item;

    /// Number of items
    fn len(&self) -> usize;

    /// Fetch the item at `index`
    ///
    /// Returns [`Error::IndexOutOfRange`] when `index >= len()`.
    fn get(&self, index: usize) -> Result<Self::Item>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tokens item `index` contributes to a batch
    fn num_tokens(&self, _index: usize) -> usize {
        1
    }

    /// Size of item `index` as used for length filtering
    fn size(&self, index: usize) -> usize {
        self.num_tokens(index)
    }

    /// Order in which a batch sampler should visit the items
    fn ordered_indices(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }

    /// Notify the dataset that a new epoch is starting
    fn set_epoch(&mut self, _epoch: usize) {}
}

macro_rules! forward_dataset {
    () => {
        fn len(&self) -> usize {
            (**self).len()
        }

        fn get(&self, index: usize) -> Result<Self::Item> {
            (**self).get(index)
        }

        fn is_empty(&self) -> bool {
            (**self).is_empty()
        }

        fn num_tokens(&self, index: usize) -> usize {
            (**self).num_tokens(index)
        }

        fn size(&self, index: usize) -> usize {
            (**self).size(index)
        }

        fn ordered_indices(&self) -> Vec<usize> {
            (**self).ordered_indices()
        }
    };
}

impl<D: Dataset + ?Sized> Dataset for &D {
    type Item = D::Item;

    forward_dataset!();

    // A shared borrow cannot reach the inner epoch; the default no-op applies.
}

impl<D: Dataset + ?Sized> Dataset for &mut D {
    type Item = D::Item;

    forward_dataset!();

    fn set_epoch(&mut self, epoch: usize) {
        (**self).set_epoch(epoch);
    }
}

/// Bounds-check `index` against a dataset of length `len`
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange { index, len })
    }
}

/// Element count of one dataset item
///
/// Structured numeric items count every element across all dimensions;
/// unstructured sequences count their (recursively flattened) elements.
pub trait Numel {
    fn numel(&self) -> usize;
}

impl Numel for Tensor {
    fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

macro_rules! scalar_numel {
    ($($t:ty),*) => {
        $(impl Numel for $t {
            fn numel(&self) -> usize {
                1
            }
        })*
    };
}

scalar_numel!(f32, f64, i32, i64, u8, u32, u64, usize);

impl<T: Numel> Numel for [T] {
    fn numel(&self) -> usize {
        self.iter().map(Numel::numel).sum()
    }
}

impl<T: Numel, const N: usize> Numel for [T; N] {
    fn numel(&self) -> usize {
        self.as_slice().numel()
    }
}

impl<T: Numel> Numel for Vec<T> {
    fn numel(&self) -> usize {
        self.as_slice().numel()
    }
}

impl<T: Numel + ?Sized> Numel for &T {
    fn numel(&self) -> usize {
        (**self).numel()
    }
}

/// `Vec`-backed dataset whose items are cloned out on access
#[derive(Clone, Debug, Default)]
pub struct InMemoryDataset<T> {
    items: Vec<T>,
    epoch: usize,
}

impl<T> InMemoryDataset<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, epoch: 0 }
    }

    /// Epoch most recently passed to `set_epoch`
    pub fn epoch(&self) -> usize {
        self.epoch
    }
}

impl<T> From<Vec<T>> for InMemoryDataset<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: Clone + Numel> Dataset for InMemoryDataset<T> {
    type Item = T;

    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Result<T> {
        check_index(index, self.items.len())?;
        Ok(self.items[index].clone())
    }

    fn num_tokens(&self, index: usize) -> usize {
        self.items.get(index).map_or(0, Numel::numel)
    }

    fn set_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
    }
}
