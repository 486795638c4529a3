//! Datasets
//!
//! - **dataset**: the `Dataset` capability trait, the `Numel` item trait and
//!   a `Vec`-backed store
//! - **numel_dataset**: wrapper reporting the element count of each item

pub mod dataset;
pub mod numel_dataset;

pub use dataset::{Dataset, InMemoryDataset, Numel};
pub use numel_dataset::{Collated, NumelDataset};
