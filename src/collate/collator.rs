//! Batch collation for variable-length instruction examples

use std::borrow::Borrow;

use ndarray::{s, Array2, Array3, Array4};

use super::mask::{get_masks_and_position_ids, MaskOptions};
use super::IGNORE_INDEX;
use crate::data::Example;
use crate::error::{Error, Result};

/// A padded training batch
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Token ids, right-padded with eos, shape `(B, L)`
    pub input_ids: Array2<i64>,
    /// Loss targets, ignore index outside the response, shape `(B, L)`
    pub labels: Array2<i64>,
    /// `true` where attention is disallowed, shape `(B, 1, L, L)`
    pub attention_mask: Array4<bool>,
    /// Absolute and block positions, shape `(B, 2, L)` (or `(B, 1, L)`)
    pub position_ids: Array3<i64>,
    /// Label value the loss skips
    pub ignore_index: i64,
}

impl Batch {
    /// Number of examples in the batch
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.input_ids.nrows()
    }

    /// Padded sequence length
    #[must_use]
    pub fn seq_len(&self) -> usize {
        self.input_ids.ncols()
    }

    /// Number of label positions that are not ignored
    #[must_use]
    pub fn num_target_tokens(&self) -> usize {
        self.labels.iter().filter(|&&l| l != self.ignore_index).count()
    }
}

/// Collates examples into a [`Batch`].
///
/// Every example is padded to `max(len) + 1` so the appended eos token always
/// fits. Examples are emitted longest first.
#[derive(Debug, Clone)]
pub struct DataCollator {
    eos_token_id: i64,
    ignore_index: i64,
    mask_options: MaskOptions,
}

impl DataCollator {
    /// Collator padding with `eos_token_id` and ignoring with [`IGNORE_INDEX`]
    #[must_use]
    pub fn new(eos_token_id: i64) -> Self {
        Self { eos_token_id, ignore_index: IGNORE_INDEX, mask_options: MaskOptions::default() }
    }

    /// Override the label value the loss skips
    #[must_use]
    pub fn with_ignore_index(mut self, ignore_index: i64) -> Self {
        self.ignore_index = ignore_index;
        self
    }

    /// Override mask / position-id options
    #[must_use]
    pub fn with_mask_options(mut self, options: MaskOptions) -> Self {
        self.mask_options = options;
        self
    }

    /// End-of-sequence id used for padding and as the final target
    #[must_use]
    pub fn eos_token_id(&self) -> i64 {
        self.eos_token_id
    }

    /// Label value excluded from the loss
    #[must_use]
    pub fn ignore_index(&self) -> i64 {
        self.ignore_index
    }

    /// Mask options applied to every example
    #[must_use]
    pub fn mask_options(&self) -> MaskOptions {
        self.mask_options
    }

    /// Build a padded batch.
    ///
    /// # Errors
    ///
    /// Fails on an empty batch or on an example whose `seq_len` is below 2 or
    /// points past the end of its `input_ids`.
    pub fn collate<E: Borrow<Example>>(&self, features: &[E]) -> Result<Batch> {
        if features.is_empty() {
            return Err(Error::InvalidExample("cannot collate an empty batch".into()));
        }

        let mut ordered: Vec<&Example> = features.iter().map(Borrow::borrow).collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()));

        let longest = ordered[0].len() + 1;
        let batch_size = ordered.len();
        let rows = self.mask_options.position_rows();

        let mut input_ids = Array2::from_elem((batch_size, longest), self.eos_token_id);
        let mut labels = Array2::from_elem((batch_size, longest), self.ignore_index);
        let mut attention_mask = Array4::from_elem((batch_size, 1, longest, longest), false);
        let mut position_ids = Array3::zeros((batch_size, rows, longest));

        for (b, example) in ordered.iter().enumerate() {
            let response_start = example.seq_len.checked_sub(1).ok_or_else(|| {
                Error::InvalidExample(format!("example {b}: seq_len must be >= 2, got 0"))
            })?;
            if response_start > example.len() {
                return Err(Error::InvalidExample(format!(
                    "example {b}: seq_len {} points past {} input ids",
                    example.seq_len,
                    example.len()
                )));
            }

            for (t, &id) in example.input_ids.iter().enumerate() {
                input_ids[[b, t]] = id;
                if t >= response_start {
                    labels[[b, t]] = id;
                }
            }
            labels[[b, example.len()]] = self.eos_token_id;

            let (mask, positions) =
                get_masks_and_position_ids(example.seq_len, longest, self.mask_options)?;
            attention_mask.slice_mut(s![b, .., .., ..]).assign(&mask);
            position_ids.slice_mut(s![b, .., ..]).assign(&positions);
        }

        Ok(Batch { input_ids, labels, attention_mask, position_ids, ignore_index: self.ignore_index })
    }
}
