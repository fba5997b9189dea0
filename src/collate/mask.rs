//! GLM attention masks and position ids
//!
//! ChatGLM attends bidirectionally over the prompt prefix and causally over the
//! response. Position ids come in two rows when 2D position encoding is on: the
//! absolute position (frozen at the mask token for the response) and the block
//! position (offset inside the response).

use ndarray::{Array2, Array3};

use crate::error::{Error, Result};

/// Options controlling mask and position-id construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskOptions {
    /// Generation-mask mode: absolute positions keep counting instead of
    /// freezing at the mask position
    pub gmask: bool,
    /// Emit two position rows (absolute + block) instead of one
    pub position_encoding_2d: bool,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self { gmask: false, position_encoding_2d: true }
    }
}

impl MaskOptions {
    /// Number of position-id rows produced with these options
    #[must_use]
    pub const fn position_rows(&self) -> usize {
        if self.position_encoding_2d {
            2
        } else {
            1
        }
    }
}

/// Build the attention mask and position ids for one example.
///
/// Returns a boolean mask of shape `(1, context_length, context_length)` where
/// `true` means attention is disallowed, and position ids of shape
/// `(2, context_length)` (or `(1, context_length)` without 2D encoding).
///
/// # Errors
///
/// `seq_len` must be at least 2 and at most `context_length`.
pub fn get_masks_and_position_ids(
    seq_len: usize,
    context_length: usize,
    options: MaskOptions,
) -> Result<(Array3<bool>, Array2<i64>)> {
    if seq_len < 2 {
        return Err(Error::InvalidExample(format!(
            "seq_len must be >= 2 to place the mask token, got {seq_len}"
        )));
    }
    if seq_len > context_length {
        return Err(Error::InvalidExample(format!(
            "seq_len {seq_len} exceeds context length {context_length}"
        )));
    }

    let mask_position = seq_len - 2;
    // Columns before this index are visible from every row. With the mask
    // token first the bound wraps to the last column.
    let visible_prefix = match mask_position {
        0 => context_length - 1,
        p => p - 1,
    };

    let attention_mask = Array3::from_shape_fn((1, context_length, context_length), |(_, i, j)| {
        j > i && j >= visible_prefix
    });

    let position_ids = if options.position_encoding_2d {
        let response_start = seq_len - 1;
        Array2::from_shape_fn((2, context_length), |(row, t)| match row {
            0 if !options.gmask && t >= response_start => mask_position as i64,
            0 => t as i64,
            _ if t < response_start => 0,
            _ => (t - response_start + 1) as i64,
        })
    } else {
        Array2::from_shape_fn((1, context_length), |(_, t)| {
            if !options.gmask && t + 1 >= context_length {
                mask_position as i64
            } else {
                t as i64
            }
        })
    };

    Ok((attention_mask, position_ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Axis};
    use proptest::prelude::*;

    #[test]
    fn test_mask_small_example_is_strictly_upper() {
        let (mask, _) = get_masks_and_position_ids(3, 5, MaskOptions::default()).unwrap();
        assert_eq!(mask.shape(), &[1, 5, 5]);

        let expected = [
            [false, true, true, true, true],
            [false, false, true, true, true],
            [false, false, false, true, true],
            [false, false, false, false, true],
            [false, false, false, false, false],
        ];
        for (i, row) in expected.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                assert_eq!(mask[[0, i, j]], value, "mismatch at ({i}, {j})");
            }
        }
    }

    #[test]
    fn test_position_ids_small_example() {
        let (_, positions) = get_masks_and_position_ids(3, 5, MaskOptions::default()).unwrap();
        assert_eq!(positions, arr2(&[[0, 1, 1, 1, 1], [0, 0, 1, 2, 3]]));
    }

    #[test]
    fn test_prompt_prefix_visible_from_every_row() {
        // mask_position = 3, columns 0 and 1 are visible everywhere
        let (mask, _) = get_masks_and_position_ids(5, 6, MaskOptions::default()).unwrap();
        for i in 0..6 {
            assert!(!mask[[0, i, 0]]);
            assert!(!mask[[0, i, 1]]);
        }
        assert!(mask[[0, 0, 2]]);
        assert!(mask[[0, 1, 2]]);
        assert!(!mask[[0, 2, 2]]);
        assert!(mask[[0, 2, 3]]);
    }

    #[test]
    fn test_gmask_keeps_absolute_positions() {
        let options = MaskOptions { gmask: true, position_encoding_2d: true };
        let (_, positions) = get_masks_and_position_ids(3, 5, options).unwrap();
        assert_eq!(positions, arr2(&[[0, 1, 2, 3, 4], [0, 0, 1, 2, 3]]));
    }

    #[test]
    fn test_one_dimensional_positions_clamp_last() {
        let options = MaskOptions { gmask: false, position_encoding_2d: false };
        let (_, positions) = get_masks_and_position_ids(3, 5, options).unwrap();
        assert_eq!(positions, arr2(&[[0, 1, 2, 3, 1]]));
    }

    #[test]
    fn test_one_dimensional_gmask() {
        let options = MaskOptions { gmask: true, position_encoding_2d: false };
        let (_, positions) = get_masks_and_position_ids(3, 5, options).unwrap();
        assert_eq!(positions, arr2(&[[0, 1, 2, 3, 4]]));
    }

    #[test]
    fn test_seq_len_two_opens_all_but_last_column() {
        let (mask, positions) = get_masks_and_position_ids(2, 4, MaskOptions::default()).unwrap();
        let expected = [
            [false, false, false, true],
            [false, false, false, true],
            [false, false, false, true],
            [false, false, false, false],
        ];
        for (i, row) in expected.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                assert_eq!(mask[[0, i, j]], value, "mismatch at ({i}, {j})");
            }
        }
        assert_eq!(positions, arr2(&[[0, 0, 0, 0], [0, 1, 2, 3]]));
    }

    #[test]
    fn test_seq_len_below_two_rejected() {
        assert!(matches!(
            get_masks_and_position_ids(1, 5, MaskOptions::default()),
            Err(Error::InvalidExample(_))
        ));
        assert!(get_masks_and_position_ids(0, 5, MaskOptions::default()).is_err());
    }

    #[test]
    fn test_seq_len_beyond_context_rejected() {
        assert!(matches!(
            get_masks_and_position_ids(6, 5, MaskOptions::default()),
            Err(Error::InvalidExample(_))
        ));
    }

    #[test]
    fn test_position_rows() {
        assert_eq!(MaskOptions::default().position_rows(), 2);
        let flat = MaskOptions { gmask: false, position_encoding_2d: false };
        assert_eq!(flat.position_rows(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_diagonal_and_past_always_visible(context in 2usize..24, frac in 0.0f64..1.0) {
            let seq_len = 2 + ((context - 2) as f64 * frac) as usize;
            let (mask, _) = get_masks_and_position_ids(seq_len, context, MaskOptions::default()).unwrap();
            for i in 0..context {
                for j in 0..=i {
                    prop_assert!(!mask[[0, i, j]]);
                }
            }
        }

        #[test]
        fn prop_block_positions_count_response(context in 2usize..24, frac in 0.0f64..1.0) {
            let seq_len = 2 + ((context - 2) as f64 * frac) as usize;
            let (_, positions) = get_masks_and_position_ids(seq_len, context, MaskOptions::default()).unwrap();
            let block = positions.index_axis(Axis(0), 1);
            let zeros = block.iter().filter(|&&p| p == 0).count();
            prop_assert_eq!(zeros, seq_len - 1);
            prop_assert_eq!(block[context - 1], (context - seq_len + 1) as i64);
        }
    }
}
