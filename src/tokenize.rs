//! Unicode indexer — normalised text to batched vocabulary ids plus mask.
//!
//! The vocabulary is a flat integer table loaded from JSON, indexed by code
//! point.  Code points beyond the table map to `-1` — an explicit unknown
//! sentinel the models were trained with, not a silent drop.

use std::path::Path;

use anyhow::Context;
use ndarray::{Array2, Array3};

use crate::error::{Error, Result};

/// Code point → vocabulary id lookup.
pub struct UnicodeIndexer {
    indexer: Vec<i64>,
}

impl UnicodeIndexer {
    pub fn new(indexer: Vec<i64>) -> Self {
        Self { indexer }
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let indexer: Vec<i64> = serde_json::from_slice(bytes)
            .context("cannot parse unicode indexer JSON")
            .map_err(|e| Error::asset("unicode indexer", e))?;
        Ok(Self::new(indexer))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("cannot read {}", path.display()))
            .map_err(|e| Error::asset("unicode indexer", e))?;
        Self::from_json_bytes(&bytes)
    }

    /// Vocabulary id for one code point; `-1` for anything past the table.
    fn id_of(&self, c: char) -> i64 {
        let cp = c as usize;
        if cp < self.indexer.len() {
            self.indexer[cp]
        } else {
            -1
        }
    }

    /// Encode a batch of normalised texts into a right-zero-padded
    /// `(batch, max_len)` id grid and its `(batch, 1, max_len)` validity
    /// mask.  Mask row sums equal the true character lengths.
    pub fn encode_batch(&self, texts: &[String]) -> (Array2<i64>, Array3<f32>) {
        let lengths: Vec<usize> = texts.iter().map(|t| t.chars().count()).collect();
        let max_len = lengths.iter().copied().max().unwrap_or(0);

        let mut ids = Array2::<i64>::zeros((texts.len(), max_len));
        for (i, text) in texts.iter().enumerate() {
            for (j, c) in text.chars().enumerate() {
                ids[[i, j]] = self.id_of(c);
            }
        }

        let mask = length_to_mask(&lengths, Some(max_len));
        (ids, mask)
    }
}

/// Binary validity mask over a batch of variable-length sequences: row `i`
/// is `1.0` up to `lengths[i]`, `0.0` beyond.  Shape `(batch, 1, max_len)`.
pub fn length_to_mask(lengths: &[usize], max_len: Option<usize>) -> Array3<f32> {
    let bsz = lengths.len();
    let max_len = max_len.unwrap_or_else(|| lengths.iter().copied().max().unwrap_or(0));

    let mut mask = Array3::<f32>::zeros((bsz, 1, max_len));
    for (i, &len) in lengths.iter().enumerate() {
        for j in 0..len.min(max_len) {
            mask[[i, 0, j]] = 1.0;
        }
    }
    mask
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Identity table over the ASCII range.
    fn ascii_indexer() -> UnicodeIndexer {
        UnicodeIndexer::new((0..128).collect())
    }

    #[test]
    fn test_mask_row_sums_equal_lengths() {
        let idx = ascii_indexer();
        let texts = vec!["abc".to_string(), "abcdefg".to_string()];
        let (ids, mask) = idx.encode_batch(&texts);

        assert_eq!(ids.dim(), (2, 7));
        assert_eq!(mask.dim(), (2, 1, 7));
        let row_sum = |i: usize| -> f32 { (0..7).map(|j| mask[[i, 0, j]]).sum() };
        assert_eq!(row_sum(0), 3.0);
        assert_eq!(row_sum(1), 7.0);
    }

    #[test]
    fn test_padding_is_zero() {
        let idx = ascii_indexer();
        let (ids, _) = idx.encode_batch(&["ab".to_string(), "abcd".to_string()]);
        assert_eq!(ids[[0, 2]], 0);
        assert_eq!(ids[[0, 3]], 0);
    }

    #[test]
    fn test_out_of_table_maps_to_sentinel() {
        let idx = ascii_indexer();
        let (ids, _) = idx.encode_batch(&["a中".to_string()]);
        assert_eq!(ids[[0, 0]], 'a' as i64);
        assert_eq!(ids[[0, 1]], -1);
    }

    #[test]
    fn test_length_to_mask_shape_and_values() {
        let mask = length_to_mask(&[2, 4], Some(5));
        assert_eq!(mask.dim(), (2, 1, 5));
        assert_eq!(mask[[0, 0, 1]], 1.0);
        assert_eq!(mask[[0, 0, 2]], 0.0);
        assert_eq!(mask[[1, 0, 3]], 1.0);
        assert_eq!(mask[[1, 0, 4]], 0.0);
    }

    #[test]
    fn test_indexer_from_json() {
        let idx = UnicodeIndexer::from_json_bytes(b"[5, 6, 7]").unwrap();
        assert_eq!(idx.id_of('\u{1}'), 6);
        assert_eq!(idx.id_of('z'), -1);
    }
}
