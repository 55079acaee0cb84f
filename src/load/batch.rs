//! Record batching.
//!
//! Splits an enriched record sequence into fixed-size chunks in stable
//! order. Chunks are borrowed slices: they partition the input exactly
//! once, with no copy, no reorder, no loss.

use serde_json::Value;
use std::ops::Range;

use crate::error::{ConfigError, ConfigResult};

/// An ordered, non-overlapping slice of the record sequence.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// Position in the chunk sequence, starting at 0.
    pub index: usize,
    /// Index of the chunk's first record in the input sequence.
    pub start_row: usize,
    /// The records, in input order.
    pub records: &'a [Value],
}

impl<'a> Chunk<'a> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The input row range this chunk covers.
    pub fn row_range(&self) -> Range<usize> {
        self.start_row..self.start_row + self.records.len()
    }
}

/// Partition records into chunks of `size`. The last chunk may be smaller.
/// A zero size is a configuration error.
pub fn batch(records: &[Value], size: usize) -> ConfigResult<Vec<Chunk<'_>>> {
    if size == 0 {
        return Err(ConfigError::InvalidBatchSize(0));
    }

    Ok(records
        .chunks(size)
        .enumerate()
        .map(|(index, slice)| Chunk {
            index,
            start_row: index * size,
            records: slice,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"row": i})).collect()
    }

    #[test]
    fn test_concat_reproduces_input() {
        let input = records(23);
        let chunks = batch(&input, 5).unwrap();

        let rebuilt: Vec<Value> = chunks
            .iter()
            .flat_map(|c| c.records.iter().cloned())
            .collect();
        assert_eq!(rebuilt, input);
    }

    #[test]
    fn test_chunk_sizes() {
        let input = records(23);
        let chunks = batch(&input, 5).unwrap();

        assert_eq!(chunks.len(), 5);
        for chunk in &chunks[..4] {
            assert_eq!(chunk.len(), 5);
        }
        assert_eq!(chunks[4].len(), 3);

        let total: usize = chunks.iter().map(Chunk::len).sum();
        assert_eq!(total, input.len());
    }

    #[test]
    fn test_exact_multiple() {
        let input = records(10);
        let chunks = batch(&input, 5).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 5);
    }

    #[test]
    fn test_row_ranges_partition() {
        let input = records(11);
        let chunks = batch(&input, 4).unwrap();

        assert_eq!(chunks[0].row_range(), 0..4);
        assert_eq!(chunks[1].row_range(), 4..8);
        assert_eq!(chunks[2].row_range(), 8..11);
    }

    #[test]
    fn test_zero_size_is_config_error() {
        let input = records(3);
        assert!(matches!(
            batch(&input, 0),
            Err(ConfigError::InvalidBatchSize(0))
        ));
    }

    #[test]
    fn test_empty_input() {
        let chunks = batch(&[], 5).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let input = records(17);
        let a = batch(&input, 6).unwrap();
        let b = batch(&input, 6).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.index, y.index);
            assert_eq!(x.records, y.records);
        }
    }
}
