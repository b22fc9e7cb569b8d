use crate::libs::error::{PartitionError, Result};
use std::collections::HashMap;

/// Unique alignment columns and how often each occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patterns {
    /// One compressed row per input sequence
    pub sequences: Vec<Vec<u8>>,
    /// Multiplicity of each column
    pub weights: Vec<u32>,
}

impl Patterns {
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Number of columns before compression
    pub fn sites(&self) -> usize {
        self.weights.iter().map(|&w| w as usize).sum()
    }
}

/// Merge identical columns of an alignment, keeping first-occurrence order.
///
/// Columns are compared case-insensitively and stored in upper case.
///
/// ```
/// use plk::libs::patterns::compress;
///
/// let patterns = compress(&["ACAa", "GTGg"]).unwrap();
/// assert_eq!(patterns.sequences, vec![b"AC".to_vec(), b"GT".to_vec()]);
/// assert_eq!(patterns.weights, vec![3, 1]);
/// ```
pub fn compress<S: AsRef<[u8]>>(sequences: &[S]) -> Result<Patterns> {
    let Some(first) = sequences.first() else {
        return Ok(Patterns {
            sequences: Vec::new(),
            weights: Vec::new(),
        });
    };

    let sites = first.as_ref().len();
    for (tip, seq) in sequences.iter().enumerate() {
        if seq.as_ref().len() != sites {
            return Err(PartitionError::SequenceLengthMismatch {
                tip,
                expected: sites,
                got: seq.as_ref().len(),
            });
        }
    }

    let mut seen: HashMap<Vec<u8>, usize> = HashMap::new();
    let mut columns: Vec<Vec<u8>> = Vec::new();
    let mut weights: Vec<u32> = Vec::new();

    for site in 0..sites {
        let column: Vec<u8> = sequences
            .iter()
            .map(|s| s.as_ref()[site].to_ascii_uppercase())
            .collect();
        match seen.get(&column) {
            Some(&i) => weights[i] += 1,
            None => {
                seen.insert(column.clone(), columns.len());
                columns.push(column);
                weights.push(1);
            }
        }
    }

    let compressed = (0..sequences.len())
        .map(|row| columns.iter().map(|c| c[row]).collect())
        .collect();

    tracing::debug!(sites, patterns = weights.len(), "alignment compressed");
    Ok(Patterns {
        sequences: compressed,
        weights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_identical_columns() {
        let seqs = vec!["AAC-A".to_string(), "GGTNG".to_string(), "AAC-A".to_string()];
        let patterns = compress(&seqs).unwrap();
        assert_eq!(patterns.len(), 3);
        assert_eq!(patterns.sites(), 5);
        assert_eq!(patterns.weights, vec![3, 1, 1]);
        assert_eq!(patterns.sequences[0], b"AC-");
        assert_eq!(patterns.sequences[1], b"GTN");
    }

    #[test]
    fn rejects_ragged_alignment() {
        assert_eq!(
            compress(&["ACGT", "ACG"]),
            Err(PartitionError::SequenceLengthMismatch {
                tip: 1,
                expected: 4,
                got: 3
            })
        );
    }

    #[test]
    fn empty_input() {
        let none: Vec<&str> = vec![];
        assert!(compress(&none).unwrap().is_empty());
    }
}
