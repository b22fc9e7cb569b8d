use super::{check_index, Partition};
use crate::libs::error::{PartitionError, Result};
use crate::libs::maps::{StateMap, StateSet};

/// Compact encoding of one tip site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipState {
    /// Exactly one state is observed
    Single(u8),
    /// Any of the states in the mask
    Ambiguous(StateSet),
}

impl TipState {
    fn from_set(set: StateSet) -> Self {
        if set.count_ones() == 1 {
            TipState::Single(set.trailing_zeros() as u8)
        } else {
            TipState::Ambiguous(set)
        }
    }

    /// The states this site is consistent with
    pub fn mask(&self) -> StateSet {
        match self {
            TipState::Single(state) => 1 << state,
            TipState::Ambiguous(set) => *set,
        }
    }
}

/// Full-length indicator vector of `set`
pub(super) fn indicator(set: StateSet, states: usize) -> Vec<f64> {
    (0..states)
        .map(|i| if set & (1 << i) != 0 { 1.0 } else { 0.0 })
        .collect()
}

impl Partition {
    /// Encode `sequence` through `map` and store it as tip `tip`.
    ///
    /// Every symbol must map to a non-empty set of states below S. Replacing a
    /// tip invalidates the internal CLVs computed from it.
    pub fn set_tip_states(
        &mut self,
        tip: usize,
        map: &StateMap,
        sequence: impl AsRef<[u8]>,
    ) -> Result<()> {
        check_index("tip", tip, self.dims.tips)?;

        let sequence = sequence.as_ref();
        if sequence.len() != self.dims.sites {
            return Err(PartitionError::SequenceLengthMismatch {
                tip,
                expected: self.dims.sites,
                got: sequence.len(),
            });
        }

        let valid = crate::libs::maps::all_states(self.dims.states);
        let encoded = sequence
            .iter()
            .enumerate()
            .map(|(site, &symbol)| {
                let set = map.get(symbol);
                if set == 0 || set & !valid != 0 {
                    Err(PartitionError::UnknownSymbol {
                        tip,
                        site,
                        symbol: symbol as char,
                    })
                } else {
                    Ok(TipState::from_set(set))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        self.cache_indicators(&encoded);
        self.tips[tip] = Some(encoded);
        self.lineage.replace_tip(tip);
        Ok(())
    }

    /// Encoded states of `tip`, `None` if never set.
    pub fn tip_states(&self, tip: usize) -> Option<&[TipState]> {
        self.tips.get(tip).and_then(|t| t.as_deref())
    }

    /// Cache the indicator vector of every ambiguity mask in `encoded`.
    fn cache_indicators(&mut self, encoded: &[TipState]) {
        let states = self.dims.states;
        for site in encoded {
            if let TipState::Ambiguous(set) = site {
                self.indicators
                    .entry(*set)
                    .or_insert_with(|| indicator(*set, states));
            }
        }
    }
}
