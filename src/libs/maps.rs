//! Symbol to state-set tables.
//!
//! A [`StateMap`] maps every byte to a bitmask over the states of a model. Bit
//! `i` set means "state `i` is consistent with this symbol". Unmapped bytes
//! have an empty mask.

/// Bitmask over at most 64 states.
pub type StateSet = u64;

/// Amino acid order shared by every empirical protein model:
/// A R N D C Q E G H I L K M F P S T W Y V
pub const AA_ORDER: &[u8; 20] = b"ARNDCQEGHILKMFPSTWYV";

/// Nucleotide order: A C G T
pub const NT_ORDER: &[u8; 4] = b"ACGT";

#[derive(Clone)]
pub struct StateMap {
    table: [StateSet; 256],
}

impl Default for StateMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mapped: Vec<(char, StateSet)> = self
            .table
            .iter()
            .enumerate()
            .filter(|(_, &m)| m != 0)
            .map(|(b, &m)| (b as u8 as char, m))
            .collect();
        f.debug_struct("StateMap").field("mapped", &mapped).finish()
    }
}

impl StateMap {
    /// An empty map
    pub fn new() -> Self {
        Self { table: [0; 256] }
    }

    /// Map `symbol` to `states`
    pub fn set(&mut self, symbol: u8, states: StateSet) {
        self.table[symbol as usize] = states;
    }

    /// Builder form of [`StateMap::set`]
    pub fn with(mut self, symbol: u8, states: StateSet) -> Self {
        self.set(symbol, states);
        self
    }

    /// Map both cases of an ASCII letter
    pub fn with_both_cases(mut self, symbol: u8, states: StateSet) -> Self {
        self.set(symbol.to_ascii_uppercase(), states);
        self.set(symbol.to_ascii_lowercase(), states);
        self
    }

    /// States consistent with `symbol`, `0` if unmapped.
    pub fn get(&self, symbol: u8) -> StateSet {
        self.table[symbol as usize]
    }

    /// Build a map where each symbol of `alphabet` is one state, in order.
    /// Symbols in `missing` stand for every state.
    ///
    /// ```
    /// use plk::libs::maps::StateMap;
    ///
    /// let map = StateMap::from_alphabet(b"01", b"-?");
    /// assert_eq!(map.get(b'0'), 0b01);
    /// assert_eq!(map.get(b'1'), 0b10);
    /// assert_eq!(map.get(b'-'), 0b11);
    /// assert_eq!(map.get(b'2'), 0);
    /// ```
    pub fn from_alphabet(alphabet: &[u8], missing: &[u8]) -> Self {
        let all = all_states(alphabet.len());
        let mut map = Self::new();
        for (i, &b) in alphabet.iter().enumerate() {
            map = map.with_both_cases(b, 1 << i);
        }
        for &b in missing {
            map = map.with_both_cases(b, all);
        }
        map
    }

    /// Nucleotides with IUPAC ambiguity codes. `U` is `T`; `N`, `O`, `X`,
    /// `-` and `?` match any base.
    pub fn nt() -> Self {
        const A: StateSet = 1;
        const C: StateSet = 2;
        const G: StateSet = 4;
        const T: StateSet = 8;

        Self::from_alphabet(NT_ORDER, b"NOX-?")
            .with_both_cases(b'U', T)
            .with_both_cases(b'R', A | G)
            .with_both_cases(b'Y', C | T)
            .with_both_cases(b'S', C | G)
            .with_both_cases(b'W', A | T)
            .with_both_cases(b'K', G | T)
            .with_both_cases(b'M', A | C)
            .with_both_cases(b'B', C | G | T)
            .with_both_cases(b'D', A | G | T)
            .with_both_cases(b'H', A | C | T)
            .with_both_cases(b'V', A | C | G)
    }

    /// Amino acids in [`AA_ORDER`]. `B` is N/D, `Z` is Q/E, `J` is I/L;
    /// `X`, `-`, `?` and `*` match any residue.
    pub fn aa() -> Self {
        let state = |aa: u8| -> StateSet {
            let pos = AA_ORDER.iter().position(|&c| c == aa).unwrap_or(0);
            1 << pos
        };

        Self::from_alphabet(AA_ORDER, b"X-?*")
            .with_both_cases(b'B', state(b'N') | state(b'D'))
            .with_both_cases(b'Z', state(b'Q') | state(b'E'))
            .with_both_cases(b'J', state(b'I') | state(b'L'))
    }
}

/// Mask with the lowest `n` bits set.
pub fn all_states(n: usize) -> StateSet {
    if n >= 64 {
        StateSet::MAX
    } else {
        (1 << n) - 1
    }
}
