//! Data types — the mapping between symbols and internal state codes
//!
//! A data type owns the alphabet of a character matrix: which symbol each
//! integer code stands for, and which model states a (possibly ambiguous)
//! code is compatible with. The matrix and the cache adapter only ever
//! consume these lookups read-only.

mod binary;
mod nucleotide;

pub use binary::Binary;
pub use nucleotide::Nucleotide;

use crate::error::AlignmentError;
use std::fmt;
use std::sync::Arc;

/// Integer state code stored in every matrix cell
pub type Code = u32;

/// Symbol ↔ code mapping plus ambiguity lookups
pub trait DataType: fmt::Debug + Send + Sync {
    /// Name used in snapshots and by [`data_type_by_name`]
    fn name(&self) -> &'static str;

    /// Number of model states (4 for nucleotides)
    fn state_count(&self) -> usize;

    /// Number of distinct codes, ambiguity codes included
    fn code_count(&self) -> usize;

    fn symbol_for_code(&self, code: Code) -> Option<char>;

    fn code_for_symbol(&self, symbol: char) -> Option<Code>;

    /// Membership mask over model states: `mask[s]` is true when `code`
    /// is compatible with state `s`. Unknown codes are compatible with all.
    fn ambiguity_states_for_code(&self, code: Code) -> Vec<bool>;

    /// The states a code canonically denotes. Unambiguous codes yield a
    /// single state; ambiguity codes yield every compatible state.
    fn canonical_states_for_code(&self, code: Code) -> Vec<usize>;

    /// Decode a symbol string into codes
    fn encode(&self, symbols: &str) -> Result<Vec<Code>, AlignmentError> {
        symbols
            .chars()
            .map(|c| {
                self.code_for_symbol(c).ok_or_else(|| AlignmentError::Symbol {
                    symbol: c,
                    data_type: self.name().to_string(),
                })
            })
            .collect()
    }

    /// Render codes as a symbol string; codes outside the alphabet print as `?`
    fn decode(&self, codes: &[Code]) -> String {
        codes
            .iter()
            .map(|&c| self.symbol_for_code(c).unwrap_or('?'))
            .collect()
    }
}

/// Look up a built-in data type by name
pub fn data_type_by_name(name: &str) -> Option<Arc<dyn DataType>> {
    match name {
        "nucleotide" => Some(Arc::new(Nucleotide)),
        "binary" => Some(Arc::new(Binary)),
        _ => None,
    }
}

/// Build a membership mask from a state list
pub(crate) fn mask_from_states(states: &[usize], state_count: usize) -> Vec<bool> {
    let mut mask = vec![false; state_count];
    for &s in states {
        if s < state_count {
            mask[s] = true;
        }
    }
    mask
}
