//! Nucleotide alphabet with IUPAC ambiguity codes

use super::{mask_from_states, Code, DataType};

const SYMBOLS: &[u8; 18] = b"ACGTURYMWSKBDHVN-?";

/// Compatible states (A=0, C=1, G=2, T=3) for every code, indexed by code
const STATE_SETS: [&[usize]; 18] = [
    &[0],          // A
    &[1],          // C
    &[2],          // G
    &[3],          // T
    &[3],          // U
    &[0, 2],       // R
    &[1, 3],       // Y
    &[0, 1],       // M
    &[0, 3],       // W
    &[1, 2],       // S
    &[2, 3],       // K
    &[1, 2, 3],    // B
    &[0, 2, 3],    // D
    &[0, 1, 3],    // H
    &[0, 1, 2],    // V
    &[0, 1, 2, 3], // N
    &[0, 1, 2, 3], // -
    &[0, 1, 2, 3], // ?
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Nucleotide;

impl DataType for Nucleotide {
    fn name(&self) -> &'static str {
        "nucleotide"
    }

    fn state_count(&self) -> usize {
        4
    }

    fn code_count(&self) -> usize {
        SYMBOLS.len()
    }

    fn symbol_for_code(&self, code: Code) -> Option<char> {
        SYMBOLS.get(code as usize).map(|&b| b as char)
    }

    fn code_for_symbol(&self, symbol: char) -> Option<Code> {
        let upper = symbol.to_ascii_uppercase();
        SYMBOLS
            .iter()
            .position(|&b| b as char == upper)
            .map(|i| i as Code)
    }

    fn ambiguity_states_for_code(&self, code: Code) -> Vec<bool> {
        let states = STATE_SETS.get(code as usize).copied().unwrap_or(&[0, 1, 2, 3]);
        mask_from_states(states, 4)
    }

    fn canonical_states_for_code(&self, code: Code) -> Vec<usize> {
        STATE_SETS
            .get(code as usize)
            .map(|s| s.to_vec())
            .unwrap_or_else(|| vec![0, 1, 2, 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let codes = Nucleotide.encode("ACGT-?").unwrap();
        assert_eq!(codes, vec![0, 1, 2, 3, 16, 17]);
        assert_eq!(Nucleotide.decode(&codes), "ACGT-?");
    }

    #[test]
    fn test_lowercase_accepted() {
        assert_eq!(Nucleotide.encode("acgt").unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_uracil_is_thymine() {
        let u = Nucleotide.code_for_symbol('U').unwrap();
        assert_eq!(Nucleotide.canonical_states_for_code(u), vec![3]);
        assert_eq!(
            Nucleotide.ambiguity_states_for_code(u),
            Nucleotide.ambiguity_states_for_code(3)
        );
    }

    #[test]
    fn test_ambiguity_sets() {
        let r = Nucleotide.code_for_symbol('R').unwrap();
        assert_eq!(Nucleotide.ambiguity_states_for_code(r), vec![true, false, true, false]);
        let n = Nucleotide.code_for_symbol('N').unwrap();
        assert_eq!(Nucleotide.canonical_states_for_code(n).len(), 4);
        // out-of-alphabet codes behave as missing data
        assert_eq!(Nucleotide.ambiguity_states_for_code(99), vec![true; 4]);
    }
}
