//! Two-state alphabet (`0`, `1`) with gap and missing symbols

use super::{mask_from_states, Code, DataType};

const SYMBOLS: &[u8; 4] = b"01-?";

#[derive(Debug, Clone, Copy, Default)]
pub struct Binary;

impl DataType for Binary {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn state_count(&self) -> usize {
        2
    }

    fn code_count(&self) -> usize {
        SYMBOLS.len()
    }

    fn symbol_for_code(&self, code: Code) -> Option<char> {
        SYMBOLS.get(code as usize).map(|&b| b as char)
    }

    fn code_for_symbol(&self, symbol: char) -> Option<Code> {
        SYMBOLS.iter().position(|&b| b as char == symbol).map(|i| i as Code)
    }

    fn ambiguity_states_for_code(&self, code: Code) -> Vec<bool> {
        mask_from_states(&self.canonical_states_for_code(code), 2)
    }

    fn canonical_states_for_code(&self, code: Code) -> Vec<usize> {
        match code {
            0 => vec![0],
            1 => vec![1],
            _ => vec![0, 1],
        }
    }
}
