//! Text form of a matrix and its embedding in a state-node element
//!
//! One line per unit: `<unitName>: <symbolString>`. Loading is not an
//! edit: columns are overwritten directly and the journal is left alone.

use super::matrix::VersionedMatrix;
use crate::datatype::Code;
use crate::error::AlignmentError;

/// Entity replacements, applied in this order when escaping
const ENTITIES: [(&str, &str); 5] = [
    ("&", "&amp;"),
    ("'", "&apos;"),
    ("\"", "&quot;"),
    ("<", "&lt;"),
    (">", "&gt;"),
];

const NODE_CLOSE: &str = "</statenode>";

/// Render every unit as `name: symbols`, one per line
pub fn to_text(matrix: &VersionedMatrix) -> String {
    let data_type = matrix.data_type();
    let mut out = String::new();
    for (unit, name) in matrix.taxa().iter().enumerate() {
        let codes: Vec<Code> = matrix.grid().column(unit).iter().copied().collect();
        out.push_str(name);
        out.push_str(": ");
        out.push_str(&data_type.decode(&codes));
        out.push('\n');
    }
    out
}

/// Overwrite unit columns from text produced by [`to_text`].
///
/// Every line is validated before any column changes, so a bad line
/// leaves the matrix as it was. Units absent from the text keep their data.
pub fn load_text(matrix: &mut VersionedMatrix, text: &str) -> Result<usize, AlignmentError> {
    let mut parsed = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let (name, symbols) = line.split_once(':').ok_or_else(|| {
            AlignmentError::Configuration(format!("line without ':' separator: '{}'", line))
        })?;
        let name = name.trim();
        let unit = matrix
            .unit_index(name)
            .ok_or_else(|| AlignmentError::UnknownUnit(name.to_string()))?;
        let codes = matrix.data_type().encode(symbols.trim())?;
        if codes.len() != matrix.site_count() {
            return Err(AlignmentError::shape("sequence length", matrix.site_count(), codes.len()));
        }
        parsed.push((unit, codes));
    }

    let count = parsed.len();
    for (unit, codes) in parsed {
        matrix.load_column(unit, &codes)?;
    }
    Ok(count)
}

pub fn escape_entities(text: &str) -> String {
    ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (raw, entity)| acc.replace(raw, entity))
}

pub fn unescape_entities(text: &str) -> String {
    ENTITIES
        .iter()
        .rev()
        .fold(text.to_string(), |acc, (raw, entity)| acc.replace(entity, raw))
}

/// `<statenode id='ID'>TEXT</statenode>` with id and text escaped
pub fn to_state_node(matrix: &VersionedMatrix) -> String {
    format!(
        "<statenode id='{}'>{}{}\n",
        escape_entities(matrix.id()),
        escape_entities(&to_text(matrix)),
        NODE_CLOSE
    )
}

/// Load the text content of a `statenode` element into `matrix`
pub fn load_state_node(matrix: &mut VersionedMatrix, xml: &str) -> Result<usize, AlignmentError> {
    let malformed = || AlignmentError::Configuration("malformed statenode element".to_string());
    let open = xml.find("<statenode").ok_or_else(malformed)?;
    let body_start = xml[open..].find('>').map(|i| open + i + 1).ok_or_else(malformed)?;
    let body_end = xml[body_start..]
        .find(NODE_CLOSE)
        .map(|i| body_start + i)
        .ok_or_else(malformed)?;
    load_text(matrix, &unescape_entities(&xml[body_start..body_end]))
}
