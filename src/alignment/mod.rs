//! Versioned alignment — the journaled character matrix
//!
//! The matrix is edited in place by a search loop; every write appends an
//! invertible record to the journal so a rejected proposal can be rolled
//! back bit-exactly. The dirty-set resolver tells downstream caches which
//! units the open journal may have changed.

mod dirty;
mod edit;
mod journal;
mod matrix;
pub mod text;

pub use dirty::{resolve_dirty_units, resolve_dirty_units_since, DirtyUnits};
pub use edit::EditRecord;
pub use journal::EditJournal;
pub use matrix::VersionedMatrix;
