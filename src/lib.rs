//! mutalign — versioned character matrices for stochastic search
//!
//! A journaled `site × unit` matrix that can be edited speculatively and
//! rolled back bit-exactly, plus an adapter that keeps an external
//! tree-likelihood engine's leaf cache in step by re-pushing only the
//! units an edit may have touched.

pub mod alignment;
pub mod datatype;
pub mod error;
pub mod likelihood;
pub mod state;
pub mod storage;
pub mod trace;

pub use alignment::{resolve_dirty_units, DirtyUnits, EditJournal, EditRecord, VersionedMatrix};
pub use datatype::{Code, DataType};
pub use error::AlignmentError;
pub use likelihood::{AdapterConfig, LeafEncoding, LikelihoodCacheAdapter, LikelihoodEngine, StarTreeEngine};
pub use state::SearchState;
pub use storage::AlignmentStore;
