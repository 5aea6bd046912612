//! Input/output helpers.
//!
//! - model artifact directory loading (`bundle`)
//! - raw asylum-seeker dataset ingest (`dataset`)
//! - batch request CSV read/write (`requests`)

pub mod bundle;
pub mod dataset;
pub mod requests;

pub use bundle::*;
pub use dataset::{AsylumRecord, Dataset, RowError, load_dataset, read_dataset};
pub use requests::*;
