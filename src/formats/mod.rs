//! Binary artifact formats.

pub mod edge_lookup;
pub mod original_edges;
pub mod snapshot;

pub use edge_lookup::{EdgeLookupPaths, EdgeLookupWriter};
pub use original_edges::{OriginalEdgeData, OriginalEdgeWriter};
pub use snapshot::{NetworkData, NetworkSnapshot};
