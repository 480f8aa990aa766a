pub mod layer;
pub mod store;

pub use layer::DiagnosticsLayer;
pub use store::{DiagnosticEntry, DiagnosticLevel, DiagnosticsStore};
