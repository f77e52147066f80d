mod access;
mod scope;

pub use access::{WriteAccessConfig, WriteAccessError, WriteAccessGate, WriteAccessMode};
pub use scope::{ScopeHints, ScopeSet};
