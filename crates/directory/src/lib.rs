mod catalogue;
mod hierarchy;

pub use catalogue::{CatalogueTtls, ListPage, ListPageKey, RecordCatalogue, SearchKey};
pub use hierarchy::{EnsureOptions, HierarchyDirectory, ScopeKey};
