mod error;
mod index;
mod member;
mod task;

pub use error::{ResolveError, Result};
pub use index::{FieldWeight, FuzzyIndex, IndexEntry, RankedCandidate};
pub use member::{MemberResolver, ResolutionMethod, ResolvedMember};
pub use task::{ResolvedTask, TaskIndex};
