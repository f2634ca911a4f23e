#![deny(rust_2018_idioms)]

mod backend;
mod level;
mod resolver;
mod subject;

pub use backend::{MemoryPermissionBackend, PermissionBackend};
pub use level::{SuggestedLevel, Tristate};
pub use resolver::{PermissionMetadata, PermissionResolver, ResolverSettings};
pub use subject::{HyphenatedUuid, Subject};
