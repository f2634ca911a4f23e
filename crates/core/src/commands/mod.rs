//! Command metadata, the runtime command tree and modifier enforcement.
//!
//! Features register [`CommandDescriptor`]s with the [`CommandService`].
//! Completing registration merges them with the commands file, builds one
//! [`CommandControl`] per executor and hands the roots to the host, which
//! then dispatches invocations into them.

mod context;
mod control;
mod cooldown;
mod economy;
mod error;
mod executor;
mod key;
mod merger;
mod metadata;
mod modifier;
mod pipeline;
mod registry;
mod service;
mod tree;
mod warmup;

#[cfg(test)]
mod testing;

pub use context::{Audience, CommandContext, ConsoleAudience, Invocation};
pub use control::CommandControl;
pub use cooldown::{CooldownStore, MAX_COOLDOWN};
pub use economy::EconomyBackend;
pub use error::{
    CommandError, CommandResult, ConfigError, EconomyError, InternalError, RegistrationError,
    RuntimeError, StartupError,
};
pub use executor::{CommandDescriptor, CommandExecutor, DeclaredCommand, Execution};
pub use key::CommandKey;
pub use merger::{CommandsFile, ConfigMerger, EffectiveAliasSet, Namespace};
pub use metadata::{CommandDeclaration, CommandMetadata, ExecutorId, ModifierDeclaration, ModifierKind};
pub use modifier::ModifierConfig;
pub use pipeline::Stage;
pub use registry::MetadataRegistry;
pub use service::{CommandService, ReloadOutcome};
pub use tree::{CommandTree, RootRegistration, TreeBuilder};
pub use warmup::{CancellationTrigger, WarmupService, WarmupSettings, WarmupTask};
