use super::context::CommandContext;
use super::error::CommandResult;
use super::metadata::{CommandDeclaration, ExecutorId};
use crate::services::ServiceCollection;
use bastion_permissions::Subject;
use std::sync::Arc;

/// How an executor finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Success,
    /// The executor will finish on its own later; nothing is committed.
    Deferred,
}

/// The business logic behind a command. Failures are reported through
/// `Err`.
pub trait CommandExecutor: Send + Sync + 'static {
    fn execute(&self, ctx: &mut CommandContext) -> CommandResult<Execution>;

    /// The subject this invocation acts on, used by permission-level
    /// modifiers. Commands without a target skip the level comparison.
    fn target(&self, _ctx: &CommandContext) -> Option<Subject> {
        None
    }

    /// Called once registration completes and again on every reload.
    fn on_reload(&self, _services: &ServiceCollection) {}
}

/// An executor type together with its static declaration.
pub trait DeclaredCommand: CommandExecutor + Sized {
    fn declaration() -> CommandDeclaration;

    fn construct(services: &ServiceCollection) -> anyhow::Result<Self>;
}

pub(super) type ExecutorFactory =
    Arc<dyn Fn(&ServiceCollection) -> anyhow::Result<Arc<dyn CommandExecutor>> + Send + Sync>;

/// Everything the registry needs to know about one command.
#[derive(Clone)]
pub struct CommandDescriptor {
    pub(super) executor: ExecutorId,
    pub(super) declaration: CommandDeclaration,
    pub(super) factory: ExecutorFactory,
}

impl CommandDescriptor {
    pub fn of<T: DeclaredCommand>() -> Self {
        CommandDescriptor {
            executor: ExecutorId::of::<T>(),
            declaration: T::declaration(),
            factory: Arc::new(|services: &ServiceCollection| {
                let executor: Arc<dyn CommandExecutor> = Arc::new(T::construct(services)?);
                Ok(executor)
            }),
        }
    }

    /// Registers the same executor under another declaration. Both end up
    /// on a single control and share its cooldowns.
    pub fn with_declaration(mut self, declaration: CommandDeclaration) -> Self {
        self.declaration = declaration;
        self
    }

    pub fn executor(&self) -> ExecutorId {
        self.executor
    }

    pub fn declaration(&self) -> &CommandDeclaration {
        &self.declaration
    }
}
