use super::error::{CommandResult, InternalError, RuntimeError};
use super::key::CommandKey;
use crate::services::ServiceCollection;
use bastion_permissions::Subject;
use std::sync::Arc;
use std::time::Duration;

/// Where replies to an invocation go.
pub trait Audience: Send + Sync {
    fn send_message(&self, message: &str);

    fn send_error(&self, message: &str);
}

/// Replies on the server console.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleAudience;

impl Audience for ConsoleAudience {
    fn send_message(&self, message: &str) {
        println!("{}", message);
    }

    fn send_error(&self, message: &str) {
        eprintln!("Error: {}", message);
    }
}

/// One command line as handed over by the host dispatcher, with the root
/// alias already removed.
#[derive(Clone)]
pub struct Invocation {
    pub subject: Subject,
    pub arguments: Vec<String>,
    pub audience: Arc<dyn Audience>,
}

impl Invocation {
    pub fn new(subject: Subject, arguments: &str, audience: Arc<dyn Audience>) -> Self {
        Invocation {
            subject,
            arguments: arguments.split_whitespace().map(str::to_string).collect(),
            audience,
        }
    }
}

/// The state of a single invocation as seen by an executor.
///
/// Owned, so a warmup can carry it to whichever thread finishes the
/// invocation.
pub struct CommandContext {
    subject: Subject,
    arguments: Vec<String>,
    command: CommandKey,
    services: Arc<ServiceCollection>,
    audience: Arc<dyn Audience>,
    cooldown: Duration,
    warmup: Duration,
    cost: f64,
}

impl CommandContext {
    pub(super) fn new(
        invocation: Invocation,
        command: CommandKey,
        services: Arc<ServiceCollection>,
    ) -> Self {
        CommandContext {
            subject: invocation.subject,
            arguments: invocation.arguments,
            command,
            services,
            audience: invocation.audience,
            cooldown: Duration::ZERO,
            warmup: Duration::ZERO,
            cost: 0.0,
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn command(&self) -> &CommandKey {
        &self.command
    }

    pub fn services(&self) -> &ServiceCollection {
        &self.services
    }

    pub fn audience(&self) -> &Arc<dyn Audience> {
        &self.audience
    }

    pub fn args(&self) -> &[String] {
        &self.arguments
    }

    pub fn arg(&self, index: usize) -> CommandResult<&str> {
        self.arguments
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                InternalError::MissingArgument {
                    command: self.command.to_string(),
                    index,
                }
                .into()
            })
    }

    pub fn reply(&self, message: &str) {
        self.audience.send_message(message);
    }

    pub fn error(&self, message: &str) {
        self.audience.send_error(message);
    }

    /// The invoking player, or `PlayerOnly` for the console.
    pub fn player_id(&self) -> CommandResult<u128> {
        self.subject
            .player_id()
            .ok_or_else(|| RuntimeError::PlayerOnly.into())
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.services
            .permissions()
            .has_permission(&self.subject, permission)
    }

    pub fn require_permission(&self, permission: &str) -> CommandResult<()> {
        if !self.has_permission(permission) {
            return Err(RuntimeError::PermissionDenied {
                permission: permission.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Whether the invoker outranks `target` for `level_key`.
    pub fn is_permission_level_ok(
        &self,
        target: &Subject,
        level_key: &str,
        fallback_permission: &str,
        allow_equal: bool,
    ) -> bool {
        self.services.permissions().level_ok(
            &self.subject,
            target,
            level_key,
            fallback_permission,
            allow_equal,
        )
    }

    /// Cooldown armed if this invocation succeeds. Executors may change it.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
    }

    pub fn warmup(&self) -> Duration {
        self.warmup
    }

    pub(super) fn set_warmup(&mut self, warmup: Duration) {
        self.warmup = warmup;
    }

    /// Amount charged if this invocation succeeds. Executors may change it.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn set_cost(&mut self, cost: f64) {
        self.cost = cost;
    }
}
