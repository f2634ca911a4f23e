use super::context::{Audience, CommandContext, Invocation};
use super::control::CommandControl;
use super::error::{CommandError, CommandResult, RuntimeError};
use super::executor::Execution;
use super::metadata::ModifierKind;
use super::warmup::WarmupTask;
use bastion_permissions::{HyphenatedUuid, Subject};
use std::sync::Arc;
use tracing::{error, trace, warn};

/// Where an invocation is in the modifier pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    LevelCheck,
    CooldownCheck,
    CostCheck,
    WarmupArm,
    Delegate,
}

struct LevelGate {
    key: String,
    fallback_permission: String,
    allow_equal: bool,
}

/// The modifiers that apply to one invoker: declared, relevant for the
/// kind of subject, and not exempted.
#[derive(Default)]
struct Gates {
    levels: Vec<LevelGate>,
    cooldown: bool,
    warmup: bool,
    cost: bool,
}

impl Gates {
    fn select(control: &CommandControl, subject: &Subject) -> Gates {
        let services = control.services();
        let mut gates = Gates::default();
        for modifier in control.metadata().modifiers() {
            if modifier.kind.players_only() && !subject.is_player() {
                continue;
            }
            if modifier.kind == ModifierKind::Cost && services.economy().is_none() {
                continue;
            }
            if let Some(exempt) = &modifier.exempt_permission {
                if services.permissions().has_permission(subject, exempt) {
                    trace!("{} is exempt from {:?} on {}", subject, modifier.kind, control.command_key());
                    continue;
                }
            }
            match &modifier.kind {
                ModifierKind::Cooldown => gates.cooldown = true,
                ModifierKind::Warmup => gates.warmup = true,
                ModifierKind::Cost => gates.cost = true,
                ModifierKind::PermissionLevel {
                    key,
                    fallback_permission,
                    allow_equal,
                } => gates.levels.push(LevelGate {
                    key: key.clone(),
                    fallback_permission: fallback_permission.clone(),
                    allow_equal: *allow_equal,
                }),
            }
        }
        gates
    }
}

/// Runs one invocation through
/// `Start -> LevelCheck -> CooldownCheck -> CostCheck -> WarmupArm -> Delegate`,
/// ending in a commit or a rejection.
///
/// Nothing is mutated until the executor succeeds: only then is the cost
/// charged and the cooldown armed.
pub(super) struct ModifierPipeline {
    control: Arc<CommandControl>,
    ctx: CommandContext,
    gates: Gates,
}

impl ModifierPipeline {
    pub(super) fn new(control: Arc<CommandControl>, invocation: Invocation) -> Self {
        let gates = Gates::select(&control, &invocation.subject);
        let ctx = CommandContext::new(
            invocation,
            control.command_key().clone(),
            Arc::clone(control.services()),
        );
        ModifierPipeline { control, ctx, gates }
    }

    pub(super) fn run(mut self) -> CommandResult<Execution> {
        let mut stage = Stage::Start;
        loop {
            trace!("{} for {}: {:?}", self.control.command_key(), self.ctx.subject(), stage);
            stage = match stage {
                Stage::Start => {
                    self.start()?;
                    Stage::LevelCheck
                }
                Stage::LevelCheck => {
                    self.check_levels()?;
                    Stage::CooldownCheck
                }
                Stage::CooldownCheck => {
                    self.check_cooldown()?;
                    Stage::CostCheck
                }
                Stage::CostCheck => {
                    self.check_cost()?;
                    Stage::WarmupArm
                }
                Stage::WarmupArm => {
                    if self.gates.warmup && !self.ctx.warmup().is_zero() {
                        return Ok(self.arm_warmup());
                    }
                    Stage::Delegate
                }
                Stage::Delegate => return self.delegate(),
            };
        }
    }

    fn start(&mut self) -> CommandResult<()> {
        let subject = *self.ctx.subject();
        if let Some(permission) = self
            .control
            .metadata()
            .base_permissions()
            .iter()
            .find(|permission| !self.ctx.has_permission(permission))
        {
            return Err(RuntimeError::PermissionDenied {
                permission: permission.clone(),
            }
            .into());
        }

        if self.control.executor().is_none() {
            let names = self.control.subcommand_names(&subject);
            if names.is_empty() {
                return Err(RuntimeError::NotExecutable.into());
            }
            return Err(CommandError::runtime(format!(
                "Usage: /{} <{}>",
                self.control.command_key().command_line(),
                names.join("|")
            )));
        }

        if self.gates.cooldown {
            self.ctx.set_cooldown(self.control.cooldown_for(&subject));
        }
        if self.gates.warmup {
            self.ctx.set_warmup(self.control.warmup_for(&subject));
        }
        if self.gates.cost {
            self.ctx.set_cost(self.control.cost_for(&subject));
        }
        Ok(())
    }

    fn check_levels(&self) -> CommandResult<()> {
        if self.gates.levels.is_empty() {
            return Ok(());
        }
        let permissions = self.ctx.services().permissions();
        if permissions.is_console_override(self.ctx.subject()) {
            return Ok(());
        }
        let Some(target) = self
            .control
            .executor()
            .and_then(|executor| executor.target(&self.ctx))
        else {
            return Ok(());
        };
        for gate in &self.gates.levels {
            if !self.ctx.is_permission_level_ok(
                &target,
                &gate.key,
                &gate.fallback_permission,
                gate.allow_equal,
            ) {
                return Err(RuntimeError::InsufficientLevel {
                    key: gate.key.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn check_cooldown(&self) -> CommandResult<()> {
        let Some(player) = self.ctx.subject().player_id().filter(|_| self.gates.cooldown) else {
            return Ok(());
        };
        let now = self.ctx.services().clock().now();
        match self.control.cooldowns().remaining(player, now) {
            Some(remaining) => Err(RuntimeError::CooldownActive { remaining }.into()),
            None => Ok(()),
        }
    }

    fn check_cost(&self) -> CommandResult<()> {
        let cost = self.ctx.cost();
        let Some(player) = self.ctx.subject().player_id().filter(|_| self.gates.cost && cost > 0.0) else {
            return Ok(());
        };
        let Some(economy) = self.ctx.services().economy() else {
            return Ok(());
        };
        if economy.can_afford(player, cost) {
            Ok(())
        } else {
            Err(RuntimeError::InsufficientFunds { cost }.into())
        }
    }

    /// Schedules the rest of the pipeline. Its outcome goes to the
    /// invocation's audience.
    fn arm_warmup(self) -> Execution {
        let Some(player) = self.ctx.subject().player_id() else {
            return Execution::Deferred;
        };
        let warmup = self.ctx.warmup();
        let audience = Arc::clone(self.ctx.audience());
        let warmups = Arc::clone(self.ctx.services().warmups());

        audience.send_message(&format!(
            "Your command will run in {} second(s). Do not move.",
            warmup.as_secs()
        ));
        let cancelled = Arc::clone(&audience);
        let task = WarmupTask::new(
            move || {
                let audience = Arc::clone(self.ctx.audience());
                report(&*audience, self.delegate());
            },
            move || {
                cancelled.send_error(&RuntimeError::WarmupCancelled.to_string());
            },
        );
        warmups.execute_after(player, warmup, task);
        Execution::Deferred
    }

    fn delegate(mut self) -> CommandResult<Execution> {
        let Some(executor) = self.control.executor().cloned() else {
            return Err(RuntimeError::NotExecutable.into());
        };
        match executor.execute(&mut self.ctx)? {
            Execution::Success => {
                self.commit();
                Ok(Execution::Success)
            }
            Execution::Deferred => Ok(Execution::Deferred),
        }
    }

    fn commit(&self) {
        let Some(player) = self.ctx.subject().player_id() else {
            return;
        };
        let services = self.ctx.services();

        let cost = self.ctx.cost();
        if self.gates.cost && cost > 0.0 {
            if let Some(economy) = services.economy() {
                if let Err(err) = economy.charge(player, cost) {
                    warn!(
                        "Could not charge {} to {} for {}: {}",
                        economy.format_amount(cost),
                        HyphenatedUuid(player),
                        self.control.command_key(),
                        err
                    );
                }
            }
        }

        let cooldown = self.ctx.cooldown();
        if self.gates.cooldown && !cooldown.is_zero() {
            let armed = self
                .control
                .cooldowns()
                .arm_for(player, services.clock().now(), cooldown);
            if armed.is_none() {
                warn!(
                    "Could not arm a cooldown of {:?} for {} on {}",
                    cooldown,
                    HyphenatedUuid(player),
                    self.control.command_key()
                );
            }
        }
    }
}

/// Delivers the outcome of a command that finished outside the dispatcher.
fn report(audience: &dyn Audience, result: CommandResult<Execution>) {
    match result {
        Ok(_) => {}
        Err(CommandError::Runtime(err)) => audience.send_error(&err.to_string()),
        Err(CommandError::Internal(err)) => {
            error!("{}", err);
            audience.send_error("An internal error occurred while running this command");
        }
    }
}
