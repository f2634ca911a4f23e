use super::context::Invocation;
use super::cooldown::CooldownStore;
use super::error::CommandResult;
use super::executor::{CommandExecutor, Execution};
use super::key::CommandKey;
use super::metadata::CommandMetadata;
use super::modifier::ModifierConfig;
use super::pipeline::ModifierPipeline;
use super::warmup::CancellationTrigger;
use crate::services::ServiceCollection;
use bastion_permissions::Subject;
use indexmap::IndexMap;
use itertools::Itertools;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::warn;

/// A node of the runtime command tree.
///
/// Every alias of one executor leads to the same control, so they share its
/// cooldowns. Children are owned, the parent is only referenced.
pub struct CommandControl {
    metadata: Arc<CommandMetadata>,
    executor: Option<Arc<dyn CommandExecutor>>,
    services: Arc<ServiceCollection>,
    parent: RwLock<Weak<CommandControl>>,
    children: RwLock<IndexMap<String, Arc<CommandControl>>>,
    accepting_registration: AtomicBool,
    modifier_config: RwLock<Arc<ModifierConfig>>,
    cooldowns: Arc<CooldownStore>,
}

impl CommandControl {
    pub(super) fn new(
        metadata: Arc<CommandMetadata>,
        executor: Option<Arc<dyn CommandExecutor>>,
        services: Arc<ServiceCollection>,
        cooldowns: Arc<CooldownStore>,
    ) -> Self {
        CommandControl {
            metadata,
            executor,
            services,
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(IndexMap::new()),
            accepting_registration: AtomicBool::new(true),
            modifier_config: RwLock::new(Arc::new(ModifierConfig::default())),
            cooldowns,
        }
    }

    pub fn metadata(&self) -> &Arc<CommandMetadata> {
        &self.metadata
    }

    pub fn command_key(&self) -> &CommandKey {
        self.metadata.key()
    }

    pub fn modifier_key(&self) -> &str {
        self.metadata.modifier_key()
    }

    pub fn executor(&self) -> Option<&Arc<dyn CommandExecutor>> {
        self.executor.as_ref()
    }

    pub fn services(&self) -> &Arc<ServiceCollection> {
        &self.services
    }

    pub fn cooldowns(&self) -> &Arc<CooldownStore> {
        &self.cooldowns
    }

    pub fn parent(&self) -> Option<Arc<CommandControl>> {
        self.parent.read().upgrade()
    }

    pub fn child(&self, alias: &str) -> Option<Arc<CommandControl>> {
        self.children.read().get(&alias.to_lowercase()).cloned()
    }

    pub fn has_children(&self) -> bool {
        !self.children.read().is_empty()
    }

    /// Hangs `child` under this control. Only possible until registration
    /// completes.
    pub(super) fn attach(self: &Arc<Self>, alias: &str, child: &Arc<CommandControl>) -> bool {
        if !self.is_accepting_registration() {
            warn!(
                "Cannot attach {} to {}: registration has completed",
                child.command_key(),
                self.command_key()
            );
            return false;
        }
        let mut children = self.children.write();
        if let Some(existing) = children.get(alias) {
            if !Arc::ptr_eq(existing, child) {
                warn!(
                    "Alias {} under {} already leads to {}",
                    alias,
                    self.command_key(),
                    existing.command_key()
                );
            }
            return false;
        }
        children.insert(alias.to_string(), Arc::clone(child));

        let mut parent = child.parent.write();
        if parent.upgrade().is_none() {
            *parent = Arc::downgrade(self);
        }
        true
    }

    pub(super) fn complete_registration(&self) {
        self.accepting_registration.store(false, Ordering::Release);
    }

    pub fn is_accepting_registration(&self) -> bool {
        self.accepting_registration.load(Ordering::Acquire)
    }

    /// Whether `subject` holds every base permission of the command.
    pub fn test_permission(&self, subject: &Subject) -> bool {
        let permissions = self.services.permissions();
        self.metadata
            .base_permissions()
            .iter()
            .all(|permission| permissions.has_permission(subject, permission))
    }

    /// The first alias of every subcommand `subject` may use.
    pub fn subcommand_names(&self, subject: &Subject) -> Vec<String> {
        self.children
            .read()
            .iter()
            .unique_by(|(_, child)| Arc::as_ptr(child))
            .filter(|(_, child)| child.test_permission(subject))
            .map(|(alias, _)| alias.clone())
            .collect()
    }

    pub fn modifier_config(&self) -> Arc<ModifierConfig> {
        Arc::clone(&self.modifier_config.read())
    }

    /// Replaces the configured modifier values. Armed cooldowns are kept.
    pub fn set_modifier_config(&self, config: ModifierConfig) {
        *self.modifier_config.write() = Arc::new(config);
    }

    fn option_key(&self, name: &str) -> String {
        format!(
            "{}.{}.{}",
            self.services.permissions().namespace(),
            self.command_key(),
            name
        )
    }

    /// Cooldown for `subject`: a per-subject option, else the configured one.
    pub fn cooldown_for(&self, subject: &Subject) -> Duration {
        self.services
            .permissions()
            .positive_int_option(subject, &[&self.option_key("cooldown")])
            .map(|secs| Duration::from_secs(secs.into()))
            .unwrap_or_else(|| self.modifier_config().cooldown())
    }

    pub fn warmup_for(&self, subject: &Subject) -> Duration {
        self.services
            .permissions()
            .positive_int_option(subject, &[&self.option_key("warmup")])
            .map(|secs| Duration::from_secs(secs.into()))
            .unwrap_or_else(|| self.modifier_config().warmup())
    }

    pub fn cost_for(&self, subject: &Subject) -> f64 {
        self.services
            .permissions()
            .double_option(subject, &[&self.option_key("cost")])
            .filter(|cost| *cost >= 0.0)
            .unwrap_or(self.modifier_config().cost)
    }

    /// Runs the command without looking at subcommands.
    pub fn process(self: &Arc<Self>, invocation: Invocation) -> CommandResult<Execution> {
        ModifierPipeline::new(Arc::clone(self), invocation).run()
    }

    /// Routes to the deepest subcommand named by the leading arguments, then
    /// runs it. Using a command cancels the invoker's pending warmup.
    pub fn dispatch(self: &Arc<Self>, mut invocation: Invocation) -> CommandResult<Execution> {
        if let Some(player) = invocation.subject.player_id() {
            self.services
                .warmups()
                .on_trigger(player, CancellationTrigger::Command);
        }

        let mut control = Arc::clone(self);
        while let Some(child) = invocation
            .arguments
            .first()
            .and_then(|token| control.child(token))
        {
            invocation.arguments.remove(0);
            control = child;
        }
        control.process(invocation)
    }
}
