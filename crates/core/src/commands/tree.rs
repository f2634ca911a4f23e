use super::control::CommandControl;
use super::cooldown::CooldownStore;
use super::key::CommandKey;
use super::merger::{EffectiveAliasSet, Namespace};
use super::metadata::ExecutorId;
use super::registry::{MetadataRegistry, RegisteredCommand};
use crate::services::ServiceCollection;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, error};

/// A root control and the aliases the host should bind it under.
#[derive(Clone)]
pub struct RootRegistration {
    pub primary: String,
    pub secondary: Vec<String>,
    pub control: Arc<CommandControl>,
}

impl RootRegistration {
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.secondary.iter().map(String::as_str))
    }
}

/// The built command surface.
pub struct CommandTree {
    roots: Vec<RootRegistration>,
    controls: IndexMap<CommandKey, Arc<CommandControl>>,
    instances: Vec<Arc<CommandControl>>,
    aliases: EffectiveAliasSet,
}

impl CommandTree {
    pub fn roots(&self) -> &[RootRegistration] {
        &self.roots
    }

    /// The control a command key resolves to. Keys sharing an executor
    /// resolve to the same control.
    pub fn control(&self, key: &str) -> Option<&Arc<CommandControl>> {
        self.controls.get(key)
    }

    pub fn root(&self, alias: &str) -> Option<&Arc<CommandControl>> {
        let key = self.aliases.resolve(&Namespace::Root, alias)?;
        self.controls.get(key)
    }

    /// Every control once.
    pub fn instances(&self) -> &[Arc<CommandControl>] {
        &self.instances
    }

    pub fn aliases(&self) -> &EffectiveAliasSet {
        &self.aliases
    }
}

/// Turns the enabled part of the registry into controls.
pub struct TreeBuilder<'a> {
    registry: &'a MetadataRegistry,
    services: &'a Arc<ServiceCollection>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(registry: &'a MetadataRegistry, services: &'a Arc<ServiceCollection>) -> Self {
        TreeBuilder { registry, services }
    }

    /// Builds roots first, then every command whose parent exists, until
    /// nothing more can be attached. A command whose executor cannot be
    /// constructed is logged and left out.
    pub fn build(&self, aliases: EffectiveAliasSet) -> CommandTree {
        let mut by_executor: IndexMap<ExecutorId, Arc<CommandControl>> = IndexMap::new();
        let mut failed: FxHashSet<ExecutorId> = FxHashSet::default();
        let mut cooldowns: FxHashMap<String, Arc<CooldownStore>> = FxHashMap::default();
        let mut controls = IndexMap::new();

        let (mut pending, children): (Vec<_>, Vec<_>) = self
            .registry
            .commands()
            .filter(|command| aliases.is_enabled(command.metadata.key().as_str()))
            .partition(|command| command.metadata.is_root());
        pending.extend(children);

        loop {
            let before = pending.len();
            pending.retain(|command| {
                let metadata = &command.metadata;
                let parent = match metadata.parent() {
                    Some(parent) => match by_executor.get(&parent) {
                        Some(parent) => Some(Arc::clone(parent)),
                        None if failed.contains(&parent) => return false,
                        None => return true,
                    },
                    None => None,
                };

                let Some(control) =
                    self.control_for(command, &mut by_executor, &mut failed, &mut cooldowns)
                else {
                    return false;
                };
                if let (Some(parent), Some(parent_key)) = (parent, metadata.key().parent()) {
                    let namespace = Namespace::Children(parent_key);
                    for alias in aliases.aliases_for(&namespace, metadata.key()) {
                        parent.attach(alias, &control);
                    }
                }
                controls.insert(metadata.key().clone(), control);
                false
            });
            if pending.len() == before {
                break;
            }
        }
        for command in pending {
            debug!(
                "Skipping command {}: its parent command is not enabled",
                command.metadata.key()
            );
        }

        let roots = root_registrations(&aliases, &controls);
        let instances: Vec<_> = by_executor.into_values().collect();
        for control in &instances {
            control.complete_registration();
        }
        CommandTree {
            roots,
            controls,
            instances,
            aliases,
        }
    }

    fn control_for(
        &self,
        command: &RegisteredCommand,
        by_executor: &mut IndexMap<ExecutorId, Arc<CommandControl>>,
        failed: &mut FxHashSet<ExecutorId>,
        cooldowns: &mut FxHashMap<String, Arc<CooldownStore>>,
    ) -> Option<Arc<CommandControl>> {
        let metadata = &command.metadata;
        let id = metadata.executor();
        if let Some(control) = by_executor.get(&id) {
            return Some(Arc::clone(control));
        }
        if failed.contains(&id) {
            return None;
        }

        let executor = if metadata.has_executor() {
            match (command.factory)(self.services.as_ref()) {
                Ok(executor) => Some(executor),
                Err(err) => {
                    error!(
                        "Could not construct the executor of command {} ({}): {:#}",
                        metadata.key(),
                        id.name(),
                        err
                    );
                    failed.insert(id);
                    return None;
                }
            }
        } else {
            None
        };

        let store = cooldowns
            .entry(metadata.modifier_key().to_string())
            .or_default();
        let control = Arc::new(CommandControl::new(
            Arc::clone(metadata),
            executor,
            Arc::clone(self.services),
            Arc::clone(store),
        ));
        by_executor.insert(id, Arc::clone(&control));
        Some(control)
    }
}

/// Groups the enabled root aliases by control, in command registration
/// order.
fn root_registrations(
    aliases: &EffectiveAliasSet,
    controls: &IndexMap<CommandKey, Arc<CommandControl>>,
) -> Vec<RootRegistration> {
    let mut roots: Vec<RootRegistration> = Vec::new();
    for (key, control) in controls {
        for alias in aliases.root_aliases_for(key) {
            match roots
                .iter_mut()
                .find(|root| Arc::ptr_eq(&root.control, control))
            {
                Some(root) => root.secondary.push(alias.to_string()),
                None => roots.push(RootRegistration {
                    primary: alias.to_string(),
                    secondary: Vec::new(),
                    control: Arc::clone(control),
                }),
            }
        }
    }
    roots
}
