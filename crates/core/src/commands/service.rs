use super::context::Invocation;
use super::control::CommandControl;
use super::error::{CommandError, CommandResult, ConfigError, RegistrationError, StartupError};
use super::executor::{CommandDescriptor, Execution};
use super::key::CommandKey;
use super::merger::{CommandsFile, ConfigMerger};
use super::registry::MetadataRegistry;
use super::tree::{CommandTree, TreeBuilder};
use crate::services::ServiceCollection;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use toml_edit::DocumentMut;
use tracing::{error, info};

/// What a reload did.
pub enum ReloadOutcome {
    /// Registration has not completed, there is nothing to reload yet.
    Pending,
    /// Modifier values were swapped, the tree is unchanged.
    Refreshed,
    /// Enabled commands or aliases changed. The host must rebind the new
    /// roots; cooldowns start over.
    Rebuilt(Arc<CommandTree>),
}

struct Loaded {
    doc: DocumentMut,
    tree: Arc<CommandTree>,
}

/// Entry point for features and the host dispatcher.
pub struct CommandService {
    registry: MetadataRegistry,
    services: Arc<ServiceCollection>,
    file: Mutex<CommandsFile>,
    loaded: RwLock<Option<Loaded>>,
}

impl CommandService {
    pub fn new(services: Arc<ServiceCollection>, commands_file: impl Into<PathBuf>) -> Self {
        CommandService {
            registry: MetadataRegistry::new(),
            services,
            file: Mutex::new(CommandsFile::new(commands_file)),
            loaded: RwLock::new(None),
        }
    }

    pub fn services(&self) -> &Arc<ServiceCollection> {
        &self.services
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    pub fn register_command(
        &mut self,
        module_id: &str,
        module_name: &str,
        descriptor: CommandDescriptor,
    ) -> Result<CommandKey, RegistrationError> {
        self.registry.register(module_id, module_name, descriptor)
    }

    pub fn register_commands(
        &mut self,
        module_id: &str,
        module_name: &str,
        descriptors: impl IntoIterator<Item = CommandDescriptor>,
    ) -> Result<Vec<CommandKey>, RegistrationError> {
        self.registry.register_all(module_id, module_name, descriptors)
    }

    /// Closes registration, merges the commands file and builds the tree.
    ///
    /// Later calls only reapply modifier values and reload hooks to the
    /// controls that already exist.
    pub fn complete_registration_phase(&mut self) -> Result<Arc<CommandTree>, StartupError> {
        if let Some(loaded) = &*self.loaded.read() {
            apply(&loaded.tree, &loaded.doc, &self.services);
            return Ok(Arc::clone(&loaded.tree));
        }

        self.registry.finalize();
        let mut file = self.file.lock();
        let mut doc = file.load()?;
        let aliases = ConfigMerger::reconcile(&self.registry, &mut doc);
        file.save(&doc)?;

        let tree = Arc::new(TreeBuilder::new(&self.registry, &self.services).build(aliases));
        apply(&tree, &doc, &self.services);
        info!(
            "Registered {} commands, {} enabled under {} root commands",
            self.registry.len(),
            tree.aliases().enabled().count(),
            tree.roots().len()
        );

        *self.loaded.write() = Some(Loaded {
            doc,
            tree: Arc::clone(&tree),
        });
        Ok(tree)
    }

    /// Re-reads the commands file. On failure the error is logged and the
    /// previous configuration stays in effect.
    pub fn reload(&self) -> Result<ReloadOutcome, ConfigError> {
        let result = self.try_reload();
        if let Err(err) = &result {
            error!(
                "Could not reload {}, keeping the previous configuration: {}",
                self.file.lock().path().display(),
                err
            );
        }
        result
    }

    /// Merges and builds without holding the loaded state, so dispatch keeps
    /// using the current tree until the new one is swapped in. The file lock
    /// serializes reloads.
    fn try_reload(&self) -> Result<ReloadOutcome, ConfigError> {
        let mut file = self.file.lock();
        let Some(current) = self.tree() else {
            return Ok(ReloadOutcome::Pending);
        };

        let mut doc = file.load()?;
        let aliases = ConfigMerger::reconcile(&self.registry, &mut doc);
        file.save(&doc)?;

        if &aliases == current.aliases() {
            apply(&current, &doc, &self.services);
            if let Some(loaded) = self.loaded.write().as_mut() {
                loaded.doc = doc;
            }
            return Ok(ReloadOutcome::Refreshed);
        }

        info!("Enabled commands or aliases changed, rebuilding the command tree");
        let tree = Arc::new(TreeBuilder::new(&self.registry, &self.services).build(aliases));
        apply(&tree, &doc, &self.services);
        *self.loaded.write() = Some(Loaded {
            doc,
            tree: Arc::clone(&tree),
        });
        Ok(ReloadOutcome::Rebuilt(tree))
    }

    pub fn tree(&self) -> Option<Arc<CommandTree>> {
        self.loaded
            .read()
            .as_ref()
            .map(|loaded| Arc::clone(&loaded.tree))
    }

    pub fn control(&self, key: &str) -> Option<Arc<CommandControl>> {
        self.tree()?.control(key).cloned()
    }

    /// Runs the command bound to the root alias `alias`.
    pub fn dispatch(&self, alias: &str, invocation: Invocation) -> CommandResult<Execution> {
        let control = self
            .tree()
            .and_then(|tree| tree.root(alias).cloned())
            .ok_or_else(|| CommandError::runtime(format!("Unknown command: {}", alias)))?;
        control.dispatch(invocation)
    }
}

fn apply(tree: &CommandTree, doc: &DocumentMut, services: &ServiceCollection) {
    for control in tree.instances() {
        control.set_modifier_config(ConfigMerger::modifier_config(doc, control.metadata()));
        if let Some(executor) = control.executor() {
            executor.on_reload(services);
        }
    }
}
