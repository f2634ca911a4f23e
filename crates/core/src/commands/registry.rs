use super::error::RegistrationError;
use super::executor::{CommandDescriptor, ExecutorFactory};
use super::key::{compute_key, CommandKey};
use super::metadata::{CommandMetadata, ExecutorId};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub(super) struct RegisteredCommand {
    pub(super) metadata: Arc<CommandMetadata>,
    pub(super) factory: ExecutorFactory,
}

/// Collects command declarations until registration is finalized. After
/// that the set is frozen.
#[derive(Default)]
pub struct MetadataRegistry {
    commands: IndexMap<CommandKey, RegisteredCommand>,
    finalized: bool,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register(
        &mut self,
        module_id: &str,
        module_name: &str,
        descriptor: CommandDescriptor,
    ) -> Result<CommandKey, RegistrationError> {
        if self.finalized {
            return Err(RegistrationError::AlreadyFinalized);
        }
        let CommandDescriptor {
            executor,
            declaration,
            factory,
        } = descriptor;

        if module_id.trim().is_empty() {
            return Err(malformed(executor, "module id is empty"));
        }
        for alias in &declaration.aliases {
            let bare = alias.trim_start_matches(['#', '$']);
            if bare.is_empty() || bare.contains(|c: char| c == '.' || c.is_whitespace()) {
                return Err(malformed(executor, &format!("invalid alias {alias:?}")));
            }
        }
        if declaration
            .modifier_override
            .as_ref()
            .is_some_and(|key| key.trim().is_empty())
        {
            return Err(malformed(executor, "modifier override is empty"));
        }

        let key = compute_key(executor, &declaration)?;
        if self.commands.contains_key(&key) {
            return Err(RegistrationError::Duplicate {
                key: key.to_string(),
            });
        }

        debug!("Registering command {} from module {}", key, module_id);
        let metadata = CommandMetadata::new(module_id, module_name, key.clone(), executor, declaration);
        self.commands.insert(
            key.clone(),
            RegisteredCommand {
                metadata: Arc::new(metadata),
                factory,
            },
        );
        Ok(key)
    }

    pub fn register_all(
        &mut self,
        module_id: &str,
        module_name: &str,
        descriptors: impl IntoIterator<Item = CommandDescriptor>,
    ) -> Result<Vec<CommandKey>, RegistrationError> {
        descriptors
            .into_iter()
            .map(|descriptor| self.register(module_id, module_name, descriptor))
            .collect()
    }

    /// Closes registration. Calling it again is harmless.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn get(&self, key: &str) -> Option<&Arc<CommandMetadata>> {
        self.commands.get(key).map(|command| &command.metadata)
    }

    /// Registered metadata in registration order.
    pub fn metadata(&self) -> impl Iterator<Item = &Arc<CommandMetadata>> {
        self.commands.values().map(|command| &command.metadata)
    }

    pub(super) fn commands(&self) -> impl Iterator<Item = &RegisteredCommand> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn malformed(executor: ExecutorId, reason: &str) -> RegistrationError {
    RegistrationError::Malformed {
        executor: executor.name(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::declared;
    use crate::commands::CommandDeclaration;

    declared!(Ban, CommandDeclaration::new(["ban"]));
    declared!(TempBan, CommandDeclaration::new(["tempban", "tb"]));
    declared!(Broken, CommandDeclaration::new(["broken", "bad alias"]));
    declared!(Loop, CommandDeclaration::new(["loop"]).parent::<Loop>());

    #[test]
    fn registers_in_order() {
        let mut registry = MetadataRegistry::new();
        let keys = registry
            .register_all(
                "moderation",
                "Moderation",
                [CommandDescriptor::of::<TempBan>(), CommandDescriptor::of::<Ban>()],
            )
            .unwrap();
        assert_eq!(keys, [CommandKey::from("tempban"), CommandKey::from("ban")]);
        let order: Vec<_> = registry.metadata().map(|m| m.key().as_str()).collect();
        assert_eq!(order, ["tempban", "ban"]);
        assert_eq!(registry.get("tempban").unwrap().module_name(), "Moderation");
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut registry = MetadataRegistry::new();
        registry.register("moderation", "Moderation", CommandDescriptor::of::<Ban>()).unwrap();
        let err = registry
            .register("other", "Other", CommandDescriptor::of::<Ban>())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Duplicate { key } if key == "ban"));
    }

    #[test]
    fn registration_closes() {
        let mut registry = MetadataRegistry::new();
        registry.finalize();
        registry.finalize();
        assert!(matches!(
            registry.register("moderation", "Moderation", CommandDescriptor::of::<Ban>()),
            Err(RegistrationError::AlreadyFinalized)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn malformed_declarations_are_rejected() {
        let mut registry = MetadataRegistry::new();
        assert!(matches!(
            registry.register("moderation", "Moderation", CommandDescriptor::of::<Broken>()),
            Err(RegistrationError::Malformed { .. })
        ));
        assert!(matches!(
            registry.register(" ", "Moderation", CommandDescriptor::of::<Ban>()),
            Err(RegistrationError::Malformed { .. })
        ));
    }

    #[test]
    fn cycle_fails_before_anything_is_stored() {
        let mut registry = MetadataRegistry::new();
        assert!(matches!(
            registry.register("loop", "Loop", CommandDescriptor::of::<Loop>()),
            Err(RegistrationError::CircularParent { .. })
        ));
        assert_eq!(registry.len(), 0);
    }
}
