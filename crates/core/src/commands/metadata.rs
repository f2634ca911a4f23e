use super::key::CommandKey;
use super::executor::DeclaredCommand;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable identity of an executor type.
///
/// Carries the executor's own declaration so a parent chain can be walked
/// without the parent having been registered.
#[derive(Clone, Copy)]
pub struct ExecutorId {
    type_id: TypeId,
    name: &'static str,
    declaration: fn() -> CommandDeclaration,
}

impl ExecutorId {
    pub fn of<T: DeclaredCommand>() -> Self {
        ExecutorId {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            declaration: T::declaration,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declaration(&self) -> CommandDeclaration {
        (self.declaration)()
    }
}

impl PartialEq for ExecutorId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ExecutorId {}

impl Hash for ExecutorId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ExecutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The per-command policy kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    Cooldown,
    Warmup,
    Cost,
    /// Compare the invoker's level against the command's target.
    PermissionLevel {
        key: String,
        fallback_permission: String,
        allow_equal: bool,
    },
}

impl ModifierKind {
    /// The configuration key holding this modifier's default, if it has one.
    pub fn config_key(&self) -> Option<&'static str> {
        match self {
            ModifierKind::Cooldown => Some("cooldown"),
            ModifierKind::Warmup => Some("warmup"),
            ModifierKind::Cost => Some("cost"),
            ModifierKind::PermissionLevel { .. } => None,
        }
    }

    /// Whether only players are subject to this modifier.
    pub fn players_only(&self) -> bool {
        !matches!(self, ModifierKind::PermissionLevel { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModifierDeclaration {
    pub kind: ModifierKind,
    pub exempt_permission: Option<String>,
}

impl ModifierDeclaration {
    pub fn new(kind: ModifierKind) -> Self {
        ModifierDeclaration {
            kind,
            exempt_permission: None,
        }
    }

    pub fn exempt(mut self, permission: impl Into<String>) -> Self {
        self.exempt_permission = Some(permission.into());
        self
    }
}

/// What a feature declares about one of its commands.
///
/// Aliases may carry a marker: `#alias` also offers a subcommand alias at
/// the root, `$alias` is a root alias that starts out disabled.
#[derive(Debug, Clone)]
pub struct CommandDeclaration {
    pub(super) aliases: Vec<String>,
    pub(super) parent: Option<ExecutorId>,
    pub(super) base_permissions: Vec<String>,
    pub(super) modifiers: Vec<ModifierDeclaration>,
    pub(super) description: Option<String>,
    pub(super) prefix_aliases_with_n: bool,
    pub(super) modifier_override: Option<String>,
    pub(super) has_executor: bool,
}

impl CommandDeclaration {
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandDeclaration {
            aliases: aliases.into_iter().map(Into::into).collect(),
            parent: None,
            base_permissions: Vec::new(),
            modifiers: Vec::new(),
            description: None,
            prefix_aliases_with_n: false,
            modifier_override: None,
            has_executor: true,
        }
    }

    pub fn parent<T: DeclaredCommand>(self) -> Self {
        self.parent_id(ExecutorId::of::<T>())
    }

    pub fn parent_id(mut self, parent: ExecutorId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn require_permission(mut self, permission: impl Into<String>) -> Self {
        self.base_permissions.push(permission.into());
        self
    }

    pub fn modifier(mut self, modifier: ModifierDeclaration) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn cooldown(self, exempt_permission: impl Into<String>) -> Self {
        self.modifier(ModifierDeclaration::new(ModifierKind::Cooldown).exempt(exempt_permission))
    }

    pub fn warmup(self, exempt_permission: impl Into<String>) -> Self {
        self.modifier(ModifierDeclaration::new(ModifierKind::Warmup).exempt(exempt_permission))
    }

    pub fn cost(self, exempt_permission: impl Into<String>) -> Self {
        self.modifier(ModifierDeclaration::new(ModifierKind::Cost).exempt(exempt_permission))
    }

    pub fn permission_level(
        self,
        key: impl Into<String>,
        fallback_permission: impl Into<String>,
        allow_equal: bool,
    ) -> Self {
        self.modifier(ModifierDeclaration::new(ModifierKind::PermissionLevel {
            key: key.into(),
            fallback_permission: fallback_permission.into(),
            allow_equal,
        }))
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn prefix_aliases_with_n(mut self) -> Self {
        self.prefix_aliases_with_n = true;
        self
    }

    /// Read modifier values (and share cooldowns) with the command at `key`.
    pub fn modifier_override(mut self, key: impl Into<String>) -> Self {
        self.modifier_override = Some(key.into().to_lowercase());
        self
    }

    /// A grouping command that only hosts subcommands.
    pub fn without_executor(mut self) -> Self {
        self.has_executor = false;
        self
    }

    /// The first alias with any marker removed.
    pub(super) fn canonical_alias(&self) -> Option<String> {
        self.aliases.first().map(|alias| strip_marker(alias).to_lowercase())
    }
}

fn strip_marker(alias: &str) -> &str {
    alias
        .strip_prefix('#')
        .or_else(|| alias.strip_prefix('$'))
        .unwrap_or(alias)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SplitAliases {
    root: Vec<String>,
    sub: Vec<String>,
    disabled: Vec<String>,
}

fn split_aliases(aliases: &[String], is_root: bool, add_prefix: bool) -> SplitAliases {
    fn with_prefix(alias: String, add_prefix: bool) -> impl Iterator<Item = String> {
        let prefixed = add_prefix.then(|| format!("n{alias}"));
        std::iter::once(alias).chain(prefixed)
    }

    let mut split = SplitAliases::default();
    for alias in aliases {
        if let Some(alias) = alias.strip_prefix('#') {
            split.root.extend(with_prefix(alias.to_lowercase(), add_prefix));
        } else if let Some(alias) = alias.strip_prefix('$') {
            let aliases: Vec<_> = with_prefix(alias.to_lowercase(), add_prefix).collect();
            split.disabled.extend(aliases.iter().cloned());
            split.root.extend(aliases);
        } else if is_root {
            split.root.extend(with_prefix(alias.to_lowercase(), add_prefix));
        } else {
            split.sub.push(alias.to_lowercase());
        }
    }
    split
}

/// Immutable descriptor of a registered command.
#[derive(Debug)]
pub struct CommandMetadata {
    module_id: String,
    module_name: String,
    key: CommandKey,
    executor: ExecutorId,
    declaration: CommandDeclaration,
    root_aliases: Vec<String>,
    sub_aliases: Vec<String>,
    disabled_by_default: Vec<String>,
}

impl CommandMetadata {
    pub(super) fn new(
        module_id: &str,
        module_name: &str,
        key: CommandKey,
        executor: ExecutorId,
        declaration: CommandDeclaration,
    ) -> Self {
        let split = split_aliases(
            &declaration.aliases,
            declaration.parent.is_none(),
            declaration.prefix_aliases_with_n,
        );
        CommandMetadata {
            module_id: module_id.to_string(),
            module_name: module_name.to_string(),
            key,
            executor,
            declaration,
            root_aliases: split.root,
            sub_aliases: split.sub,
            disabled_by_default: split.disabled,
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    /// The configuration node that holds this command's modifier values.
    pub fn modifier_key(&self) -> &str {
        self.declaration
            .modifier_override
            .as_deref()
            .unwrap_or(self.key.as_str())
    }

    pub fn is_modifier_key_redirected(&self) -> bool {
        self.declaration.modifier_override.is_some()
    }

    pub fn executor(&self) -> ExecutorId {
        self.executor
    }

    pub fn parent(&self) -> Option<ExecutorId> {
        self.declaration.parent
    }

    pub fn is_root(&self) -> bool {
        self.declaration.parent.is_none()
    }

    pub fn has_executor(&self) -> bool {
        self.declaration.has_executor
    }

    /// Declared aliases, markers stripped. The first one is canonical.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.declaration.aliases.iter().map(|alias| strip_marker(alias))
    }

    pub fn canonical_alias(&self) -> &str {
        self.key.last_segment()
    }

    /// Aliases offered at the root, in declared order.
    pub fn root_aliases(&self) -> &[String] {
        &self.root_aliases
    }

    /// Aliases valid under the parent command.
    pub fn sub_aliases(&self) -> &[String] {
        &self.sub_aliases
    }

    pub fn disabled_by_default(&self) -> &[String] {
        &self.disabled_by_default
    }

    pub fn base_permissions(&self) -> &[String] {
        &self.declaration.base_permissions
    }

    pub fn modifiers(&self) -> &[ModifierDeclaration] {
        &self.declaration.modifiers
    }

    pub fn declares(&self, kind: &ModifierKind) -> bool {
        self.declaration.modifiers.iter().any(|m| &m.kind == kind)
    }

    pub fn permission_level_keys(&self) -> impl Iterator<Item = &str> {
        self.declaration.modifiers.iter().filter_map(|m| match &m.kind {
            ModifierKind::PermissionLevel { key, .. } => Some(key.as_str()),
            _ => None,
        })
    }

    pub fn description(&self) -> Option<&str> {
        self.declaration.description.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(aliases: &[&str]) -> Vec<String> {
        aliases.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn root_aliases_keep_declared_order() {
        let split = split_aliases(&strings(&["Home", "h", "$homes"]), true, false);
        assert_eq!(split.root, ["home", "h", "homes"]);
        assert_eq!(split.disabled, ["homes"]);
        assert!(split.sub.is_empty());
    }

    #[test]
    fn subcommand_aliases() {
        let split = split_aliases(&strings(&["set", "#sethome", "$createhome"]), false, false);
        assert_eq!(split.sub, ["set"]);
        assert_eq!(split.root, ["sethome", "createhome"]);
        assert_eq!(split.disabled, ["createhome"]);
    }

    #[test]
    fn n_prefixed_aliases_follow_their_alias() {
        let split = split_aliases(&strings(&["spawn", "$s"]), true, true);
        assert_eq!(split.root, ["spawn", "nspawn", "s", "ns"]);
        assert_eq!(split.disabled, ["s", "ns"]);
    }

    #[test]
    fn canonical_alias_strips_markers() {
        let declaration = CommandDeclaration::new(["#SetHome", "set"]);
        assert_eq!(declaration.canonical_alias().as_deref(), Some("sethome"));
        assert_eq!(CommandDeclaration::new(Vec::<String>::new()).canonical_alias(), None);
    }
}
