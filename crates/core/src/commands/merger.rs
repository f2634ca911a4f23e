use super::error::ConfigError;
use super::key::CommandKey;
use super::metadata::CommandMetadata;
use super::modifier::ModifierConfig;
use super::registry::MetadataRegistry;
use indexmap::{IndexMap, IndexSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, InlineTable, Item, Table, TableLike, Value};
use tracing::{debug, warn};

const ENABLED: &str = "enabled";
const ROOT_ALIASES: &str = "root level aliases";

/// The persisted, operator-editable command configuration.
pub struct CommandsFile {
    path: PathBuf,
    /// What is on disk as far as we know, `None` if the file is missing.
    contents: Option<String>,
}

impl CommandsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CommandsFile {
            path: path.into(),
            contents: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file. A missing file is an empty tree.
    pub fn load(&mut self) -> Result<DocumentMut, ConfigError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let doc = contents
            .as_deref()
            .unwrap_or_default()
            .parse::<DocumentMut>()
            .map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;
        self.contents = contents;
        Ok(doc)
    }

    /// Writes `doc` back unless the file already holds exactly that.
    pub fn save(&mut self, doc: &DocumentMut) -> Result<bool, ConfigError> {
        let contents = doc.to_string();
        if self.contents.as_deref() == Some(contents.as_str()) {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, &contents).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("Wrote {}", self.path.display());
        self.contents = Some(contents);
        Ok(true)
    }
}

/// Alias scope: the root of the command namespace, or the children of one
/// command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Root,
    Children(CommandKey),
}

/// Enabled commands and the aliases that reach them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EffectiveAliasSet {
    enabled: IndexSet<CommandKey>,
    namespaces: IndexMap<Namespace, IndexMap<String, CommandKey>>,
}

impl EffectiveAliasSet {
    pub fn is_enabled(&self, key: &str) -> bool {
        self.enabled.contains(key)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &CommandKey> {
        self.enabled.iter()
    }

    /// Binds `alias` in `namespace`. An alias already bound to another
    /// command keeps its first owner.
    pub fn insert(&mut self, namespace: Namespace, alias: &str, key: &CommandKey) -> bool {
        let aliases = self.namespaces.entry(namespace).or_default();
        match aliases.get(alias) {
            Some(existing) if existing == key => true,
            Some(existing) => {
                warn!(
                    "Alias {} of command {} is already used by command {}, ignoring it",
                    alias, key, existing
                );
                false
            }
            None => {
                aliases.insert(alias.to_string(), key.clone());
                true
            }
        }
    }

    pub fn resolve(&self, namespace: &Namespace, alias: &str) -> Option<&CommandKey> {
        self.namespaces.get(namespace)?.get(&alias.to_lowercase())
    }

    /// Aliases in `namespace` that lead to `key`, in binding order.
    pub fn aliases_for<'a>(
        &'a self,
        namespace: &Namespace,
        key: &'a CommandKey,
    ) -> impl Iterator<Item = &'a str> + use<'a> {
        self.namespaces
            .get(namespace)
            .into_iter()
            .flatten()
            .filter(move |(_, target)| *target == key)
            .map(|(alias, _)| alias.as_str())
    }

    pub fn root_aliases_for<'a>(&'a self, key: &'a CommandKey) -> impl Iterator<Item = &'a str> {
        self.aliases_for(&Namespace::Root, key)
    }
}

/// Reconciles declared commands with the persisted tree.
pub struct ConfigMerger;

impl ConfigMerger {
    /// Adds every missing command, alias and modifier default to `doc`,
    /// leaving existing values alone, and returns what is enabled.
    ///
    /// Running it again on its own output changes nothing.
    pub fn reconcile(registry: &MetadataRegistry, doc: &mut DocumentMut) -> EffectiveAliasSet {
        for metadata in registry.metadata() {
            let Some(node) = command_node(doc, metadata) else {
                continue;
            };
            merge_defaults(metadata, node);
        }
        Self::effective_aliases(registry, doc)
    }

    /// What the tree enables, without touching it.
    pub fn effective_aliases(registry: &MetadataRegistry, doc: &DocumentMut) -> EffectiveAliasSet {
        let mut effective = EffectiveAliasSet::default();
        for metadata in registry.metadata() {
            let Some(node) = doc.get(metadata.key().as_str()).and_then(Item::as_table_like) else {
                continue;
            };
            if !node.get(ENABLED).and_then(Item::as_bool).unwrap_or(false) {
                continue;
            }
            let key = metadata.key();
            effective.enabled.insert(key.clone());

            if let Some(parent) = key.parent() {
                for alias in metadata.sub_aliases() {
                    effective.insert(Namespace::Children(parent.clone()), alias, key);
                }
            }
            for alias in enabled_root_aliases(metadata, node) {
                effective.insert(Namespace::Root, &alias, key);
            }
        }
        effective
    }

    /// Modifier values for a command, read from its modifier node.
    pub fn modifier_config(doc: &DocumentMut, metadata: &CommandMetadata) -> ModifierConfig {
        let key = metadata.modifier_key();
        match doc.get(key).and_then(Item::as_table_like) {
            Some(node) => ModifierConfig::from_table(key, node),
            None => {
                debug!("No modifier configuration at {} for {}", key, metadata.key());
                ModifierConfig::default()
            }
        }
    }
}

fn command_node<'a>(doc: &'a mut DocumentMut, metadata: &CommandMetadata) -> Option<&'a mut dyn TableLike> {
    let key = metadata.key().as_str();
    let item = doc.entry(key).or_insert_with(|| Item::Table(new_node(metadata)));
    if !item.is_table_like() {
        warn!("Replacing malformed entry for command {} in the commands file", key);
        *item = Item::Table(new_node(metadata));
    }
    item.as_table_like_mut()
}

fn new_node(metadata: &CommandMetadata) -> Table {
    let mut comment = format!("\n# /{}", metadata.key().command_line());
    if let Some(description) = metadata.description() {
        comment.push_str(&format!(": {}", description));
    }
    comment.push_str("\n# enabled: set to true to make the command available\n");
    if !metadata.root_aliases().is_empty() {
        comment.push_str("# root level aliases: which aliases may be used at the top level\n");
    }
    if !metadata.is_modifier_key_redirected() && metadata.modifiers().iter().any(|m| m.kind.config_key().is_some()) {
        comment.push_str("# cooldown and warmup are in seconds, cost is charged on success\n");
    }

    let mut table = Table::new();
    table.decor_mut().set_prefix(comment);
    table
}

fn merge_defaults(metadata: &CommandMetadata, node: &mut dyn TableLike) {
    if !node.contains_key(ENABLED) {
        node.insert(ENABLED, toml_edit::value(false));
    }

    if !metadata.root_aliases().is_empty() {
        if !node.get(ROOT_ALIASES).is_some_and(Item::is_table_like) {
            if node.contains_key(ROOT_ALIASES) {
                warn!("Replacing malformed root level aliases of command {}", metadata.key());
            }
            node.insert(ROOT_ALIASES, Item::Value(Value::InlineTable(InlineTable::new())));
        }
        if let Some(aliases) = node.get_mut(ROOT_ALIASES).and_then(Item::as_table_like_mut) {
            for alias in metadata.root_aliases() {
                if !aliases.contains_key(alias) {
                    let enabled = !metadata.disabled_by_default().contains(alias);
                    aliases.insert(alias, toml_edit::value(enabled));
                }
            }
        }
    }

    if metadata.is_modifier_key_redirected() {
        return;
    }
    for modifier in metadata.modifiers() {
        let (Some(name), Some(default)) = (modifier.kind.config_key(), ModifierConfig::default_item(&modifier.kind)) else {
            continue;
        };
        if !node.contains_key(name) {
            node.insert(name, default);
        }
    }
}

/// Declared aliases in declared order, then any the operator added.
fn enabled_root_aliases(metadata: &CommandMetadata, node: &dyn TableLike) -> Vec<String> {
    let Some(aliases) = node.get(ROOT_ALIASES).and_then(Item::as_table_like) else {
        return Vec::new();
    };
    let declared = metadata
        .root_aliases()
        .iter()
        .filter(|alias| aliases.get(alias).and_then(Item::as_bool).unwrap_or(false))
        .cloned();
    let added = aliases
        .iter()
        .filter(|(alias, value)| {
            !metadata.root_aliases().iter().any(|declared| declared == alias)
                && value.as_bool().unwrap_or(false)
        })
        .filter_map(|(alias, _)| {
            let alias = alias.to_lowercase();
            if alias.is_empty() || alias.contains(|c: char| c == '.' || c.is_whitespace()) {
                warn!("Ignoring invalid alias {:?} for command {}", alias, metadata.key());
                None
            } else {
                Some(alias)
            }
        });
    declared.chain(added).collect()
}
