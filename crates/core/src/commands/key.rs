use super::error::RegistrationError;
use super::metadata::{CommandDeclaration, ExecutorId};
use indexmap::IndexSet;
use std::borrow::Borrow;
use std::fmt;

/// Dot-delimited, lower-cased path of a command: the canonical alias of
/// every ancestor followed by the command's own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandKey(String);

impl CommandKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    pub fn last_segment(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    pub fn parent(&self) -> Option<CommandKey> {
        self.0
            .rsplit_once('.')
            .map(|(parent, _)| CommandKey(parent.to_string()))
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The key as typed by a player, e.g. `home set`.
    pub fn command_line(&self) -> String {
        self.0.replace('.', " ")
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CommandKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommandKey {
    fn from(key: &str) -> Self {
        CommandKey(key.to_lowercase())
    }
}

/// Walks the parent chain of `declaration`, failing on the first executor
/// that is visited twice.
pub(super) fn compute_key(
    executor: ExecutorId,
    declaration: &CommandDeclaration,
) -> Result<CommandKey, RegistrationError> {
    let mut segments = vec![canonical_alias(executor, declaration)?];
    let mut traversed = IndexSet::new();
    let mut parent = declaration.parent;

    while let Some(current) = parent {
        if !traversed.insert(current) {
            let chain = traversed
                .iter()
                .map(ExecutorId::name)
                .chain(std::iter::once(current.name()))
                .collect();
            return Err(RegistrationError::CircularParent { chain });
        }
        let parent_declaration = current.declaration();
        segments.push(canonical_alias(current, &parent_declaration)?);
        parent = parent_declaration.parent;
    }

    segments.reverse();
    Ok(CommandKey(segments.join(".")))
}

fn canonical_alias(
    executor: ExecutorId,
    declaration: &CommandDeclaration,
) -> Result<String, RegistrationError> {
    let alias = declaration
        .canonical_alias()
        .ok_or_else(|| RegistrationError::Malformed {
            executor: executor.name(),
            reason: "no aliases declared".to_string(),
        })?;
    if alias.is_empty() || alias.contains(|c: char| c == '.' || c.is_whitespace()) {
        return Err(RegistrationError::Malformed {
            executor: executor.name(),
            reason: format!("invalid alias {alias:?}"),
        });
    }
    Ok(alias)
}
