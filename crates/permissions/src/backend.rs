use crate::level::Tristate;
use crate::subject::Subject;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// The external subject/permission store.
pub trait PermissionBackend: Send + Sync {
    /// The value explicitly configured for `permission`, `Undefined` when the
    /// store has no opinion.
    fn permission_value(&self, subject: &Subject, permission: &str) -> Tristate;

    /// The store's final answer, including its own defaults.
    fn has_permission(&self, subject: &Subject, permission: &str) -> bool {
        match self.permission_value(subject, permission) {
            Tristate::Undefined => subject.is_system(),
            value => value.as_bool(),
        }
    }

    /// A string option (meta value) attached to the subject.
    fn option(&self, subject: &Subject, key: &str) -> Option<String>;
}

#[derive(Debug)]
enum PathSegment {
    WildCard,
    Named(String),
}

#[derive(Debug)]
struct PermissionNode {
    path: Vec<PathSegment>,
    value: bool,
}

impl PermissionNode {
    fn parse(name: &str, value: bool) -> PermissionNode {
        let path = name
            .split('.')
            .map(|s| match s {
                "*" => PathSegment::WildCard,
                s => PathSegment::Named(s.to_lowercase()),
            })
            .collect();
        PermissionNode { path, value }
    }

    fn matches(&self, permission: &str) -> bool {
        let mut segments = permission.split('.');
        for node_segment in &self.path {
            match node_segment {
                PathSegment::WildCard => return true,
                PathSegment::Named(name) => match segments.next() {
                    Some(segment) if segment.eq_ignore_ascii_case(name) => {}
                    _ => return false,
                },
            }
        }
        segments.next().is_none()
    }

    fn specificity(&self) -> usize {
        self.path
            .iter()
            .take_while(|segment| matches!(segment, PathSegment::Named(_)))
            .count()
    }

    fn is_same_path(&self, other: &PermissionNode) -> bool {
        self.path.len() == other.path.len()
            && self.path.iter().zip(&other.path).all(|pair| match pair {
                (PathSegment::WildCard, PathSegment::WildCard) => true,
                (PathSegment::Named(a), PathSegment::Named(b)) => a == b,
                _ => false,
            })
    }
}

#[derive(Debug, Default)]
struct SubjectData {
    nodes: Vec<PermissionNode>,
    options: FxHashMap<String, String>,
}

impl SubjectData {
    /// The most specific matching node decides; an exact node beats a
    /// wildcard covering it.
    fn node_value(&self, permission: &str) -> Option<bool> {
        self.nodes
            .iter()
            .filter(|node| node.matches(permission))
            .max_by_key(|node| node.specificity())
            .map(|node| node.value)
    }

    fn set(&mut self, permission: &str, value: Tristate) {
        let node = PermissionNode::parse(permission, value.as_bool());
        self.nodes.retain(|existing| !existing.is_same_path(&node));
        if value.is_defined() {
            self.nodes.push(node);
        }
    }
}

/// In-memory permission store with wildcard nodes (`bastion.home.*`).
///
/// Subjects without an opinion fall through to the default subject, which
/// is where role permissions are usually granted.
#[derive(Default)]
pub struct MemoryPermissionBackend {
    subjects: RwLock<FxHashMap<Subject, SubjectData>>,
    defaults: RwLock<SubjectData>,
}

impl MemoryPermissionBackend {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_permission(&self, subject: Subject, permission: &str, value: impl Into<Tristate>) {
        self.subjects
            .write()
            .entry(subject)
            .or_default()
            .set(permission, value.into());
    }

    pub fn set_default_permission(&self, permission: &str, value: impl Into<Tristate>) {
        self.defaults.write().set(permission, value.into());
    }

    pub fn set_option(&self, subject: Subject, key: &str, value: impl Into<String>) {
        self.subjects
            .write()
            .entry(subject)
            .or_default()
            .options
            .insert(key.to_lowercase(), value.into());
    }

    pub fn clear(&self, subject: &Subject) {
        self.subjects.write().remove(subject);
    }
}

impl PermissionBackend for MemoryPermissionBackend {
    fn permission_value(&self, subject: &Subject, permission: &str) -> Tristate {
        let own = self
            .subjects
            .read()
            .get(subject)
            .and_then(|data| data.node_value(permission));
        match own.or_else(|| self.defaults.read().node_value(permission)) {
            Some(value) => Tristate::from_bool(value),
            None => Tristate::Undefined,
        }
    }

    fn option(&self, subject: &Subject, key: &str) -> Option<String> {
        let key = key.to_lowercase();
        let own = self
            .subjects
            .read()
            .get(subject)
            .and_then(|data| data.options.get(&key).cloned());
        own.or_else(|| self.defaults.read().options.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Subject = Subject::Player(1);

    #[test]
    fn exact_and_wildcard_nodes() {
        let backend = MemoryPermissionBackend::new();
        backend.set_permission(ALICE, "bastion.home.*", true);
        backend.set_permission(ALICE, "bastion.home.others", false);

        assert_eq!(backend.permission_value(&ALICE, "bastion.home.base"), Tristate::True);
        assert_eq!(backend.permission_value(&ALICE, "bastion.home.others"), Tristate::False);
        assert_eq!(backend.permission_value(&ALICE, "bastion.spawn.base"), Tristate::Undefined);
    }

    #[test]
    fn node_does_not_match_longer_permission() {
        let backend = MemoryPermissionBackend::new();
        backend.set_permission(ALICE, "bastion.home", true);
        assert_eq!(backend.permission_value(&ALICE, "bastion.home"), Tristate::True);
        assert_eq!(backend.permission_value(&ALICE, "bastion.home.base"), Tristate::Undefined);
        assert_eq!(backend.permission_value(&ALICE, "bastion"), Tristate::Undefined);
    }

    #[test]
    fn undefined_removes_node() {
        let backend = MemoryPermissionBackend::new();
        backend.set_permission(ALICE, "bastion.ban.base", true);
        backend.set_permission(ALICE, "bastion.ban.base", Tristate::Undefined);
        assert_eq!(backend.permission_value(&ALICE, "bastion.ban.base"), Tristate::Undefined);
    }

    #[test]
    fn defaults_apply_without_opinion() {
        let backend = MemoryPermissionBackend::new();
        backend.set_default_permission("bastion.user", true);
        backend.set_permission(ALICE, "bastion.user", false);

        assert_eq!(backend.permission_value(&ALICE, "bastion.user"), Tristate::False);
        assert_eq!(backend.permission_value(&Subject::Player(2), "bastion.user"), Tristate::True);
    }

    #[test]
    fn console_has_everything_by_default() {
        let backend = MemoryPermissionBackend::new();
        assert!(backend.has_permission(&Subject::Console, "anything.at.all"));
        assert!(!backend.has_permission(&ALICE, "anything.at.all"));
    }

    #[test]
    fn options_are_case_insensitive() {
        let backend = MemoryPermissionBackend::new();
        backend.set_option(ALICE, "Bastion.Level.Ban", "3");
        assert_eq!(backend.option(&ALICE, "bastion.level.ban").as_deref(), Some("3"));
        assert_eq!(backend.option(&Subject::Player(2), "bastion.level.ban"), None);
    }
}
