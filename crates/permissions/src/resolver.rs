use crate::backend::PermissionBackend;
use crate::level::{SuggestedLevel, Tristate};
use crate::subject::Subject;
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Registration record for one permission string (or permission prefix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMetadata {
    permission: String,
    suggested_level: SuggestedLevel,
    is_prefix: bool,
    module_id: String,
}

impl PermissionMetadata {
    pub fn permission(&self) -> &str {
        &self.permission
    }

    pub fn suggested_level(&self) -> SuggestedLevel {
        self.suggested_level
    }

    pub fn is_prefix(&self) -> bool {
        self.is_prefix
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }
}

/// Settings that may change on reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Fall back to the suggested level's role permission when the store
    /// has no opinion.
    pub use_suggested_levels: bool,
    pub console_override: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            use_suggested_levels: true,
            console_override: false,
        }
    }
}

pub struct PermissionResolver {
    backend: Arc<dyn PermissionBackend>,
    namespace: String,
    settings: RwLock<ResolverSettings>,
    metadata: FxHashMap<String, PermissionMetadata>,
    prefix_metadata: FxHashMap<String, PermissionMetadata>,
    /// Unregistered permissions that have already been reported.
    failed_checks: Mutex<FxHashSet<String>>,
}

impl PermissionResolver {
    pub fn new(backend: Arc<dyn PermissionBackend>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into().trim_end_matches('.').to_lowercase();
        PermissionResolver {
            backend,
            namespace,
            settings: RwLock::new(ResolverSettings::default()),
            metadata: FxHashMap::default(),
            prefix_metadata: FxHashMap::default(),
            failed_checks: Mutex::new(FxHashSet::default()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn backend(&self) -> &Arc<dyn PermissionBackend> {
        &self.backend
    }

    pub fn settings(&self) -> ResolverSettings {
        *self.settings.read()
    }

    pub fn apply_settings(&self, settings: ResolverSettings) {
        *self.settings.write() = settings;
    }

    pub fn register(
        &mut self,
        permission: &str,
        level: SuggestedLevel,
        is_prefix: bool,
        module_id: &str,
    ) -> &PermissionMetadata {
        let permission = permission.to_lowercase();
        debug!("Registering permission {} ({}) for {}", permission, level, module_id);
        let metadata = PermissionMetadata {
            permission: permission.clone(),
            suggested_level: level,
            is_prefix,
            module_id: module_id.to_string(),
        };
        let map = if is_prefix {
            &mut self.prefix_metadata
        } else {
            &mut self.metadata
        };
        map.insert(permission.clone(), metadata);
        &map[&permission]
    }

    pub fn metadata_for(&self, permission: &str) -> Option<&PermissionMetadata> {
        self.metadata.get(&permission.to_lowercase())
    }

    pub fn all_metadata(&self) -> impl Iterator<Item = &PermissionMetadata> {
        self.metadata
            .values()
            .sorted_by(|a, b| a.permission.cmp(&b.permission))
    }

    pub fn permissions_for_level(&self, level: SuggestedLevel) -> Vec<&PermissionMetadata> {
        self.metadata
            .values()
            .chain(self.prefix_metadata.values())
            .filter(|metadata| metadata.suggested_level == level)
            .sorted_by(|a, b| a.permission.cmp(&b.permission))
            .collect()
    }

    pub fn has_permission(&self, subject: &Subject, permission: &str) -> bool {
        match self.has_permission_tristate(subject, permission) {
            Tristate::Undefined => self.backend.has_permission(subject, permission),
            value => value.as_bool(),
        }
    }

    pub fn has_permission_with_console_override(
        &self,
        subject: &Subject,
        permission: &str,
        if_console: bool,
    ) -> bool {
        if self.is_console_override(subject) {
            return if_console;
        }
        self.has_permission(subject, permission)
    }

    pub fn is_console_override(&self, subject: &Subject) -> bool {
        self.settings.read().console_override && subject.is_system()
    }

    /// Asks the store first. If it has no opinion and the permission belongs
    /// to our namespace, the registered metadata (exact, then longest prefix)
    /// decides which role permission to ask about instead.
    pub fn has_permission_tristate(&self, subject: &Subject, permission: &str) -> Tristate {
        let permission = permission.to_lowercase();
        let direct = self.backend.permission_value(subject, &permission);
        if direct.is_defined() || !self.settings.read().use_suggested_levels {
            return direct;
        }
        if !self.in_namespace(&permission) {
            return Tristate::Undefined;
        }

        let registered = self.metadata.get(&permission).or_else(|| {
            self.prefix_metadata
                .iter()
                .filter(|(prefix, _)| permission.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, metadata)| metadata)
        });

        match registered {
            Some(metadata) => match metadata.suggested_level.role_permission(&self.namespace) {
                Some(role) => self.backend.permission_value(subject, &role),
                None => direct,
            },
            None => {
                if self.failed_checks.lock().insert(permission.clone()) {
                    warn!(
                        "Permission {} was checked but never registered; treating it as undefined",
                        permission
                    );
                }
                Tristate::Undefined
            }
        }
    }

    fn in_namespace(&self, permission: &str) -> bool {
        permission
            .strip_prefix(self.namespace.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    }

    /// The first option present among `keys`. An empty value counts as unset.
    pub fn option(&self, subject: &Subject, keys: &[&str]) -> Option<String> {
        for key in keys {
            if let Some(value) = self.backend.option(subject, &key.to_lowercase()) {
                return if value.is_empty() { None } else { Some(value) };
            }
        }
        None
    }

    pub fn int_option(&self, subject: &Subject, keys: &[&str]) -> Option<i32> {
        self.option(subject, keys)?.trim().parse().ok()
    }

    pub fn positive_int_option(&self, subject: &Subject, keys: &[&str]) -> Option<u32> {
        self.option(subject, keys)?.trim().parse().ok()
    }

    pub fn double_option(&self, subject: &Subject, keys: &[&str]) -> Option<f64> {
        self.option(subject, keys)?
            .trim()
            .parse()
            .ok()
            .filter(|value: &f64| value.is_finite())
    }

    /// The level a subject explicitly declares through the `level_key` option.
    pub fn permission_level(&self, subject: &Subject, level_key: &str) -> Option<i32> {
        self.int_option(subject, &[level_key])
    }

    /// Whether `actor` may act on `actee`.
    ///
    /// Undeclared levels fall back to 1 (or `i32::MAX` for the console) when
    /// the subject holds `fallback_permission`, otherwise 0.
    pub fn level_ok(
        &self,
        actor: &Subject,
        actee: &Subject,
        level_key: &str,
        fallback_permission: &str,
        allow_equal: bool,
    ) -> bool {
        let actor_level = self.effective_level(actor, level_key, fallback_permission);
        let actee_level = self.effective_level(actee, level_key, fallback_permission);
        if allow_equal {
            actor_level >= actee_level
        } else {
            actor_level > actee_level
        }
    }

    fn effective_level(&self, subject: &Subject, level_key: &str, fallback_permission: &str) -> i32 {
        self.permission_level(subject, level_key).unwrap_or_else(|| {
            if self.has_permission(subject, fallback_permission) {
                default_level(subject)
            } else {
                0
            }
        })
    }
}

fn default_level(subject: &Subject) -> i32 {
    if subject.is_system() { i32::MAX } else { 1 }
}
