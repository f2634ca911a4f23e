use crate::clock::{Clock, SystemClock};
use crate::commands::{EconomyBackend, InternalError, WarmupService};
use crate::config::CoreConfig;
use bastion_permissions::PermissionResolver;
use rustc_hash::FxHashMap;
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

/// Everything executors and the modifier pipeline depend on.
///
/// Feature-specific dependencies live in a typed extension map and are
/// looked up by executor factories at construction time.
pub struct ServiceCollection {
    permissions: Arc<PermissionResolver>,
    economy: Option<Arc<dyn EconomyBackend>>,
    warmups: Arc<WarmupService>,
    clock: Arc<dyn Clock>,
    extensions: FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ServiceCollection {
    pub fn builder(
        permissions: Arc<PermissionResolver>,
        warmups: Arc<WarmupService>,
    ) -> ServiceCollectionBuilder {
        ServiceCollectionBuilder {
            services: ServiceCollection {
                permissions,
                economy: None,
                warmups,
                clock: Arc::new(SystemClock),
                extensions: FxHashMap::default(),
            },
        }
    }

    pub fn permissions(&self) -> &PermissionResolver {
        &self.permissions
    }

    pub fn economy(&self) -> Option<&dyn EconomyBackend> {
        self.economy.as_deref()
    }

    pub fn warmups(&self) -> &Arc<WarmupService> {
        &self.warmups
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    /// Applies the reloadable parts of the core configuration.
    pub fn apply_config(&self, config: &CoreConfig) {
        self.permissions.apply_settings(config.resolver_settings());
        self.warmups.apply_settings(config.warmup_settings());
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let extension = self.extensions.get(&TypeId::of::<T>())?;
        Arc::clone(extension).downcast::<T>().ok()
    }

    /// Like [`get`](Self::get), but a missing dependency is an error.
    pub fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>, InternalError> {
        self.get::<T>().ok_or(InternalError::MissingDependency {
            name: type_name::<T>(),
        })
    }
}

pub struct ServiceCollectionBuilder {
    services: ServiceCollection,
}

impl ServiceCollectionBuilder {
    pub fn economy(mut self, economy: Arc<dyn EconomyBackend>) -> Self {
        self.services.economy = Some(economy);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.services.clock = clock;
        self
    }

    pub fn insert<T: Any + Send + Sync>(mut self, extension: Arc<T>) -> Self {
        self.services.extensions.insert(TypeId::of::<T>(), extension);
        self
    }

    pub fn build(self) -> ServiceCollection {
        self.services
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_permissions::MemoryPermissionBackend;
    use tokio::runtime::Handle;

    struct HomeStore(u32);

    #[tokio::test]
    async fn extensions_are_typed() {
        let permissions = Arc::new(PermissionResolver::new(
            Arc::new(MemoryPermissionBackend::new()),
            "bastion",
        ));
        let warmups = Arc::new(WarmupService::new(Handle::current()));
        let services = ServiceCollection::builder(permissions, warmups)
            .insert(Arc::new(HomeStore(3)))
            .build();

        assert_eq!(services.get::<HomeStore>().unwrap().0, 3);
        assert!(services.get::<String>().is_none());
        assert!(matches!(
            services.require::<String>(),
            Err(InternalError::MissingDependency { .. })
        ));
        assert!(services.economy().is_none());
    }
}
