use bastion_core::commands::{
    CommandContext, CommandDeclaration, CommandDescriptor, CommandError, CommandExecutor,
    CommandResult, DeclaredCommand, Execution,
};
use bastion_core::ServiceCollection;
use bastion_permissions::{PermissionResolver, SuggestedLevel};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Where players are, where they live and where spawn is.
pub struct Locations {
    positions: Mutex<FxHashMap<u128, String>>,
    homes: Mutex<FxHashMap<u128, String>>,
    spawn: Mutex<String>,
}

impl Locations {
    pub fn new(spawn: &str) -> Locations {
        Locations {
            positions: Mutex::new(FxHashMap::default()),
            homes: Mutex::new(FxHashMap::default()),
            spawn: Mutex::new(spawn.to_string()),
        }
    }

    pub fn position(&self, player: u128) -> String {
        self.positions
            .lock()
            .get(&player)
            .cloned()
            .unwrap_or_else(|| self.spawn.lock().clone())
    }

    pub fn move_to(&self, player: u128, position: &str) {
        self.positions.lock().insert(player, position.to_string());
    }
}

struct Home {
    locations: Arc<Locations>,
}

impl CommandExecutor for Home {
    fn execute(&self, ctx: &mut CommandContext) -> CommandResult<Execution> {
        let player = ctx.player_id()?;
        let home = self.locations.homes.lock().get(&player).cloned();
        let Some(home) = home else {
            return Err(CommandError::runtime("You have not set a home yet, use /home set"));
        };
        self.locations.move_to(player, &home);
        ctx.reply(&format!("Teleported to your home at {}", home));
        Ok(Execution::Success)
    }
}

impl DeclaredCommand for Home {
    fn declaration() -> CommandDeclaration {
        CommandDeclaration::new(["home", "h"])
            .require_permission("bastion.home.base")
            .cooldown("bastion.home.exempt.cooldown")
            .warmup("bastion.home.exempt.warmup")
            .description("Teleports you to your home")
    }

    fn construct(services: &ServiceCollection) -> anyhow::Result<Self> {
        Ok(Home {
            locations: services.require::<Locations>()?,
        })
    }
}

struct SetHome {
    locations: Arc<Locations>,
}

impl CommandExecutor for SetHome {
    fn execute(&self, ctx: &mut CommandContext) -> CommandResult<Execution> {
        let player = ctx.player_id()?;
        let position = self.locations.position(player);
        self.locations.homes.lock().insert(player, position.clone());
        ctx.reply(&format!("Home set at {}", position));
        Ok(Execution::Success)
    }
}

impl DeclaredCommand for SetHome {
    fn declaration() -> CommandDeclaration {
        CommandDeclaration::new(["set", "#sethome"])
            .parent::<Home>()
            .require_permission("bastion.home.set")
            .description("Sets your home to where you stand")
    }

    fn construct(services: &ServiceCollection) -> anyhow::Result<Self> {
        Ok(SetHome {
            locations: services.require::<Locations>()?,
        })
    }
}

struct Spawn {
    locations: Arc<Locations>,
}

impl CommandExecutor for Spawn {
    fn execute(&self, ctx: &mut CommandContext) -> CommandResult<Execution> {
        let player = ctx.player_id()?;
        let spawn = self.locations.spawn.lock().clone();
        self.locations.move_to(player, &spawn);
        ctx.reply(&format!("Teleported to spawn at {}", spawn));
        Ok(Execution::Success)
    }

    fn on_reload(&self, _services: &ServiceCollection) {
        debug!("Spawn is at {}", self.locations.spawn.lock());
    }
}

impl DeclaredCommand for Spawn {
    fn declaration() -> CommandDeclaration {
        CommandDeclaration::new(["spawn"])
            .require_permission("bastion.spawn.base")
            .warmup("bastion.spawn.exempt.warmup")
            .cost("bastion.spawn.exempt.cost")
            .prefix_aliases_with_n()
            .description("Teleports you to spawn")
    }

    fn construct(services: &ServiceCollection) -> anyhow::Result<Self> {
        Ok(Spawn {
            locations: services.require::<Locations>()?,
        })
    }
}

struct SetSpawn {
    locations: Arc<Locations>,
}

impl CommandExecutor for SetSpawn {
    fn execute(&self, ctx: &mut CommandContext) -> CommandResult<Execution> {
        let position = match ctx.subject().player_id() {
            Some(player) => self.locations.position(player),
            None => ctx.arg(0)?.to_string(),
        };
        *self.locations.spawn.lock() = position.clone();
        ctx.reply(&format!("Spawn set to {}", position));
        Ok(Execution::Success)
    }
}

impl DeclaredCommand for SetSpawn {
    fn declaration() -> CommandDeclaration {
        CommandDeclaration::new(["setspawn"])
            .require_permission("bastion.setspawn.base")
            .modifier_override("spawn")
            .description("Moves spawn")
    }

    fn construct(services: &ServiceCollection) -> anyhow::Result<Self> {
        Ok(SetSpawn {
            locations: services.require::<Locations>()?,
        })
    }
}

pub(super) fn register_permissions(permissions: &mut PermissionResolver) {
    permissions.register("bastion.home", SuggestedLevel::User, true, "teleport");
    permissions.register("bastion.home.exempt", SuggestedLevel::Admin, true, "teleport");
    permissions.register("bastion.spawn.base", SuggestedLevel::User, false, "teleport");
    permissions.register("bastion.spawn.exempt", SuggestedLevel::Admin, true, "teleport");
    permissions.register("bastion.setspawn.base", SuggestedLevel::Admin, false, "teleport");
}

pub(super) fn commands() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor::of::<Home>(),
        CommandDescriptor::of::<SetHome>(),
        CommandDescriptor::of::<Spawn>(),
        CommandDescriptor::of::<SetSpawn>(),
    ]
}
