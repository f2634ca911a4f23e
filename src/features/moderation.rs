use super::parse_player;
use bastion_core::commands::{
    CommandContext, CommandDeclaration, CommandDescriptor, CommandError, CommandExecutor,
    CommandResult, DeclaredCommand, Execution,
};
use bastion_core::ServiceCollection;
use bastion_permissions::{HyphenatedUuid, PermissionResolver, Subject, SuggestedLevel};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::Arc;

#[derive(Default)]
pub struct Bans {
    banned: Mutex<FxHashSet<u128>>,
}

impl Bans {
    pub fn is_banned(&self, player: u128) -> bool {
        self.banned.lock().contains(&player)
    }

    /// Returns false if `player` was already banned.
    pub fn ban(&self, player: u128) -> bool {
        self.banned.lock().insert(player)
    }

    /// Returns false if `player` was not banned.
    pub fn unban(&self, player: u128) -> bool {
        self.banned.lock().remove(&player)
    }
}

/// Backs both `/ban` and `/tempban`, which therefore share a cooldown.
struct Ban {
    bans: Arc<Bans>,
}

impl CommandExecutor for Ban {
    fn execute(&self, ctx: &mut CommandContext) -> CommandResult<Execution> {
        let target = ctx.arg(0).ok().and_then(parse_player).ok_or_else(|| {
            CommandError::runtime(format!("Usage: /{} <player>", ctx.command().command_line()))
        })?;
        if !self.bans.ban(target) {
            return Err(CommandError::runtime("That player is already banned"));
        }
        ctx.reply(&format!("Banned {}", HyphenatedUuid(target)));
        Ok(Execution::Success)
    }

    fn target(&self, ctx: &CommandContext) -> Option<Subject> {
        ctx.args().first().and_then(|name| parse_player(name)).map(Subject::Player)
    }
}

impl DeclaredCommand for Ban {
    fn declaration() -> CommandDeclaration {
        CommandDeclaration::new(["ban"])
            .require_permission("bastion.ban.base")
            .cooldown("bastion.ban.exempt.cooldown")
            .permission_level("bastion.ban.level", "bastion.ban.base", false)
            .description("Bans a player")
    }

    fn construct(services: &ServiceCollection) -> anyhow::Result<Self> {
        Ok(Ban {
            bans: services.require::<Bans>()?,
        })
    }
}

struct Unban {
    bans: Arc<Bans>,
}

impl CommandExecutor for Unban {
    fn execute(&self, ctx: &mut CommandContext) -> CommandResult<Execution> {
        let target = parse_player(ctx.arg(0)?)
            .ok_or_else(|| CommandError::runtime("Unknown player"))?;
        if !self.bans.unban(target) {
            return Err(CommandError::runtime("That player is not banned"));
        }
        ctx.reply(&format!("Unbanned {}", HyphenatedUuid(target)));
        Ok(Execution::Success)
    }
}

impl DeclaredCommand for Unban {
    fn declaration() -> CommandDeclaration {
        CommandDeclaration::new(["unban", "$pardon"])
            .require_permission("bastion.unban.base")
            .description("Lifts a ban")
    }

    fn construct(services: &ServiceCollection) -> anyhow::Result<Self> {
        Ok(Unban {
            bans: services.require::<Bans>()?,
        })
    }
}

pub(super) fn register_permissions(permissions: &mut PermissionResolver) {
    permissions.register("bastion.ban", SuggestedLevel::Mod, true, "moderation");
    permissions.register("bastion.ban.exempt", SuggestedLevel::Admin, true, "moderation");
    permissions.register("bastion.unban.base", SuggestedLevel::Mod, false, "moderation");
}

pub(super) fn commands() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor::of::<Ban>(),
        CommandDescriptor::of::<Ban>().with_declaration(
            CommandDeclaration::new(["tempban"]).description("Bans a player for a while"),
        ),
        CommandDescriptor::of::<Unban>(),
    ]
}
