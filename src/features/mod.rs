//! Sample features wired into the console demo.

mod bank;
mod moderation;
mod teleport;

pub use bank::Bank;
pub use moderation::Bans;
pub use teleport::Locations;

use bastion_core::commands::{CommandService, RegistrationError};
use bastion_permissions::PermissionResolver;

pub fn register_permissions(permissions: &mut PermissionResolver) {
    teleport::register_permissions(permissions);
    moderation::register_permissions(permissions);
    bank::register_permissions(permissions);
}

pub fn register_commands(service: &mut CommandService) -> Result<(), RegistrationError> {
    service.register_commands("teleport", "Teleport", teleport::commands())?;
    service.register_commands("moderation", "Moderation", moderation::commands())?;
    service.register_commands("bank", "Bank", bank::commands())?;
    Ok(())
}

/// Players are addressed by a plain number or a hyphenated uuid.
pub fn parse_player(name: &str) -> Option<u128> {
    name.parse::<u128>()
        .ok()
        .or_else(|| name.parse::<bastion_permissions::HyphenatedUuid>().ok().map(|uuid| uuid.0))
}
