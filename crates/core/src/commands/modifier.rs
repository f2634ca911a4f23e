use super::metadata::ModifierKind;
use std::time::Duration;
use toml_edit::{Item, TableLike};
use tracing::warn;

/// Configured modifier values of one command, swapped wholesale on reload.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModifierConfig {
    pub cooldown: u64,
    pub warmup: u64,
    pub cost: f64,
}

impl ModifierConfig {
    /// Reads the values from a command's node in the commands file. Missing
    /// or malformed values count as zero.
    pub fn from_table(key: &str, table: &dyn TableLike) -> Self {
        ModifierConfig {
            cooldown: seconds(key, "cooldown", table.get("cooldown")),
            warmup: seconds(key, "warmup", table.get("warmup")),
            cost: amount(key, table.get("cost")),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup)
    }

    /// The default written for a newly declared modifier.
    pub(super) fn default_item(kind: &ModifierKind) -> Option<Item> {
        match kind {
            ModifierKind::Cooldown | ModifierKind::Warmup => Some(toml_edit::value(0i64)),
            ModifierKind::Cost => Some(toml_edit::value(0.0)),
            ModifierKind::PermissionLevel { .. } => None,
        }
    }
}

fn seconds(key: &str, name: &str, item: Option<&Item>) -> u64 {
    let Some(item) = item else {
        return 0;
    };
    match item.as_integer().map(u64::try_from) {
        Some(Ok(value)) => value,
        _ => {
            warn!("Ignoring invalid {} value for command {}: {}", name, key, item.to_string().trim());
            0
        }
    }
}

fn amount(key: &str, item: Option<&Item>) -> f64 {
    let Some(item) = item else {
        return 0.0;
    };
    let value = item
        .as_float()
        .or_else(|| item.as_integer().map(|value| value as f64));
    match value {
        Some(value) if value.is_finite() && value >= 0.0 => value,
        _ => {
            warn!("Ignoring invalid cost value for command {}: {}", key, item.to_string().trim());
            0.0
        }
    }
}
