use bastion_core::commands::{
    CommandContext, CommandDeclaration, CommandDescriptor, CommandExecutor, CommandResult,
    DeclaredCommand, EconomyBackend, EconomyError, Execution,
};
use bastion_core::ServiceCollection;
use bastion_permissions::{HyphenatedUuid, PermissionResolver, SuggestedLevel};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// In-memory economy. Every account starts with the same balance.
pub struct Bank {
    starting_balance: f64,
    balances: Mutex<FxHashMap<u128, f64>>,
}

impl Bank {
    pub fn new(starting_balance: f64) -> Bank {
        Bank {
            starting_balance,
            balances: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn balance(&self, account: u128) -> f64 {
        self.balances
            .lock()
            .get(&account)
            .copied()
            .unwrap_or(self.starting_balance)
    }
}

impl EconomyBackend for Bank {
    fn can_afford(&self, account: u128, amount: f64) -> bool {
        self.balance(account) >= amount
    }

    fn charge(&self, account: u128, amount: f64) -> Result<(), EconomyError> {
        let mut balances = self.balances.lock();
        let balance = balances.entry(account).or_insert(self.starting_balance);
        if *balance < amount {
            return Err(EconomyError::InsufficientBalance { account, amount });
        }
        *balance -= amount;
        Ok(())
    }

    fn format_amount(&self, amount: f64) -> String {
        format!("${amount:.2}")
    }
}

struct Balance {
    bank: Arc<Bank>,
}

impl CommandExecutor for Balance {
    fn execute(&self, ctx: &mut CommandContext) -> CommandResult<Execution> {
        let player = ctx.player_id()?;
        let balance = self.bank.format_amount(self.bank.balance(player));
        ctx.reply(&format!("Balance of {}: {}", HyphenatedUuid(player), balance));
        Ok(Execution::Success)
    }
}

impl DeclaredCommand for Balance {
    fn declaration() -> CommandDeclaration {
        CommandDeclaration::new(["balance", "bal", "$money"])
            .require_permission("bastion.balance.base")
            .description("Shows your balance")
    }

    fn construct(services: &ServiceCollection) -> anyhow::Result<Self> {
        Ok(Balance {
            bank: services.require::<Bank>()?,
        })
    }
}

pub(super) fn register_permissions(permissions: &mut PermissionResolver) {
    permissions.register("bastion.balance.base", SuggestedLevel::User, false, "bank");
}

pub(super) fn commands() -> Vec<CommandDescriptor> {
    vec![CommandDescriptor::of::<Balance>()]
}
