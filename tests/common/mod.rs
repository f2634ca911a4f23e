use bastion_core::commands::{
    Audience, CommandContext, CommandDeclaration, CommandDescriptor, CommandError,
    CommandExecutor, CommandResult, CommandService, DeclaredCommand, EconomyBackend,
    EconomyError, Execution, Invocation, WarmupService,
};
use bastion_core::{ManualClock, ServiceCollection, ServiceCollectionBuilder};
use bastion_permissions::{MemoryPermissionBackend, PermissionResolver, Subject};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Handle;

pub const PLAYER: Subject = Subject::Player(1);
pub const OTHER_PLAYER: Subject = Subject::Player(2);

#[derive(Default)]
pub struct RecordingAudience {
    messages: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingAudience {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl Audience for RecordingAudience {
    fn send_message(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }

    fn send_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}

#[derive(Default)]
pub struct TestEconomy {
    balances: Mutex<FxHashMap<u128, f64>>,
    charges: Mutex<Vec<(u128, f64)>>,
}

impl TestEconomy {
    pub fn deposit(&self, account: u128, amount: f64) {
        *self.balances.lock().entry(account).or_default() += amount;
    }

    pub fn balance(&self, account: u128) -> f64 {
        self.balances.lock().get(&account).copied().unwrap_or_default()
    }

    pub fn charges(&self) -> Vec<(u128, f64)> {
        self.charges.lock().clone()
    }
}

impl EconomyBackend for TestEconomy {
    fn can_afford(&self, account: u128, amount: f64) -> bool {
        self.balance(account) >= amount
    }

    fn charge(&self, account: u128, amount: f64) -> Result<(), EconomyError> {
        let mut balances = self.balances.lock();
        let balance = balances.entry(account).or_default();
        if *balance < amount {
            return Err(EconomyError::InsufficientBalance { account, amount });
        }
        *balance -= amount;
        self.charges.lock().push((account, amount));
        Ok(())
    }
}

/// A command service over a throwaway commands file, with a manual clock
/// and a test economy.
pub struct Harness {
    pub dir: TempDir,
    pub backend: Arc<MemoryPermissionBackend>,
    pub clock: Arc<ManualClock>,
    pub economy: Arc<TestEconomy>,
    pub service: CommandService,
}

impl Harness {
    /// Registers `descriptors`, seeds the commands file with `commands_toml`
    /// and completes registration. Must run inside a tokio runtime.
    pub fn new(commands_toml: &str, descriptors: Vec<CommandDescriptor>) -> Harness {
        let mut harness = Harness::registering(commands_toml, descriptors);
        harness.service.complete_registration_phase().unwrap();
        harness
    }

    /// Like [`Harness::new`], with extra services added to the collection.
    pub fn with_services(
        commands_toml: &str,
        descriptors: Vec<CommandDescriptor>,
        configure: impl FnOnce(ServiceCollectionBuilder) -> ServiceCollectionBuilder,
    ) -> Harness {
        let mut harness = Harness::build(commands_toml, descriptors, configure);
        harness.service.complete_registration_phase().unwrap();
        harness
    }

    /// Like [`Harness::new`], but leaves registration open.
    pub fn registering(commands_toml: &str, descriptors: Vec<CommandDescriptor>) -> Harness {
        Harness::build(commands_toml, descriptors, |builder| builder)
    }

    fn build(
        commands_toml: &str,
        descriptors: Vec<CommandDescriptor>,
        configure: impl FnOnce(ServiceCollectionBuilder) -> ServiceCollectionBuilder,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.toml");
        if !commands_toml.is_empty() {
            fs::write(&path, commands_toml).unwrap();
        }

        let backend = Arc::new(MemoryPermissionBackend::new());
        let clock = Arc::new(ManualClock::new());
        let economy = Arc::new(TestEconomy::default());
        let builder = ServiceCollection::builder(
            Arc::new(PermissionResolver::new(backend.clone(), "test")),
            Arc::new(WarmupService::new(Handle::current())),
        )
        .economy(economy.clone())
        .clock(clock.clone());
        let services = configure(builder).build();

        let mut service = CommandService::new(Arc::new(services), path);
        service
            .register_commands("test", "Test", descriptors)
            .unwrap();
        Harness {
            dir,
            backend,
            clock,
            economy,
            service,
        }
    }

    pub fn commands_path(&self) -> PathBuf {
        self.dir.path().join("commands.toml")
    }

    pub fn commands_file(&self) -> String {
        fs::read_to_string(self.commands_path()).unwrap()
    }

    pub fn write_commands_file(&self, contents: &str) {
        fs::write(self.commands_path(), contents).unwrap();
    }

    /// Runs `line` (root alias first) as `subject`.
    pub fn run(
        &self,
        subject: Subject,
        line: &str,
    ) -> (CommandResult<Execution>, Arc<RecordingAudience>) {
        let audience = Arc::new(RecordingAudience::default());
        let (alias, arguments) = line.split_once(' ').unwrap_or((line, ""));
        let result = self
            .service
            .dispatch(alias, Invocation::new(subject, arguments, audience.clone()));
        (result, audience)
    }
}

/// Declares an executor that replies with its own name.
macro_rules! replying_command {
    ($name:ident, $declaration:expr) => {
        pub struct $name;

        impl CommandExecutor for $name {
            fn execute(&self, ctx: &mut CommandContext) -> CommandResult<Execution> {
                ctx.reply(stringify!($name));
                Ok(Execution::Success)
            }
        }

        impl DeclaredCommand for $name {
            fn declaration() -> CommandDeclaration {
                $declaration
            }

            fn construct(_: &ServiceCollection) -> anyhow::Result<Self> {
                Ok($name)
            }
        }
    };
}

replying_command!(Ban, CommandDeclaration::new(["ban"]).cooldown("x.exempt"));
replying_command!(Mail, CommandDeclaration::new(["mail"]).cooldown("mail.exempt"));
replying_command!(Pay, CommandDeclaration::new(["pay"]).cost("pay.exempt"));
replying_command!(
    Warp,
    CommandDeclaration::new(["warp"])
        .warmup("warp.exempt.warmup")
        .cooldown("warp.exempt.cooldown")
        .cost("warp.exempt.cost")
);
replying_command!(Home, CommandDeclaration::new(["home", "h", "$homes"]));
replying_command!(
    SetHome,
    CommandDeclaration::new(["set", "#sethome"]).parent::<Home>()
);
replying_command!(
    DeleteHome,
    CommandDeclaration::new(["delete", "del"])
        .parent::<Home>()
        .require_permission("home.delete")
);
replying_command!(Admin, CommandDeclaration::new(["admin"]).without_executor());
replying_command!(
    AdminReload,
    CommandDeclaration::new(["reload"])
        .parent::<Admin>()
        .require_permission("admin.reload")
);
replying_command!(Spawn, CommandDeclaration::new(["spawn"]).prefix_aliases_with_n());
replying_command!(Cycle, CommandDeclaration::new(["cycle"]).parent::<CycleBack>());
replying_command!(CycleBack, CommandDeclaration::new(["back"]).parent::<Cycle>());

/// The second registration of the mail executor.
pub fn post() -> CommandDescriptor {
    CommandDescriptor::of::<Mail>()
        .with_declaration(CommandDeclaration::new(["post"]).cooldown("mail.exempt"))
}

/// Needs a dependency nobody provides.
pub struct Broken;

impl CommandExecutor for Broken {
    fn execute(&self, _ctx: &mut CommandContext) -> CommandResult<Execution> {
        Ok(Execution::Success)
    }
}

impl DeclaredCommand for Broken {
    fn declaration() -> CommandDeclaration {
        CommandDeclaration::new(["broken"])
    }

    fn construct(services: &ServiceCollection) -> anyhow::Result<Self> {
        services.require::<String>()?;
        Ok(Broken)
    }
}

/// Always fails once it gets to run.
pub struct Explode;

impl CommandExecutor for Explode {
    fn execute(&self, _ctx: &mut CommandContext) -> CommandResult<Execution> {
        Err(CommandError::runtime("boom"))
    }
}

impl DeclaredCommand for Explode {
    fn declaration() -> CommandDeclaration {
        CommandDeclaration::new(["explode"])
            .cooldown("explode.exempt")
            .cost("explode.exempt")
    }

    fn construct(_: &ServiceCollection) -> anyhow::Result<Self> {
        Ok(Explode)
    }
}

/// Acts on the player named by its first argument.
pub struct Kick;

impl CommandExecutor for Kick {
    fn execute(&self, ctx: &mut CommandContext) -> CommandResult<Execution> {
        ctx.reply(&format!("kicked {}", ctx.arg(0)?));
        Ok(Execution::Success)
    }

    fn target(&self, ctx: &CommandContext) -> Option<Subject> {
        ctx.args().first()?.parse().ok().map(Subject::Player)
    }
}

impl DeclaredCommand for Kick {
    fn declaration() -> CommandDeclaration {
        CommandDeclaration::new(["kick"]).permission_level("test.kick.level", "kick.base", false)
    }

    fn construct(_: &ServiceCollection) -> anyhow::Result<Self> {
        Ok(Kick)
    }
}

/// A commands file enabling `keys` with every declared alias on.
pub fn enabled(keys: &[&str]) -> String {
    keys.iter()
        .map(|key| format!("[\"{key}\"]\nenabled = true\n"))
        .collect()
}

impl Harness {
    pub fn clock_now(&self) -> std::time::Instant {
        bastion_core::Clock::now(&*self.clock)
    }
}
