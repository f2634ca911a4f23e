mod features;

use anyhow::{Context, Result};
use bastion_core::commands::{
    Audience, CancellationTrigger, CommandError, CommandService, ConsoleAudience, Invocation,
    ReloadOutcome, WarmupService,
};
use bastion_core::{CoreConfig, ServiceCollection};
use bastion_permissions::{HyphenatedUuid, MemoryPermissionBackend, PermissionResolver, Subject};
use clap::{Parser, Subcommand};
use features::{Bank, Bans, Locations};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Bastion command console
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding Config.toml and the commands file.
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Mode {
    /// Register every command, update the commands file and list root aliases.
    Check,
    /// Read commands from standard input.
    Console,
}

fn main() -> Result<()> {
    // Setup logging
    let logfile = tracing_appender::rolling::daily("./logs", "bastion.log");
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("BASTION_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_writer(logfile.and(std::io::stdout))
        .with_env_filter(env_filter)
        .init();

    let args = Args::parse();
    let runtime = Runtime::new().context("failed to start the async runtime")?;
    let console = Console::start(&args.config_dir, runtime.handle().clone())?;
    match args.mode.unwrap_or(Mode::Console) {
        Mode::Check => console.print_roots(),
        Mode::Console => console.run()?,
    }
    Ok(())
}

struct Console {
    config_file: PathBuf,
    backend: Arc<MemoryPermissionBackend>,
    locations: Arc<Locations>,
    bans: Arc<Bans>,
    commands: CommandService,
}

impl Console {
    fn start(config_dir: &Path, runtime: Handle) -> Result<Console> {
        let config_file = config_dir.join("Config.toml");
        let config = CoreConfig::load(&config_file)?;

        let backend = Arc::new(MemoryPermissionBackend::new());
        // Everyone is a user unless the store says otherwise
        backend.set_default_permission(&format!("{}.user", config.permission_namespace), true);
        let mut permissions = PermissionResolver::new(backend.clone(), &config.permission_namespace);
        features::register_permissions(&mut permissions);

        let bank = Arc::new(Bank::new(100.0));
        let locations = Arc::new(Locations::new("0 64 0"));
        let bans = Arc::new(Bans::default());
        let services = ServiceCollection::builder(
            Arc::new(permissions),
            Arc::new(WarmupService::new(runtime)),
        )
        .economy(bank.clone())
        .insert(bank)
        .insert(locations.clone())
        .insert(bans.clone())
        .build();
        services.apply_config(&config);

        let mut commands =
            CommandService::new(Arc::new(services), config_dir.join(&config.commands_file));
        features::register_commands(&mut commands)?;
        commands
            .complete_registration_phase()
            .context("could not set up commands")?;

        Ok(Console {
            config_file,
            backend,
            locations,
            bans,
            commands,
        })
    }

    fn print_roots(&self) {
        let Some(tree) = self.commands.tree() else {
            return;
        };
        if tree.roots().is_empty() {
            info!("No commands are enabled, enable them in the commands file");
        }
        for root in tree.roots() {
            let aliases: Vec<_> = root.aliases().collect();
            info!("/{} -> {}", aliases.join(", /"), root.control.command_key());
        }
    }

    fn run(&self) -> Result<()> {
        info!("Ready. Type `help` for console commands.");
        for line in io::stdin().lock().lines() {
            let line = line.context("failed to read from stdin")?;
            if !self.handle_line(line.trim()) {
                break;
            }
        }
        Ok(())
    }

    /// Returns false once the console should stop.
    fn handle_line(&self, line: &str) -> bool {
        let mut words = line.split_whitespace();
        match words.next() {
            None => {}
            Some("stop") => return false,
            Some("help") => {
                println!("reload                          reload Config.toml and the commands file");
                println!("roots                           list bound root aliases");
                println!("as <player> <command...>        run a command as a player");
                println!("grant <player> <perm> [bool]    set a permission");
                println!("option <player> <key> <value>   set a permission option");
                println!("move <player> <place>           move a player");
                println!("disconnect <player>             disconnect a player");
                println!("stop                            exit");
                println!("<command...>                    run a command as the console");
            }
            Some("reload") => self.reload(),
            Some("roots") => self.print_roots(),
            Some("as") => match player(words.next()) {
                Some(player) if self.bans.is_banned(player) => {
                    warn!("{} is banned and cannot run commands", HyphenatedUuid(player));
                }
                Some(player) => {
                    let rest: Vec<_> = words.collect();
                    self.run_command(Subject::Player(player), &rest.join(" "));
                }
                None => warn!("Usage: as <player> <command...>"),
            },
            Some("grant") => match (player(words.next()), words.next()) {
                (Some(player), Some(permission)) => {
                    let value = words.next().is_none_or(|value| value != "false");
                    self.backend
                        .set_permission(Subject::Player(player), permission, value);
                }
                _ => warn!("Usage: grant <player> <permission> [true|false]"),
            },
            Some("option") => match (player(words.next()), words.next(), words.next()) {
                (Some(player), Some(key), Some(value)) => {
                    self.backend.set_option(Subject::Player(player), key, value);
                }
                _ => warn!("Usage: option <player> <key> <value>"),
            },
            Some("move") => match (player(words.next()), words.next()) {
                (Some(player), Some(place)) => {
                    self.locations.move_to(player, place);
                    self.commands
                        .services()
                        .warmups()
                        .on_trigger(player, CancellationTrigger::Move);
                }
                _ => warn!("Usage: move <player> <place>"),
            },
            Some("disconnect") => match player(words.next()) {
                Some(player) => {
                    self.commands
                        .services()
                        .warmups()
                        .on_trigger(player, CancellationTrigger::Disconnect);
                }
                None => warn!("Usage: disconnect <player>"),
            },
            Some(_) => self.run_command(Subject::Console, line),
        }
        true
    }

    fn run_command(&self, subject: Subject, line: &str) {
        let (alias, arguments) = line.split_once(' ').unwrap_or((line, ""));
        let audience: Arc<dyn Audience> = Arc::new(ConsoleAudience);
        let invocation = Invocation::new(subject, arguments, audience.clone());
        match self.commands.dispatch(alias, invocation) {
            Ok(_) => {}
            Err(CommandError::Runtime(err)) => audience.send_error(&err.to_string()),
            Err(CommandError::Internal(err)) => {
                error!("{}", err);
                audience.send_error("An internal error occurred while running this command");
            }
        }
    }

    fn reload(&self) {
        match CoreConfig::load(&self.config_file) {
            Ok(config) => self.commands.services().apply_config(&config),
            Err(err) => error!("Could not reload {}: {:#}", self.config_file.display(), err),
        }
        match self.commands.reload() {
            Ok(ReloadOutcome::Rebuilt(_)) => {
                info!("Command tree rebuilt");
                self.print_roots();
            }
            Ok(_) => info!("Reloaded"),
            // already logged
            Err(_) => {}
        }
    }
}

fn player(name: Option<&str>) -> Option<u128> {
    name.and_then(features::parse_player)
}
