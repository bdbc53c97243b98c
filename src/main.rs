use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use app::App;
use persistence::local::FileLocalStore;
use persistence::remote::HttpRemote;
use persistence::{Reconciler, StorageMode};
use session::TokenSession;
use types::Category;

mod analytics;
mod app;
mod config;
mod debug_log;
mod log_key;
mod persistence;
mod render;
mod reqwest_simd_json;
mod session;
mod store;
#[cfg(test)]
mod test_server;
mod types;
mod utils;

/// How often `watch` re-checks the API token.
const SESSION_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "habitgrid")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark or unmark a day for a habit
    Toggle {
        /// Habit number (1-10)
        habit: String,
        /// Day of the selected month
        day: u32,
    },
    /// Name a habit slot
    Set(SetArgs),
    /// Delete a habit and its tracking data for the selected month
    Delete {
        /// Habit number (1-10)
        habit: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y', default_value_t = false)]
        yes: bool,
    },
    /// Move to the next or previous month
    Month {
        #[arg(value_enum)]
        direction: Direction,
    },
    /// Clear all tracking data for the selected month
    Reset {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y', default_value_t = false)]
        yes: bool,
    },
    /// Output analytics for the selected month
    Stats(StatsArgs),
    /// Export all data as JSON
    Export {
        /// Output file (defaults to habitgrid-export-YYYY-MM-DD.json)
        path: Option<PathBuf>,
    },
    /// Import habits and tracking data from an exported JSON file
    Import { path: PathBuf },
    /// Follow remote changes and print analytics on every update
    Watch,
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct SetArgs {
    /// Habit number (1-10)
    habit: String,
    /// Habit name
    name: String,
    /// Category (health, study, work, personal)
    #[arg(long, short = 'c', default_value = "health")]
    category: String,
}

#[derive(Args)]
struct StatsArgs {
    /// Output JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Pretty-print JSON instead of a single line
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Next,
    Prev,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (remote-url, api-token, use-remote, poll-interval, timeout, data-dir, debug-mode)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = config::Config::load().unwrap_or(None).unwrap_or_default();
    debug_log::init(config.debug.debug_mode);

    match cli.command {
        Some(Commands::Config(config_args)) => handle_config_subcommand(config_args),
        command => {
            if let Err(e) = run(command, &config).await {
                eprintln!("{e:#}");
                std::process::exit(1);
            }
        }
    }
}

/// Wire the backends chosen by the config and load the initial state.
async fn build_app(config: &config::Config) -> Result<(App, Option<Arc<TokenSession>>)> {
    let local = Arc::new(FileLocalStore::open(&config.data_dir()?)?);
    debug_log::log("STORAGE", "OPEN", &local.path().display().to_string());

    let mut token_session = None;
    let mode = if config.use_remote() {
        let session = Arc::new(TokenSession::new(&config.remote)?);
        if let Err(e) = session.sign_in().await {
            utils::warn_once(format!("⚠️  Not signed in, using local data only: {e:#}"));
        }
        token_session = Some(session.clone());
        StorageMode::Remote {
            remote: Arc::new(HttpRemote::new(&config.remote)?),
            session,
        }
    } else {
        StorageMode::LocalOnly
    };

    let mut app = App::new(Reconciler::new(local, mode));
    if let Some(identity) = app.current_identity() {
        app.migrate_once(&identity).await;
    }
    app.load_state().await;

    Ok((app, token_session))
}

fn prompt_confirm(prompt: &str) -> bool {
    print!("{prompt}\n[y/N] ");
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn assume_yes(_: &str) -> bool {
    true
}

fn confirmer(yes: bool) -> &'static dyn app::Confirm {
    if yes { &assume_yes } else { &prompt_confirm }
}

fn colored() -> bool {
    std::io::stdout().is_terminal()
}

fn show(app: &App) {
    print!("{}", render::render_grid(app.state(), colored()));
    println!();
    print!("{}", render::render_analytics(&app.analytics(), colored()));
}

async fn run(command: Option<Commands>, config: &config::Config) -> Result<()> {
    let (mut app, token_session) = build_app(config).await?;

    match command {
        None => show(&app),
        Some(Commands::Toggle { habit, day }) => {
            let index = utils::parse_habit_number(&habit)?;
            match app.toggle(index, day).await {
                Some(done) => {
                    let name = &app.state().habits[index].name;
                    if done {
                        println!("✅ {name}: day {day} completed");
                    } else {
                        println!("↩️  {name}: day {day} cleared");
                    }
                    let snapshot = app.analytics();
                    println!(
                        "{} out of {} habit actions completed ({}), {} to go",
                        snapshot.total_completed,
                        snapshot.total_possible,
                        utils::format_rate(snapshot.completion_rate),
                        snapshot.remaining()
                    );
                }
                None => anyhow::bail!(
                    "Cannot toggle habit {habit} on day {day}: the slot is empty or the day is outside {}",
                    app.state().month_header()
                ),
            }
        }
        Some(Commands::Set(args)) => {
            let index = utils::parse_habit_number(&args.habit)?;
            let category = Category::parse(&args.category).with_context(|| {
                format!(
                    "Unknown category '{}' (expected health, study, work or personal)",
                    args.category
                )
            })?;
            if !app.set_habit(index, &args.name, category).await {
                anyhow::bail!("Habit name cannot be empty");
            }
            println!(
                "📝 Habit {} set to \"{}\" ({})",
                index + 1,
                app.state().habits[index].name,
                category.display_name()
            );
        }
        Some(Commands::Delete { habit, yes }) => {
            let index = utils::parse_habit_number(&habit)?;
            if app.delete_habit(index, confirmer(yes)).await {
                println!("🗑️  Habit {} deleted", index + 1);
            } else {
                println!("Nothing deleted.");
            }
        }
        Some(Commands::Month { direction }) => {
            let delta = match direction {
                Direction::Next => 1,
                Direction::Prev => -1,
            };
            app.change_month(delta).await;
            show(&app);
        }
        Some(Commands::Reset { yes }) => {
            if app.reset_month(confirmer(yes)).await {
                println!("🧹 {} reset", app.state().month_header());
            } else {
                println!("Nothing reset.");
            }
        }
        Some(Commands::Stats(args)) => {
            let snapshot = app.analytics();
            if args.json {
                let json = if args.pretty {
                    simd_json::to_string_pretty(&snapshot)?
                } else {
                    simd_json::to_string(&snapshot)?
                };
                println!("{json}");
            } else {
                println!("{}", app.state().month_header());
                print!("{}", render::render_analytics(&snapshot, colored()));
            }
        }
        Some(Commands::Export { path }) => {
            let path = path.unwrap_or_else(|| PathBuf::from(utils::export_file_name()));
            std::fs::write(&path, app.export_json()?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("📦 Exported to {}", path.display());
        }
        Some(Commands::Import { path }) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            app.import_json(&text).await?;
            println!("Data imported successfully!");
        }
        Some(Commands::Watch) => watch(&mut app, token_session).await?,
        Some(Commands::Config(_)) => unreachable!("config is handled before loading state"),
    }

    Ok(())
}

async fn watch(app: &mut App, token_session: Option<Arc<TokenSession>>) -> Result<()> {
    let (Some(mut updates), Some(mut identity)) = (app.subscribe(), app.watch_identity()) else {
        anyhow::bail!(
            "Remote sync is not active. Enable it with `habitgrid config set use-remote true`."
        );
    };

    let refresher = token_session.map(|session| {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SESSION_REFRESH_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = session.refresh().await {
                    debug_log::log("SESSION", "REFRESH_FAILED", &format!("{e:#}"));
                }
            }
        })
    });

    show(app);
    loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(state) => {
                    app.apply_remote_update(state);
                    println!();
                    show(app);
                }
                None => break,
            },
            changed = identity.changed() => {
                if changed.is_err() || identity.borrow().is_none() {
                    println!("Signed out, no longer following remote changes.");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Some(refresher) = refresher {
        refresher.abort();
    }
    updates.unsubscribe();
    Ok(())
}

fn handle_config_subcommand(config_args: ConfigArgs) {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            if let Err(e) = config::create_default_config(overwrite) {
                eprintln!("Error creating config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Show => {
            if let Err(e) = config::show_config() {
                eprintln!("Error showing config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Set { key, value } => {
            if let Err(e) = config::set_config_value(&key, &value) {
                eprintln!("Error setting config: {e}");
                std::process::exit(1);
            }
        }
    }
}
