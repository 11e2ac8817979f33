use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;

use wpfleet_core::config::{self, config_path, load_config, AppConfig};
use wpfleet_core::coordinator::{OperationCoordinator, OperationState};
use wpfleet_core::dispatch::BulkActionDispatcher;
use wpfleet_core::history::{FileHistory, SearchHistory};
use wpfleet_core::notice::{Notice, NoticeKind};
use wpfleet_core::request::{
    ActionPayload, Category, Frequency, ScanConfig, WebsiteStatus, WebsiteType,
};
use wpfleet_core::resource::ResourceType;
use wpfleet_core::selection::SelectionSet;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "wpfleet")]
#[command(about = "Bulk operations against a WordPress fleet-management server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Override the configured server base URL
    #[arg(long, global = true)]
    server: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan websites for plugins, themes, and vulnerabilities
    Scan {
        /// Website ids
        #[arg(required = true)]
        ids: Vec<u64>,

        /// Skip the plugin check
        #[arg(long)]
        no_plugins: bool,

        /// Skip the theme check
        #[arg(long)]
        no_themes: bool,

        /// Skip the vulnerability check
        #[arg(long)]
        no_vulnerabilities: bool,

        /// Skip the update check
        #[arg(long)]
        no_updates: bool,
    },

    /// Delete items of a resource type
    Delete {
        /// Resource type (websites, clients, hosting-providers, plugins, templates, scan-schedules)
        #[arg(long, default_value = "websites")]
        resource: ResourceType,

        /// Item ids
        #[arg(required = true)]
        ids: Vec<u64>,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Update the status of items
    Status {
        /// Resource type
        #[arg(long, default_value = "websites")]
        resource: ResourceType,

        /// Item ids
        #[arg(required = true)]
        ids: Vec<u64>,

        /// New status (active, inactive, maintenance)
        #[arg(long)]
        status: WebsiteStatus,
    },

    /// Assign websites to a group
    Group {
        /// Website ids
        #[arg(required = true)]
        ids: Vec<u64>,

        /// Group id; omit to remove the websites from their group
        #[arg(long)]
        group: Option<i64>,
    },

    /// Create scan schedules for websites
    Schedule {
        /// Website ids
        #[arg(required = true)]
        ids: Vec<u64>,

        /// Schedule name template
        #[arg(long, default_value = "Scheduled scan")]
        name_template: String,

        /// Frequency (daily, weekly, monthly)
        #[arg(long, default_value = "weekly")]
        frequency: Frequency,

        /// Time of day, HH:MM
        #[arg(long, default_value = "02:00")]
        time: String,

        /// Create the schedules in a paused state
        #[arg(long)]
        paused: bool,
    },

    /// Update the type of plugins or templates
    SetType {
        /// Resource type (plugins, templates)
        #[arg(long, default_value = "plugins")]
        resource: ResourceType,

        /// Item ids
        #[arg(required = true)]
        ids: Vec<u64>,

        /// New type (security, performance, functionality, design, other)
        #[arg(long = "type")]
        website_type: WebsiteType,
    },

    /// Update the category of websites or templates
    SetCategory {
        /// Resource type (websites, templates)
        #[arg(long, default_value = "websites")]
        resource: ResourceType,

        /// Item ids
        #[arg(required = true)]
        ids: Vec<u64>,

        /// New category (business, blog, portfolio, ecommerce, landing, other)
        #[arg(long)]
        category: Category,
    },

    /// Manage the search history
    History {
        #[command(subcommand)]
        action: HistoryAction,

        /// Use this history file instead of the default
        #[arg(long, global = true)]
        file: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Show recent searches, most recent first
    Show,
    /// Record a search string
    Add {
        entry: String,
    },
    /// Forget all recent searches
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Key (dot-separated path)
        key: String,
        /// Value
        value: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut cfg = load_config();
    if let Some(server) = &cli.server {
        cfg.api.base_url = server.clone();
    }

    let result = match cli.command {
        Commands::Scan {
            ref ids,
            no_plugins,
            no_themes,
            no_vulnerabilities,
            no_updates,
        } => {
            let payload = ActionPayload::Scan {
                config: ScanConfig {
                    check_plugins: !no_plugins,
                    check_themes: !no_themes,
                    check_vulnerabilities: !no_vulnerabilities,
                    check_updates: !no_updates,
                },
            };
            run_bulk(&cfg, ResourceType::Websites, payload, ids, cli.json).await
        }
        Commands::Delete {
            resource,
            ref ids,
            yes,
        } => run_delete(&cfg, resource, ids, yes, cli.json).await,
        Commands::Status {
            resource,
            ref ids,
            status,
        } => {
            run_bulk(
                &cfg,
                resource,
                ActionPayload::StatusUpdate { status },
                ids,
                cli.json,
            )
            .await
        }
        Commands::Group { ref ids, group } => {
            run_bulk(
                &cfg,
                ResourceType::Websites,
                ActionPayload::GroupAssign { group_id: group },
                ids,
                cli.json,
            )
            .await
        }
        Commands::Schedule {
            ref ids,
            ref name_template,
            frequency,
            ref time,
            paused,
        } => {
            let payload = ActionPayload::Schedule {
                name_template: name_template.clone(),
                frequency,
                scheduled_time: time.clone(),
                config: ScanConfig::default(),
                is_active: !paused,
            };
            run_bulk(&cfg, ResourceType::Websites, payload, ids, cli.json).await
        }
        Commands::SetType {
            resource,
            ref ids,
            website_type,
        } => {
            run_bulk(
                &cfg,
                resource,
                ActionPayload::TypeUpdate { website_type },
                ids,
                cli.json,
            )
            .await
        }
        Commands::SetCategory {
            resource,
            ref ids,
            category,
        } => {
            run_bulk(
                &cfg,
                resource,
                ActionPayload::CategoryUpdate { category },
                ids,
                cli.json,
            )
            .await
        }
        Commands::History { ref action, ref file } => run_history(&cfg, action, file.as_deref(), cli.json),
        Commands::Config { ref action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_delete(
    cfg: &AppConfig,
    resource: ResourceType,
    ids: &[u64],
    yes: bool,
    json: bool,
) -> Result<(), BoxError> {
    // Destructive action: the dispatcher leaves confirmation to us.
    if !yes {
        let prompt = format!("Delete {} {}?", ids.len(), resource);
        if !confirm(&prompt)? {
            println!("Aborted.");
            return Ok(());
        }
    }
    run_bulk(cfg, resource, ActionPayload::Delete, ids, json).await
}

async fn run_bulk(
    cfg: &AppConfig,
    resource: ResourceType,
    payload: ActionPayload,
    ids: &[u64],
    json: bool,
) -> Result<(), BoxError> {
    let coordinator = Arc::new(OperationCoordinator::with_seed(cfg.progress.seed_percent));
    let executor = config::executor_from_config(cfg);
    let dispatcher = BulkActionDispatcher::new(resource, Arc::clone(&coordinator), executor);

    let mut selection = SelectionSet::new();
    selection.select_all(ids.iter().map(|id| id.to_string()));

    let kind = payload.kind();
    let render = if json {
        None
    } else {
        Some(spawn_progress_bar(coordinator.subscribe())?)
    };

    let outcome = dispatcher.dispatch(payload, &mut selection).await;
    if let Some(handle) = render {
        match &outcome {
            Ok(_) => {
                let _ = handle.await;
            }
            Err(_) => handle.abort(),
        }
    }
    let outcome = outcome?;

    if json {
        let report = serde_json::json!({
            "succeeded": outcome.succeeded(),
            "affected": outcome.affected,
            "result": outcome.state.result,
            "error": outcome.state.error.as_ref().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(notice) = Notice::from_terminal(&outcome.state, kind, outcome.affected) {
        print_notice(&notice);
    }

    if !outcome.succeeded() {
        return Err(format!("{} did not complete", kind).into());
    }
    Ok(())
}

fn spawn_progress_bar(
    mut rx: watch::Receiver<OperationState>,
) -> Result<tokio::task::JoinHandle<()>, BoxError> {
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")?;
    Ok(tokio::spawn(async move {
        let bar = ProgressBar::new(100).with_style(style);
        loop {
            let (percent, stage, terminal) = {
                let s = rx.borrow_and_update();
                (s.percent, s.stage.clone(), s.is_terminal())
            };
            bar.set_position(u64::from(percent));
            bar.set_message(stage);
            if terminal {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        bar.finish_and_clear();
    }))
}

fn print_notice(notice: &Notice) {
    match notice.kind {
        NoticeKind::Success | NoticeKind::Info => println!("{}", notice.message),
        NoticeKind::Error => {
            eprintln!("{}", notice.message);
            for (field, messages) in &notice.field_errors {
                for message in messages {
                    eprintln!("  {}: {}", field, message);
                }
            }
        }
    }
}

fn confirm(prompt: &str) -> Result<bool, BoxError> {
    use std::io::Write;
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn run_history(
    cfg: &AppConfig,
    action: &HistoryAction,
    file: Option<&str>,
    json: bool,
) -> Result<(), BoxError> {
    let store = match file {
        Some(path) => FileHistory::new(path).with_limit(cfg.history.max_entries),
        None => config::history_from_config(&cfg.history)
            .ok_or("Could not determine history file location")?,
    };

    match action {
        HistoryAction::Show => {
            let entries = store.load()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No recent searches.");
            } else {
                for (i, entry) in entries.iter().enumerate() {
                    println!("{:>2}. {}", i + 1, entry);
                }
            }
        }
        HistoryAction::Add { entry } => {
            store.append(entry)?;
            if !json {
                println!("Recorded.");
            }
        }
        HistoryAction::Clear => {
            store.clear()?;
            if !json {
                println!("History cleared.");
            }
        }
    }
    Ok(())
}

fn run_config(action: &ConfigAction, json: bool) -> Result<(), BoxError> {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or("Could not determine config directory")?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let default_cfg = AppConfig::default();
            let toml = toml::to_string_pretty(&default_cfg)?;
            std::fs::write(&path, toml)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let cfg = load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or("Could not determine config directory")?;
            let mut cfg: AppConfig = if path.exists() {
                let s = std::fs::read_to_string(&path)?;
                toml::from_str(&s).unwrap_or_default()
            } else {
                AppConfig::default()
            };

            set_config_key(&mut cfg, key, value)?;

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let toml = toml::to_string_pretty(&cfg)?;
            std::fs::write(&path, toml)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}

fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), BoxError> {
    let parts: Vec<&str> = key.splitn(2, '.').collect();
    match parts.as_slice() {
        ["api", sub] => match *sub {
            "base_url" => cfg.api.base_url = value.to_string(),
            "timeout_secs" => cfg.api.timeout_secs = value.parse().ok(),
            _ => return Err(format!("Unknown key: {}", key).into()),
        },
        ["progress", sub] => match *sub {
            "seed_percent" => {
                cfg.progress.seed_percent = value
                    .parse()
                    .map_err(|_| format!("Invalid percent: {}", value))?
            }
            _ => return Err(format!("Unknown key: {}", key).into()),
        },
        ["history", sub] => match *sub {
            "path" => cfg.history.path = Some(value.to_string()),
            "max_entries" => {
                cfg.history.max_entries = value
                    .parse()
                    .map_err(|_| format!("Invalid count: {}", value))?
            }
            _ => return Err(format!("Unknown key: {}", key).into()),
        },
        _ => return Err(format!("Unknown key: {}", key).into()),
    }
    Ok(())
}
