//! atscrawl CLI entry point

use atscrawl::{
    commands::{
        cmd_crawl, cmd_deactivate, cmd_discover, cmd_init, cmd_list_hosts, cmd_lookup, cmd_reap,
        cmd_render, cmd_seed, cmd_status, print_crawl_stats, print_discovery_stats, print_hosts,
        print_init, print_postings, print_reap_stats, print_render_stats, print_seed_stats,
        print_status,
    },
    config::Config,
    error::{Error, Result},
    pipeline::{trigger, PipelineOptions},
    progress::LogWriterFactory,
    store::Database,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "atscrawl")]
#[command(version, about = "Discover and crawl ATS-hosted job boards", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database URL (overrides the config file)
    #[arg(long, global = true, env = "ATSCRAWL_DATABASE_URL")]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Register well-known multi-tenant job boards
    Seed,

    /// Probe candidate domains and register ATS hosts
    Discover {
        /// Stop launching probes after this many milliseconds
        #[arg(long)]
        max_time_ms: Option<u64>,
    },

    /// Crawl active hosts for job postings
    Crawl {
        /// Only crawl this registered domain
        #[arg(long)]
        domain: Option<String>,
    },

    /// Close postings not seen within the retention window
    Reap {
        /// Retention window in days
        #[arg(long)]
        retention_days: Option<u32>,

        /// Dry run - count what would be closed
        #[arg(long)]
        dry_run: bool,
    },

    /// Scrape client-rendered seed pages with a headless browser
    Render,

    /// Run discovery then crawling as one recorded pipeline run
    Run {
        /// Skip the discovery stage
        #[arg(long)]
        skip_discovery: bool,

        /// Skip the crawl stage
        #[arg(long)]
        skip_crawl: bool,

        /// Duration budget for discovery in milliseconds
        #[arg(long)]
        max_discovery_time_ms: Option<u64>,
    },

    /// Show registry, store and run status
    Status,

    /// List registered hosts
    Hosts {
        /// Include inactive hosts
        #[arg(long)]
        all: bool,
    },

    /// Find stored postings for a job URL
    Lookup {
        /// Job page URL; tracking parameters are ignored
        url: String,
    },

    /// Deactivate a host so it is no longer crawled
    Deactivate {
        /// Domain to deactivate
        domain: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(fmt::layer().json().with_writer(LogWriterFactory))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(LogWriterFactory))
            .init();
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "atscrawl", &mut std::io::stdout());
        return Ok(());
    }

    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.as_deref().map(init_base_dir);
        let config = cmd_init(base_dir, cli.database_url, force).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            print_init(&config);
        }
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    // The pipeline owns its own database handle
    if let Commands::Run {
        skip_discovery,
        skip_crawl,
        max_discovery_time_ms,
    } = cli.command
    {
        let options = PipelineOptions {
            run_discovery: !skip_discovery,
            run_crawling: !skip_crawl,
            max_discovery_time_ms,
        };
        let handle = trigger(config.clone(), options).await?;
        let run_id = handle.run_id.clone();
        if cli.json {
            println!(r#"{{"run_id": "{}", "status": "started"}}"#, run_id);
        } else {
            println!("▶ Pipeline run {} started", run_id);
        }

        // Keep the process alive until the background run finishes
        handle.join().await;

        let db = Database::connect(&config.database_url).await?;
        if let Some(run) = db.get_run(&run_id).await? {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                println!("✓ Pipeline run {} {}", run.id, run.status);
            }
        }
        db.close().await;
        return Ok(());
    }

    let db = Database::connect(&config.database_url).await?;
    let result = handle_command(&config, &db, cli.command, cli.json).await;
    db.close().await;
    result
}

async fn handle_command(config: &Config, db: &Database, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Seed => {
            let stats = cmd_seed(config, db).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_seed_stats(&stats);
            }
        }

        Commands::Discover { max_time_ms } => {
            let stats = cmd_discover(config, db, max_time_ms).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_discovery_stats(&stats);
            }
        }

        Commands::Crawl { domain } => {
            let stats = cmd_crawl(config, db, domain.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_crawl_stats(&stats);
            }
        }

        Commands::Reap {
            retention_days,
            dry_run,
        } => {
            let stats = cmd_reap(config, db, retention_days, dry_run).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_reap_stats(&stats);
            }
        }

        Commands::Render => {
            let stats = cmd_render(config, db).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_render_stats(&stats);
            }
        }

        Commands::Status => {
            let status = cmd_status(config, db).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Hosts { all } => {
            let hosts = cmd_list_hosts(db, all).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hosts)?);
            } else {
                print_hosts(&hosts);
            }
        }

        Commands::Lookup { url } => {
            let postings = cmd_lookup(config, db, &url).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&postings)?);
            } else {
                print_postings(&postings);
            }
        }

        Commands::Deactivate { domain } => {
            cmd_deactivate(db, &domain).await?;
            if json {
                println!(r#"{{"domain": "{}", "is_active": false}}"#, domain);
            } else {
                println!("✓ Host '{}' deactivated", domain);
            }
        }

        Commands::Init { .. } | Commands::Run { .. } | Commands::Completions { .. } => {
            unreachable!()
        }
    }

    Ok(())
}

/// Base directory for `init`: a `.toml` path means its parent directory
fn init_base_dir(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == "toml") {
        path.parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir)
    } else {
        path.to_path_buf()
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) if !path.exists() => return Err(Error::NotInitialized),
        Some(path) => Config::load(path)?,
        None => Config::load_from(None)?,
    };
    std::fs::create_dir_all(&config.paths.base_dir)?;
    Ok(config)
}
