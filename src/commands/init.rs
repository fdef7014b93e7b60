//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::Database;
use std::path::PathBuf;
use tracing::info;

/// Write a default config file and create the database schema
pub async fn cmd_init(
    base_dir: Option<PathBuf>,
    database_url: Option<String>,
    force: bool,
) -> Result<Config> {
    let mut config = Config::default();
    config.init_paths(base_dir);
    if let Some(url) = database_url {
        config.database_url = url;
    }

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.validate()?;
    config.save()?;

    let db = Database::connect(&config.database_url).await?;
    db.close().await;
    info!(database = %config.database_url, "Database ready");

    Ok(config)
}

/// Print init result to console
pub fn print_init(config: &Config) {
    println!("✓ atscrawl initialized successfully");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Database: {}", config.database_url);
    println!("\nNext steps:");
    println!("  1. Edit the config file to adjust seeds and limits");
    println!("  2. Register known boards: atscrawl seed");
    println!("  3. Run the pipeline: atscrawl run");
}
