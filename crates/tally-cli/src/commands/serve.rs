//! Server command implementation

use std::path::Path;

use anyhow::Result;
use tally_core::{Dispatcher, TallyConfig};
use tally_server::ServerConfig;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_encrypt: bool,
    config: &TallyConfig,
) -> Result<()> {
    println!("🚀 Starting Tally web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let server_config = ServerConfig::from_settings(&config.server);
    if server_config.requires_auth() {
        println!(
            "   🔑 API keys: {} configured (TALLY_API_KEYS)",
            server_config.api_keys.len()
        );
    } else {
        println!();
        println!("   ⚠️  Authentication DISABLED - set TALLY_API_KEYS before exposing to a network!");
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;
    let dispatcher = Dispatcher::from_config(db, config)?;

    tally_server::serve(dispatcher, host, port, server_config).await?;

    Ok(())
}
