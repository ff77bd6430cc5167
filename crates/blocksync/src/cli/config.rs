//! Config command handlers

use blocksync_core::config::Config;
use blocksync_core::error::{BlocksyncError, Result};
use serde_json::json;

use crate::cli::args::ConfigCommands;
use crate::cli::print_json;

pub fn handle_config_command(command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => show_config(&Config::load()?),
        Some(ConfigCommands::Path) => {
            let path = Config::config_path().ok_or(BlocksyncError::NoConfigDir)?;
            println!("{}", path.display());
            Ok(())
        }
        Some(ConfigCommands::Set {
            server,
            workspace_id,
            token,
            cookie,
            client_version,
            connect_timeout_ms,
            request_timeout_ms,
        }) => {
            let mut config = Config::load()?;
            let mut changes = Vec::new();

            if let Some(server) = server {
                changes.push(format!("server_url = {server}"));
                config.server_url = Some(server);
            }
            if let Some(id) = workspace_id {
                changes.push(format!("workspace_id = {id}"));
                config.workspace_id = Some(id);
            }
            if let Some(token) = token {
                changes.push("token = (set)".to_string());
                config.token = Some(token).filter(|t| !t.is_empty());
            }
            if let Some(cookie) = cookie {
                changes.push("cookie = (set)".to_string());
                config.cookie = Some(cookie).filter(|c| !c.is_empty());
            }
            if let Some(version) = client_version {
                changes.push(format!("client_version = {version}"));
                config.client_version = version;
            }
            if let Some(ms) = connect_timeout_ms {
                changes.push(format!("connect_timeout_ms = {ms}"));
                config.connect_timeout_ms = ms;
            }
            if let Some(ms) = request_timeout_ms {
                changes.push(format!("request_timeout_ms = {ms}"));
                config.request_timeout_ms = ms;
            }

            if changes.is_empty() {
                println!("No changes made.");
                return Ok(());
            }

            config.save()?;
            println!("Configuration updated:");
            for change in changes {
                println!("  {change}");
            }
            Ok(())
        }
    }
}

/// Print the configuration with credentials masked.
fn show_config(config: &Config) -> Result<()> {
    let masked = |value: &Option<String>| if value.is_some() { "(set)" } else { "(not set)" };
    let endpoint = config.socket_endpoint().ok();
    print_json(&json!({
        "configPath": Config::config_path(),
        "serverUrl": config.server_url,
        "socketEndpoint": endpoint,
        "workspaceId": config.workspace_id,
        "token": masked(&config.token),
        "cookie": masked(&config.cookie),
        "clientVersion": config.client_version,
        "connectTimeoutMs": config.connect_timeout_ms,
        "requestTimeoutMs": config.request_timeout_ms,
    }))
}
