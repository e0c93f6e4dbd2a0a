use crate::output::print_json;
use std::path::Path;
use wrangler_core::crafting::{HttpCraftingService, RunnerResponse};

/// One-shot control commands sent to the order runner.
#[derive(Debug, Clone)]
pub enum RunnerCommand {
    Stop,
    Resume,
    Home,
    RunFile(String),
}

impl RunnerCommand {
    fn label(&self) -> &'static str {
        match self {
            RunnerCommand::Stop => "stop",
            RunnerCommand::Resume => "resume",
            RunnerCommand::Home => "home",
            RunnerCommand::RunFile(_) => "run-file",
        }
    }
}

fn service(config_path: &Path, url: Option<String>) -> anyhow::Result<HttpCraftingService> {
    let mut config = super::load_config(config_path)?;
    if let Some(url) = url {
        config.crafting.base_url = url;
    }
    Ok(HttpCraftingService::new(&config.crafting)?)
}

pub fn status(config_path: &Path, url: Option<String>, json: bool) -> anyhow::Result<()> {
    let service = service(config_path, url)?;
    let rt = super::runtime()?;
    let status = rt.block_on(service.status()).map_err(|e| {
        anyhow::anyhow!("runner at {} did not report status: {e}", service.base_url())
    })?;

    if json {
        return print_json(&status);
    }

    println!("{}", service.base_url());
    println!("state:      {}", status.state);
    println!("busy:       {}", status.is_busy());
    println!("executing:  {}", status.is_executing);
    println!("pending:    {}", status.has_pending_order);
    println!("incomplete: {}", status.has_incomplete_orders);
    if !status.current_file.is_empty() {
        println!("file:       {}", status.current_file);
    }
    if !status.character_name.is_empty() {
        println!("character:  {} @ {}", status.character_name, status.world_name);
    }
    println!("api:        {}", status.api_status);
    println!("bot:        {}", if status.bot_running { "running" } else { "stopped" });
    println!("runtime:    {}s", status.runtime_seconds);
    Ok(())
}

pub fn send(
    config_path: &Path,
    command: RunnerCommand,
    url: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let service = service(config_path, url)?;
    let rt = super::runtime()?;
    let response: RunnerResponse = rt
        .block_on(async {
            match &command {
                RunnerCommand::Stop => service.stop_gently().await,
                RunnerCommand::Resume => service.resume().await,
                RunnerCommand::Home => service.go_home().await,
                RunnerCommand::RunFile(path) => service.run_path(path).await,
            }
        })
        .map_err(|e| {
            anyhow::anyhow!("{} failed against {}: {e}", command.label(), service.base_url())
        })?;

    if json {
        print_json(&serde_json::json!({
            "url": service.base_url(),
            "command": command.label(),
            "success": response.success,
            "message": response.text(),
        }))?;
    } else if response.success {
        println!("{}: {}", command.label(), response.text());
    }

    if !response.success {
        anyhow::bail!("runner refused {}: {}", command.label(), response.text());
    }
    Ok(())
}
