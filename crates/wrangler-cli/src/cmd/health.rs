use crate::output::print_json;
use std::path::Path;
use wrangler_core::crafting::HttpCraftingService;

pub fn run(config_path: &Path, url: Option<String>, json: bool) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(url) = url {
        config.crafting.base_url = url;
    }
    let service = HttpCraftingService::new(&config.crafting)?;
    let rt = super::runtime()?;

    let (healthy, status) = rt.block_on(async {
        if !service.health().await {
            return (false, None);
        }
        (true, service.status().await.ok())
    });

    if json {
        print_json(&serde_json::json!({
            "url": service.base_url(),
            "healthy": healthy,
            "status": status,
        }))?;
    } else if healthy {
        println!("{}: ok", service.base_url());
        if let Some(s) = &status {
            println!("busy: {}", s.is_busy());
        }
    }

    if !healthy {
        anyhow::bail!("runner at {} is not healthy", service.base_url());
    }
    Ok(())
}
