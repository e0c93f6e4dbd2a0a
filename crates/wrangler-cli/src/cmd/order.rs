use crate::output::print_json;
use std::path::Path;
use wrangler_core::crafting::{CraftingService, HttpCraftingService, OrderBatch, OrderSpec};
use wrangler_core::ClassJob;

pub struct OrderArgs {
    pub item: u32,
    pub amount: u32,
    pub class: String,
    pub hq: bool,
    pub quick_synth: bool,
    pub url: Option<String>,
    pub dry_run: bool,
}

pub fn run(config_path: &Path, args: OrderArgs, json: bool) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(url) = args.url {
        config.crafting.base_url = url;
    }
    if args.amount == 0 {
        anyhow::bail!("--amount must be at least 1");
    }

    let class: ClassJob = args.class.parse()?;
    let spec = OrderSpec::new(args.item, args.amount, class)
        .with_hq(args.hq)
        .with_quick_synth(args.quick_synth);
    let batch = OrderBatch::single(spec);

    if args.dry_run {
        println!("{}", batch.to_wire()?);
        return Ok(());
    }

    let service = HttpCraftingService::new(&config.crafting)?;
    let rt = super::runtime()?;
    let ok = rt.block_on(service.submit_order(&batch));

    if json {
        print_json(&serde_json::json!({
            "url": service.base_url(),
            "orders": batch.summary(),
            "success": ok,
        }))?;
    } else if ok {
        println!("Order finished: {}", batch.summary());
    }

    if !ok {
        anyhow::bail!("order did not complete on runner at {}", service.base_url());
    }
    Ok(())
}
