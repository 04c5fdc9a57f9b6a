use std::{fs, path::PathBuf};

use clap::Parser;
use shop_api::openapi::ApiDoc;
use utoipa::OpenApi;

/// Writes the OpenAPI document for the shop API to disk.
#[derive(Parser, Debug)]
#[command(name = "openapi-export", version)]
struct Args {
    /// Destination file
    #[arg(short, long, default_value = "openapi/shop-api.v1.json")]
    out: PathBuf,

    /// Emit compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let doc = ApiDoc::openapi();
    let json = if args.compact {
        serde_json::to_string(&doc)?
    } else {
        serde_json::to_string_pretty(&doc)?
    };

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.out, json)?;

    println!("OpenAPI document written to {}", args.out.display());
    Ok(())
}
