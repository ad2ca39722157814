use anyhow::{bail, Context, Result};
use log::info;
use std::env;
use std::path::PathBuf;

use physical_flow_upload::column_mapper;
use physical_flow_upload::env_loader;
use physical_flow_upload::source_data;

fn main() -> Result<()> {
    env_loader::load_env();
    env_logger::init();

    // Upload file from the first argument, optional output path from the second
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("Usage: suggest-mapping <upload.csv> [mapping.json]");
    }
    let data_path = PathBuf::from(&args[1]);

    info!("Suggesting column mapping for {:?}", data_path);
    let source = source_data::read_source_file(&data_path)?;
    let mapping = column_mapper::suggest_mapping(&source.headers);
    let json = serde_json::to_string_pretty(&mapping).context("Failed to serialise mapping")?;

    let unmapped: Vec<&String> = source
        .headers
        .iter()
        .filter(|h| !mapping.contains_key(h.as_str()))
        .collect();

    match args.get(2) {
        Some(out) => {
            std::fs::write(out, &json).with_context(|| format!("Failed to write mapping to {}", out))?;
            println!("Mapping for {} columns written to {}", mapping.len(), out);
        }
        None => println!("{}", json),
    }
    if !unmapped.is_empty() {
        eprintln!("Unmapped columns: {:?}", unmapped);
    }
    Ok(())
}
