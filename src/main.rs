use anyhow::{bail, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use physical_flow_upload::column_mapper;
use physical_flow_upload::config;
use physical_flow_upload::env_loader;
use physical_flow_upload::excel_writer;
use physical_flow_upload::filter::FilterCriterion;
use physical_flow_upload::gateway::HttpValidationGateway;
use physical_flow_upload::models::Summary;
use physical_flow_upload::parser::{BulkFlowParser, ParseComplete, ParserHooks};
use physical_flow_upload::review::render_table;
use physical_flow_upload::source_data;

/// Validate a bulk physical flow upload and export its errors.
#[derive(Parser, Debug)]
#[command(name = "flow-upload", version)]
struct Args {
    /// Upload file (comma separated, header row first)
    data: PathBuf,

    /// Column mapping JSON; suggested from the header row when omitted
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// Rows to show: ALL, ERROR, NEW or EXISTING
    #[arg(short, long, default_value = "ALL")]
    filter: String,

    /// Base URL of the repository, overrides FLOW_UPLOAD_BASE_URL
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in seconds, overrides FLOW_UPLOAD_TIMEOUT_SECS
    #[arg(long)]
    timeout: Option<u64>,

    /// Directory for physical_flow_errors.csv, overrides FLOW_UPLOAD_EXPORT_DIR
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Skip writing the error export
    #[arg(long)]
    no_export: bool,

    /// Also write a review workbook (.xlsx) to this path
    #[arg(long)]
    workbook: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_loader::load_env();
    env_logger::init();

    let args = Args::parse();
    info!("Starting bulk flow upload for {:?}", args.data);

    let mut upload_config = config::from_env();
    if let Some(base_url) = &args.base_url {
        upload_config.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(secs) = args.timeout {
        upload_config.request_timeout = Duration::from_secs(secs.max(1));
    }
    if let Some(dir) = &args.export_dir {
        upload_config.export_dir = dir.clone();
    }

    let source = source_data::read_source_file(&args.data)?;
    let mapping = match &args.mapping {
        Some(path) => source_data::read_mapping_file(path)?,
        None => {
            let suggested = column_mapper::suggest_mapping(&source.headers);
            for (header, target) in &suggested {
                println!("  {} -> {}", header, target.name);
            }
            suggested
        }
    };
    if mapping.is_empty() {
        bail!("No usable column mapping for {:?}", args.data);
    }

    let gateway = Arc::new(HttpValidationGateway::new(&upload_config)?);
    let hooks = ParserHooks {
        on_parse_complete: Some(Arc::new(|event: &ParseComplete| {
            info!("Parse of batch {} complete: {}", event.batch_id, event.is_complete());
        })),
        ..Default::default()
    };
    let row_count = source.rows.len();
    let handle = BulkFlowParser::new(mapping, source.rows, gateway, hooks).initialise();

    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.set_message(format!("Validating {} rows...", row_count));
    spinner.enable_steady_tick(Duration::from_millis(80));
    let parsed = handle.parse_flows().await;
    spinner.finish_and_clear();
    let event = parsed?;

    print_summary(&event.summary, event.is_complete());

    let criterion: FilterCriterion = args.filter.parse().unwrap_or_default();
    let view = handle.apply_filter(criterion).await;
    println!("\nShowing {} of {} flows ({})", view.len(), event.data.len(), criterion);
    print!("{}", render_table(&handle.review().await));

    if !args.no_export {
        // Export from the full view so error rows are never hidden by the display filter
        handle.apply_filter(FilterCriterion::All).await;
        if event.summary.failed_flows > 0 {
            let path = handle.write_parse_errors(&upload_config.export_dir).await?;
            println!("\nErrors exported to {:?}", path);
        } else {
            info!("No failed rows, skipping error export.");
        }
    }

    if let Some(path) = &args.workbook {
        excel_writer::write_review_workbook(path, &event.summary, &event.data)?;
        println!("Review workbook written to {:?}", path);
    }

    if !event.is_complete() {
        warn!("Upload has unresolved errors and cannot be submitted as-is.");
    }
    Ok(())
}

fn print_summary(summary: &Summary, complete: bool) {
    println!("\nUpload summary");
    println!("  Total:             {}", summary.total);
    println!("  New flows:         {}", summary.new_flows);
    println!("  Existing flows:    {}", summary.existing_flows);
    println!("  Failed flows:      {}", summary.failed_flows);
    println!("  Missing entities:  {}", summary.missing_entities);
    println!("  Circular flows:    {}", summary.circular_flows);
    println!("  Errors:            {}", summary.errors);
    println!("  Ready to submit:   {}", if complete { "yes" } else { "no" });
}
