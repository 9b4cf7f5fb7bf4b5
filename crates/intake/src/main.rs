//! `sellerdesk-intake` -- bulk CSV upload from the command line.
//!
//! Adds every file given on the command line to a batch, preselects the
//! account whose username exactly matches the one detected in the file,
//! asks before uploading into a mismatched account, then uploads all
//! eligible files one after another.
//!
//! ```text
//! sellerdesk-intake [--data-type order|listing|customer] <file.csv>...
//! ```
//!
//! See [`IntakeConfig::from_env`] for environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sellerdesk_core::account_match::best_exact_match;
use sellerdesk_core::upload_entry::{parse_data_type, DataType, FileRef, UploadEntry};
use sellerdesk_intake::config::IntakeConfig;
use sellerdesk_intake::confirm::{AlwaysConfirm, MismatchConfirmer, StdinConfirmer};
use sellerdesk_intake::coordinator::IntakeCoordinator;
use sellerdesk_intake::directory::{AccountDirectory, StaticAccountDirectory};
use sellerdesk_intake::events::IntakeEvent;
use sellerdesk_intake::http::{build_client, HttpAccountDirectory, HttpFileTransfer};

/// Command line.
#[derive(Parser, Debug)]
#[command(name = "sellerdesk-intake", version, about = "Bulk CSV upload into seller accounts")]
struct CliArgs {
    /// Data type applied to every file [default: INTAKE_DATA_TYPE, else order]
    #[arg(short = 't', long, value_parser = parse_data_type)]
    data_type: Option<DataType>,

    /// CSV files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// One row per entry: status, progress, file name and message.
fn result_table(entries: &[UploadEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["STATUS", "PCT", "FILE", "MESSAGE"]);
    for entry in entries {
        table.add_row(vec![
            entry.status().to_string(),
            format!("{}%", entry.progress()),
            entry.file_name().to_string(),
            entry.message().unwrap_or_default().to_string(),
        ]);
    }
    table
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sellerdesk_intake=info".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn read_file(path: &Path) -> anyhow::Result<FileRef> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(FileRef::new(name, content))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    dotenvy::dotenv().ok();

    let config = IntakeConfig::from_env()?;
    init_tracing(config.log_json);
    let data_type = args.data_type.unwrap_or(config.default_data_type);

    tracing::info!(
        api_url = %config.api_url,
        data_type = %data_type,
        files = args.files.len(),
        "Starting sellerdesk-intake",
    );

    let client = build_client(&config).context("Failed to build HTTP client")?;
    let directory: Box<dyn AccountDirectory> = match &config.accounts_file {
        Some(path) => Box::new(StaticAccountDirectory::from_json_file(path).await?),
        None => Box::new(HttpAccountDirectory::new(
            client.clone(),
            config.api_url.clone(),
        )),
    };
    let transfer = Arc::new(HttpFileTransfer::from_config(client, &config));
    let mut coordinator = IntakeCoordinator::load(transfer, directory.as_ref()).await?;

    let mut events = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                IntakeEvent::UploadProgress {
                    entry_id, percent, ..
                } => eprintln!("  {entry_id} {percent:>3}%"),
                IntakeEvent::UploadFailed { entry_id, error } => {
                    eprintln!("  {entry_id} failed: {error}")
                }
                IntakeEvent::BatchFinished { .. } => break,
                _ => {}
            }
        }
    });

    let mut rejected = 0usize;
    for path in &args.files {
        let file = match read_file(path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(error = %e, "Skipping file");
                rejected += 1;
                continue;
            }
        };
        let id = match coordinator.add_file(file, data_type) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "File rejected");
                rejected += 1;
                continue;
            }
        };

        let entry = coordinator.entry(id)?;
        let preselect = best_exact_match(entry.suggested_accounts())
            .map(|s| s.account_id)
            .or(config.default_account_id);
        match preselect {
            Some(account_id) => coordinator.select_account(id, Some(account_id))?,
            None => tracing::warn!(
                path = %path.display(),
                "No matching account and no INTAKE_DEFAULT_ACCOUNT_ID, file will not be uploaded",
            ),
        }
    }

    let confirmer: Box<dyn MismatchConfirmer> = if config.auto_confirm {
        Box::new(AlwaysConfirm)
    } else {
        Box::new(StdinConfirmer)
    };
    let report = coordinator.upload_all(confirmer.as_ref()).await?;
    let _ = printer.await;

    println!("{}", result_table(coordinator.batch().entries()));
    println!(
        "\n{} attempted, {} completed, {} failed, {} skipped, {} rejected",
        report.attempted, report.completed, report.failed, report.skipped, rejected
    );

    let unfinished = report.summary.total - report.summary.completed;
    if unfinished > 0 || rejected > 0 {
        bail!("{} file(s) were not uploaded", unfinished + rejected);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("sellerdesk-intake").chain(args.iter().copied()))
    }

    #[test]
    fn files_without_data_type_defer_to_config() {
        let parsed = parse(&["a.csv", "b.csv"]).unwrap();
        assert_eq!(parsed.data_type, None);
        assert_eq!(parsed.files, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
    }

    #[test]
    fn data_type_flag_forms() {
        let parsed = parse(&["--data-type", "listing", "a.csv"]).unwrap();
        assert_eq!(parsed.data_type, Some(DataType::Listing));
        let parsed = parse(&["--data-type=Customer", "a.csv"]).unwrap();
        assert_eq!(parsed.data_type, Some(DataType::Customer));
        let parsed = parse(&["-t", "order", "a.csv"]).unwrap();
        assert_eq!(parsed.data_type, Some(DataType::Order));
    }

    #[test]
    fn rejects_missing_files_and_unknown_flags() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--data-type"]).is_err());
        assert!(parse(&["--verbose", "a.csv"]).is_err());
        assert!(parse(&["--data-type", "invoice", "a.csv"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }

    #[test]
    fn result_table_keeps_long_names_whole() {
        let name = "march-2024-ebay-orders-export-for-the-main-store.csv";
        let entry = UploadEntry::new(FileRef::new(name, b"Order,Total\n1,2\n".to_vec()), DataType::Order, &[]);
        let mut table = result_table(std::slice::from_ref(&entry));
        table.set_width(200);

        let rendered = table.to_string();
        assert!(rendered.contains("STATUS"));
        assert!(rendered.contains("MESSAGE"));
        assert!(rendered.contains(name));
        assert!(rendered.contains("pending"));
        assert!(rendered.contains("0%"));
    }
}
