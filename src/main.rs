use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use csv_pager::api_client::{ApiClient, RemoteData};
use csv_pager::config::{Config, PAGE_SIZE_OPTIONS};
use csv_pager::format::{format_count, format_date, format_file_size, format_percent};
use csv_pager::models::{DataFrameInfo, FileId, FileStatus, UploadOutcome, UploadedFile};
use csv_pager::session::{Session, UploadMode};
use csv_pager::viewer::table_rows;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "csv-pager")]
#[command(about = "Upload CSV files to the CSV service and browse them page by page", long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "Override the service base URL")]
    api_url: Option<String>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Auto,
    Small,
    Large,
}

impl From<ModeArg> for UploadMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => UploadMode::Auto,
            ModeArg::Small => UploadMode::Small,
            ModeArg::Large => UploadMode::Large,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    Upload {
        #[arg(help = "Local CSV file")]
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "auto", help = "Upload endpoint")]
        mode: ModeArg,
    },

    List,

    Status {
        #[arg(help = "File id")]
        id: String,
    },

    Show {
        #[arg(help = "File id")]
        id: String,

        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        #[arg(short = 's', long, help = "Rows per page (50, 100, 500, 1000 or 5000)")]
        page_size: Option<u32>,
    },

    Delete {
        #[arg(help = "File id")]
        id: String,
    },

    Disk,

    Health,

    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::load_default()?
    };
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
        config.validate()?;
    }

    let client: Arc<dyn RemoteData> = Arc::new(ApiClient::from_config(&config)?);

    match cli.command {
        Commands::Upload { file, mode } => {
            let session = Session::new(client, &config);
            session
                .choose_upload(&file)
                .with_context(|| format!("Cannot upload {}", file.display()))?;

            info!("Uploading {}", file.display());
            let outcome = session.upload(mode.into()).await?;
            print_outcome(&outcome);
        }

        Commands::List => {
            let files = client.list_files().await?;
            if files.is_empty() {
                println!("No files uploaded yet.");
            } else {
                print_files(&files);
            }
        }

        Commands::Status { id } => {
            let file = client.file_status(&FileId::from(id)).await?;
            print_file(&file);
        }

        Commands::Show { id, page, page_size } => {
            let page_size = page_size.unwrap_or(config.viewer.default_page_size);
            if !PAGE_SIZE_OPTIONS.contains(&page_size) {
                anyhow::bail!("Page size must be one of {:?}", PAGE_SIZE_OPTIONS);
            }

            let id = FileId::from(id);
            let file = client.file_status(&id).await?;
            if file.status != FileStatus::Completed {
                println!(
                    "File is {}. Data will be available once processing is complete.",
                    file.status
                );
                return Ok(());
            }

            let result = client.fetch_page(&id, page, page_size).await?;
            println!("{}", file.filename);
            println!("{}", result.range_label());
            print_table(&result.columns, &table_rows(&result.columns, &result.data));
            println!("{}", result.page_label());
        }

        Commands::Delete { id } => {
            let id = FileId::from(id);
            client.delete_file(&id).await?;
            info!("Successfully deleted: {}", id);
        }

        Commands::Disk => {
            let session = Session::new(client, &config);
            // failures are kept in the view state
            let _ = session.refresh_disk_space().await;
            println!("{}", session.disk_space().label());
        }

        Commands::Health => {
            let health = client.health_check().await?;
            println!("Service status: {}", health.status);
        }

        Commands::Watch => watch(client, &config).await?,
    }

    Ok(())
}

/// Runs both pollers and prints what changes until Ctrl-C.
async fn watch(client: Arc<dyn RemoteData>, config: &Config) -> Result<()> {
    let session = Arc::new(Session::new(client, config));
    session.start();

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut last_files = String::new();
    let mut last_disk = String::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let disk = session.disk_space().label();
                if disk != last_disk {
                    println!("{}", disk);
                    last_disk = disk;
                }

                let snapshot = session.files();
                let summary = serde_json::to_string(&snapshot.files)?;
                if snapshot.loaded && summary != last_files {
                    println!("--- {} files, {} processing ---", snapshot.files.len(), snapshot.processing_count());
                    print_files(&snapshot.files);
                    last_files = summary;
                }
            }
        }
    }

    info!("Stopping watch");
    session.shutdown().await;
    Ok(())
}

fn print_outcome(outcome: &UploadOutcome) {
    match outcome {
        UploadOutcome::Parsed(response) => {
            println!("Successfully processed: {}", response.filename);
            print_dataframe_info(&response.dataframe_info);
        }
        UploadOutcome::Queued(ack) => {
            match &ack.file_id {
                Some(id) => println!("Upload accepted, processing as {}", id),
                None => println!("Upload accepted"),
            }
            if let Some(message) = &ack.message {
                println!("{}", message);
            }
        }
    }
}

fn print_dataframe_info(info: &DataFrameInfo) {
    println!("Shape: {} rows x {} columns", info.rows(), info.column_count());
    println!("Memory Usage: {} KB", info.memory_usage_kb());

    println!("Columns and Data Types:");
    for column in &info.columns {
        let dtype = info.dtypes.get(column).map(String::as_str).unwrap_or("?");
        let nulls = info.info.null_counts.get(column).copied().unwrap_or(0);
        println!("  {}: {} ({} null values)", column, dtype, nulls);
    }

    println!("Sample Data:");
    print_table(&info.columns, &table_rows(&info.columns, &info.head));
}

fn print_files(files: &[UploadedFile]) {
    let header = ["ID", "Filename", "Size", "Status", "Rows", "Uploaded"]
        .map(String::from)
        .to_vec();
    let rows: Vec<Vec<String>> = files
        .iter()
        .map(|f| {
            let status = if f.status == FileStatus::Processing {
                format!("{} {}", f.status, format_percent(f.processing_progress))
            } else {
                f.status.to_string()
            };
            vec![
                f.file_id.to_string(),
                f.filename.clone(),
                format_file_size(f.file_size),
                status,
                f.total_rows.map(format_count).unwrap_or_default(),
                format_date(&f.created_at),
            ]
        })
        .collect();
    print_table(&header, &rows);
}

fn print_file(file: &UploadedFile) {
    println!("ID:       {}", file.file_id);
    println!("Filename: {}", file.filename);
    println!("Size:     {}", format_file_size(file.file_size));
    println!("Status:   {}", file.status);
    if file.status == FileStatus::Processing {
        println!("Progress: {}", format_percent(file.processing_progress));
    }
    if let Some(rows) = file.total_rows {
        println!("Rows:     {}", format_count(rows));
    }
    if let Some(message) = &file.error_message {
        println!("Error:    {}", message);
    }
    println!("Uploaded: {}", format_date(&file.created_at));
}

fn print_table(header: &[String], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(header));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    for row in rows {
        println!("{}", line(row.as_slice()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_rejects_page_zero() {
        assert!(Cli::try_parse_from(["csv-pager", "show", "abc", "--page", "0"]).is_err());
    }

    #[test]
    fn show_defaults_to_first_page() {
        let cli = Cli::try_parse_from(["csv-pager", "show", "abc"]).unwrap();
        match cli.command {
            Commands::Show { id, page, page_size } => {
                assert_eq!(id, "abc");
                assert_eq!(page, 1);
                assert_eq!(page_size, None);
            }
            _ => panic!("expected show"),
        }
    }
}
