//! rowsplit CLI: splits CSV files and query results into numbered CSV parts.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rowsplit::cli::{CliArgs, Command};
use rowsplit::{export_csv_file, export_query, init_tracing, AppError, ChunkSummary, ChunkWriter};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current row");
            on_signal.cancel();
        }
    });

    match run(args.command, cancel).await {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to encode summary: {e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            let presentation = e.to_presentation();
            eprintln!("{}: {}", presentation.title, presentation.message);
            if let Some(action) = presentation.action {
                eprintln!("{action}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, cancel: CancellationToken) -> Result<ChunkSummary, AppError> {
    match command {
        Command::File(args) => {
            let writer = ChunkWriter::new(args.chunk.chunk_config()?).with_cancellation(cancel);
            info!("Splitting {}", args.input.display());
            export_csv_file(writer, args.request()).await
        }
        Command::Query(args) => {
            let writer = ChunkWriter::new(args.chunk.chunk_config()?).with_cancellation(cancel);
            let request = args.request()?;
            export_query(args.session(), writer, request).await
        }
    }
}
