use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use saudi_invoicer::commands::extract::run_extract;
use saudi_invoicer::commands::invoices::{
    print_invoice, reset_invoice, run_item, set_field, show_invoice, show_qr, show_totals, ItemCommand,
};
use saudi_invoicer::commands::settings::{run_settings, SettingsCommand};
use saudi_invoicer::services::editor::InvoiceField;
use saudi_invoicer::services::state::AppState;

/// Saudi tax invoice builder with ZATCA QR codes.
#[derive(Parser, Debug)]
#[command(name = "invoicer", version, about, long_about = None)]
struct Cli {
    /// Repeat for more output (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Where the invoice database and printed documents live.
    #[arg(long, global = true, env = "INVOICER_DATA_DIR", default_value = ".invoicer")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the current invoice.
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Print subtotal, VAT and total.
    Totals {
        #[arg(long)]
        json: bool,
    },
    /// Set one field: number, type, date, time, discount, notes,
    /// seller.<name|address|vat|cr|contact|logo> or buyer.<...>.
    Set { field: InvoiceField, value: String },
    /// Add, change or remove line items.
    #[command(subcommand)]
    Item(ItemCommand),
    /// Discard the current invoice and start from the sample one.
    Reset,
    /// Print the ZATCA QR payload, or decode one.
    Qr {
        #[arg(long)]
        decode: Option<String>,
    },
    /// Write the printable document and open it.
    Print {
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        no_open: bool,
    },
    /// Fill the invoice from a photo of an existing one.
    Extract { image: PathBuf },
    /// API key, model and extraction history.
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut state = AppState::open(&cli.data_dir)?;

    match cli.command {
        Commands::Show { json } => show_invoice(&state, json),
        Commands::Totals { json } => show_totals(&state, json),
        Commands::Set { field, value } => set_field(&state, field, &value),
        Commands::Item(command) => run_item(&state, command),
        Commands::Reset => reset_invoice(&state),
        Commands::Qr { decode } => show_qr(&state, decode),
        Commands::Print { output, no_open } => print_invoice(&state, output, no_open),
        Commands::Extract { image } => run_extract(&state, &image).await,
        Commands::Settings(command) => run_settings(&mut state, command).await,
    }
}
