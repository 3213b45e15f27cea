use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use txn_ledger::api::{self, ParseResponse};
use txn_ledger::balance::compute_balances;
use txn_ledger::store::{LedgerStore, ManualTransactionInput, YearMonth};
use txn_ledger::StoreError;

/// Parse, check and maintain plain-text `.transactions` ledgers.
#[derive(Parser)]
#[command(name = "txn-ledger", version)]
struct Cli {
    /// Ledger store directory
    #[arg(long, global = true, env = "TXN_LEDGER_DIR", default_value = "generated")]
    dir: PathBuf,

    /// Current month as YYYYMM (defaults to the local clock)
    #[arg(long, global = true)]
    month: Option<YearMonth>,

    /// Print JSON responses
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file; exits 1 when it has errors, 2 when it cannot be read
    Parse { file: PathBuf },

    /// Print account balances of a file
    Balances { file: PathBuf },

    /// Rotate if needed, then parse the active ledger
    Load,

    /// Import transactions of source files into the active ledger
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Append a transaction read from a JSON file ("-" for stdin)
    AddManual { input: PathBuf },

    /// Declare an account with an optional opening balance
    AddAccount {
        name: String,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        opening_balance: Option<String>,
    },

    /// Archive the active ledger if it belongs to another month
    Rotate,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_response(response: &ParseResponse, json: bool) -> Result<()> {
    if json {
        return print_json(response);
    }

    for diagnostic in &response.diagnostics {
        eprintln!("{}", diagnostic);
    }
    println!(
        "{} transactions, {} diagnostics",
        response.transactions.len(),
        response.diagnostics.len()
    );
    for balance in &response.balances {
        for total in &balance.totals {
            println!("{:<40} {:>20} {}", balance.account, total.amount, total.commodity);
        }
    }
    Ok(())
}

fn read_manual_input(path: &Path) -> Result<ManualTransactionInput> {
    let text = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&text).context("invalid manual transaction JSON")
}

fn parse_command(file: PathBuf, json: bool) -> Result<i32> {
    let response = match api::parse(&file) {
        Ok(response) => response,
        Err(StoreError::ReadSource { path, source }) => {
            eprintln!("Failed to read {}: {}", path.display(), source);
            return Ok(2);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        print_json(&response)?;
    } else if response.ok {
        println!("OK");
    } else {
        eprintln!("Parse failed with diagnostics:");
        for diagnostic in response.diagnostics.iter().filter(|d| d.is_error()) {
            eprintln!("{}", diagnostic);
        }
    }
    Ok(if response.ok { 0 } else { 1 })
}

fn run(cli: Cli) -> Result<i32> {
    let month = cli.month.unwrap_or_else(YearMonth::current);
    let store = LedgerStore::open(&cli.dir);

    match cli.command {
        Commands::Parse { file } => return parse_command(file, cli.json),
        Commands::Balances { file } => {
            let result = txn_ledger::parse_file(&file)?;
            let balances = compute_balances(&result.ledger.transactions)?;
            if cli.json {
                print_json(&balances)?;
            } else {
                for balance in &balances {
                    for total in &balance.totals {
                        println!("{:<40} {:>20} {}", balance.account, total.amount, total.commodity);
                    }
                }
            }
        }
        Commands::Load => {
            let response = api::load_generated_ledger(&store, month)?;
            print_response(&response, cli.json)?;
        }
        Commands::Import { paths } => {
            let response = api::import_generated_sources(&store, month, paths.as_slice())?;
            if cli.json {
                print_json(&response)?;
            } else {
                println!(
                    "imported {}, skipped {} duplicates, rejected {}, archived {}",
                    response.stats.imported,
                    response.stats.skipped_duplicates,
                    response.stats.rejected,
                    response.stats.archived
                );
                print_response(&response.parse, false)?;
            }
        }
        Commands::AddManual { input } => {
            let input = read_manual_input(&input)?;
            let response = api::add_manual_to_generated_ledger(&store, month, &input)?;
            print_response(&response, cli.json)?;
        }
        Commands::AddAccount {
            name,
            currency,
            opening_balance,
        } => {
            let response = api::add_account_to_generated_ledger(
                &store,
                month,
                &name,
                currency.as_deref(),
                opening_balance.as_deref(),
            )?;
            print_response(&response, cli.json)?;
        }
        Commands::Rotate => {
            api::rotate_generated_ledger(&store, month)?;
            println!("{}", store.dir().display());
        }
    }
    Ok(0)
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(2);
        }
    }
}
