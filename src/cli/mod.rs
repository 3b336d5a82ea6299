pub mod advise;
pub mod dashboard;
pub mod gamify;
pub mod init;
pub mod report;
pub mod statements;
pub mod status;
pub mod transactions;
pub mod wrapped;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::advisor::{ChartKind, LlmClient, RiskAppetite};
use crate::analytics::TxnKind;
use crate::api::HttpBackend;
use crate::error::{FinwizzError, Result};
use crate::settings::{self, Settings};

#[derive(Parser)]
#[command(
    name = "finwizz",
    version,
    about = "Personal-finance terminal client: statements, insights and advice."
)]
pub struct Cli {
    /// User id to act as (overrides settings and FINWIZZ_USER_ID)
    #[arg(long, global = true)]
    pub user: Option<String>,
    /// Backend base URL (overrides settings and FINWIZZ_API_URL)
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store the backend URL, user id and model settings.
    Init {
        /// Backend base URL
        #[arg(long = "backend")]
        backend: Option<String>,
        /// Language model name
        #[arg(long)]
        model: Option<String>,
        /// Language model base URL (OpenAI-compatible)
        #[arg(long = "llm-url")]
        llm_url: Option<String>,
        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the effective configuration.
    Status,
    /// Totals across every upload.
    Summary,
    /// List uploaded statements with their first rows.
    Statements,
    /// Upload a bank statement (.csv, .pdf, .jpg, .jpeg, .png) for parsing.
    Upload {
        /// Path to the statement file
        file: PathBuf,
    },
    /// Ask the backend to re-categorize one upload.
    Enrich {
        /// Upload id (shown by `finwizz statements`)
        upload_id: String,
    },
    /// Interactive dashboard: totals, daily flows, categories, balance and spikes.
    Dashboard {
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: Option<String>,
    },
    /// Financial report: metrics, health, categories, months, recurring and anomalies.
    Report {
        /// Export the report as PDF instead of printing it
        #[arg(long)]
        pdf: bool,
        /// Output file for the PDF
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List, filter and browse transactions.
    Transactions(TransactionArgs),
    /// Change a transaction's category.
    Recategorize {
        /// Upload id the transaction belongs to
        #[arg(long)]
        upload: String,
        /// Transaction day (YYYY-MM-DD) or the date exactly as the backend stores it
        #[arg(long)]
        date: String,
        /// Transaction description
        #[arg(long)]
        description: String,
        /// New category name
        #[arg(long)]
        category: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Ask the language model for financial advice based on your history.
    Advise {
        /// What you are saving towards
        #[arg(long)]
        goal: Option<String>,
        /// Risk appetite
        #[arg(long, value_enum)]
        risk: Option<RiskAppetite>,
        /// Free-text question
        #[arg(long)]
        question: Option<String>,
    },
    /// Explain a chart in plain language.
    Explain {
        #[arg(value_enum)]
        chart: ChartKind,
    },
    /// Your statement, wrapped: five highlight cards.
    Wrapped {
        /// Print the cards instead of opening the animated view
        #[arg(long)]
        plain: bool,
    },
    /// Savings goal, recurring challenge and financial IQ.
    Gamify,
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct TransactionArgs {
    /// Case-insensitive description search
    #[arg(long)]
    pub search: Option<String>,
    /// Start date: YYYY-MM-DD
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// End date: YYYY-MM-DD
    #[arg(long = "to")]
    pub to_date: Option<String>,
    /// Debit, credit or all
    #[arg(long = "type", value_enum, default_value = "all")]
    pub kind: TxnKind,
    /// Category name
    #[arg(long)]
    pub category: Option<String>,
    /// Page number, 10 rows per page
    #[arg(long, default_value = "1")]
    pub page: usize,
    /// Open the interactive browser with category editing
    #[arg(long)]
    pub browse: bool,
}

/// Settings with environment and command-line overrides applied.
pub fn effective_settings(cli: &Cli) -> Settings {
    settings::load_settings().resolve(cli.user.as_deref(), cli.api_url.as_deref())
}

pub fn connect(settings: &Settings) -> Result<HttpBackend> {
    HttpBackend::new(&settings.api_url, settings.timeout())
}

pub fn language_model(settings: &Settings) -> Result<LlmClient> {
    let key = settings::api_key().ok_or_else(|| {
        FinwizzError::Settings(format!(
            "{} is not set; export it to use the language model",
            settings::API_KEY_ENV
        ))
    })?;
    LlmClient::new(
        &settings.llm_base_url,
        &settings.llm_model,
        &key,
        settings.timeout(),
    )
}

/// Ask before a write. `--yes` skips the prompt; without a terminal the write is refused.
pub fn confirm_write(action: &str, yes: bool) -> Result<()> {
    if yes {
        return Ok(());
    }
    ensure_confirmable(yes)?;
    eprintln!("{action}");
    let input = rpassword::prompt_password("Proceed? Type 'yes' to confirm: ")?;
    if input.trim() != "yes" {
        return Err(FinwizzError::Other("aborted".into()));
    }
    Ok(())
}

/// Fails when a write would need a prompt that cannot be shown.
pub fn ensure_confirmable(yes: bool) -> Result<()> {
    if yes || std::io::stdin().is_terminal() {
        return Ok(());
    }
    Err(FinwizzError::Other(
        "refusing to write in non-interactive mode without --yes".into(),
    ))
}

/// Terminal width for wrapped text, clamped to something readable.
pub(crate) fn text_width() -> usize {
    crossterm::terminal::size()
        .map(|(w, _)| w as usize)
        .unwrap_or(80)
        .clamp(40, 100)
}
