mod advisor;
mod analytics;
mod api;
mod browser;
mod categories;
mod cli;
mod effects;
mod error;
mod fmt;
mod markdown;
mod models;
#[cfg(feature = "pdf")]
mod pdf;
mod reports;
mod settings;
mod tui;
mod wrapped;

use std::sync::Once;

use clap::{CommandFactory, Parser};

use advisor::AdviceRequest;
use cli::{Cli, Commands};
use error::Result;
use models::CategoryUpdate;

static TRACING_INIT: Once = Once::new();

/// Events go to stderr so command output stays pipeable. `RUST_LOG` overrides the default.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("finwizz=warn"));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    });
}

fn dispatch(cli: Cli) -> Result<()> {
    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };
    let settings = cli::effective_settings(&cli);

    match command {
        Commands::Init {
            backend,
            model,
            llm_url,
            timeout,
        } => cli::init::run(cli::init::InitArgs {
            user: cli.user.clone(),
            backend: backend.clone().or_else(|| cli.api_url.clone()),
            model: model.clone(),
            llm_url: llm_url.clone(),
            timeout: *timeout,
        }),
        Commands::Status => {
            cli::status::run(&settings);
            Ok(())
        }
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "finwizz", &mut std::io::stdout());
            Ok(())
        }
        Commands::Recategorize {
            upload,
            date,
            description,
            category,
            yes,
        } => {
            // resolve before connecting so a typo never costs a request
            categories::resolve(category)?;
            cli::ensure_confirmable(*yes)?;
            let user = settings.require_user()?;
            let backend = cli::connect(&settings)?;
            let update = CategoryUpdate {
                upload_id: upload.clone(),
                date: date.clone(),
                description: description.clone(),
                category: category.clone(),
            };
            let message = cli::transactions::recategorize(&backend, user, update, *yes)?;
            println!("{message}");
            Ok(())
        }
        Commands::Enrich { upload_id } => {
            let backend = cli::connect(&settings)?;
            println!("{}", cli::statements::enrich(&backend, upload_id)?);
            Ok(())
        }
        Commands::Upload { file } => {
            api::check_extension(file)?;
            let user = settings.require_user()?;
            let backend = cli::connect(&settings)?;
            println!("{}", cli::statements::upload(&backend, user, file)?);
            Ok(())
        }
        Commands::Advise {
            goal,
            risk,
            question,
        } => {
            let request = AdviceRequest {
                goal: goal.clone(),
                risk: *risk,
                question: question.clone(),
            };
            request.validate()?;
            let user = settings.require_user()?;
            let model = cli::language_model(&settings)?;
            let backend = cli::connect(&settings)?;
            let out = cli::advise::advise(&backend, &model, user, &request, cli::text_width())?;
            println!("{out}");
            Ok(())
        }
        Commands::Explain { chart } => {
            let user = settings.require_user()?;
            let model = cli::language_model(&settings)?;
            let backend = cli::connect(&settings)?;
            let out = cli::advise::explain(&backend, &model, user, *chart, cli::text_width())?;
            println!("{out}");
            Ok(())
        }
        Commands::Dashboard { from_date, to_date } => {
            analytics::DateRange::parse(from_date.as_deref(), to_date.as_deref())?;
            let user = settings.require_user()?;
            let backend = cli::connect(&settings)?;
            cli::dashboard::run(&backend, user, from_date.as_deref(), to_date.as_deref())
        }
        Commands::Transactions(args) => {
            analytics::DateRange::parse(args.from_date.as_deref(), args.to_date.as_deref())?;
            let user = settings.require_user()?;
            let backend = cli::connect(&settings)?;
            cli::transactions::run(&backend, user, args)
        }
        Commands::Summary => {
            let user = settings.require_user()?;
            let backend = cli::connect(&settings)?;
            println!("{}", cli::statements::summary(&backend, user)?);
            Ok(())
        }
        Commands::Statements => {
            let user = settings.require_user()?;
            let backend = cli::connect(&settings)?;
            println!("{}", cli::statements::statements(&backend, user)?);
            Ok(())
        }
        Commands::Report { pdf, output } => {
            let user = settings.require_user()?;
            let backend = cli::connect(&settings)?;
            cli::report::run(&backend, user, *pdf, output.clone())
        }
        Commands::Wrapped { plain } => {
            let user = settings.require_user()?;
            let backend = cli::connect(&settings)?;
            cli::wrapped::run(&backend, user, *plain)
        }
        Commands::Gamify => {
            let user = settings.require_user()?;
            let backend = cli::connect(&settings)?;
            println!("{}", cli::gamify::run(&backend, user)?);
            Ok(())
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
