use clap::Parser;
use relmongo::{
    ast::Command,
    catalog::Catalog,
    options::TranslatorOptions,
    store::{mongodb::MongoStore, NoLargeObjects},
    usererror::{self, UserError},
    Execution, Translation,
};
use std::{env, fs};
use tracing::Level;
use tracing_subscriber::{fmt::time, EnvFilter};

#[derive(Debug)]
struct CliError(String);

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T> From<T> for CliError
where
    T: std::error::Error,
{
    fn from(e: T) -> Self {
        CliError(e.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about=None)]
struct Cli {
    #[arg(index = 1, help = "A file holding the JSON-encoded command to translate")]
    command: String,
    #[arg(short, long, help = "A file holding the JSON-encoded catalog")]
    catalog: String,
    #[arg(short, long, help = "A file holding JSON-encoded translator options")]
    options: Option<String>,
    #[arg(short, long, help = "Run the command and display the result")]
    execute: bool,
    #[arg(
        short,
        long,
        help = "The mongodb uri, default = mongodb://localhost:27017"
    )]
    uri: Option<String>,
    #[arg(short, long, help = "The database holding the collections, default = test")]
    db: Option<String>,
}

fn init_logger() {
    let log_level_str = env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".into());
    let log_level = log_level_str.parse::<Level>().unwrap_or(Level::WARN);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level_str))
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_timer(time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .init();
    tracing::debug!("Logger initialized with level: {}", log_level);
}

fn user_error(e: relmongo::result::Error) -> CliError {
    CliError(usererror::display(&e))
}

fn main() -> Result<(), CliError> {
    init_logger();
    let args = Cli::parse();

    let catalog: Catalog = serde_json::from_str(&fs::read_to_string(&args.catalog)?)?;
    let command: Command = serde_json::from_str(&fs::read_to_string(&args.command)?)?;
    let options = match &args.options {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => TranslatorOptions::default(),
    };

    if !args.execute {
        let translation = translate_offline(&command, &catalog, &options).map_err(user_error)?;
        print_translation(&translation);
        return Ok(());
    }

    let uri = args.uri.unwrap_or("mongodb://localhost:27017".to_string());
    let db = args.db.unwrap_or("test".to_string());
    let store = MongoStore::connect(&uri, &db, &options.large_object_collection)?;
    let execution =
        relmongo::execute(&command, &catalog, &options, &store).map_err(user_error)?;
    match execution {
        Execution::Rows { columns, rows } => {
            println!("{}", columns.join("\t"));
            for row in rows {
                let values = row.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                println!("{}", values.join("\t"));
            }
        }
        Execution::Write(outcome) => {
            println!("affected: {}", outcome.affected);
            if let Some(key) = outcome.generated_key {
                println!("generated key: {key}");
            }
            for warning in outcome.warnings {
                println!("warning: {warning}");
            }
        }
    }
    Ok(())
}

/// Translates without a store. Writes of large object values need one and
/// fail here.
fn translate_offline(
    command: &Command,
    catalog: &Catalog,
    options: &TranslatorOptions,
) -> relmongo::result::Result<Translation> {
    Ok(match command {
        Command::Select(select) => {
            Translation::Query(relmongo::translate_query(select, catalog, options)?)
        }
        c => Translation::Write(relmongo::translate_write(
            c,
            catalog,
            options,
            &NoLargeObjects,
        )?),
    })
}

fn print_translation(translation: &Translation) {
    match translation {
        Translation::Query(query) => {
            println!("collection: {},\npipeline:", query.collection);
            for stage in &query.pipeline {
                println!("    {}", stage);
            }
            println!("columns:");
            for column in &query.columns {
                println!("    {} {} <- {}", column.name, column.ty, column.path);
            }
        }
        Translation::Write(plan) => println!("{plan:#?}"),
    }
}
