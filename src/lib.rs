pub mod cli;
pub mod config;
pub mod csv_store;
pub mod dbf;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod first_run;
pub mod inputs;
pub mod io_utils;
pub mod job;
pub mod prompt;
pub mod rules;
pub mod store;
pub mod table;

use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::OnceLock,
    thread,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::Cli,
    config::{Config, DEFAULT_CONFIG_FILE},
    diagnostics::{DiagnosticsSink, FileSink},
    error::InputError,
    first_run::FirstRunMarker,
    job::{JobOptions, run_jobs},
    rules::RuleSet,
    store::FileStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("dbf_column_filler", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = Config::load(&config_path)?;
    cli.apply_overrides(&mut config.settings);
    let Config { settings, messages } = &config;

    let sink = FileSink::open(Path::new(&settings.log_file))?;
    debug!("Appending faults to {:?}", sink.path());

    // Without --rules an operator is at the console (typically after dropping
    // files onto the executable) and needs time to read the output.
    let interactive = cli.rules.is_none();
    if interactive {
        for line in messages.intro() {
            println!("{line}");
        }
        println!();
        let first_run = FirstRunMarker::new(&settings.first_run_marker).check_and_mark();
        pause(settings.intro_delay(first_run));
    }

    if let Err(err) = inputs::check_inputs(&cli.files, &settings.file_extension) {
        match &err {
            InputError::NoFiles => println!("{}", messages.drop_the_files()),
            InputError::WrongExtension { extension, .. } => {
                println!("{}", messages.wrong_format(extension))
            }
        }
        info!("Nothing processed: {err}");
        if interactive {
            pause(settings.abort_linger());
        }
        return Ok(());
    }

    let rules = match &cli.rules {
        Some(line) => RuleSet::parse_line(line).context("Parsing --rules")?,
        None => prompt::prompt_rules(&mut io::stdin().lock(), &mut io::stdout(), messages)?,
    };
    for rule in &rules {
        debug!("Rule {rule}");
    }

    let encoding = io_utils::resolve_encoding(settings.encoding.as_deref())?;
    let delimiter = settings
        .delimiter
        .as_deref()
        .map(io_utils::parse_delimiter)
        .transpose()
        .map_err(|err| anyhow!("Invalid delimiter: {err}"))?;
    if let Some(delimiter) = delimiter {
        debug!(
            "CSV delimiter '{}'",
            io_utils::printable_delimiter(delimiter)
        );
    }
    let store = FileStore::new(encoding, delimiter);
    let options = JobOptions::from_config(settings, messages);

    run_jobs(&cli.files, &rules, &store, &options, &sink);

    println!("{}", messages.success());
    io::stdout().flush()?;
    sink.flush()?;
    if interactive {
        pause(settings.exit_linger());
    }
    Ok(())
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
