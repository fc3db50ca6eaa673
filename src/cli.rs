use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Append rule-driven copies of matching records to dBase tables",
    long_about = None
)]
pub struct Cli {
    /// Tables to process; results go to a sub-folder next to each one
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,
    /// Rule line `COLUMN MATCH REPLACEMENT [COLUMN MATCH REPLACEMENT ...]` (prompted for when omitted)
    #[arg(short, long)]
    pub rules: Option<String>,
    /// YAML file with settings and messages
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Name of the output folder created next to each input
    #[arg(short, long = "output-folder")]
    pub output_folder: Option<String>,
    /// Extension every input must carry (e.g. `dbf`, `csv`)
    #[arg(short, long)]
    pub extension: Option<String>,
    /// Character encoding of the tables (dBase defaults to the header code page, CSV to utf-8)
    #[arg(long)]
    pub encoding: Option<String>,
    /// Delimiter for CSV inputs (supports ',', 'tab', ';', '|')
    #[arg(long)]
    pub delimiter: Option<String>,
    /// Error log that per-file and per-record faults are appended to
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Command-line values win over the config file.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(folder) = &self.output_folder {
            settings.output_folder = folder.clone();
        }
        if let Some(extension) = &self.extension {
            settings.file_extension = extension.clone();
        }
        if let Some(encoding) = &self.encoding {
            settings.encoding = Some(encoding.clone());
        }
        if let Some(delimiter) = &self.delimiter {
            settings.delimiter = Some(delimiter.clone());
        }
        if let Some(log_file) = &self.log_file {
            settings.log_file = log_file.to_string_lossy().into_owned();
        }
    }
}
