//! Run configuration and operator-facing messages.
//!
//! Loaded once at startup from a YAML file. Every key is optional; absent
//! keys (or an absent file) fall back to the built-in defaults, while a file
//! that exists but does not parse aborts startup.

use std::{fs, io::ErrorKind, path::Path, time::Duration};

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "column-filler.yaml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub settings: Settings,
    pub messages: Messages,
}

impl Config {
    /// Reads `path`, returning defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(raw)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Folder created next to each input to receive its output.
    pub output_folder: String,
    /// Extension every input file must carry.
    pub file_extension: String,
    pub log_file: String,
    pub first_run_marker: String,
    pub encoding: Option<String>,
    pub delimiter: Option<String>,
    pub intro_delay_secs: u64,
    pub first_run_delay_secs: u64,
    pub exit_linger_secs: u64,
    pub abort_linger_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            output_folder: "changed".to_string(),
            file_extension: "dbf".to_string(),
            log_file: "error_log.txt".to_string(),
            first_run_marker: "already_ran".to_string(),
            encoding: None,
            delimiter: None,
            intro_delay_secs: 2,
            first_run_delay_secs: 20,
            exit_linger_secs: 15,
            abort_linger_secs: 2,
        }
    }
}

impl Settings {
    pub fn intro_delay(&self, first_run: bool) -> Duration {
        Duration::from_secs(if first_run {
            self.first_run_delay_secs
        } else {
            self.intro_delay_secs
        })
    }

    pub fn exit_linger(&self) -> Duration {
        Duration::from_secs(self.exit_linger_secs)
    }

    pub fn abort_linger(&self) -> Duration {
        Duration::from_secs(self.abort_linger_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Messages {
    intro: Vec<String>,
    rules_prompt: String,
    entered_not_three: String,
    didnt_enter: String,
    working: String,
    file_saved: String,
    success: String,
    drop_the_files: String,
    wrong_format: String,
    creating_folders_error: String,
}

impl Default for Messages {
    fn default() -> Self {
        Messages {
            intro: vec![
                "dbf-column-filler".to_string(),
                "Drop one or more tables onto the program (or pass them as arguments).".to_string(),
                "Then enter one or more rules: COLUMN MATCH REPLACEMENT.".to_string(),
                "Every record whose COLUMN equals MATCH is copied,".to_string(),
                "and the copy gets REPLACEMENT in that column.".to_string(),
                "Originals are left untouched.".to_string(),
                "Results are written to a sub-folder next to each table.".to_string(),
            ],
            rules_prompt: "Rules:".to_string(),
            entered_not_three: "Enter the values in groups of three: COLUMN MATCH REPLACEMENT"
                .to_string(),
            didnt_enter: "Nothing was entered.".to_string(),
            working: "Working on".to_string(),
            file_saved: "File saved:".to_string(),
            success: "Done.".to_string(),
            drop_the_files: "No tables were dropped onto the program.".to_string(),
            wrong_format: "Only .{ext} files are accepted.".to_string(),
            creating_folders_error: "Could not create the output folder".to_string(),
        }
    }
}

impl Messages {
    pub fn intro(&self) -> &[String] {
        &self.intro
    }

    pub fn rules_prompt(&self) -> &str {
        &self.rules_prompt
    }

    pub fn entered_not_three(&self) -> &str {
        &self.entered_not_three
    }

    pub fn didnt_enter(&self) -> &str {
        &self.didnt_enter
    }

    pub fn working(&self, path: &Path) -> String {
        format!("{} {}", self.working, path.display())
    }

    pub fn file_saved(&self, path: &Path) -> String {
        format!("{}\n{}", self.file_saved, path.display())
    }

    pub fn success(&self) -> &str {
        &self.success
    }

    pub fn drop_the_files(&self) -> &str {
        &self.drop_the_files
    }

    /// Wrong-extension message with `{ext}` filled in.
    pub fn wrong_format(&self, extension: &str) -> String {
        self.wrong_format
            .replace("{ext}", extension.trim_start_matches('.'))
    }

    pub fn creating_folders_error(&self) -> &str {
        &self.creating_folders_error
    }
}
