//! Per-file jobs and the barrier that waits for all of them.
//!
//! Every input gets its own scoped thread; the rule set and the diagnostics
//! sink are shared by reference, each table is owned by exactly one job. A
//! job that fails (or panics) is reported to the sink and never affects its
//! siblings, and the batch always runs to completion.

use std::{
    any::Any,
    fmt, fs,
    path::{Path, PathBuf},
    thread::{self, ScopedJoinHandle},
};

use log::{debug, info};

use crate::{
    config::{Messages, Settings},
    diagnostics::{DiagnosticsSink, Fault, FaultKind},
    engine::{ApplyReport, apply_rules},
    inputs::{output_dir_for, output_path_for},
    rules::RuleSet,
    table::TableStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Loading,
    Processing,
    Saving,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Pending => "pending",
            JobState::Loading => "loading",
            JobState::Processing => "processing",
            JobState::Saving => "saving",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct JobOptions {
    pub output_folder: String,
    pub messages: Messages,
}

impl JobOptions {
    pub fn new(output_folder: impl Into<String>) -> Self {
        JobOptions {
            output_folder: output_folder.into(),
            messages: Messages::default(),
        }
    }

    pub fn from_config(settings: &Settings, messages: &Messages) -> Self {
        JobOptions {
            output_folder: settings.output_folder.clone(),
            messages: messages.clone(),
        }
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        JobOptions::new(Settings::default().output_folder)
    }
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub state: JobState,
    /// Stage that was running when the job failed. Stays `None` for a job
    /// that panicked, since its thread took the stage with it.
    pub failed_during: Option<JobState>,
    pub report: ApplyReport,
}

impl JobOutcome {
    fn new(input: &Path, output: PathBuf) -> Self {
        JobOutcome {
            input: input.to_path_buf(),
            output,
            state: JobState::Pending,
            failed_during: None,
            report: ApplyReport::default(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == JobState::Succeeded
    }

    fn advance(&mut self, next: JobState) {
        debug!("{}: {} -> {}", self.input.display(), self.state, next);
        self.state = next;
    }

    fn fail(mut self, sink: &dyn DiagnosticsSink, kind: FaultKind, message: String) -> Self {
        self.failed_during = Some(self.state);
        self.abandon(sink, kind, message)
    }

    fn abandon(mut self, sink: &dyn DiagnosticsSink, kind: FaultKind, message: String) -> Self {
        sink.report(&Fault::new(&self.input, kind, message));
        self.advance(JobState::Failed);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn duplicated(&self) -> usize {
        self.outcomes.iter().map(|o| o.report.duplicated).sum()
    }
}

/// Runs one job per path concurrently and returns once every job has reached
/// a terminal state. Outcomes come back in input order.
pub fn run_jobs<S>(
    paths: &[PathBuf],
    rules: &RuleSet,
    store: &S,
    options: &JobOptions,
    sink: &dyn DiagnosticsSink,
) -> BatchSummary
where
    S: TableStore + ?Sized,
{
    info!("Starting {} job(s) with {} rule(s)", paths.len(), rules.len());
    let outcomes = thread::scope(|scope| {
        let handles = paths
            .iter()
            .map(|path| {
                let handle = scope.spawn(move || run_job(path, rules, store, options, sink));
                (path, handle)
            })
            .collect::<Vec<_>>();
        wait_all(handles, options, sink)
    });
    let summary = BatchSummary { outcomes };
    info!(
        "Batch finished: {} succeeded, {} failed, {} duplicate(s) appended",
        summary.succeeded(),
        summary.failed(),
        summary.duplicated()
    );
    summary
}

/// Completion barrier: joins every job, turning a panicked job into a failed
/// outcome instead of propagating the panic.
fn wait_all(
    handles: Vec<(&PathBuf, ScopedJoinHandle<'_, JobOutcome>)>,
    options: &JobOptions,
    sink: &dyn DiagnosticsSink,
) -> Vec<JobOutcome> {
    handles
        .into_iter()
        .map(|(path, handle)| {
            handle.join().unwrap_or_else(|payload| {
                let output = output_path_for(path, &options.output_folder);
                JobOutcome::new(path, output).abandon(
                    sink,
                    FaultKind::Panic,
                    panic_message(&*payload),
                )
            })
        })
        .collect()
}

fn run_job<S>(
    input: &Path,
    rules: &RuleSet,
    store: &S,
    options: &JobOptions,
    sink: &dyn DiagnosticsSink,
) -> JobOutcome
where
    S: TableStore + ?Sized,
{
    println!("{}", options.messages.working(input));
    let output_dir = output_dir_for(input, &options.output_folder);
    let mut outcome = JobOutcome::new(input, output_path_for(input, &options.output_folder));

    outcome.advance(JobState::Loading);
    let mut table = match store.load(input) {
        Ok(table) => table,
        Err(err) => return outcome.fail(sink, FaultKind::Load, format!("{err:#}")),
    };

    outcome.advance(JobState::Processing);
    outcome.report = apply_rules(&mut table, rules, input, sink);

    if let Err(err) = fs::create_dir_all(&output_dir) {
        let message = format!(
            "{} {}: {err}",
            options.messages.creating_folders_error(),
            output_dir.display()
        );
        return outcome.fail(sink, FaultKind::CreateDir, message);
    }

    outcome.advance(JobState::Saving);
    if let Err(err) = store.save(&table, &outcome.output) {
        return outcome.fail(sink, FaultKind::Save, format!("{err:#}"));
    }

    outcome.advance(JobState::Succeeded);
    println!("{}", options.messages.file_saved(&outcome.output));
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "job panicked".to_string()
    }
}
