//! Shared output formatting for todovault CLI commands.
//!
//! Every command either prints a JSON envelope (`--json`) or a short human
//! report. Both carry the same warnings and next steps.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};

pub const SCHEMA_VERSION: &str = "todovault.v1";

/// Commands whose first positional argument names a subcommand.
const COMMAND_FAMILIES: &[&str] = &["task", "group", "stats", "config"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Details,
    Warnings,
    NextSteps,
}

impl Section {
    const ORDER: [Section; 3] = [Section::Details, Section::Warnings, Section::NextSteps];

    fn title(self) -> &'static str {
        match self {
            Section::Details => "Details",
            Section::Warnings => "Warnings",
            Section::NextSteps => "Next steps",
        }
    }
}

/// Human-readable report: a header line, `key: value` facts beneath it,
/// then bulleted sections.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    facts: Vec<(String, String)>,
    items: Vec<(Section, String)>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            facts: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.facts.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.items.push((Section::Details, value.into()));
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.items.push((Section::Warnings, value.into()));
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.items.push((Section::NextSteps, value.into()));
    }

    fn section(&self, section: Section) -> Vec<String> {
        self.items
            .iter()
            .filter(|(s, _)| *s == section)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(flatten)]
    error: JsonError,
    kind: &'static str,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Outcome<'a, T> {
    Success {
        data: &'a T,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Error {
        error: ErrorBody,
    },
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    schema_version: &'static str,
    command: &'a str,
    #[serde(flatten)]
    outcome: Outcome<'a, T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    next_steps: Vec<String>,
}

fn print_envelope<T: Serialize>(
    command: &str,
    outcome: Outcome<'_, T>,
    next_steps: Vec<String>,
) -> Result<()> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        command,
        outcome,
        next_steps,
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let (warnings, next_steps) = human
            .map(|h| (h.section(Section::Warnings), h.section(Section::NextSteps)))
            .unwrap_or_default();
        return print_envelope(command, Outcome::Success { data, warnings }, next_steps);
    }

    match human {
        Some(human) if !options.quiet => println!("{}", format_human(human)),
        _ => {}
    }
    Ok(())
}

/// Report `err`. JSON output carries only the public message, so storage
/// faults never leak paths; the human form is for a local operator and
/// prints the full error.
pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        let error = ErrorBody {
            error: JsonError::from(err),
            kind: error_kind(err),
        };
        return print_envelope::<()>(command, Outcome::Error { error }, next_steps);
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut out = output.header.clone();
    for (key, value) in &output.facts {
        if value.is_empty() {
            out.push_str(&format!("\n  {key}"));
        } else {
            out.push_str(&format!("\n  {key}: {value}"));
        }
    }

    for section in Section::ORDER {
        let items = output.section(section);
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("\n\n{}:", section.title()));
        for item in items {
            out.push_str(&format!("\n- {item}"));
        }
    }
    out
}

/// Best-effort command name for error envelopes, used when clap never got
/// far enough to tell us.
pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut words = args.into_iter().filter(|arg| !arg.starts_with('-'));
    let Some(command) = words.next() else {
        return "todovault".to_string();
    };
    if !COMMAND_FAMILIES.contains(&command.as_str()) {
        return command;
    }
    match words.next() {
        Some(sub) => format!("{command} {sub}"),
        None => command,
    }
}

pub fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        2 => "user_error",
        3 => "policy_blocked",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    let step = match err {
        Error::NotFound { kind: "task", .. } => "todovault task list".to_string(),
        Error::NotFound { kind: "group", .. } | Error::DefaultGroupProtected => {
            "todovault group list".to_string()
        }
        Error::InvalidConfiguration(_) | Error::TomlParse(_) => {
            "todovault config check".to_string()
        }
        Error::AuthenticationFailed => "check auth.password or TODOVAULT_AUTH_PASSWORD".to_string(),
        Error::RateLimited { retry_after_secs } => format!("retry in {retry_after_secs}s"),
        Error::StorageCorrupt { .. } => {
            "inspect the *.corrupt-*.json backup, then run todovault repair".to_string()
        }
        Error::LockFailed(_) => "retry once the other writer finishes".to_string(),
        _ => return Vec::new(),
    };
    vec![step]
}
