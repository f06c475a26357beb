//! Startup validation.
//!
//! Checks the raw file for unknown or misspelled fields, then the parsed
//! config for settings the relay cannot run with.

use std::{
    collections::HashSet,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use secrecy::ExposeSecret;

use crate::{
    env_subst::{substitute_env, unresolved_placeholder},
    loader::{apply_env_overrides, find_config_file, load_config_value, parse_config_value},
    schema::ChanmirrorConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "mirror",
    /// "telegram", "metrics", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "mirror.source_channels"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(f, "{}: {}: {}", self.severity, self.path, self.message)
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Fields accepted in each section.
const KNOWN_FIELDS: &[(&str, &[&str])] = &[
    ("mirror", &[
        "source_channels",
        "destination_channels",
        "destinations",
        "sync_deletions",
        "dedup_window_seconds",
        "max_mapping_entries",
        "reposting_active",
    ]),
    ("telegram", &["token", "poll_timeout_secs", "api_url"]),
    ("metrics", &["enabled", "listen"]),
];

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate the config file at `path`, or the discovered one when `path` is
/// `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

    let Some(actual_path) = config_path else {
        let mut result = ValidationResult::default();
        result.push(
            Severity::Info,
            "file-ref",
            "",
            "no config file found; using defaults",
        );
        let mut config = ChanmirrorConfig::default();
        apply_env_overrides(&mut config);
        check_config(&config, &mut result);
        return result;
    };

    let mut result = match load_config_value(&actual_path) {
        Ok(value) => validate_value(&value),
        Err(e) => {
            let mut result = ValidationResult::default();
            result.push(Severity::Error, "syntax", "", format!("{e:#}"));
            result
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate config text in the format implied by `path`'s extension,
/// without touching the file system.
#[must_use]
pub fn validate_str(raw: &str, path: &Path) -> ValidationResult {
    match parse_config_value(&substitute_env(raw), path) {
        Ok(value) => validate_value(&value),
        Err(e) => {
            let mut result = ValidationResult::default();
            result.push(Severity::Error, "syntax", "", format!("syntax error: {e}"));
            result
        },
    }
}

fn validate_value(value: &serde_json::Value) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_unknown_fields(value, &mut result);

    match serde_json::from_value::<ChanmirrorConfig>(value.clone()) {
        Ok(mut config) => {
            apply_env_overrides(&mut config);
            check_config(&config, &mut result);
        },
        Err(e) => result.push(Severity::Error, "type-error", "", format!("type error: {e}")),
    }
    result
}

/// Semantic checks on an already parsed config.
#[must_use]
pub fn validate_config(config: &ChanmirrorConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_config(config, &mut result);
    result
}

fn check_unknown_fields(value: &serde_json::Value, result: &mut ValidationResult) {
    let Some(root) = value.as_object() else {
        result.push(
            Severity::Error,
            "type-error",
            "",
            "config root must be a table",
        );
        return;
    };
    let sections: Vec<&str> = KNOWN_FIELDS.iter().map(|(s, _)| *s).collect();

    for (key, child) in root {
        let Some((_, fields)) = KNOWN_FIELDS.iter().find(|(s, _)| *s == key.as_str()) else {
            let message = match suggest(key, &sections, 3) {
                Some(s) => format!("unknown field at top level (did you mean \"{s}\"?)"),
                None => "unknown field at top level".into(),
            };
            result.push(Severity::Error, "unknown-field", key, message);
            continue;
        };
        let Some(table) = child.as_object() else {
            continue;
        };
        for field in table.keys() {
            if fields.contains(&field.as_str()) {
                continue;
            }
            let message = match suggest(field, fields, 3) {
                Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                None => "unknown field".into(),
            };
            result.push(
                Severity::Error,
                "unknown-field",
                &format!("{key}.{field}"),
                message,
            );
        }
    }
}

fn check_config(config: &ChanmirrorConfig, result: &mut ValidationResult) {
    let mirror = &config.mirror;

    if mirror.source_channels.is_empty() {
        result.push(
            Severity::Error,
            "mirror",
            "mirror.source_channels",
            "at least one source channel is required",
        );
    }
    if mirror.destination_channels.is_empty() {
        result.push(
            Severity::Error,
            "mirror",
            "mirror.destination_channels",
            "at least one destination channel is required",
        );
    }
    for (path, ids) in [
        ("mirror.source_channels", &mirror.source_channels),
        ("mirror.destination_channels", &mirror.destination_channels),
    ] {
        let mut seen = HashSet::new();
        for id in ids.iter().filter(|id| !seen.insert(**id)) {
            result.push(
                Severity::Warning,
                "mirror",
                path,
                format!("channel {id} is listed more than once"),
            );
        }
    }
    for id in mirror
        .source_channels
        .iter()
        .filter(|id| mirror.destination_channels.contains(*id))
    {
        result.push(
            Severity::Warning,
            "mirror",
            "mirror.destination_channels",
            format!("channel {id} is also a source; it will not be mirrored into itself"),
        );
    }
    if mirror.sync_deletions {
        result.push(
            Severity::Warning,
            "mirror",
            "mirror.sync_deletions",
            "the Telegram Bot API does not report channel deletions; deletes are only mirrored by hosts that observe them",
        );
    }
    if mirror.dedup_window_seconds == 0 {
        result.push(
            Severity::Error,
            "mirror",
            "mirror.dedup_window_seconds",
            "must be greater than zero",
        );
    }
    if mirror.max_mapping_entries == 0 {
        result.push(
            Severity::Error,
            "mirror",
            "mirror.max_mapping_entries",
            "must be greater than zero",
        );
    }

    let token = config.telegram.token.expose_secret().trim();
    if token.is_empty() {
        result.push(
            Severity::Error,
            "telegram",
            "telegram.token",
            "bot token is required",
        );
    } else if let Some(placeholder) = unresolved_placeholder(token) {
        result.push(
            Severity::Error,
            "telegram",
            "telegram.token",
            format!("environment variable in {placeholder} is not set"),
        );
    } else if !token.split_once(':').is_some_and(|(id, secret)| {
        !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && !secret.is_empty()
    }) {
        result.push(
            Severity::Warning,
            "telegram",
            "telegram.token",
            "does not look like a bot token (expected <bot id>:<secret>)",
        );
    }
    if config.telegram.poll_timeout_secs == 0 {
        result.push(
            Severity::Warning,
            "telegram",
            "telegram.poll_timeout_secs",
            "zero disables long polling and busy-loops against the Bot API",
        );
    }

    if config.metrics.enabled && config.metrics.listen.parse::<SocketAddr>().is_err() {
        result.push(
            Severity::Error,
            "metrics",
            "metrics.listen",
            format!("\"{}\" is not a socket address", config.metrics.listen),
        );
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
