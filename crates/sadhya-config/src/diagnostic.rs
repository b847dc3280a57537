// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment errors into miette diagnostics pointing into `sadhya.toml`.
//!
//! Every diagnostic says where the key lives: a table such as `[bot]`, or
//! one entry of an array of tables such as `[[catalog.locations]]` by its
//! zero-based index, the same index validation messages use.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::fmt;

use figment::error::{Error as FigmentError, Kind};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity to offer a correction
/// (`min_lead_dys` -> `min_lead_days`).
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Name under which an in-memory TOML document is passed as a source.
pub const INLINE_SOURCE: &str = "<inline>";

/// Where a key lives in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    /// Outside any table; only section names are valid here.
    Root,
    /// A table such as `[bot]`.
    Table(String),
    /// One entry of an array of tables, e.g. the second `[[catalog.menu]]`.
    Entry { table: String, index: usize },
}

impl Section {
    /// Section for a figment path that does not include the key itself.
    pub fn from_path(path: &[String]) -> Self {
        match path {
            [] => Section::Root,
            [table @ .., last] if !table.is_empty() => match last.parse() {
                Ok(index) => Section::Entry {
                    table: table.join("."),
                    index,
                },
                Err(_) => Section::Table(path.join(".")),
            },
            _ => Section::Table(path.join(".")),
        }
    }

    /// `catalog.menu[2].price` style name of `key` inside this section.
    pub fn qualify(&self, key: &str) -> String {
        match self {
            Section::Root => key.to_string(),
            Section::Table(table) => format!("{table}.{key}"),
            Section::Entry { table, index } => format!("{table}[{index}].{key}"),
        }
    }

    /// The `SADHYA_*` variable that overrides `key`. Array entries have none.
    fn env_var(&self, key: &str) -> Option<String> {
        match self {
            Section::Table(table) if !table.contains('.') => {
                Some(format!("SADHYA_{table}_{key}").to_uppercase())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Root => f.write_str("the top level"),
            Section::Table(table) => write!(f, "`[{table}]`"),
            Section::Entry { table, index } => write!(f, "`[[{table}]]` entry {index}"),
        }
    }
}

/// A configuration error, rendered by miette with the offending line.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {section}")]
    #[diagnostic(
        code(sadhya::config::unknown_key),
        help("{}", unknown_key_help(section, suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        section: Section,
        /// Closest valid key, if one is similar enough.
        suggestion: Option<String>,
        /// Comma-separated keys accepted in `section`.
        valid_keys: String,
        #[label("not a setting here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong type, out of range, or not one of the allowed words.
    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(code(sadhya::config::invalid_value), help("{help}"))]
    InvalidValue {
        /// Qualified key, e.g. `catalog.locations[1].kind`.
        key: String,
        detail: String,
        help: String,
        #[label("this value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A required field of a catalog entry is absent.
    #[error("missing `{field}` in {section}")]
    #[diagnostic(
        code(sadhya::config::missing_key),
        help("add `{field} = ...` to {section}")
    )]
    MissingKey { field: String, section: Section },

    /// The file parsed but a value breaks a rule of the bot.
    #[error("validation error: {message}")]
    #[diagnostic(code(sadhya::config::validation))]
    Validation { message: String },

    /// The TOML could not be parsed at all.
    #[error("could not read the configuration: {0}")]
    #[diagnostic(
        code(sadhya::config::unreadable),
        help("check the TOML syntax and any SADHYA_* environment variables")
    )]
    Unreadable(String),
}

fn unknown_key_help(section: &Section, suggestion: Option<&str>, valid_keys: &str) -> String {
    match (section, suggestion) {
        (Section::Root, Some(s)) => format!("did you mean the `[{s}]` section? Sections: {valid_keys}"),
        (Section::Root, None) => format!("sections: {valid_keys}"),
        (_, Some(s)) => format!("did you mean `{s}`? Keys allowed in {section}: {valid_keys}"),
        (_, None) => format!("keys allowed in {section}: {valid_keys}"),
    }
}

/// Converts every error figment collected into a diagnostic.
///
/// `toml_sources` pairs a file path (or [`INLINE_SOURCE`]) with its content
/// so spans can be resolved.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &FigmentError, sources: &[(String, String)]) -> ConfigError {
    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let section = Section::from_path(&error.path);
            let (span, src) = locate(error, &section, field, sources);
            ConfigError::UnknownKey {
                key: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                section,
                span,
                src,
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey {
            field: field.to_string(),
            section: Section::from_path(&error.path),
        },
        Kind::InvalidType(..)
        | Kind::InvalidValue(..)
        | Kind::InvalidLength(..)
        | Kind::UnknownVariant(..)
        | Kind::ISizeOutOfRange(_)
        | Kind::USizeOutOfRange(_) => invalid_value(error, sources),
        _ => ConfigError::Unreadable(error.to_string()),
    }
}

fn invalid_value(error: &FigmentError, sources: &[(String, String)]) -> ConfigError {
    let (key, parent) = match error.path.split_last() {
        Some((key, parent)) => (key.as_str(), parent),
        None => ("", &[][..]),
    };
    let section = Section::from_path(parent);

    let (detail, mut help) = match &error.kind {
        Kind::UnknownVariant(value, allowed) => (
            format!("`{value}` is not one of {}", allowed.join(", ")),
            match suggest_key(value, allowed) {
                Some(s) => format!("did you mean `{s}`?"),
                None => format!("use one of: {}", allowed.join(", ")),
            },
        ),
        Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
            (format!("found {actual}"), format!("expected {expected}"))
        }
        other => (other.to_string(), format!("fix the value in {section}")),
    };

    let from_env = error
        .metadata
        .as_ref()
        .is_some_and(|m| m.name.contains("environment"));
    if from_env && let Some(var) = section.env_var(key) {
        help.push_str(&format!(" (the value came from {var})"));
    }

    let (span, src) = locate(error, &section, key, sources);
    ConfigError::InvalidValue {
        key: section.qualify(key),
        detail,
        help,
        span,
        src,
    }
}

/// Span of `key` in the file the failing value came from.
fn locate(
    error: &FigmentError,
    section: &Section,
    key: &str,
    sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(metadata) = error.metadata.as_ref() else {
        return (None, None);
    };
    let origin = match &metadata.source {
        Some(figment::Source::File(path)) => path.display().to_string(),
        _ if metadata.name.ends_with("source string") => INLINE_SOURCE.to_string(),
        _ => return (None, None),
    };
    let Some((path, content)) = sources.iter().find(|(p, _)| *p == origin) else {
        return (None, None);
    };
    match find_key_offset(content, section, key) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), key.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `key` within `section` of a TOML document.
///
/// Only the lines between the section's header and the next header are
/// searched. At the top level `key` is a section name and the header
/// naming it is returned.
pub fn find_key_offset(content: &str, section: &Section, key: &str) -> Option<usize> {
    let mut offset = 0;
    let mut inside = false;
    let mut entries_seen = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if let Some((name, array)) = header(trimmed) {
            inside = match section {
                Section::Root => {
                    if name == key || name.starts_with(&format!("{key}.")) {
                        return line.find(name).map(|at| offset + at);
                    }
                    false
                }
                Section::Table(table) => !array && name == table.as_str(),
                Section::Entry { table, index } => {
                    if array && name == table.as_str() {
                        entries_seen += 1;
                        entries_seen == index + 1
                    } else {
                        false
                    }
                }
            };
        } else if inside
            && let Some(rest) = trimmed.strip_prefix(key)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Name inside a `[table]` or `[[array]]` header, and whether it is an array.
fn header(line: &str) -> Option<(&str, bool)> {
    if let Some(rest) = line.strip_prefix("[[") {
        return Some((rest[..rest.find("]]")?].trim(), true));
    }
    let rest = line.strip_prefix('[')?;
    Some((rest[..rest.find(']')?].trim(), false))
}

/// Closest valid key by Jaro-Winkler similarity, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCATIONS: &str = "\
[catalog]
delivery_fee = 50

[[catalog.locations]]
id = \"vyttila_delivery\"
fee = 40

[[catalog.locations]]
id = \"kakkanad_delivery\"
fee = 60

[bot]
name = \"EeOnam\"
";

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn array_index_in_path_names_the_entry() {
        assert_eq!(
            Section::from_path(&path(&["catalog", "locations", "2"])),
            Section::Entry {
                table: "catalog.locations".into(),
                index: 2
            }
        );
        assert_eq!(Section::from_path(&path(&["bot"])), Section::Table("bot".into()));
        assert_eq!(Section::from_path(&[]), Section::Root);
    }

    #[test]
    fn sections_read_like_the_file() {
        let entry = Section::Entry {
            table: "catalog.menu".into(),
            index: 1,
        };
        assert_eq!(entry.to_string(), "`[[catalog.menu]]` entry 1");
        assert_eq!(entry.qualify("price"), "catalog.menu[1].price");
        assert_eq!(entry.env_var("price"), None);
        let bot = Section::Table("bot".into());
        assert_eq!(bot.env_var("min_lead_days").as_deref(), Some("SADHYA_BOT_MIN_LEAD_DAYS"));
    }

    #[test]
    fn offset_finds_key_in_the_indexed_entry() {
        let second = Section::Entry {
            table: "catalog.locations".into(),
            index: 1,
        };
        let offset = find_key_offset(LOCATIONS, &second, "fee").expect("offset");
        assert_eq!(&LOCATIONS[offset..offset + 8], "fee = 60");
    }

    #[test]
    fn offset_stays_inside_the_section() {
        let catalog = Section::Table("catalog".into());
        assert_eq!(find_key_offset(LOCATIONS, &catalog, "name"), None);
        let bot = Section::Table("bot".into());
        let offset = find_key_offset(LOCATIONS, &bot, "name").expect("offset");
        assert!(LOCATIONS[offset..].starts_with("name = \"EeOnam\""));
    }

    #[test]
    fn unknown_section_points_at_its_header() {
        let content = "[bot]\nname = \"x\"\n\n[payments]\nupi_id = \"a@b\"\n";
        let offset = find_key_offset(content, &Section::Root, "payments").expect("offset");
        assert_eq!(&content[offset..offset + 8], "payments");
    }

    #[test]
    fn help_names_the_entry_and_the_closest_key() {
        let section = Section::Entry {
            table: "catalog.menu".into(),
            index: 0,
        };
        let help = unknown_key_help(&section, Some("price"), "number, name, price");
        assert_eq!(
            help,
            "did you mean `price`? Keys allowed in `[[catalog.menu]]` entry 0: number, name, price"
        );
        let root = unknown_key_help(&Section::Root, Some("payment"), "bot, payment");
        assert!(root.starts_with("did you mean the `[payment]` section?"));
    }

    #[test]
    fn suggest_min_lead_days_for_typo() {
        let valid = &["name", "log_level", "min_lead_days", "booking_window_days"];
        assert_eq!(
            suggest_key("min_lead_dys", valid),
            Some("min_lead_days".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["name", "log_level", "min_lead_days"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }
}
