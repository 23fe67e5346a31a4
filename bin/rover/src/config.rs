//! Configuration loading with dotted-path override parsing.

use std::fs;

use rover_config::Config;
use toml::value::Table;

use crate::{
    args::Args,
    errors::{ConfigError, InitError},
};

type Override = (String, toml::Value);

/// Loads the config file (or defaults) and applies cli overrides on the
/// raw toml before deserializing.
pub(crate) fn load_config(args: &Args) -> Result<Config, InitError> {
    let raw = match &args.config {
        Some(path) => fs::read_to_string(path)?,
        None => String::new(),
    };
    let mut table: Table = toml::from_str(&raw)?;

    for override_str in args.get_all_overrides() {
        let (path, value) = parse_override(&override_str)?;
        apply_override(&path, value, &mut table)?;
    }

    let config = toml::Value::Table(table).try_into()?;
    Ok(config)
}

/// Parses an override string. Splits by '=' to get key and raw str value,
/// then parses the str value.
pub(crate) fn parse_override(override_str: &str) -> Result<Override, ConfigError> {
    let (key, value_str) = override_str
        .split_once('=')
        .ok_or(ConfigError::InvalidOverride {
            override_str: override_str.to_string(),
        })?;
    Ok((key.to_string(), parse_value(value_str)))
}

/// Apply override to config table. Intermediate tables are created on
/// demand so overrides work against an empty config.
pub(crate) fn apply_override(
    path: &str,
    value: toml::Value,
    table: &mut Table,
) -> Result<(), ConfigError> {
    apply_override_inner(path, path, value, table)
}

fn apply_override_inner(
    original_path: &str,
    remaining_path: &str,
    value: toml::Value,
    table: &mut Table,
) -> Result<(), ConfigError> {
    match remaining_path.split_once('.') {
        None => {
            table.insert(remaining_path.to_string(), value);
            Ok(())
        }
        Some((key, rest)) => {
            let entry = table
                .entry(key.to_string())
                .or_insert_with(|| toml::Value::Table(Table::new()));
            match entry {
                toml::Value::Table(inner) => apply_override_inner(original_path, rest, value, inner),
                _ => Err(ConfigError::TraverseNonTableAt {
                    key: key.to_string(),
                    path: original_path.to_string(),
                }),
            }
        }
    }
}

/// Parses a string into a toml value. First tries as `i64`, then as `bool`
/// and then defaults to `String`.
fn parse_value(str_value: &str) -> toml::Value {
    str_value
        .parse::<i64>()
        .map(toml::Value::Integer)
        .or_else(|_| str_value.parse::<bool>().map(toml::Value::Boolean))
        .unwrap_or_else(|_| toml::Value::String(str_value.to_string()))
}
