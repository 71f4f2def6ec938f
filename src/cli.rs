//! Flag lookup shared by the binaries.

use std::str::FromStr;

use anyhow::{Result, anyhow};

/// Value of `--name=value` or `--name value`. Blank values count as absent,
/// so a later occurrence of the flag can still supply one.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix)
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

pub fn parse_arg<T: FromStr>(args: &[String], name: &str) -> Result<Option<T>> {
    match arg_value(args, name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("invalid value for {name}: {raw}")),
        None => Ok(None),
    }
}
