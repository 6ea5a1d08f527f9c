//! `${NAME}` substitution for scenario sources
//!
//! Scenario files keep credentials and environment-specific values out of
//! the file itself. Lookup order is the supplied variables, then the process
//! environment. `$${` produces a literal `${`.
//!
//! Substitution happens on parsed string scalars, never on YAML source, so
//! a value is inserted verbatim whatever quoting or escapes it contains.

use regex::{Captures, Regex};
use serde_yaml::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{Error, Result};

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(\$?)\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
    })
}

/// Substitute every placeholder in `input`
pub fn interpolate(
    input: &str,
    vars: &HashMap<String, String>,
    source_name: &str,
) -> Result<String> {
    let mut missing: Option<String> = None;

    let out = placeholder().replace_all(input, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{}}}", name);
        }
        match vars
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
        {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(Error::UnknownVariable {
            name,
            source_name: source_name.to_string(),
        }),
        None => Ok(out.into_owned()),
    }
}

/// Substitute placeholders in every string scalar of a parsed document
///
/// Mapping keys and non-string scalars are left alone.
pub fn interpolate_value(
    value: &mut Value,
    vars: &HashMap<String, String>,
    source_name: &str,
) -> Result<()> {
    match value {
        Value::String(s) => {
            if s.contains('$') {
                *s = interpolate(s, vars, source_name)?;
            }
        }
        Value::Sequence(items) => {
            for item in items {
                interpolate_value(item, vars, source_name)?;
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                interpolate_value(item, vars, source_name)?;
            }
        }
        Value::Tagged(tagged) => interpolate_value(&mut tagged.value, vars, source_name)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}
