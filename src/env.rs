//! Line-oriented environment file parser with `${VAR}` substitution.
//!
//! Blank lines and lines whose first non-space character is `#` are
//! ignored; every other line must contain `=`, split on the first
//! occurrence; the key has trailing whitespace stripped, the value has
//! leading whitespace stripped. A value wrapped in a single matching pair of
//! `"` or `'` has that pair stripped; single quotes additionally disable
//! substitution. Substitution looks up `${NAME}` first among keys defined
//! earlier in the same file, then in an optional outer map, failing if
//! neither has the key.

use indexmap::IndexMap;

use crate::error::{Error, Result};

pub type Env = IndexMap<String, String>;

pub fn parse(text: &str, outer: Option<&Env>) -> Result<Env> {
    let mut env = Env::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(eq) = line.find('=') else {
            return Err(Error::EnvParseLine(line.to_string()));
        };

        let key = line[..eq].trim_end().to_string();
        let mut value = line[eq + 1..].trim_start().to_string();

        let mut substitute = true;
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            let first = bytes[0];
            let last = bytes[bytes.len() - 1];
            if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
                if first == b'\'' {
                    substitute = false;
                }
                value = value[1..value.len() - 1].to_string();
            }
        }

        if substitute {
            value = substitute_vars(&value, &env, outer)?;
        }

        env.insert(key, value);
    }

    Ok(env)
}

fn substitute_vars(value: &str, env: &Env, outer: Option<&Env>) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after_marker = &rest[start + 2..];
        let Some(end) = after_marker.find('}') else {
            // No closing brace: copy the rest verbatim, matching the regex's
            // refusal to match an unterminated `${...`.
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let name = &after_marker[..end];
        if name.is_empty() || name.contains(['}', '\0', '=']) {
            // Not a valid variable reference; leave untouched and continue
            // scanning from just past this `${`.
            out.push_str("${");
            rest = after_marker;
            continue;
        }

        let resolved = env
            .get(name)
            .or_else(|| outer.and_then(|o| o.get(name)))
            .ok_or_else(|| Error::EnvSubstitute(name.to_string()))?;
        out.push_str(resolved);

        rest = &after_marker[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Load an env file from disk. A missing file yields an empty mapping, not
/// an error.
pub fn load_file(path: &std::path::Path, outer: Option<&Env>) -> Result<Env> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse(&text, outer),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Env::new()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Merge environments left to right: later entries override earlier ones on
/// key collision, preserving first-insertion order for keys not overridden
/// and appending new keys in the order they first appear among the later
/// maps. Used to compose outer process environment ∪ defaults env ∪ job env
/// before launching a job's script.
pub fn merge(maps: impl IntoIterator<Item = Env>) -> Env {
    let mut merged = Env::new();
    for map in maps {
        for (k, v) in map {
            merged.insert(k, v);
        }
    }
    merged
}
