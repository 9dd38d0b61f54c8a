//! NetworkManager keyfile grammar.
//!
//! A keyfile is a sequence of `[group]` headers followed by `key=value`
//! lines. Lines starting with `#` or `;` are comments. Repeated groups merge
//! and a repeated key keeps its last value.

use crate::SchemaError;
use std::fs;
use std::path::Path;

/// Group names NetworkManager accepts interchangeably.
const GROUP_ALIASES: &[(&str, &str)] = &[
    ("wifi", "802-11-wireless"),
    ("wifi-security", "802-11-wireless-security"),
    ("ethernet", "802-3-ethernet"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFile {
    groups: Vec<Group>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Group {
    name: String,
    entries: Vec<(String, String)>,
}

impl KeyFile {
    pub fn parse_str(input: &str) -> Result<Self, SchemaError> {
        let mut kf = KeyFile::default();
        let mut current: Option<usize> = None;

        for (n, raw) in input.lines().enumerate() {
            let line_no = n + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| syntax(line_no, "unterminated group header"))?;
                if name.is_empty() {
                    return Err(syntax(line_no, "empty group name"));
                }
                current = Some(kf.group_slot(name));
                continue;
            }

            let Some(group) = current else {
                return Err(syntax(line_no, "key outside of any group"));
            };
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| syntax(line_no, "expected 'key=value'"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(syntax(line_no, "empty key"));
            }
            let value = unescape(value.trim_start(), line_no)?;

            let entries = &mut kf.groups[group].entries;
            if let Some(slot) = entries.iter_mut().find(|(k, _)| k == key) {
                slot.1 = value;
            } else {
                entries.push((key.to_owned(), value));
            }
        }

        Ok(kf)
    }

    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    fn group_slot(&mut self, name: &str) -> usize {
        if let Some(pos) = self.groups.iter().position(|g| g.name == name) {
            return pos;
        }
        self.groups.push(Group {
            name: name.to_owned(),
            entries: Vec::new(),
        });
        self.groups.len() - 1
    }

    /// Look up `group.key`, accepting NetworkManager's group aliases.
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        let alias = GROUP_ALIASES.iter().find_map(|(a, b)| {
            if *a == group {
                Some(*b)
            } else if *b == group {
                Some(*a)
            } else {
                None
            }
        });
        self.groups
            .iter()
            .filter(|g| g.name == group || Some(g.name.as_str()) == alias)
            .flat_map(|g| g.entries.iter())
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every `(group, key, value)` triple in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.groups.iter().flat_map(|g| {
            g.entries
                .iter()
                .map(move |(k, v)| (g.name.as_str(), k.as_str(), v.as_str()))
        })
    }

    /// Canonical group name, folding the long aliases onto the short ones.
    pub fn canonical_group(group: &str) -> &str {
        GROUP_ALIASES
            .iter()
            .find(|(_, long)| *long == group)
            .map_or(group, |(short, _)| short)
    }
}

fn syntax(line: usize, reason: &str) -> SchemaError {
    SchemaError::KeyfileSyntax {
        line,
        reason: reason.to_owned(),
    }
}

fn unescape(value: &str, line: usize) -> Result<String, SchemaError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            // list separators stay escaped, callers split lists themselves
            Some(';') => out.push_str("\\;"),
            Some(other) => {
                return Err(syntax(line, &format!("invalid escape sequence '\\{other}'")));
            }
            None => return Err(syntax(line, "trailing backslash")),
        }
    }
    Ok(out)
}
