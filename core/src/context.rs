//! The request context: a typed record describing the next HTTP call.
//!
//! # Design
//! Scripts see the context as a map-like binding, but the shell keeps a
//! plain struct and converts only at the marshalling boundary
//! (`to_tree` / `from_table`). `scheme` and `method` are stored as text so
//! any value a script assigns is kept until dispatch decides whether it is
//! usable.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rhai::Map;

use crate::error::{Error, Result};
use crate::value::Tree;

/// The canonical request description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub scheme: String,
    pub host: String,
    /// 0 means unset.
    pub port: i64,
    pub path: String,
    pub method: String,
    /// When non-empty, the request target; scheme/host/port/path are ignored.
    pub url: String,
    /// Raw body for non-GET requests. Takes over from `query` when non-empty.
    pub data: String,
    pub query: BTreeMap<String, String>,
    pub header: BTreeMap<String, String>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 80,
            path: String::new(),
            method: "GET".to_string(),
            url: String::new(),
            data: String::new(),
            query: BTreeMap::new(),
            header: BTreeMap::new(),
        }
    }
}

impl Context {
    /// Insert or replace a query parameter.
    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.insert(key.into(), value.into());
    }

    /// Insert or replace a header, formatting the key with `case` first.
    pub fn set_header(&mut self, key: &str, value: impl Into<String>, case: HeaderCase) {
        self.header.insert(case.apply(key), value.into());
    }

    pub fn to_tree(&self) -> Tree {
        let strings = |map: &BTreeMap<String, String>| {
            Tree::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Tree::String(v.clone())))
                    .collect(),
            )
        };

        let mut map = BTreeMap::new();
        map.insert("scheme".to_string(), Tree::String(self.scheme.clone()));
        map.insert("host".to_string(), Tree::String(self.host.clone()));
        map.insert("port".to_string(), Tree::Number(self.port as f64));
        map.insert("path".to_string(), Tree::String(self.path.clone()));
        map.insert("method".to_string(), Tree::String(self.method.clone()));
        map.insert("url".to_string(), Tree::String(self.url.clone()));
        map.insert("data".to_string(), Tree::String(self.data.clone()));
        map.insert("query".to_string(), strings(&self.query));
        map.insert("header".to_string(), strings(&self.header));
        Tree::Map(map)
    }

    /// Build a context from a script map. The whole map must be inside the
    /// closed value set; fields that are missing or of the wrong type take
    /// their default.
    pub fn from_table(table: &Map) -> Result<Context> {
        Context::from_tree(&Tree::from_table(table)?)
    }

    pub fn from_tree(tree: &Tree) -> Result<Context> {
        let Some(fields) = tree.as_map() else {
            return Err(Error::UnsupportedType("context must be a map".to_string()));
        };
        let defaults = Context::default();

        let text = |name: &str, default: String| match fields.get(name) {
            Some(Tree::String(s)) => s.clone(),
            _ => default,
        };
        let port = match fields.get("port") {
            Some(Tree::Number(n)) => *n as i64,
            _ => defaults.port,
        };

        Ok(Context {
            scheme: text("scheme", defaults.scheme),
            host: text("host", defaults.host),
            port,
            path: text("path", defaults.path),
            method: text("method", defaults.method),
            url: text("url", defaults.url),
            data: text("data", defaults.data),
            query: string_pairs(fields.get("query"), "query")?,
            header: string_pairs(fields.get("header"), "header")?,
        })
    }
}

/// Render the scalar entries of a nested map as strings.
fn string_pairs(tree: Option<&Tree>, field: &str) -> Result<BTreeMap<String, String>> {
    let Some(Tree::Map(map)) = tree else {
        return Ok(BTreeMap::new());
    };
    map.iter()
        .map(|(key, value)| {
            let text = match value {
                Tree::Null => String::new(),
                Tree::Bool(b) => b.to_string(),
                Tree::Number(_) => value.to_json(false)?,
                Tree::String(s) => s.clone(),
                Tree::Map(_) => {
                    return Err(Error::UnsupportedType(format!("map at {field}.{key}")));
                }
            };
            Ok((key.clone(), text))
        })
        .collect()
}

/// How `set_header` spells header names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderCase {
    /// Keep the key exactly as given.
    #[default]
    Preserve,
    /// Upper-case the first letter of every `-` separated segment and
    /// lower-case the rest: `content-TYPE` becomes `Content-Type`.
    Canonical,
}

impl HeaderCase {
    pub fn apply(self, key: &str) -> String {
        match self {
            HeaderCase::Preserve => key.to_string(),
            HeaderCase::Canonical => key
                .split('-')
                .map(|segment| {
                    let mut chars = segment.chars();
                    match chars.next() {
                        Some(first) => first
                            .to_uppercase()
                            .chain(chars.flat_map(char::to_lowercase))
                            .collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join("-"),
        }
    }
}

impl FromStr for HeaderCase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preserve" => Ok(HeaderCase::Preserve),
            "canonical" => Ok(HeaderCase::Canonical),
            other => Err(format!("unknown header case {other:?}, expected preserve|canonical")),
        }
    }
}

impl fmt::Display for HeaderCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderCase::Preserve => f.write_str("preserve"),
            HeaderCase::Canonical => f.write_str("canonical"),
        }
    }
}
