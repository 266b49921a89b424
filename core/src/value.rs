//! Conversions between the script runtime's maps, the generic `Tree`, JSON
//! text and re-loadable script source.
//!
//! # Design
//! `Tree` is the closed interchange shape: null, bool, number, string and
//! string-keyed maps. Every conversion fails fast with
//! `Error::UnsupportedType` on anything else (arrays, chars, function
//! pointers, custom types, non-finite numbers) instead of coercing it, so a
//! saved context script never silently loses data.
//!
//! Script source uses Rhai object-map literals. `Tree::to_script_code`
//! output evaluated by the runtime yields a map that converts back to an
//! equal `Tree`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rhai::{Dynamic, Map};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Error, Result};

/// Largest magnitude below which an integral `f64` is printed as an integer.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Words the Rhai tokenizer claims for itself. Map keys spelled like one of
/// these are emitted quoted.
const RESERVED_WORDS: &[&str] = &[
    "as", "async", "await", "break", "call", "case", "catch", "const", "continue", "curry",
    "debug", "default", "do", "else", "eval", "exit", "export", "false", "Fn", "fn", "for",
    "global", "go", "goto", "if", "import", "in", "is", "let", "loop", "match", "module", "new",
    "nil", "null", "package", "print", "private", "protected", "public", "return", "shared",
    "spawn", "static", "super", "switch", "sync", "this", "thread", "throw", "true", "try",
    "until", "use", "var", "void", "while", "with", "yield",
];

/// Generic value tree used while marshalling.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Map(BTreeMap<String, Tree>),
}

impl Tree {
    /// Convert a runtime map, recursing into nested maps.
    pub fn from_table(table: &Map) -> Result<Tree> {
        convert_map(table, "")
    }

    /// Convert any runtime value inside the closed value set.
    pub fn from_dynamic(value: &Dynamic) -> Result<Tree> {
        convert(value, "")
    }

    /// Parse JSON text. Arrays are outside the closed set and rejected.
    pub fn from_json(text: &str) -> Result<Tree> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        from_json_value(value, "")
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Tree>> {
        match self {
            Tree::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Compact JSON, or 4-space indented JSON when `pretty` is set.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        if pretty {
            to_pretty_string(self)
        } else {
            Ok(serde_json::to_string(self)?)
        }
    }

    /// Emit Rhai source that evaluates back to this value.
    ///
    /// `indent` is the indentation of the line the value starts on; entries
    /// of a map go one tab deeper and the closing brace lines up with
    /// `indent`.
    pub fn to_script_code(&self, indent: &str) -> Result<String> {
        let mut out = String::new();
        self.write_script(&mut out, indent)?;
        Ok(out)
    }

    fn write_script(&self, out: &mut String, indent: &str) -> Result<()> {
        match self {
            Tree::Null => out.push_str("()"),
            Tree::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Tree::Number(n) => write_number(out, *n)?,
            Tree::String(s) => write_string(out, s),
            Tree::Map(map) if map.is_empty() => out.push_str("#{}"),
            Tree::Map(map) => {
                let inner = format!("{indent}\t");
                out.push_str("#{\n");
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(",\n");
                    }
                    out.push_str(&inner);
                    write_key(out, key);
                    out.push_str(": ");
                    value.write_script(out, &inner)?;
                }
                out.push('\n');
                out.push_str(indent);
                out.push('}');
            }
        }
        Ok(())
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Tree::Null => serializer.serialize_unit(),
            Tree::Bool(b) => serializer.serialize_bool(*b),
            Tree::Number(n) => match exact_int(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Tree::String(s) => serializer.serialize_str(s),
            Tree::Map(map) => {
                let mut state = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    state.serialize_entry(key, value)?;
                }
                state.end()
            }
        }
    }
}

/// Re-indent arbitrary JSON text with 4 spaces. Text that does not parse is
/// returned unchanged so malformed bodies are still shown.
pub fn pretty_json(text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => to_pretty_string(&value).unwrap_or_else(|_| text.to_string()),
        Err(_) => text.to_string(),
    }
}

/// Shallow conversion of a runtime map to string pairs. Every value is
/// rendered with its display form; a missing map gives an empty result.
pub fn table_to_string_map(table: Option<&Map>) -> BTreeMap<String, String> {
    table
        .map(|table| {
            table
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn convert(value: &Dynamic, path: &str) -> Result<Tree> {
    if value.is_unit() {
        return Ok(Tree::Null);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Tree::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        if i.unsigned_abs() > MAX_EXACT_INT as u64 {
            return Err(unsupported(path, &format!("integer {i} beyond 2^53")));
        }
        return Ok(Tree::Number(i as f64));
    }
    if let Ok(f) = value.as_float() {
        if !f.is_finite() {
            return Err(unsupported(path, &format!("non-finite number {f}")));
        }
        return Ok(Tree::Number(f));
    }
    if value.is_string() {
        let s = value
            .clone()
            .into_string()
            .map_err(|type_name| unsupported(path, type_name))?;
        return Ok(Tree::String(s));
    }
    if let Some(map) = value.read_lock::<Map>() {
        return convert_map(&map, path);
    }
    Err(unsupported(path, value.type_name()))
}

fn convert_map(table: &Map, path: &str) -> Result<Tree> {
    let mut out = BTreeMap::new();
    for (key, value) in table {
        let child = join_path(path, key);
        out.insert(key.to_string(), convert(value, &child)?);
    }
    Ok(Tree::Map(out))
}

fn from_json_value(value: serde_json::Value, path: &str) -> Result<Tree> {
    use serde_json::Value;

    Ok(match value {
        Value::Null => Tree::Null,
        Value::Bool(b) => Tree::Bool(b),
        Value::Number(n) => match n.as_f64() {
            Some(f) => Tree::Number(f),
            None => return Err(unsupported(path, &format!("number {n}"))),
        },
        Value::String(s) => Tree::String(s),
        Value::Array(_) => return Err(unsupported(path, "array")),
        Value::Object(object) => {
            let mut out = BTreeMap::new();
            for (key, value) in object {
                let child = join_path(path, &key);
                out.insert(key, from_json_value(value, &child)?);
            }
            Tree::Map(out)
        }
    })
}

fn unsupported(path: &str, what: &str) -> Error {
    if path.is_empty() {
        Error::UnsupportedType(what.to_string())
    } else {
        Error::UnsupportedType(format!("{what} at {path}"))
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn exact_int(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n.abs() <= MAX_EXACT_INT).then_some(n as i64)
}

fn to_pretty_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_number(out: &mut String, n: f64) -> Result<()> {
    if !n.is_finite() {
        return Err(Error::UnsupportedType(format!("non-finite number {n}")));
    }
    match exact_int(n) {
        Some(i) => {
            let _ = write!(out, "{i}");
        }
        None => {
            // Display for f64 is the shortest round-trip form without an
            // exponent; an integral value still needs a point to stay a float.
            let text = n.to_string();
            out.push_str(&text);
            if !text.contains('.') {
                out.push_str(".0");
            }
        }
    }
    Ok(())
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_key(out: &mut String, key: &str) {
    if is_bare_key(key) {
        out.push_str(key);
    } else {
        write_string(out, key);
    }
}

fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_alphabetic())
        && !RESERVED_WORDS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::Engine;

    fn table(code: &str) -> Map {
        Engine::new().eval::<Map>(code).unwrap()
    }

    fn map(entries: &[(&str, Tree)]) -> Tree {
        Tree::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn from_table_converts_nested_values() {
        let tree = Tree::from_table(&table(
            r#"#{ name: "x", port: 8080, ratio: 0.5, on: true, none: (), inner: #{ a: "1" } }"#,
        ))
        .unwrap();
        assert_eq!(
            tree,
            map(&[
                ("inner", map(&[("a", Tree::String("1".into()))])),
                ("name", Tree::String("x".into())),
                ("none", Tree::Null),
                ("on", Tree::Bool(true)),
                ("port", Tree::Number(8080.0)),
                ("ratio", Tree::Number(0.5)),
            ])
        );
    }

    #[test]
    fn from_table_rejects_arrays_with_key_path() {
        let err = Tree::from_table(&table(r#"#{ outer: #{ list: [1, 2] } }"#)).unwrap_err();
        match err {
            Error::UnsupportedType(msg) => assert!(msg.contains("outer.list"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn from_table_rejects_function_pointers() {
        let err = Tree::from_table(&table(r#"#{ f: Fn("handler") }"#)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn from_dynamic_rejects_non_finite_numbers() {
        let err = Tree::from_dynamic(&Dynamic::from(f64::INFINITY)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn from_table_rejects_integers_that_lose_precision() {
        let err = Tree::from_table(&table("#{ outer: #{ id: 9007199254740993 } }")).unwrap_err();
        assert!(err.to_string().contains("at outer.id"), "{err}");

        let err = Tree::from_dynamic(&Dynamic::from(rhai::INT::MIN)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));

        let edge = Tree::from_table(&table("#{ id: 9007199254740992, neg: -9007199254740992 }"))
            .unwrap();
        let fields = edge.as_map().unwrap();
        assert_eq!(fields["id"], Tree::Number(9_007_199_254_740_992.0));
        assert_eq!(fields["neg"], Tree::Number(-9_007_199_254_740_992.0));
    }

    #[test]
    fn json_compact_and_pretty() {
        let tree = map(&[
            ("a", Tree::Number(1.0)),
            ("b", map(&[("c", Tree::String("d".into()))])),
        ]);
        assert_eq!(tree.to_json(false).unwrap(), r#"{"a":1,"b":{"c":"d"}}"#);
        assert_eq!(
            tree.to_json(true).unwrap(),
            "{\n    \"a\": 1,\n    \"b\": {\n        \"c\": \"d\"\n    }\n}"
        );
    }

    #[test]
    fn empty_map_json_has_no_whitespace() {
        let tree = Tree::Map(BTreeMap::new());
        assert_eq!(tree.to_json(true).unwrap(), "{}");
        assert_eq!(tree.to_json(false).unwrap(), "{}");
    }

    #[test]
    fn fractional_numbers_keep_their_fraction_in_json() {
        assert_eq!(Tree::Number(0.25).to_json(false).unwrap(), "0.25");
        assert_eq!(Tree::Number(-3.0).to_json(false).unwrap(), "-3");
    }

    #[test]
    fn compact_json_is_idempotent() {
        let tree = map(&[
            ("x", Tree::Number(1.5)),
            ("y", Tree::Null),
            ("z", map(&[("k", Tree::Bool(false))])),
        ]);
        let first = tree.to_json(false).unwrap();
        let second = Tree::from_json(&first).unwrap().to_json(false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn from_json_rejects_arrays() {
        let err = Tree::from_json(r#"{"a":[1]}"#).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn pretty_json_reindents_and_falls_back() {
        assert_eq!(pretty_json(r#"[1,{"a":2}]"#), "[\n    1,\n    {\n        \"a\": 2\n    }\n]");
        assert_eq!(pretty_json("<html>oops"), "<html>oops");
    }

    #[test]
    fn script_code_for_empty_map() {
        assert_eq!(Tree::Map(BTreeMap::new()).to_script_code("").unwrap(), "#{}");
    }

    #[test]
    fn script_code_layout() {
        let tree = map(&[
            ("method", Tree::String("GET".into())),
            ("header", map(&[("Content-Type", Tree::String("text/plain".into()))])),
        ]);
        assert_eq!(
            tree.to_script_code("").unwrap(),
            "#{\n\theader: #{\n\t\t\"Content-Type\": \"text/plain\"\n\t},\n\tmethod: \"GET\"\n}"
        );
    }

    #[test]
    fn script_code_quotes_keywords_and_non_letters() {
        let tree = map(&[
            ("if", Tree::Null),
            ("a1", Tree::Null),
            ("", Tree::Null),
            ("ok", Tree::Null),
        ]);
        let code = tree.to_script_code("").unwrap();
        assert!(code.contains("\"if\": ()"));
        assert!(code.contains("\"a1\": ()"));
        assert!(code.contains("\"\": ()"));
        assert!(code.contains("\tok: ()"));
    }

    #[test]
    fn script_code_numbers_are_minimal() {
        let code = |n: f64| Tree::Number(n).to_script_code("").unwrap();
        assert_eq!(code(80.0), "80");
        assert_eq!(code(0.1), "0.1");
        assert_eq!(code(-2.5), "-2.5");
        assert_eq!(code(1e20), "100000000000000000000.0");
        assert!(Tree::Number(f64::NAN).to_script_code("").is_err());
    }

    #[test]
    fn script_code_escapes_strings() {
        let code = Tree::String("a\"b\\c\nd\u{1}".into()).to_script_code("").unwrap();
        assert_eq!(code, r#""a\"b\\c\nd\u0001""#);
    }

    #[test]
    fn script_code_evaluates_back_to_the_same_tree() {
        let tree = map(&[
            ("s", Tree::String("tab\there \"q\"".into())),
            ("n", Tree::Number(-12.75)),
            ("i", Tree::Number(443.0)),
            ("b", Tree::Bool(true)),
            ("z", Tree::Null),
            ("x-y", map(&[("deep", map(&[]))])),
        ]);
        let code = tree.to_script_code("").unwrap();
        let back = Tree::from_table(&table(&code)).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn string_map_coerces_scalars() {
        let query = table(r#"#{ page: 2, q: "rust", ratio: 1.5, on: true }"#);
        let out = table_to_string_map(Some(&query));
        assert_eq!(out["page"], "2");
        assert_eq!(out["q"], "rust");
        assert_eq!(out["ratio"], "1.5");
        assert_eq!(out["on"], "true");
        assert!(table_to_string_map(None).is_empty());
    }
}
