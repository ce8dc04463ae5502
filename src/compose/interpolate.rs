//! String interpolation over a composed tree.
//!
//! Supported forms:
//! - `${a.b.c}` absolute reference, `${.c}` sibling reference
//! - `${now:<strftime>}` composition timestamp
//! - `${oc.env:NAME}` / `${oc.env:NAME,default}` environment variable
//!
//! `\${` is a literal `${`.

use super::node::{self, join, key_string};
use crate::error::ComposeError;
use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDateTime;
use serde_yaml::{Mapping, Value};
use std::fmt::Write as _;

/// True if `s` contains an unescaped `${`.
pub fn has_interpolation(s: &str) -> bool {
    let bytes = s.as_bytes();
    (0..bytes.len().saturating_sub(1))
        .any(|i| bytes[i] == b'$' && bytes[i + 1] == b'{' && (i == 0 || bytes[i - 1] != b'\\'))
}

#[derive(Debug, PartialEq)]
enum Segment {
    Text(String),
    Interp(String),
}

fn tokenize(s: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && chars.get(i + 1) == Some(&'$') && chars.get(i + 2) == Some(&'{') {
            text.push_str("${");
            i += 3;
        } else if chars[i] == '$' && chars.get(i + 1) == Some(&'{') {
            let start = i + 2;
            let mut depth = 1;
            let mut j = start;
            while j < chars.len() {
                if chars[j] == '$' && chars.get(j + 1) == Some(&'{') {
                    depth += 1;
                    j += 1;
                } else if chars[j] == '}' {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                j += 1;
            }
            if depth != 0 {
                return Err("unterminated interpolation".to_string());
            }
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Interp(chars[start..j].iter().collect()));
            i = j + 1;
        } else {
            text.push(chars[i]);
            i += 1;
        }
    }
    if !text.is_empty() || segments.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

/// Resolve every interpolation in `root`.
pub fn resolve(root: &Value, now: NaiveDateTime) -> Result<Value, ComposeError> {
    let mut resolver = Resolver {
        root,
        now,
        stack: Vec::new(),
    };
    resolver.resolve_node(root, "")
}

struct Resolver<'a> {
    root: &'a Value,
    now: NaiveDateTime,
    stack: Vec<String>,
}

impl Resolver<'_> {
    fn resolve_node(&mut self, value: &Value, path: &str) -> Result<Value, ComposeError> {
        match value {
            Value::Mapping(map) => {
                let mut out = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    let child = join(path, &key_string(k));
                    out.insert(k.clone(), self.resolve_node(v, &child)?);
                }
                Ok(Value::Mapping(out))
            }
            Value::Sequence(seq) => seq
                .iter()
                .enumerate()
                .map(|(i, v)| self.resolve_node(v, &join(path, &i.to_string())))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            Value::String(s) => self.resolve_string(s, path),
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&mut self, s: &str, path: &str) -> Result<Value, ComposeError> {
        let segments = tokenize(s).map_err(|reason| unresolved(path, s, reason))?;

        if let [Segment::Interp(expr)] = segments.as_slice() {
            return self.evaluate(expr, path);
        }

        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(&text),
                Segment::Interp(expr) => {
                    let value = self.evaluate(&expr, path)?;
                    let rendered = node::scalar_to_string(&value).ok_or_else(|| {
                        unresolved(path, &expr, format!("cannot embed a {} in a string", node::kind(&value)))
                    })?;
                    out.push_str(&rendered);
                }
            }
        }
        Ok(Value::String(out))
    }

    fn evaluate(&mut self, expr: &str, path: &str) -> Result<Value, ComposeError> {
        let expr = if has_interpolation(expr) {
            match self.resolve_string(expr, path)? {
                Value::String(s) => s,
                other => node::scalar_to_string(&other).unwrap_or_default(),
            }
        } else {
            expr.to_string()
        };
        let expr = expr.trim();

        if let Some((name, args)) = expr.split_once(':') {
            return self.call_resolver(name.trim(), args, expr, path);
        }

        let key = if let Some(relative) = expr.strip_prefix('.') {
            let parent = path.rsplit_once('.').map(|(p, _)| p).unwrap_or("");
            join(parent, relative)
        } else {
            expr.to_string()
        };

        if self.stack.contains(&key) {
            let mut cycle = self.stack.clone();
            cycle.push(key);
            return Err(ComposeError::InterpolationCycle(cycle));
        }
        let target = node::get(self.root, &key)
            .ok_or_else(|| unresolved(path, expr, format!("key '{}' not found", key)))?
            .clone();

        self.stack.push(key.clone());
        let resolved = self.resolve_node(&target, &key);
        self.stack.pop();
        resolved
    }

    fn call_resolver(
        &mut self,
        name: &str,
        args: &str,
        expr: &str,
        path: &str,
    ) -> Result<Value, ComposeError> {
        match name {
            "now" => {
                let items: Vec<Item<'_>> = StrftimeItems::new(args).collect();
                if items.iter().any(|item| matches!(item, Item::Error)) {
                    return Err(unresolved(path, expr, "invalid strftime format".to_string()));
                }
                let mut out = String::new();
                write!(out, "{}", self.now.format_with_items(items.iter()))
                    .map_err(|_| unresolved(path, expr, "timestamp formatting failed".to_string()))?;
                Ok(Value::String(out))
            }
            "oc.env" => {
                let (var, default) = match args.split_once(',') {
                    Some((var, default)) => (var.trim(), Some(default.trim())),
                    None => (args.trim(), None),
                };
                match (std::env::var(var), default) {
                    (Ok(value), _) => Ok(Value::String(value)),
                    (Err(_), Some("null")) => Ok(Value::Null),
                    (Err(_), Some(default)) => Ok(Value::String(
                        default.trim_matches(|c| c == '\'' || c == '"').to_string(),
                    )),
                    (Err(_), None) => Err(unresolved(
                        path,
                        expr,
                        format!("environment variable '{}' is not set", var),
                    )),
                }
            }
            other => Err(unresolved(path, expr, format!("unknown resolver '{}'", other))),
        }
    }
}

fn unresolved(path: &str, expr: &str, reason: String) -> ComposeError {
    ComposeError::UnresolvedInterpolation {
        key: path.to_string(),
        expr: expr.to_string(),
        reason,
    }
}
