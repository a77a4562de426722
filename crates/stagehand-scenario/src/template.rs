//! ---
//! sh_section: "01-scenario-engine"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Placeholder resolution for step parameters."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
//! `${expression}` placeholders are resolved by walking the parameter tree.
//!
//! A string consisting of a single placeholder is replaced by the typed value
//! it refers to; placeholders embedded in longer text are rendered as text.
//! Object keys are left untouched. Expressions are dotted paths with optional
//! array indices, e.g. `${deployer.address}` or `${accounts[1]}`.

use serde_json::{Map, Value};

use crate::error::TemplateError;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// Variables visible to placeholder expressions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateContext {
    vars: Map<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Evaluate a path expression against the context.
    pub fn lookup(&self, expression: &str) -> Result<&Value, TemplateError> {
        let path = parse_path(expression)?;
        let undefined = || TemplateError::Undefined {
            expression: expression.to_owned(),
        };
        let mut segments = path.into_iter();
        let mut current = match segments.next() {
            Some(Segment::Key(key)) => self.vars.get(key).ok_or_else(undefined)?,
            _ => {
                return Err(TemplateError::Malformed {
                    expression: expression.to_owned(),
                })
            }
        };
        for segment in segments {
            current = match segment {
                Segment::Key(key) => current.get(key),
                Segment::Index(index) => current.get(index),
            }
            .ok_or_else(undefined)?;
        }
        Ok(current)
    }
}

/// Resolve every placeholder inside `params`. Values without placeholders
/// are returned unchanged.
pub fn resolve_params(params: &Value, context: &TemplateContext) -> Result<Value, TemplateError> {
    match params {
        Value::String(text) => resolve_string(text, context),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_params(item, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(entries) => entries
            .iter()
            .map(|(key, value)| {
                Ok::<_, TemplateError>((key.clone(), resolve_params(value, context)?))
            })
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

enum Piece<'a> {
    Text(&'a str),
    Expr(&'a str),
}

fn resolve_string(text: &str, context: &TemplateContext) -> Result<Value, TemplateError> {
    if !text.contains(OPEN) {
        return Ok(Value::String(text.to_owned()));
    }
    let pieces = split_placeholders(text)?;
    if let [Piece::Expr(expression)] = pieces.as_slice() {
        return context.lookup(expression).cloned();
    }

    let mut rendered = String::with_capacity(text.len());
    for piece in pieces {
        match piece {
            Piece::Text(literal) => rendered.push_str(literal),
            Piece::Expr(expression) => match context.lookup(expression)? {
                Value::String(value) => rendered.push_str(value),
                value => rendered.push_str(&value.to_string()),
            },
        }
    }
    Ok(Value::String(rendered))
}

fn split_placeholders(text: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            pieces.push(Piece::Text(&rest[..start]));
        }
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            return Err(TemplateError::Unterminated {
                text: text.to_owned(),
            });
        };
        let expression = after[..end].trim();
        if expression.is_empty() {
            return Err(TemplateError::Empty {
                text: text.to_owned(),
            });
        }
        pieces.push(Piece::Expr(expression));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    Ok(pieces)
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn parse_path(expression: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let malformed = || TemplateError::Malformed {
        expression: expression.to_owned(),
    };
    let mut segments = Vec::new();
    for part in expression.split('.') {
        let (key, mut indices) = match part.find('[') {
            Some(open) => (&part[..open], &part[open..]),
            None => (part, ""),
        };
        if key.is_empty() || !key.chars().all(is_identifier_char) {
            return Err(malformed());
        }
        segments.push(Segment::Key(key));
        while !indices.is_empty() {
            let close = indices.find(']').ok_or_else(malformed)?;
            if !indices.starts_with('[') {
                return Err(malformed());
            }
            let index = indices[1..close].parse().map_err(|_| malformed())?;
            segments.push(Segment::Index(index));
            indices = &indices[close + 1..];
        }
    }
    Ok(segments)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> TemplateContext {
        TemplateContext::new()
            .with_var("deployer", json!({"address": "0xabc", "nonce": 7}))
            .with_var("accounts", json!(["0x01", "0x02"]))
            .with_var("quote", json!("say \"hi\""))
    }

    #[test]
    fn values_without_placeholders_pass_through() {
        let params = json!({"to": "0x02", "amount": 10, "flags": [true, null]});
        assert_eq!(resolve_params(&params, &TemplateContext::new()).unwrap(), params);
    }

    #[test]
    fn whole_placeholder_keeps_type() {
        let resolved = resolve_params(
            &json!({"nonce": "${deployer.nonce}", "who": "${ accounts[1] }"}),
            &context(),
        )
        .unwrap();
        assert_eq!(resolved, json!({"nonce": 7, "who": "0x02"}));
    }

    #[test]
    fn embedded_placeholders_render_as_text() {
        let resolved = resolve_params(
            &json!(["from ${deployer.address} nonce ${deployer.nonce}"]),
            &context(),
        )
        .unwrap();
        assert_eq!(resolved, json!(["from 0xabc nonce 7"]));
    }

    #[test]
    fn quotes_in_substituted_values_are_preserved() {
        let resolved = resolve_params(&json!({"memo": "${quote}!"}), &context()).unwrap();
        assert_eq!(resolved, json!({"memo": "say \"hi\"!"}));
    }

    #[test]
    fn object_keys_are_not_templated() {
        let params = json!({"${deployer}": 1});
        assert_eq!(resolve_params(&params, &context()).unwrap(), params);
    }

    #[test]
    fn undefined_variable_fails() {
        let err = resolve_params(&json!({"x": "${missing}"}), &TemplateContext::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Undefined {
                expression: "missing".into()
            }
        );
        let err = resolve_params(&json!("${accounts[5]}"), &context()).unwrap_err();
        assert!(matches!(err, TemplateError::Undefined { .. }));
    }

    #[test]
    fn malformed_placeholders_fail() {
        assert!(matches!(
            resolve_params(&json!("${deployer"), &context()),
            Err(TemplateError::Unterminated { .. })
        ));
        assert!(matches!(
            resolve_params(&json!("${ }"), &context()),
            Err(TemplateError::Empty { .. })
        ));
        assert!(matches!(
            resolve_params(&json!("${a + b}"), &context()),
            Err(TemplateError::Malformed { .. })
        ));
        assert!(matches!(
            resolve_params(&json!("${accounts[x]}"), &context()),
            Err(TemplateError::Malformed { .. })
        ));
    }

    #[test]
    fn parses_nested_indices() {
        assert_eq!(
            parse_path("grid[0][2].cell").unwrap(),
            vec![
                Segment::Key("grid"),
                Segment::Index(0),
                Segment::Index(2),
                Segment::Key("cell")
            ]
        );
    }
}
