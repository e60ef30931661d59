//! Registry entry templating.
//!
//! Entries interpolate `{{ expr | filter(arg) | ... }}` expressions over
//! their own JSON representation (plus an injected `version`). Rendering is
//! repeated to a fixed point because an expansion may itself produce further
//! templates.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use thiserror::Error;

use crate::core::platform::Platform;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("invalid filter syntax '{0}' in '{1}'")]
    FilterSyntax(String, String),

    #[error("invalid function syntax '{0}'")]
    FunctionSyntax(String),

    #[error("unknown filter '{0}' in '{1}'")]
    UnknownFilter(String, String),

    #[error("unknown function '{0}' in '{1}'")]
    UnknownFunction(String, String),

    #[error("identifier '{0}' not found in '{1}'")]
    UnknownIdentifier(String, String),

    #[error("cannot resolve attribute/key '{0}' in '{1}'")]
    UnknownKey(String, String),

    #[error("'{0}' requires an argument")]
    MissingArgument(&'static str),

    #[error("'{0}': value must be a string")]
    StringExpected(&'static str),

    #[error("'{0}': condition must be a boolean")]
    BoolExpected(&'static str),
}

/// A dynamic template value.
///
/// Booleans stay booleans through filter chains so `equals`/`take_if` keep
/// sharp semantics; everything else JSON-shaped maps onto strings, lists,
/// and nested mappings.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Str(String::new()),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Str(n.to_string()),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Evaluates `{{ ... }}` interpolations against a context mapping.
pub struct TemplateEngine<'a> {
    platform: &'a Platform,
    interp: Regex,
}

impl<'a> TemplateEngine<'a> {
    pub fn new(platform: &'a Platform) -> Self {
        Self {
            platform,
            interp: Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("interpolation pattern"),
        }
    }

    /// Replace every interpolation in `text`. Any failing expression fails
    /// the whole render.
    pub fn render(&self, text: &str, ctx: &Value) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in self.interp.captures_iter(text) {
            let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            let value = self.eval_expr(expr.as_str(), ctx)?;
            out.push_str(&value.to_string());
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    /// Render until the text stops changing.
    pub fn render_to_fixed_point(&self, text: &str, ctx: &Value) -> Result<String, TemplateError> {
        let mut current = text.to_string();
        loop {
            let next = self.render(&current, ctx)?;
            if next == current {
                return Ok(next);
            }
            current = next;
        }
    }

    fn eval_expr(&self, expr: &str, ctx: &Value) -> Result<Value, TemplateError> {
        let mut parts = expr.split('|').map(str::trim);
        let mut value = self.eval_value(parts.next().unwrap_or_default(), ctx, expr)?;

        for filter in parts {
            if filter.is_empty() {
                continue;
            }

            let (name, arg) = if let Some(open) = filter.find('(') {
                if !filter.ends_with(')') {
                    return Err(TemplateError::FilterSyntax(
                        filter.to_string(),
                        expr.to_string(),
                    ));
                }
                let name = filter[..open].trim();
                let arg_str = &filter[open + 1..filter.len() - 1];
                (name, self.eval_arg(arg_str, ctx, expr)?)
            } else if let Some((name, rest)) = filter.split_once(' ') {
                let Some(arg) = parse_string(rest.trim()) else {
                    return Err(TemplateError::FilterSyntax(
                        filter.to_string(),
                        expr.to_string(),
                    ));
                };
                (name, Some(Value::Str(arg)))
            } else {
                (filter, None)
            };

            value = apply_filter(name, value, arg, expr)?;
        }

        Ok(value)
    }

    /// The head of an expression: a string literal, a two-argument filter
    /// call, or a dotted identifier resolved against the context.
    fn eval_value(&self, head: &str, ctx: &Value, expr: &str) -> Result<Value, TemplateError> {
        if let Some(s) = parse_string(head) {
            return Ok(Value::Str(s));
        }

        if let Some(open) = head.find('(') {
            if !head.ends_with(')') {
                return Err(TemplateError::FunctionSyntax(head.to_string()));
            }
            let name = head[..open].trim();
            let inner = &head[open + 1..head.len() - 1];
            let Some((first, second)) = inner.split_once(',') else {
                return Err(TemplateError::FunctionSyntax(head.to_string()));
            };
            let arg = self.eval_arg(first, ctx, expr)?;
            let value = self
                .eval_arg(second, ctx, expr)?
                .unwrap_or_else(|| Value::Str(String::new()));
            return apply_filter(name, value, arg, expr);
        }

        let mut segments = head.split('.').map(str::trim);
        let root = segments.next().unwrap_or_default();
        let Value::Map(map) = ctx else {
            return Err(TemplateError::UnknownIdentifier(
                root.to_string(),
                expr.to_string(),
            ));
        };
        let mut value = map.get(root).ok_or_else(|| {
            TemplateError::UnknownIdentifier(root.to_string(), expr.to_string())
        })?;

        for key in segments {
            let Value::Map(nested) = value else {
                return Err(TemplateError::UnknownKey(key.to_string(), expr.to_string()));
            };
            value = nested
                .get(key)
                .ok_or_else(|| TemplateError::UnknownKey(key.to_string(), expr.to_string()))?;
        }

        Ok(value.clone())
    }

    /// An argument: a function call, a string literal, or a bare identifier.
    ///
    /// Bare identifiers resolve against the context and fall back to the
    /// literal token on a miss; registry data relies on the fallback, so it
    /// only warns.
    fn eval_arg(
        &self,
        arg: &str,
        ctx: &Value,
        expr: &str,
    ) -> Result<Option<Value>, TemplateError> {
        let arg = arg.trim();
        if arg.is_empty() {
            return Ok(Some(Value::Str(String::new())));
        }

        if let Some(open) = arg.find('(') {
            if !arg.ends_with(')') {
                return Err(TemplateError::FunctionSyntax(arg.to_string()));
            }
            let name = arg[..open].trim();
            let inner = self
                .eval_arg(&arg[open + 1..arg.len() - 1], ctx, expr)?
                .unwrap_or_else(|| Value::Str(String::new()));
            return self.call_function(name, inner, expr).map(Some);
        }

        if let Some(s) = parse_string(arg) {
            return Ok(Some(Value::Str(s)));
        }

        if let Value::Map(map) = ctx {
            if let Some(value) = map.get(arg) {
                return Ok(Some(value.clone()));
            }
        }

        tracing::warn!(identifier = arg, expression = expr, "identifier not in context, using literal");
        Ok(Some(Value::Str(arg.to_string())))
    }

    fn call_function(&self, name: &str, arg: Value, expr: &str) -> Result<Value, TemplateError> {
        match name {
            "is_platform" => {
                let Value::Str(tag) = arg else {
                    return Err(TemplateError::StringExpected("is_platform"));
                };
                Ok(Value::Bool(self.platform.matches(&[tag])))
            }
            _ => Err(TemplateError::UnknownFunction(
                name.to_string(),
                expr.to_string(),
            )),
        }
    }
}

fn apply_filter(
    name: &str,
    value: Value,
    arg: Option<Value>,
    expr: &str,
) -> Result<Value, TemplateError> {
    match name {
        "equals" => {
            let arg = arg.ok_or(TemplateError::MissingArgument("equals"))?;
            Ok(Value::Bool(value == arg))
        }
        "not_equals" => {
            let arg = arg.ok_or(TemplateError::MissingArgument("not_equals"))?;
            Ok(Value::Bool(value != arg))
        }
        "strip_prefix" => {
            let prefix = expect_string(arg.ok_or(TemplateError::MissingArgument("strip_prefix"))?, "strip_prefix")?;
            let s = expect_string(value, "strip_prefix")?;
            Ok(Value::Str(
                s.strip_prefix(&prefix).map(str::to_string).unwrap_or(s),
            ))
        }
        "strip_suffix" => {
            let suffix = expect_string(arg.ok_or(TemplateError::MissingArgument("strip_suffix"))?, "strip_suffix")?;
            let s = expect_string(value, "strip_suffix")?;
            Ok(Value::Str(
                s.strip_suffix(&suffix).map(str::to_string).unwrap_or(s),
            ))
        }
        "take_if" => {
            let cond = expect_bool(arg.ok_or(TemplateError::MissingArgument("take_if"))?, "take_if")?;
            Ok(if cond { value } else { Value::Str(String::new()) })
        }
        "take_if_not" => {
            let cond = expect_bool(arg.ok_or(TemplateError::MissingArgument("take_if_not"))?, "take_if_not")?;
            Ok(if cond { Value::Str(String::new()) } else { value })
        }
        "to_lower" => {
            let s = expect_string(value, "to_lower")?;
            Ok(Value::Str(s.to_lowercase()))
        }
        "to_upper" => {
            let s = expect_string(value, "to_upper")?;
            Ok(Value::Str(s.to_uppercase()))
        }
        _ => Err(TemplateError::UnknownFilter(
            name.to_string(),
            expr.to_string(),
        )),
    }
}

fn expect_string(value: Value, filter: &'static str) -> Result<String, TemplateError> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(TemplateError::StringExpected(filter)),
    }
}

fn expect_bool(value: Value, filter: &'static str) -> Result<bool, TemplateError> {
    match value {
        Value::Bool(b) => Ok(b),
        _ => Err(TemplateError::BoolExpected(filter)),
    }
}

/// Accepts `'...'`, `"..."`, and the escaped form `\"...\"` seen in
/// JSON-embedded templates.
fn parse_string(s: &str) -> Option<String> {
    let s = s.trim();
    if s.len() >= 4 && s.starts_with("\\\"") && s.ends_with("\\\"") {
        return Some(s[2..s.len() - 2].to_string());
    }
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        return Some(s[1..s.len() - 1].to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_ctx() -> (Platform, Value) {
        let platform = Platform::from_tags(["linux", "linux_x64", "unix"]);
        let ctx = Value::from_json(&serde_json::json!({
            "version": "1.2.3",
            "source": { "id": "pkg:cargo/ripgrep@14.1.0" },
            "name": "ripgrep",
        }));
        (platform, ctx)
    }

    #[test]
    fn test_plain_text_passes_through() {
        let (platform, ctx) = engine_ctx();
        let engine = TemplateEngine::new(&platform);
        assert_eq!(engine.render("no templates here", &ctx).unwrap(), "no templates here");
    }

    #[test]
    fn test_identifier_lookup() {
        let (platform, ctx) = engine_ctx();
        let engine = TemplateEngine::new(&platform);
        assert_eq!(engine.render("{{ version }}", &ctx).unwrap(), "1.2.3");
        assert_eq!(
            engine.render("{{ source.id }}", &ctx).unwrap(),
            "pkg:cargo/ripgrep@14.1.0"
        );
    }

    #[test]
    fn test_strip_prefix_then_upper() {
        let (platform, ctx) = engine_ctx();
        let engine = TemplateEngine::new(&platform);
        assert_eq!(
            engine
                .render("{{ 'foo-' | strip_prefix('foo-') | to_upper }}", &ctx)
                .unwrap(),
            ""
        );
        assert_eq!(
            engine
                .render("{{ version | strip_prefix('v') }}", &ctx)
                .unwrap(),
            "1.2.3"
        );
    }

    #[test]
    fn test_space_form_filter_argument() {
        let (platform, ctx) = engine_ctx();
        let engine = TemplateEngine::new(&platform);
        assert_eq!(
            engine
                .render("{{ 'v1.2.3' | strip_prefix \"v\" }}", &ctx)
                .unwrap(),
            "1.2.3"
        );
    }

    #[test]
    fn test_escaped_quote_string_literal() {
        let (platform, ctx) = engine_ctx();
        let engine = TemplateEngine::new(&platform);
        assert_eq!(
            engine
                .render(r#"{{ 'abc' | strip_prefix(\"a\") }}"#, &ctx)
                .unwrap(),
            "bc"
        );
    }

    #[test]
    fn test_take_if_not_keeps_value() {
        let (platform, ctx) = engine_ctx();
        let engine = TemplateEngine::new(&platform);
        assert_eq!(
            engine
                .render("{{ source.id | take_if_not(is_platform('nonexistent')) }}", &ctx)
                .unwrap(),
            "pkg:cargo/ripgrep@14.1.0"
        );
        assert_eq!(
            engine
                .render("{{ source.id | take_if(is_platform('nonexistent')) }}", &ctx)
                .unwrap(),
            ""
        );
    }

    #[test]
    fn test_equals_yields_boolean() {
        let (platform, ctx) = engine_ctx();
        let engine = TemplateEngine::new(&platform);
        assert_eq!(
            engine.render("{{ name | equals('ripgrep') }}", &ctx).unwrap(),
            "true"
        );
        assert_eq!(
            engine.render("{{ name | not_equals('ripgrep') }}", &ctx).unwrap(),
            "false"
        );
    }

    #[test]
    fn test_is_platform_in_value_position_call() {
        let (platform, ctx) = engine_ctx();
        let engine = TemplateEngine::new(&platform);
        assert_eq!(
            engine
                .render("{{ take_if(is_platform('linux'), version) }}", &ctx)
                .unwrap(),
            "1.2.3"
        );
    }

    #[test]
    fn test_errors() {
        let (platform, ctx) = engine_ctx();
        let engine = TemplateEngine::new(&platform);
        assert!(matches!(
            engine.render("{{ version | frobnicate }}", &ctx),
            Err(TemplateError::UnknownFilter(..))
        ));
        assert!(matches!(
            engine.render("{{ missing }}", &ctx),
            Err(TemplateError::UnknownIdentifier(..))
        ));
        assert!(matches!(
            engine.render("{{ source.nope }}", &ctx),
            Err(TemplateError::UnknownKey(..))
        ));
        assert!(matches!(
            engine.render("{{ version | equals }}", &ctx),
            Err(TemplateError::MissingArgument(..))
        ));
        assert!(matches!(
            engine.render("{{ version | strip_prefix(is_platform('linux')) }}", &ctx),
            Err(TemplateError::StringExpected(..))
        ));
    }

    #[test]
    fn test_fixed_point_expands_nested_templates() {
        let platform = Platform::from_tags(["linux"]);
        let ctx = Value::from_json(&serde_json::json!({
            "outer": "{{ inner }}",
            "inner": "done",
        }));
        let engine = TemplateEngine::new(&platform);
        assert_eq!(
            engine.render_to_fixed_point("{{ outer }}", &ctx).unwrap(),
            "done"
        );
    }

    #[test]
    fn test_fixed_point_is_stable() {
        let (platform, ctx) = engine_ctx();
        let engine = TemplateEngine::new(&platform);
        let once = engine.render_to_fixed_point("v{{ version }}", &ctx).unwrap();
        let twice = engine.render_to_fixed_point(&once, &ctx).unwrap();
        assert_eq!(once, twice);
    }
}
