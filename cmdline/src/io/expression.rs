//! Parameter-reference evaluator backed by `minijinja` expressions.
//!
//! Supports `$(expr)` references. A string that is exactly one reference
//! evaluates to the referenced value; references embedded in other text are
//! interpolated. `${...}` function bodies are rejected.

use async_trait::async_trait;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde_json::{Value, json};

use crate::core::expression::{Context, EvaluationError, Evaluator, Expression};
use crate::core::value::JobValue;

/// Default fuel budget for one expression.
pub const DEFAULT_FUEL: u64 = 10_000;

#[derive(Debug)]
pub struct TemplateEvaluator {
    env: Environment<'static>,
}

impl Default for TemplateEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_FUEL)
    }
}

impl TemplateEvaluator {
    pub fn new(fuel: u64) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_fuel(Some(fuel));
        Self { env }
    }

    fn eval_one(
        &self,
        source: &str,
        scope: &minijinja::Value,
        location: &str,
    ) -> Result<Value, EvaluationError> {
        let compiled = self
            .env
            .compile_expression(source)
            .map_err(|err| convert_error(&err, location))?;
        let value = compiled
            .eval(scope)
            .map_err(|err| convert_error(&err, location))?;
        if value.is_undefined() {
            return Err(EvaluationError::new(
                "ReferenceError",
                location,
                format!("{source} is undefined"),
            ));
        }
        serde_json::to_value(&value)
            .map_err(|err| EvaluationError::new("TypeError", location, err.to_string()))
    }
}

#[async_trait]
impl Evaluator for TemplateEvaluator {
    async fn evaluate(
        &self,
        expression: &Expression,
        context: &Context,
    ) -> Result<JobValue, EvaluationError> {
        let location = expression.location.as_str();
        let segments = split_segments(&expression.source, location)?;
        if !segments.iter().any(Segment::is_reference) {
            let text: String = segments.iter().map(Segment::as_str).collect();
            return Ok(JobValue::string(text));
        }

        let scope = minijinja::Value::from_serialize(scope_json(context));
        if let [Segment::Reference(source)] = segments.as_slice() {
            return self.eval_one(source, &scope, location).map(JobValue::from);
        }

        let mut out = String::new();
        for segment in &segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Reference(source) => match self.eval_one(source, &scope, location)? {
                    Value::String(text) => out.push_str(&text),
                    other => out.push_str(&other.to_string()),
                },
            }
        }
        Ok(JobValue::string(out))
    }
}

fn scope_json(context: &Context) -> Value {
    json!({
        "inputs": context.inputs.to_json(),
        "job": context.job.to_json(),
        "self": context.self_value.as_ref().map_or(Value::Null, JobValue::to_json),
        "runtime": context.runtime.as_ref(),
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Reference(&'a str),
}

impl<'a> Segment<'a> {
    fn is_reference(&self) -> bool {
        matches!(self, Segment::Reference(_))
    }

    fn as_str(&self) -> &'a str {
        match self {
            Segment::Text(text) | Segment::Reference(text) => *text,
        }
    }
}

/// Split source text into literal runs and `$(...)` references, honouring
/// nested parentheses and quoted strings inside a reference. `\$` is a
/// literal `$`; the backslash is dropped.
fn split_segments<'a>(
    source: &'a str,
    location: &str,
) -> Result<Vec<Segment<'a>>, EvaluationError> {
    let bytes = source.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() && bytes[i + 1] == b'$' {
            if text_start < i {
                segments.push(Segment::Text(&source[text_start..i]));
            }
            text_start = i + 1;
            i += 2;
            continue;
        }
        if bytes[i] != b'$' || i + 1 >= bytes.len() {
            i += 1;
            continue;
        }
        match bytes[i + 1] {
            b'{' => {
                return Err(EvaluationError::new(
                    "SyntaxError",
                    location,
                    "function bodies are not supported",
                ));
            }
            b'(' => {
                let end = closing_paren(bytes, i + 1).ok_or_else(|| {
                    EvaluationError::new(
                        "SyntaxError",
                        location,
                        "unterminated parameter reference",
                    )
                })?;
                if text_start < i {
                    segments.push(Segment::Text(&source[text_start..i]));
                }
                segments.push(Segment::Reference(&source[i + 2..end]));
                i = end + 1;
                text_start = i;
            }
            _ => i += 1,
        }
    }
    if text_start < source.len() {
        segments.push(Segment::Text(&source[text_start..]));
    }
    Ok(segments)
}

fn closing_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let byte = bytes[i];
        match quote {
            Some(_) if byte == b'\\' => i += 1,
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None => match byte {
                b'\'' | b'"' => quote = Some(byte),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

fn convert_error(err: &minijinja::Error, location: &str) -> EvaluationError {
    let kind = match err.kind() {
        ErrorKind::SyntaxError => "SyntaxError",
        ErrorKind::UndefinedError => "ReferenceError",
        ErrorKind::OutOfFuel => "TimeoutError",
        ErrorKind::InvalidOperation
        | ErrorKind::UnknownFilter
        | ErrorKind::UnknownTest
        | ErrorKind::UnknownFunction
        | ErrorKind::UnknownMethod
        | ErrorKind::MissingArgument
        | ErrorKind::TooManyArguments => "TypeError",
        _ => "EvaluationError",
    };
    EvaluationError::new(kind, location, err.to_string())
}
