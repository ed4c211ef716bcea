//! `{placeholder}` substitution for instruction templates.
//!
//! Free functions so any agent implementation can reuse them. A placeholder
//! is `{name}` or a dotted path `{name.field.0}`; `{{` and `}}` produce
//! literal braces. Any other `{` must open a placeholder: a `{` with no
//! closing `}`, or braces around anything but a name, is an error. A lone
//! `}` is kept as text.

#[cfg(test)]
#[path = "substitution_tests.rs"]
mod tests;

use serde_json::Value;

use taskloom_protocols::Variables;

use crate::error::SubstitutionError;
use crate::store::VariableStore;
use crate::task::Task;

enum Segment<'a> {
    Text(&'a str),
    Literal(char),
    Placeholder(&'a str),
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn parse(template: &str) -> Result<Vec<Segment<'_>>, SubstitutionError> {
    let mut segments = Vec::new();
    let bytes = template.as_bytes();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                segments.push(Segment::Text(&template[text_start..i]));
                segments.push(Segment::Literal('{'));
                i += 2;
                text_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                segments.push(Segment::Text(&template[text_start..i]));
                segments.push(Segment::Literal('}'));
                i += 2;
                text_start = i;
            }
            b'{' => {
                let name_start = i + 1;
                let close = template[name_start..]
                    .find(['{', '}'])
                    .map(|offset| name_start + offset)
                    .filter(|&end| bytes[end] == b'}')
                    .ok_or(SubstitutionError::UnterminatedPlaceholder(i))?;

                let name = &template[name_start..close];
                if name.is_empty() || !name.chars().all(is_name_char) {
                    return Err(SubstitutionError::InvalidPlaceholder {
                        position: i,
                        content: name.to_string(),
                    });
                }
                segments.push(Segment::Text(&template[text_start..i]));
                segments.push(Segment::Placeholder(name));
                i = close + 1;
                text_start = i;
            }
            _ => i += 1,
        }
    }

    segments.push(Segment::Text(&template[text_start..]));
    Ok(segments)
}

/// First segment of a dotted placeholder path.
pub fn root_segment(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Placeholder names in order of first appearance, without duplicates.
///
/// A malformed template yields the placeholders found before the error.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let segments = match parse(template) {
        Ok(segments) => segments,
        Err(err) => err
            .position()
            .and_then(|pos| parse(&template[..pos]).ok())
            .unwrap_or_default(),
    };
    for segment in segments {
        if let Segment::Placeholder(name) = segment {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Look up a possibly dotted path in `context`.
pub fn lookup<'a>(path: &str, context: &'a Variables) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = context.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a value the way it appears inside an instruction.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace every placeholder in `template` with its value from `context`.
///
/// Fails on the first placeholder that cannot be resolved; never
/// substitutes an empty string for a missing key.
pub fn substitute(template: &str, context: &Variables) -> Result<String, SubstitutionError> {
    let mut out = String::with_capacity(template.len());
    for segment in parse(template)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Literal(c) => out.push(c),
            Segment::Placeholder(name) => {
                let value = lookup(name, context)
                    .ok_or_else(|| SubstitutionError::MissingVariable(name.to_string()))?;
                out.push_str(&stringify(value));
            }
        }
    }
    Ok(out)
}

/// Placeholders in `template` that `context` cannot resolve.
pub fn missing_variables(template: &str, context: &Variables) -> Vec<String> {
    placeholders(template)
        .into_iter()
        .filter(|name| lookup(name, context).is_none())
        .collect()
}

/// Substitution context for `task`: the store projected onto the task's
/// input keys, with the task's own parameters taking precedence.
pub fn build_context(task: &Task, store: &VariableStore) -> Variables {
    let keys = task.effective_input_keys();
    let mut context = store.project(keys.iter().map(String::as_str));
    for (key, value) in &task.parameters {
        context.insert(key.clone(), value.clone());
    }
    context
}

/// Build the context for `task` and render its instruction.
pub fn render(task: &Task, store: &VariableStore) -> Result<(String, Variables), SubstitutionError> {
    let context = build_context(task, store);
    let instruction = substitute(&task.instruction_template, &context)?;
    Ok((instruction, context))
}
