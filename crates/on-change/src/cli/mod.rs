//! `on-change-trace`: replay a script of mutations against a JSON document
//! and print every change event.
//!
//! A script is a sequence of steps given as separate arguments:
//! - `set <path> <json>`
//! - `delete <path>`
//! - `call <path> <operation> [json-args...]`
//!
//! `call` takes arguments up to the next step keyword. Paths are dot-joined
//! and the empty string names the root. A leading `--options <json>`
//! configures the observer (`Options` in camelCase).

use std::cell::RefCell;
use std::rc::Rc;

use on_change_path::{Key, Path, PathForm};

use crate::error::Error;
use crate::event::Change;
use crate::observe::observe;
use crate::options::Options;
use crate::value::Value;

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CliError {
    Json(serde_json::Error),
    Script(String),
    Engine(Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Json(e) => write!(f, "{e}"),
            CliError::Script(e) => write!(f, "Invalid script: {e}"),
            CliError::Engine(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<Error> for CliError {
    fn from(e: Error) -> Self {
        CliError::Engine(e)
    }
}

// ── Scripts ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Set {
        path: String,
        value: serde_json::Value,
    },
    Delete {
        path: String,
    },
    Call {
        path: String,
        operation: String,
        args: Vec<serde_json::Value>,
    },
}

const KEYWORDS: [&str; 3] = ["set", "delete", "call"];

fn operand<'a>(args: &'a [String], at: usize, step: &str, what: &str) -> Result<&'a str, CliError> {
    args.get(at)
        .map(String::as_str)
        .ok_or_else(|| CliError::Script(format!("`{step}` is missing its {what}")))
}

/// Parses script arguments into steps.
pub fn parse_script(args: &[String]) -> Result<Vec<Step>, CliError> {
    let mut steps = Vec::new();
    let mut at = 0;
    while at < args.len() {
        match args[at].as_str() {
            "set" => {
                let path = operand(args, at + 1, "set", "path")?.to_owned();
                let value = serde_json::from_str(operand(args, at + 2, "set", "value")?)?;
                steps.push(Step::Set { path, value });
                at += 3;
            }
            "delete" => {
                let path = operand(args, at + 1, "delete", "path")?.to_owned();
                steps.push(Step::Delete { path });
                at += 2;
            }
            "call" => {
                let path = operand(args, at + 1, "call", "path")?.to_owned();
                let operation = operand(args, at + 2, "call", "operation")?.to_owned();
                at += 3;
                let mut call_args = Vec::new();
                while at < args.len() && !KEYWORDS.contains(&args[at].as_str()) {
                    call_args.push(serde_json::from_str(&args[at])?);
                    at += 1;
                }
                steps.push(Step::Call {
                    path,
                    operation,
                    args: call_args,
                });
            }
            other => return Err(CliError::Script(format!("unknown step `{other}`"))),
        }
    }
    Ok(steps)
}

fn owner_and_key(root: &Value, text: &str) -> Result<(Value, Key), CliError> {
    let path = Path::parse(PathForm::Joined, text);
    if path.is_root() {
        return Err(CliError::Script("cannot replace the root".to_owned()));
    }
    Ok((resolve(root, &path.initial())?, path.last()))
}

fn resolve(root: &Value, path: &Path) -> Result<Value, CliError> {
    let value = root.get_path(path)?;
    if value.is_composite() {
        Ok(value)
    } else {
        Err(Error::Path(format!("`{path}` does not lead to an object")).into())
    }
}

/// Applies `steps` to `doc_json` through an observer and returns every
/// event as JSON, in order.
pub fn trace(doc_json: &str, steps: &[Step], options: Options) -> Result<Vec<serde_json::Value>, CliError> {
    let doc: serde_json::Value = serde_json::from_str(doc_json)?;
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    let root = observe(
        doc,
        move |change: &Change| sink.borrow_mut().push(change.to_json()),
        options,
    );
    if !root.is_composite() {
        return Err(CliError::Script("document must be an object or an array".to_owned()));
    }
    for step in steps {
        match step {
            Step::Set { path, value } => {
                let (owner, key) = owner_and_key(&root, path)?;
                owner.set(key, Value::from(value))?;
            }
            Step::Delete { path } => {
                let (owner, key) = owner_and_key(&root, path)?;
                owner.delete(key)?;
            }
            Step::Call {
                path,
                operation,
                args,
            } => {
                let target = resolve(&root, &Path::parse(PathForm::Joined, path))?;
                let args: Vec<Value> = args.iter().map(Value::from).collect();
                target.invoke(operation, &args)?;
            }
        }
    }
    let out = events.borrow().clone();
    Ok(out)
}

/// Entry point of the binary: parses `args`, replays them against
/// `doc_json` and returns one JSON line per event.
pub fn run(doc_json: &str, args: &[String]) -> Result<String, CliError> {
    let (options, script) = match args.first().map(String::as_str) {
        Some("--options") => {
            let text = operand(args, 1, "--options", "value")?;
            (Options::from_json_str(text)?, &args[2..])
        }
        _ => (Options::default(), args),
    };
    let steps = parse_script(script)?;
    let mut out = String::new();
    for event in trace(doc_json, &steps, options)? {
        out.push_str(&serde_json::to_string(&event)?);
        out.push('\n');
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_script() {
        let steps = parse_script(&args(&[
            "set", "a.b", "1", "call", "list", "append", "2", "\"x\"", "delete", "a",
        ]))
        .unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Set {
                    path: "a.b".into(),
                    value: json!(1)
                },
                Step::Call {
                    path: "list".into(),
                    operation: "append".into(),
                    args: vec![json!(2), json!("x")]
                },
                Step::Delete { path: "a".into() },
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_script(&args(&["set", "a"])), Err(CliError::Script(_))));
        assert!(matches!(parse_script(&args(&["poke"])), Err(CliError::Script(_))));
        assert!(matches!(parse_script(&args(&["set", "a", "{"])), Err(CliError::Json(_))));
    }

    #[test]
    fn test_trace_set_and_call() {
        let events = trace(
            r#"{"a": {"b": 1}, "list": [1]}"#,
            &parse_script(&args(&["set", "a.b", "2", "call", "list", "append", "5"])).unwrap(),
            Options::default(),
        )
        .unwrap();
        assert_eq!(
            events,
            vec![
                json!({"path": "a.b", "value": 2, "previous": 1}),
                json!({"path": "list", "value": [1, 5], "previous": [1]}),
            ]
        );
    }

    #[test]
    fn test_run_with_options() {
        let out = run(
            r#"{"_hidden": 1, "shown": 1}"#,
            &args(&[
                "--options",
                r#"{"ignoreUnderscores": true}"#,
                "set",
                "_hidden",
                "2",
                "set",
                "shown",
                "2",
            ]),
        )
        .unwrap();
        assert_eq!(out, "{\"path\":\"shown\",\"value\":2,\"previous\":1}\n");
    }

    #[test]
    fn test_bad_document() {
        assert!(matches!(trace("3", &[], Options::default()), Err(CliError::Script(_))));
        assert!(matches!(trace("{", &[], Options::default()), Err(CliError::Json(_))));
        let steps = parse_script(&args(&["delete", ""])).unwrap();
        assert!(matches!(trace("{}", &steps, Options::default()), Err(CliError::Script(_))));
    }
}
