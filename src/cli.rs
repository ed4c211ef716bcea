//! CLI definitions for Taskloom.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

/// Taskloom CLI.
#[derive(Parser)]
#[command(name = "taskloom")]
#[command(about = "Task and workflow orchestration engine")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.taskloom/config.toml when present)
    #[arg(short, long, global = true, env = "TASKLOOM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run a workflow and print its report as JSON
    Run {
        /// Workflow file, or the name of a workflow defined in the config
        workflow: String,

        /// Initial variable, repeatable. Values are parsed as JSON when valid
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, Value)>,

        /// Let parallel branches finish when a sibling fails
        #[arg(long)]
        best_effort: bool,

        /// Bound on concurrently running parallel branches
        #[arg(long)]
        max_concurrency: Option<usize>,
    },

    /// Check a workflow definition without running it
    Validate {
        /// Workflow file, or the name of a workflow defined in the config
        workflow: String,
    },

    /// Print the execution plan of a workflow
    Plan {
        /// Workflow file, or the name of a workflow defined in the config
        workflow: String,
    },
}

/// Parse `key=value`. The value is JSON when it parses as JSON, else a
/// plain string.
pub(crate) fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_var_string() {
        assert_eq!(
            parse_var("topic=Rust ownership").unwrap(),
            ("topic".to_string(), json!("Rust ownership"))
        );
    }

    #[test]
    fn test_parse_var_json() {
        assert_eq!(parse_var("score=7").unwrap().1, json!(7));
        assert_eq!(parse_var("draft={\"content\":\"x\"}").unwrap().1, json!({"content": "x"}));
        assert_eq!(parse_var("flag=true").unwrap().1, json!(true));
    }

    #[test]
    fn test_parse_var_keeps_later_equals() {
        assert_eq!(parse_var("expr=a=b").unwrap().1, json!("a=b"));
    }

    #[test]
    fn test_parse_var_errors() {
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "taskloom",
            "run",
            "workflows/article.toml",
            "--var",
            "topic=owls",
            "--var",
            "words=300",
            "--best-effort",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                workflow,
                vars,
                best_effort,
                max_concurrency,
            } => {
                assert_eq!(workflow, "workflows/article.toml");
                assert_eq!(vars.len(), 2);
                assert_eq!(vars[1].1, json!(300));
                assert!(best_effort);
                assert!(max_concurrency.is_none());
            }
            _ => panic!("expected run"),
        }
    }
}
