//! Eval command - evaluates an expression without a server.

use std::path::Path;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use serde_json::{Map, Value};

use orquestulator_eval::{Evaluator, QueryKind, TaskStatus};

use super::Context;

/// Arguments for the eval command.
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Expression language: orquesta, yaql or jinja2
    #[arg(short, long)]
    pub kind: QueryKind,

    /// Expression to evaluate
    #[arg(short, long)]
    pub expression: String,

    /// Input data file (JSON, or YAML by .yaml/.yml extension)
    #[arg(short, long)]
    pub data: Option<std::path::PathBuf>,

    /// Task status seen by orquesta functions such as task_status()
    #[arg(long)]
    pub task_status: Option<TaskStatus>,

    /// Task result file seen by result() (JSON or YAML)
    #[arg(long)]
    pub task_result: Option<std::path::PathBuf>,

    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

/// Run the eval command.
pub async fn run(args: EvalArgs, _ctx: &Context) -> Result<()> {
    let data = build_data(&args)?;
    let value = Evaluator::new()
        .evaluate(args.kind, &args.expression, data)
        .with_context(|| format!("{} evaluation failed", args.kind))?;

    let output = if args.compact {
        serde_json::to_string(&value)?
    } else {
        serde_json::to_string_pretty(&value)?
    };
    println!("{output}");
    Ok(())
}

fn build_data(args: &EvalArgs) -> Result<Value> {
    let mut data = match &args.data {
        Some(path) => read_document(path)?,
        None => Value::Object(Map::new()),
    };

    if args.task_status.is_none() && args.task_result.is_none() {
        return Ok(data);
    }
    if args.kind != QueryKind::Orquesta {
        bail!("--task-status and --task-result only apply to orquesta expressions");
    }
    let Some(object) = data.as_object_mut() else {
        bail!("data must be an object when task context is given");
    };
    if let Some(status) = args.task_status {
        object.insert("__task_status".to_string(), status.as_str().into());
    }
    if let Some(path) = &args.task_result {
        object.insert("__task_result".to_string(), read_document(path)?);
    }
    Ok(data)
}

fn read_document(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let value = if is_yaml {
        serde_yaml::from_str(&contents)
            .with_context(|| format!("invalid YAML in {}", path.display()))?
    } else {
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid JSON in {}", path.display()))?
    };
    Ok(value)
}
