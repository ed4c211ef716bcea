//! Runs the workflow files under `workflows/` end to end with the static
//! agents bound by the default config.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use taskloom_agent_static::{StaticKind, build_pool};
use taskloom_config::{Config, ConfigLoader, ConfigValidator};
use taskloom_core::testing::MockAgent;
use taskloom_core::{
    AgentRegistry, HeuristicStrategy, Hints, LoopTermination, RunStatus, Task, Workflow,
    WorkflowExecutor, WorkflowPattern,
};
use taskloom_protocols::{AgentError, Variables};

fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../workflows")
        .join(name)
}

fn registry(config: &Config) -> Arc<AgentRegistry> {
    let registry = Arc::new(AgentRegistry::new());
    for binding in config.agent_bindings() {
        let kind: StaticKind = binding.kind.parse().unwrap();
        for agent in build_pool(&binding.role, kind, binding.pool_size, binding.threshold) {
            registry.register(&binding.role, agent).unwrap();
        }
    }
    registry
}

fn load(name: &str) -> Workflow {
    let definition = ConfigLoader::load_workflow(&sample(name)).unwrap();
    Workflow::from_definition(&definition).unwrap()
}

fn vars(pairs: &[(&str, &str)]) -> Variables {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect()
}

#[test]
fn test_samples_validate_against_default_config() {
    let config = Config::default();
    for name in ["article.toml", "headlines.toml", "refine.toml", "route.toml"] {
        let definition = ConfigLoader::load_workflow(&sample(name)).unwrap();
        let result = ConfigValidator::validate_workflow(&config, &definition).unwrap();
        assert!(result.is_valid(), "{} has errors: {:?}", name, result.errors);
        assert!(result.warnings.is_empty(), "{} has warnings: {:?}", name, result.warnings);
    }
}

#[tokio::test]
async fn test_article_runs_in_order() {
    let config = Config::default();
    let workflow = load("article.toml");
    assert_eq!(workflow.pattern(), WorkflowPattern::Sequential);

    let executor = WorkflowExecutor::from_config(registry(&config), &config.engine);
    let report = executor
        .run(&workflow, vars(&[("topic", "Rust ownership")]))
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.task_order(), vec!["outline", "draft", "review"]);
    assert_eq!(
        report.output("outline").unwrap()["content"],
        json!("Outline an article about Rust ownership")
    );
    assert_eq!(
        report.output("draft").unwrap()["content"],
        json!("Write the article following Outline an article about Rust ownership")
    );
    assert!(report.output("review").unwrap()["score"].is_u64());
    assert_eq!(report.trace[0].agent_id.as_deref(), Some("writer-1"));
}

#[tokio::test]
async fn test_headlines_merge_highest_score() {
    let config = Config::default();
    let workflow = load("headlines.toml");
    let executor = WorkflowExecutor::from_config(registry(&config), &config.engine);
    let report = executor.run(&workflow, vars(&[("topic", "owls")])).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.trace.len(), 3);

    let best = report.output("best").unwrap()["score"].as_u64().unwrap();
    for entry in &report.trace {
        assert!(entry.outcome.is_completed());
    }
    assert!((2..=5).contains(&best));
    for id in ["bold", "plain", "question"] {
        assert!(report.output(id).is_none());
    }
}

#[tokio::test]
async fn test_refine_loop_converges() {
    let config = Config::default();
    let workflow = load("refine.toml");
    let executor = WorkflowExecutor::from_config(registry(&config), &config.engine);
    let report = executor
        .run(&workflow, vars(&[("draft", "Ownership moves values.")]))
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    let outcome = report.loop_outcome.as_ref().unwrap();
    assert_eq!(outcome.termination, LoopTermination::ExitConditionMet);
    assert!(outcome.iterations >= 1 && outcome.iterations <= 4);

    let review = report.output("review").unwrap();
    assert!(review["score"].as_u64().unwrap() >= 7);
    assert_eq!(review["approved"], json!(true));
    assert_eq!(
        report.output("draft").unwrap()["revision"],
        json!(outcome.iterations)
    );
    assert_eq!(report.trace.len(), 2 * outcome.iterations as usize);
}

#[tokio::test]
async fn test_route_selects_branch() {
    let config = Config::default();
    let workflow = load("route.toml");
    let executor = WorkflowExecutor::from_config(registry(&config), &config.engine);

    let quiz = executor
        .run(&workflow, vars(&[("content_type", "quiz"), ("topic", "owls")]))
        .await;
    assert_eq!(quiz.status, RunStatus::Completed);
    assert_eq!(quiz.branch.as_deref(), Some("quiz"));
    assert_eq!(
        quiz.output("content").unwrap()["content"],
        json!("Write a quiz about owls")
    );

    let story = executor
        .run(&workflow, vars(&[("content_type", "story"), ("topic", "owls")]))
        .await;
    assert_eq!(story.status, RunStatus::Completed);
    assert_eq!(story.branch.as_deref(), Some("story"));
    assert_eq!(story.task_order(), vec!["outline", "story"]);

    let unknown = executor
        .run(&workflow, vars(&[("content_type", "essay"), ("topic", "owls")]))
        .await;
    assert_eq!(unknown.status, RunStatus::Failed);
    assert!(unknown.failure.is_some());
}

#[tokio::test]
async fn test_config_file_binds_pool() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("taskloom.toml");
    std::fs::write(
        &path,
        r#"
[engine]
max_concurrency = 2

[logging]
file = false

[[agents]]
role = "writer"
kind = "writer"
pool_size = 2

[[agents]]
role = "reviewer"
kind = "reviewer"
threshold = 9
"#,
    )
    .unwrap();

    let config = ConfigLoader::load(&path).unwrap();
    assert!(ConfigValidator::validate(&config).unwrap().is_valid());

    let workflow = load("article.toml");
    let executor = WorkflowExecutor::from_config(registry(&config), &config.engine);
    let report = executor.run(&workflow, vars(&[("topic", "owls")])).await;

    assert_eq!(report.status, RunStatus::Completed);
    let writers: Vec<_> = report
        .trace
        .iter()
        .filter(|e| e.role == "writer")
        .filter_map(|e| e.agent_id.as_deref())
        .collect();
    assert_eq!(writers, vec!["writer-1", "writer-2"]);
    assert_eq!(report.output("review").unwrap()["approved"], json!(false));
}

#[tokio::test]
async fn test_failing_reviewer_keeps_earlier_outputs() {
    let config = Config::default();
    let registry = registry(&config);
    registry.unregister("reviewer").unwrap();
    registry
        .register(
            "reviewer",
            Arc::new(MockAgent::new("flaky").fail_with(AgentError::ExecutionFailed(
                "reviewer offline".to_string(),
            ))),
        )
        .unwrap();

    let workflow = load("article.toml");
    let executor = WorkflowExecutor::from_config(registry, &config.engine);
    let report = executor.run(&workflow, vars(&[("topic", "owls")])).await;

    assert_eq!(report.status, RunStatus::Failed);
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.task_id.as_deref(), Some("review"));
    assert!(failure.message.contains("reviewer offline"));
    assert!(failure.snapshot.contains_key("draft"));
    assert!(!report.final_variables.contains_key("review"));
}

#[tokio::test]
async fn test_dispatch_picks_refinement_loop() {
    let config = Config::default();
    let catalog: Vec<Workflow> = ["article.toml", "headlines.toml", "refine.toml", "route.toml"]
        .into_iter()
        .map(load)
        .collect();
    let executor = WorkflowExecutor::from_config(registry(&config), &config.engine)
        .with_strategy(Arc::new(HeuristicStrategy));

    let task = Task::new(
        "polish",
        "refiner",
        "Polish the draft until it reaches the quality threshold",
    )
    .with_parameter("draft", json!("Ownership moves values."));

    let (decision, report) = executor
        .dispatch(&task, &catalog, Variables::new(), &Hints::default())
        .await
        .unwrap();

    assert_eq!(decision.pattern, WorkflowPattern::Loop);
    assert_eq!(decision.workflow, "refine");
    assert!(decision.confidence > 0.5);
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(
        report.loop_outcome.unwrap().termination,
        LoopTermination::ExitConditionMet
    );
}
