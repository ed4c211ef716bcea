//! Tests for orchestration strategies.

use super::*;
use std::sync::Arc;

use serde_json::json;
use taskloom_protocols::Agent;

use crate::testing::MockAgent;
use crate::workflow::{BranchSpec, ConditionSpec};

fn catalog() -> Vec<Workflow> {
    vec![
        Workflow::sequential("pipeline")
            .task(Task::new("a", "writer", "Write").with_output("draft"))
            .build()
            .unwrap(),
        Workflow::parallel("variants")
            .task(Task::new("v1", "writer", "One").with_output("v1"))
            .task(Task::new("v2", "writer", "Two").with_output("v2"))
            .build()
            .unwrap(),
        Workflow::looping("refine", 3, ConditionSpec::Never)
            .task(Task::new("r", "refiner", "Refine").with_output("draft"))
            .build()
            .unwrap(),
        Workflow::conditional(
            "route",
            BranchSpec::Variable {
                key: "content_type".into(),
            },
        )
        .branch_task("quiz", Task::new("quiz", "writer", "Quiz"))
        .build()
        .unwrap(),
    ]
}

fn pool(ids: &[&str]) -> AgentPool {
    let members: Vec<Arc<dyn Agent>> = ids
        .iter()
        .map(|id| Arc::new(MockAgent::new(*id)) as Arc<dyn Agent>)
        .collect();
    AgentPool::new("writer", members)
}

#[test]
fn test_declared_defaults_to_sequential() {
    let task = Task::new("job", "writer", "Refine the draft until it is good");
    let decision = DeclaredPatternStrategy
        .select_workflow(&task, &catalog(), &Hints::default())
        .unwrap();
    assert_eq!(decision.workflow, "pipeline");
    assert_eq!(decision.pattern, WorkflowPattern::Sequential);
    assert_eq!(decision.agent_role, "writer");
    assert_eq!(decision.confidence, 0.5);
}

#[test]
fn test_declared_honours_task_pin() {
    let task = Task::new("job", "writer", "Write").with_pattern(WorkflowPattern::Loop);
    let decision = DeclaredPatternStrategy
        .select_workflow(&task, &catalog(), &Hints::default())
        .unwrap();
    assert_eq!(decision.workflow, "refine");
    assert_eq!(decision.confidence, 1.0);
}

#[test]
fn test_hint_pin_overrides_task_pin() {
    let task = Task::new("job", "writer", "Write").with_pattern(WorkflowPattern::Loop);
    let decision = DeclaredPatternStrategy
        .select_workflow(&task, &catalog(), &Hints::pin(WorkflowPattern::Parallel))
        .unwrap();
    assert_eq!(decision.workflow, "variants");
}

#[test]
fn test_preferred_workflow_by_name() {
    let task = Task::new("job", "writer", "Write");
    let hints = Hints {
        preferred_workflow: Some("route".to_string()),
        preferred_member: Some(2),
        ..Hints::default()
    };
    let strategies: [&dyn OrchestrationStrategy; 2] = [&DeclaredPatternStrategy, &HeuristicStrategy];
    for strategy in strategies {
        let decision = strategy.select_workflow(&task, &catalog(), &hints).unwrap();
        assert_eq!(decision.workflow, "route");
        assert_eq!(decision.pattern, WorkflowPattern::Conditional);
        assert_eq!(decision.member, Some(2));
    }
}

#[test]
fn test_declared_no_matching_workflow() {
    let task = Task::new("job", "writer", "Write").with_pattern(WorkflowPattern::Parallel);
    let only_sequential = vec![catalog().remove(0)];
    assert!(
        DeclaredPatternStrategy
            .select_workflow(&task, &only_sequential, &Hints::default())
            .is_none()
    );
}

#[test]
fn test_declared_member_round_robin() {
    let pool = pool(&["w1", "w2", "w3"]);
    let task = Task::new("job", "writer", "Write");
    let hints = Hints::default();
    let picks: Vec<usize> = (0..4)
        .map(|_| DeclaredPatternStrategy.select_member(&task, &pool, &hints))
        .collect();
    assert_eq!(picks, vec![0, 1, 2, 0]);
}

#[test]
fn test_heuristic_prefers_loop_for_refinement() {
    let task = Task::new("job", "editor", "Refine the essay until quality reaches the threshold");
    let decision = HeuristicStrategy
        .select_workflow(&task, &catalog(), &Hints::default())
        .unwrap();
    assert_eq!(decision.pattern, WorkflowPattern::Loop);
    assert!(decision.confidence > 0.5 && decision.confidence < 1.0);
}

#[test]
fn test_heuristic_prefers_parallel_for_variants() {
    let task = Task::new("job", "writer", "Produce a variant of the headline")
        .with_parameter("num_variants", json!(3));
    let scores = HeuristicStrategy.scores(&task, &Hints::default());
    assert_eq!(scores[1], (WorkflowPattern::Parallel, 3.5));

    let decision = HeuristicStrategy
        .select_workflow(&task, &catalog(), &Hints::default())
        .unwrap();
    assert_eq!(decision.workflow, "variants");
}

#[test]
fn test_heuristic_single_variant_is_not_a_parallel_signal() {
    let task = Task::new("job", "writer", "Write the headline").with_parameter("num_variants", json!(1));
    let scores = HeuristicStrategy.scores(&task, &Hints::default());
    assert_eq!(scores[1].1, 0.5);
}

#[test]
fn test_heuristic_prefers_conditional_with_routing_signal() {
    let task = Task::new("job", "writer", "Write content depending on the audience");
    let hints = Hints::default().with_signal("content_type", json!("quiz"));
    let decision = HeuristicStrategy
        .select_workflow(&task, &catalog(), &hints)
        .unwrap();
    assert_eq!(decision.pattern, WorkflowPattern::Conditional);
}

#[test]
fn test_heuristic_false_signal_is_ignored() {
    let task = Task::new("job", "writer", "Write");
    let hints = Hints::default().with_signal("iterative", json!(false));
    let scores = HeuristicStrategy.scores(&task, &hints);
    assert_eq!(scores[2], (WorkflowPattern::Loop, 0.5));
}

#[test]
fn test_heuristic_dependencies_favour_sequential() {
    let task = Task::new("job", "writer", "Then summarize it").depends_on("draft");
    let scores = HeuristicStrategy.scores(&task, &Hints::default());
    assert_eq!(scores[0], (WorkflowPattern::Sequential, 3.0));
}

#[test]
fn test_heuristic_falls_back_when_best_pattern_unavailable() {
    let task = Task::new("job", "editor", "Refine and polish the draft");
    let without_loop: Vec<Workflow> = catalog()
        .into_iter()
        .filter(|w| w.pattern() != WorkflowPattern::Loop)
        .collect();
    let decision = HeuristicStrategy
        .select_workflow(&task, &without_loop, &Hints::default())
        .unwrap();
    assert_eq!(decision.pattern, WorkflowPattern::Sequential);
}

#[test]
fn test_heuristic_pin_wins() {
    let task = Task::new("job", "writer", "Refine until quality is high");
    let decision = HeuristicStrategy
        .select_workflow(&task, &catalog(), &Hints::pin(WorkflowPattern::Parallel))
        .unwrap();
    assert_eq!(decision.pattern, WorkflowPattern::Parallel);
    assert_eq!(decision.confidence, 1.0);
}

#[test]
fn test_heuristic_empty_catalog() {
    let task = Task::new("job", "writer", "Write");
    assert!(
        HeuristicStrategy
            .select_workflow(&task, &[], &Hints::default())
            .is_none()
    );
}

#[test]
fn test_heuristic_preferred_member() {
    let pool = pool(&["w1", "w2"]);
    let task = Task::new("job", "writer", "Write");

    let hinted = Hints {
        preferred_member: Some(1),
        ..Hints::default()
    };
    assert_eq!(HeuristicStrategy.select_member(&task, &pool, &hinted), 1);
    assert_eq!(HeuristicStrategy.select_member(&task, &pool, &hinted), 1);

    let out_of_range = Hints {
        preferred_member: Some(7),
        ..Hints::default()
    };
    assert_eq!(HeuristicStrategy.select_member(&task, &pool, &out_of_range), 0);
    assert_eq!(HeuristicStrategy.select_member(&task, &pool, &out_of_range), 1);
}

#[test]
fn test_hints_deserialize() {
    let hints: Hints = serde_json::from_value(json!({
        "pinned_pattern": "loop",
        "signals": {"iterative": true}
    }))
    .unwrap();
    assert_eq!(hints.pinned_pattern, Some(WorkflowPattern::Loop));
    assert_eq!(hints.signals.get("iterative"), Some(&json!(true)));
}
