
    use super::*;
    use crate::schema::AgentBinding;
    use taskloom_core::{Task, WorkflowPattern};

    fn sequential(name: &str, role: &str) -> WorkflowDefinition {
        WorkflowDefinition::new(name, WorkflowPattern::Sequential)
            .with_task(Task::new("draft", role, "Write about {topic}").with_output("draft"))
    }

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.engine.default_timeout_secs = 0;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.path == "engine.default_timeout_secs"));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = Config::default();
        config.engine.max_concurrency = 0;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "engine.max_concurrency"));
    }

    #[test]
    fn test_validate_high_concurrency_warning() {
        let mut config = Config::default();
        config.engine.max_concurrency = 500;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "engine.max_concurrency"));
    }

    #[test]
    fn test_validate_confidence_range() {
        let mut config = Config::default();
        config.engine.min_confidence = 1.5;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "engine.min_confidence"));
    }

    #[test]
    fn test_validate_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "logging.level"));
    }

    #[test]
    fn test_validate_filter_directive_level() {
        let mut config = Config::default();
        config.logging.level = "info,taskloom_core=debug".to_string();

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_agent_bindings() {
        let mut config = Config::default();
        config.agents.push(AgentBinding::new("writer", "poet"));
        let mut empty_pool = AgentBinding::new("reviewer", "reviewer");
        empty_pool.pool_size = 0;
        config.agents.push(empty_pool);
        config.agents.push(AgentBinding::new("", "echo"));

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "agents[0].kind"));
        assert!(result.errors.iter().any(|e| e.path == "agents[1].pool_size"));
        assert!(result.errors.iter().any(|e| e.path == "agents[2].role"));
    }

    #[test]
    fn test_validate_duplicate_role() {
        let mut config = Config::default();
        config.agents.push(AgentBinding::new("writer", "writer"));
        config.agents.push(AgentBinding::new("writer", "echo"));

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.path == "agents[1].role"));
    }

    #[test]
    fn test_validate_inline_workflows() {
        let mut config = Config::default();
        config.workflows.push(sequential("article", "writer"));
        config.workflows.push(sequential("article", "writer"));

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.path == "workflows[1]"));
    }

    #[test]
    fn test_validate_broken_workflow() {
        let config = Config::default();
        let definition = WorkflowDefinition::new("broken", WorkflowPattern::Sequential)
            .with_task(Task::new("a", "writer", "A").depends_on("b"))
            .with_task(Task::new("b", "writer", "B").depends_on("a"));

        let result = ConfigValidator::validate_workflow(&config, &definition).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors[0].message.contains("Cyclic"));
    }

    #[test]
    fn test_validate_unbound_role_warning() {
        let config = Config::default();
        let result = ConfigValidator::validate_workflow(&config, &sequential("article", "translator")).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings[0].message.contains("translator"));
    }

    #[test]
    fn test_validate_high_max_iterations_warning() {
        let config = Config::default();
        let mut definition = WorkflowDefinition::new("refine", WorkflowPattern::Loop)
            .with_task(Task::new("r", "refiner", "Refine").with_output("draft"));
        definition.max_iterations = Some(500);

        let result = ConfigValidator::validate_workflow(&config, &definition).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "refine.max_iterations"));
    }

    #[test]
    fn test_validation_result_default() {
        let result = ValidationResult::default();
        assert!(result.is_valid());
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }
