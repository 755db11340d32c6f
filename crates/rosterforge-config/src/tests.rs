//! Tests for rebalancing configuration.

use super::*;

#[test]
fn test_toml_parsing() {
    let toml = r#"
        random_seed = 42
        max_iterations = 80

        [tolerance]
        objective_pct = 6.0
        emergency_pct = 10.0

        [checkpoint]
        capacity = 8

        [dead_end]
        no_improvement = 12

        [termination]
        seconds_spent_limit = 30
        iteration_limit = 40
    "#;

    let config = RebalanceConfig::from_toml_str(toml).unwrap();
    assert_eq!(config.random_seed, Some(42));
    assert_eq!(config.max_iterations, 80);
    assert_eq!(config.tolerance.objective_pct, 6.0);
    assert_eq!(config.tolerance.part_time_floor, 0.05);
    assert_eq!(config.checkpoint.capacity, 8);
    assert_eq!(config.checkpoint.recent_window, 5);
    assert_eq!(config.dead_end.no_improvement, 12);
    assert_eq!(config.dead_end.stagnation, 10);
    let termination = config.termination.unwrap();
    assert_eq!(termination.seconds_spent_limit, Some(30));
    assert_eq!(termination.iteration_limit, Some(40));
}

#[test]
fn test_yaml_parsing() {
    let yaml = r#"
        random_seed: 42
        strategy:
          chain_max_depth: 3
        strict_balance:
          target_tolerance: 2
    "#;

    let config = RebalanceConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.random_seed, Some(42));
    assert_eq!(config.strategy.chain_max_depth, 3);
    assert_eq!(config.strategy.relaxed_every, 10);
    assert_eq!(config.strict_balance.target_tolerance, 2);
    assert_eq!(config.strict_balance.max_iterations, 200);
}

#[test]
fn test_defaults() {
    let config = RebalanceConfig::default();
    assert_eq!(config.max_iterations, 50);
    assert_eq!(config.convergence_threshold, 3);
    assert_eq!(config.max_no_change, 2);
    assert_eq!(config.tolerance.objective_pct, 8.0);
    assert_eq!(config.tolerance.emergency_pct, 12.0);
    assert_eq!(config.checkpoint.capacity, 20);
    assert_eq!(config.dead_end.violations, 5);
    assert_eq!(config.strategy.perturbation_cap, 0.6);
    assert!(config.termination.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_builder() {
    let config = RebalanceConfig::new()
        .with_random_seed(123)
        .with_max_iterations(10)
        .with_termination_seconds(60);

    assert_eq!(config.random_seed, Some(123));
    assert_eq!(config.max_iterations, 10);
    assert_eq!(config.time_limit(), Some(Duration::from_secs(60)));
}

#[test]
fn test_minutes_add_to_seconds() {
    let termination = TerminationConfig {
        seconds_spent_limit: Some(30),
        minutes_spent_limit: Some(2),
        iteration_limit: None,
    };
    assert_eq!(termination.time_limit(), Some(Duration::from_secs(150)));
    assert_eq!(TerminationConfig::default().time_limit(), None);
}

#[test]
fn test_validate_rejects_inverted_bands() {
    let mut config = RebalanceConfig::default();
    config.tolerance.emergency_pct = 5.0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_validate_rejects_tiny_capacity() {
    let mut config = RebalanceConfig::default();
    config.checkpoint.capacity = 1;
    assert!(config.validate().is_err());

    let mut config = RebalanceConfig::default();
    config.checkpoint.recent_window = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_missing_file_is_io_error() {
    let result = RebalanceConfig::load("does/not/exist.toml");
    assert!(matches!(result, Err(ConfigError::Io(_))));
}
