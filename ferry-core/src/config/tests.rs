#[cfg(test)]
mod tests {
    use crate::config::loader::parse_config;
    use crate::config::model::*;
    use std::num::NonZeroUsize;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = LoadBalancerConfig::default();

        assert_eq!(config.capacity, 10);
        assert_eq!(config.strategy, StrategyKind::Random);
        assert!(config.simultaneous_call_single_provider_limit.is_none());
        assert_eq!(config.health_check.interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
capacity = 4
strategy = "round_robin"
simultaneous_call_single_provider_limit = 3

[health_check]
interval_ms = 250
stop_timeout_ms = 100
"#,
        )
        .unwrap();

        assert_eq!(config.capacity, 4);
        assert_eq!(config.strategy, StrategyKind::RoundRobin);
        assert_eq!(
            config.simultaneous_call_single_provider_limit,
            NonZeroUsize::new(3)
        );
        assert_eq!(config.health_check.interval(), Duration::from_millis(250));
        assert_eq!(config.health_check.stop_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.strategy, StrategyKind::Random);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = parse_config("capacity = 0");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("capacity"));
    }

    #[test]
    fn test_zero_call_limit_rejected() {
        // 0不是合法的上限，不限制时应省略该字段
        assert!(parse_config("simultaneous_call_single_provider_limit = 0").is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = LoadBalancerConfig {
            health_check: HealthCheckSettings {
                interval_ms: 0,
                stop_timeout_ms: 100,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        assert!(parse_config(r#"strategy = "least_latency""#).is_err());
    }
}
