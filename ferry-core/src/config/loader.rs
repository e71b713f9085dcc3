use crate::config::model::LoadBalancerConfig;

pub fn load_config_from_path(config_path: &str) -> Result<LoadBalancerConfig, anyhow::Error> {
    let config_str = std::fs::read_to_string(config_path)?;
    let config = parse_config(&config_str)?;
    Ok(config)
}

/// 解析并验证TOML配置
pub fn parse_config(config_str: &str) -> Result<LoadBalancerConfig, anyhow::Error> {
    let config: LoadBalancerConfig = toml::from_str(config_str)?;
    config.validate()?;
    tracing::debug!(
        "Loaded load balancer config: capacity={}, strategy={:?}",
        config.capacity,
        config.strategy
    );
    Ok(config)
}
