use async_trait::async_trait;
use ferry_core::{Provider, ProviderError};
use uuid::Uuid;

/// 示例provider，每次调用都返回自己的实例编号
pub struct ExampleProvider {
    instance_id: String,
    healthy: bool,
}

impl ExampleProvider {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            healthy: true,
        }
    }

    /// 健康探测始终失败的provider
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

impl Default for ExampleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ExampleProvider {
    type Response = String;

    async fn attempt(&self) -> Result<String, ProviderError> {
        Ok(self.instance_id.clone())
    }

    async fn probe(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &str {
        &self.instance_id
    }
}
