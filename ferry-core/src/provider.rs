use async_trait::async_trait;
use thiserror::Error;

/// 任意可跨线程传递的错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Provider调用失败时返回的错误
///
/// 负载均衡器不关心provider内部如何访问真实后端，
/// 只把这个错误原样包装后交还给调用方
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ProviderError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// 保留底层错误作为cause
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 上游provider的能力接口
///
/// 负载均衡器只通过两种能力与provider交互：
/// - `attempt` 处理一次请求，可以耗时任意长
/// - `probe` 报告自身是否健康，应当迅速返回，避免网络调用
#[async_trait]
pub trait Provider: Send + Sync {
    /// 成功时返回的响应类型
    type Response: Send;

    /// 处理一次请求
    async fn attempt(&self) -> Result<Self::Response, ProviderError>;

    /// 健康探测，false表示不健康
    async fn probe(&self) -> bool;

    /// 用于日志和健康报告的名称
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    struct Fixed(&'static str);

    #[async_trait]
    impl Provider for Fixed {
        type Response = String;

        async fn attempt(&self) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }

        async fn probe(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_provider_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "backend timed out");
        let err = ProviderError::with_source("request failed", io);

        assert_eq!(err.to_string(), "request failed");
        assert_eq!(err.message(), "request failed");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("backend timed out"));
    }

    #[test]
    fn test_provider_error_without_source() {
        let err = ProviderError::new("boom");
        assert!(err.source().is_none());
    }

    #[tokio::test]
    async fn test_provider_as_trait_object() {
        let provider: std::sync::Arc<dyn Provider<Response = String>> =
            std::sync::Arc::new(Fixed("hello"));

        assert_eq!(provider.attempt().await.unwrap(), "hello");
        assert!(provider.probe().await);
        assert!(provider.name().ends_with("Fixed"));
    }
}
