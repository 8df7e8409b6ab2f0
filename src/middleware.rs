//! 关联ID传播中间件
//!
//! 在用户代码之前执行：从触发事件中提取上游的关联ID，调用链长度加一后写入
//! 当前调用的存储；没有上游信息时使用平台分配的调用ID作为默认值。

use crate::handler::{BeforeHook, InvocationContext, Request};
use crate::ids::CorrelationIds;
use crate::matchers::{self, EventMatcher};
use crate::store;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 中间件配置选项
#[derive(Clone, Debug)]
pub struct CorrelationConfig {
    /// 是否提取上游关联ID并以平台调用ID作为默认值（默认启用）
    ///
    /// 关闭时跳过提取，只写入 `call-chain-length: "1"`。
    pub aws_defaults: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self { aws_defaults: true }
    }
}

impl CorrelationConfig {
    pub fn with_aws_defaults(mut self, aws_defaults: bool) -> Self {
        self.aws_defaults = aws_defaults;
        self
    }
}

/// 创建关联ID传播中间件
///
/// `None` 等价于默认配置。
pub fn enable_correlation_ids(config: Option<CorrelationConfig>) -> EnableCorrelationIds {
    EnableCorrelationIds::with_config(config.unwrap_or_default())
}

/// 关联ID传播中间件，作为 before 钩子注册到调用生命周期中
#[derive(Clone, Default)]
pub struct EnableCorrelationIds {
    config: CorrelationConfig,
    custom_matchers: Vec<Arc<dyn EventMatcher>>,
}

impl EnableCorrelationIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CorrelationConfig) -> Self {
        Self {
            config,
            custom_matchers: Vec::new(),
        }
    }

    /// 注册自定义匹配器
    ///
    /// 自定义匹配器在所有内置匹配器之后按注册顺序尝试。
    pub fn with_matcher<M>(mut self, matcher: M) -> Self
    where
        M: EventMatcher + 'static,
    {
        self.custom_matchers.push(Arc::new(matcher));
        self
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// 计算本次调用应使用的关联ID，不读写存储
    pub fn resolve(&self, event: &Value, context: &InvocationContext) -> CorrelationIds {
        if !self.config.aws_defaults {
            return CorrelationIds::minimal();
        }

        let extracted = matchers::extract_correlation_ids_with(event, &self.custom_matchers);
        if extracted.is_empty() {
            tracing::debug!(
                aws_request_id = %context.aws_request_id,
                "No upstream correlation ids, using invocation defaults"
            );
            CorrelationIds::defaults_for(&context.aws_request_id)
        } else {
            extracted.increment_chain_length()
        }
    }
}

impl BeforeHook for EnableCorrelationIds {
    /// 先清除旧记录，再写入本次调用的记录
    ///
    /// 不在调用作用域内时只记录警告，不会失败。
    fn before(&self, request: &Request<'_>) {
        if let Err(err) = store::clear() {
            tracing::warn!(error = %err, "Unable to reset correlation ids");
        }

        let ids = self.resolve(request.event, request.context);
        tracing::debug!(correlation_ids = %ids, "Resolved correlation ids");

        if let Err(err) = store::set(ids) {
            tracing::warn!(error = %err, "Unable to store correlation ids");
        }
    }
}

impl fmt::Debug for EnableCorrelationIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.custom_matchers.iter().map(|m| m.name()).collect();
        f.debug_struct("EnableCorrelationIds")
            .field("config", &self.config)
            .field("custom_matchers", &names)
            .finish()
    }
}
