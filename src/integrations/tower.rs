//! Tower 中间件层
//!
//! 适用于以 `tower::Service` 形式组织的函数运行时：在调用内层服务之前解析关联ID，
//! 并在关联ID作用域（以及可选的 `invocation` span）中执行内层服务的 future。
//!
//! 同时支持 `lambda_runtime::LambdaEvent<Value>`（可直接交给 `lambda_runtime::run`）
//! 和独立使用的 [`LambdaInvocation`]。

use crate::handler::InvocationContext;
use crate::ids::CorrelationIds;
use crate::middleware::{CorrelationConfig, EnableCorrelationIds};
use crate::store;
use lambda_runtime::LambdaEvent;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// 一次调用：原始触发事件加平台上下文
#[derive(Debug, Clone)]
pub struct LambdaInvocation {
    pub event: Value,
    pub context: InvocationContext,
}

impl LambdaInvocation {
    pub fn new(event: Value, context: InvocationContext) -> Self {
        Self { event, context }
    }
}

/// 中间件层配置选项
#[derive(Clone, Debug)]
pub struct CorrelationLayerConfig {
    /// 是否创建 tracing span（默认启用）
    pub enable_span: bool,
    pub correlation: CorrelationConfig,
}

impl Default for CorrelationLayerConfig {
    fn default() -> Self {
        Self {
            enable_span: true,
            correlation: CorrelationConfig::default(),
        }
    }
}

/// 关联ID中间件层
#[derive(Clone, Debug)]
pub struct CorrelationLayer {
    hook: EnableCorrelationIds,
    enable_span: bool,
}

impl CorrelationLayer {
    /// 使用默认配置创建
    pub fn new() -> Self {
        Self::with_config(CorrelationLayerConfig::default())
    }

    pub fn with_config(config: CorrelationLayerConfig) -> Self {
        Self {
            hook: EnableCorrelationIds::with_config(config.correlation),
            enable_span: config.enable_span,
        }
    }

    /// 使用已配置好的中间件（例如注册了自定义匹配器）创建
    pub fn from_hook(hook: EnableCorrelationIds) -> Self {
        Self {
            hook,
            enable_span: true,
        }
    }
}

impl Default for CorrelationLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            hook: self.hook.clone(),
            enable_span: self.enable_span,
        }
    }
}

/// 关联ID服务
#[derive(Clone, Debug)]
pub struct CorrelationService<S> {
    inner: S,
    hook: EnableCorrelationIds,
    enable_span: bool,
}

impl<S> CorrelationService<S> {
    /// 在关联ID作用域中执行内层服务
    fn dispatch<R>(
        &mut self,
        ids: CorrelationIds,
        aws_request_id: &str,
        request: R,
    ) -> BoxFuture<S::Response, S::Error>
    where
        S: Service<R>,
        S::Future: Send + 'static,
        S::Response: 'static,
        S::Error: 'static,
    {
        let future = self.inner.call(request);

        if self.enable_span {
            let span = tracing::info_span!(
                "invocation",
                aws_request_id = %aws_request_id,
                correlation_id = ids.correlation_id().unwrap_or_default(),
                call_chain_length = ids.call_chain_length(),
            );
            Box::pin(store::with_correlation_ids(ids, future).instrument(span))
        } else {
            Box::pin(store::with_correlation_ids(ids, future))
        }
    }
}

impl<S> Service<LambdaInvocation> for CorrelationService<S>
where
    S: Service<LambdaInvocation> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<S::Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, invocation: LambdaInvocation) -> Self::Future {
        // 在事件被移交给内层服务之前解析
        let ids = self.hook.resolve(&invocation.event, &invocation.context);
        let aws_request_id = invocation.context.aws_request_id.clone();

        self.dispatch(ids, &aws_request_id, invocation)
    }
}

impl<S> Service<LambdaEvent<Value>> for CorrelationService<S>
where
    S: Service<LambdaEvent<Value>> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<S::Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, event: LambdaEvent<Value>) -> Self::Future {
        let context = InvocationContext::new(event.context.request_id.as_str());
        let ids = self.hook.resolve(&event.payload, &context);

        self.dispatch(ids, &context.aws_request_id, event)
    }
}
