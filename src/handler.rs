//! 最小化的调用生命周期包装器
//!
//! 为每次调用打开一个新的关联ID作用域和 `invocation` span，按注册顺序执行
//! before 钩子，然后执行用户处理函数。处理函数返回的错误原样传递给调用方。

use crate::store;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::field::Empty;
use tracing::Instrument;

/// 平台提供的调用上下文
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    /// 平台为本次调用分配的唯一ID
    pub aws_request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

impl InvocationContext {
    pub fn new(aws_request_id: impl Into<String>) -> Self {
        Self {
            aws_request_id: aws_request_id.into(),
            function_name: None,
        }
    }

    pub fn with_function_name(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = Some(function_name.into());
        self
    }
}

/// before 钩子看到的调用请求
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub event: &'a Value,
    pub context: &'a InvocationContext,
}

/// 在用户处理函数之前执行的钩子
///
/// 钩子是同步的：返回之前所有的存储写入都已完成。
pub trait BeforeHook: Send + Sync {
    fn before(&self, request: &Request<'_>);
}

impl<F> BeforeHook for F
where
    F: Fn(&Request<'_>) + Send + Sync,
{
    fn before(&self, request: &Request<'_>) {
        self(request)
    }
}

/// 带 before 钩子的处理函数
pub struct Handler<H> {
    handler: H,
    hooks: Vec<Arc<dyn BeforeHook>>,
}

impl<H> Handler<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            hooks: Vec::new(),
        }
    }

    /// 注册一个钩子对象，例如 [`crate::enable_correlation_ids`] 的返回值
    pub fn with_hook<B>(mut self, hook: B) -> Self
    where
        B: BeforeHook + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// 注册一个闭包形式的 before 钩子
    pub fn before<F>(self, hook: F) -> Self
    where
        F: Fn(&Request<'_>) + Send + Sync + 'static,
    {
        self.with_hook(hook)
    }

    /// 执行一次调用
    ///
    /// 每次调用都在新的作用域中执行，不会看到之前调用留下的记录。
    pub async fn call<Fut, T, E>(&self, event: Value, context: InvocationContext) -> Result<T, E>
    where
        H: Fn(Value, InvocationContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let span = tracing::info_span!(
            "invocation",
            aws_request_id = %context.aws_request_id,
            correlation_id = Empty,
            call_chain_length = Empty,
        );

        store::with_correlation_scope(async move {
            {
                let request = Request {
                    event: &event,
                    context: &context,
                };
                for hook in &self.hooks {
                    hook.before(&request);
                }
            }

            (self.handler)(event, context).await
        })
        .instrument(span)
        .await
    }
}
