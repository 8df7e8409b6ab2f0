//! 无服务器调用链的关联ID传播
//!
//! 从任意触发事件（直接调用、API Gateway v1/v2、DynamoDB Stream、EventBridge、
//! SQS、SNS）中提取上游的关联ID，调用链长度加一后保存在调用级的存储中，
//! 同一次调用中后续执行的任何代码都可以读取，无需显式传参。
//! 存储基于 `tokio::task_local`，并发执行的调用互不可见。
//!
//! ## Usage
//!
//! ### 基础用法：包装处理函数
//! ```
//! use lambda_correlation::{
//!     enable_correlation_ids, inject_correlation_ids, use_correlation_ids, Handler,
//!     InvocationContext,
//! };
//! use serde_json::{json, Value};
//! use std::convert::Infallible;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let handler = Handler::new(|_event: Value, _context: InvocationContext| async move {
//!     // 在处理函数的任意位置读取关联ID
//!     let ids = use_correlation_ids();
//!     Ok::<_, Infallible>(ids.call_chain_length())
//! })
//! .with_hook(enable_correlation_ids(None))
//! .before(|_| inject_correlation_ids(&tracing::Span::current()));
//!
//! let event = json!({ "__context__": { "x-correlation-id": "abc", "call-chain-length": "2" } });
//! let length = handler.call(event, InvocationContext::new("req-1")).await.unwrap();
//! assert_eq!(length, Some(3));
//! # }
//! ```
//!
//! ### Tower 集成（需要启用 tower feature）
//! ```ignore
//! use lambda_correlation::CorrelationLayer;
//! use lambda_runtime::{run, service_fn, Error, LambdaEvent};
//! use serde_json::Value;
//! use tower::ServiceBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let service = ServiceBuilder::new()
//!         .layer(CorrelationLayer::new())
//!         .service(service_fn(|_event: LambdaEvent<Value>| async move {
//!             let ids = lambda_correlation::use_correlation_ids();
//!             Ok::<_, Error>(serde_json::to_value(ids)?)
//!         }));
//!
//!     run(service).await
//! }
//! ```

mod context;
pub mod dynamodb;
mod handler;
mod ids;
mod logger;
pub mod matchers;
mod middleware;
pub mod store;

pub use context::{use_correlation_ids, MISSING_CORRELATION_IDS_WARNING};
pub use handler::{BeforeHook, Handler, InvocationContext, Request};
pub use ids::{CorrelationIds, AWS_REQUEST_ID, CALL_CHAIN_LENGTH, HEADER_KEYS, X_CORRELATION_ID};
pub use logger::{inject_correlation_ids, PersistentLogAttributes};
pub use matchers::{
    extract_correlation_ids, extract_correlation_ids_for, extract_correlation_ids_with,
    EventMatcher, TriggerKind, SUPPORTED_MATCHERS,
};
pub use middleware::{enable_correlation_ids, CorrelationConfig, EnableCorrelationIds};
pub use store::ScopeError;

// -- tower feature --
#[cfg(feature = "tower")]
mod integrations;
#[cfg(feature = "tower")]
pub use integrations::tower::{
    CorrelationLayer, CorrelationLayerConfig, CorrelationService, LambdaInvocation,
};
