//! 触发事件匹配器
//!
//! 每种触发方式（直接调用、API Gateway、DynamoDB Stream、EventBridge、SQS、SNS）
//! 把关联ID放在事件的不同位置。匹配器只根据字段是否存在来判断事件形状，
//! 不做任何结构校验，任何输入都不会 panic。
//!
//! 批量事件（SQS、SNS）只读取第一条记录：假定同一批次的记录携带相同的关联上下文。

use crate::dynamodb;
use crate::ids::{CorrelationIds, HEADER_KEYS};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 直接调用时嵌入在事件中的上下文字段名
pub const CONTEXT_FIELD: &str = "__context__";

/// 事件形状匹配器
pub trait EventMatcher: Send + Sync {
    /// 用于日志的名字
    fn name(&self) -> &'static str;

    /// 判断事件是否属于该形状，只检查字段是否存在
    fn matches(&self, event: &Value) -> bool;

    /// 从事件中提取关联ID
    ///
    /// 调用前应保证 `matches` 返回 `true`。只返回三个约定字段中找到的部分，
    /// 一个都没有时返回空记录。
    fn extract_correlation_ids(&self, event: &Value) -> CorrelationIds;
}

/// 事件中带有 `__context__` 对象的直接调用
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectInvokeMatcher;

impl EventMatcher for DirectInvokeMatcher {
    fn name(&self) -> &'static str {
        "direct-invoke"
    }

    fn matches(&self, event: &Value) -> bool {
        has_field(event, CONTEXT_FIELD)
    }

    fn extract_correlation_ids(&self, event: &Value) -> CorrelationIds {
        pick_correlation_ids(&event[CONTEXT_FIELD])
    }
}

/// API Gateway REST API (payload v1)
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiGatewayV1Matcher;

impl EventMatcher for ApiGatewayV1Matcher {
    fn name(&self) -> &'static str {
        "api-gateway-v1"
    }

    fn matches(&self, event: &Value) -> bool {
        has_field(event, "httpMethod") && has_field(event, "headers") && has_field(event, "path")
    }

    fn extract_correlation_ids(&self, event: &Value) -> CorrelationIds {
        pick_correlation_ids(&event["headers"])
    }
}

/// API Gateway HTTP API (payload v2)
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiGatewayV2Matcher;

impl EventMatcher for ApiGatewayV2Matcher {
    fn name(&self) -> &'static str {
        "api-gateway-v2"
    }

    fn matches(&self, event: &Value) -> bool {
        has_field(event, "headers") && has_field(&event["requestContext"], "http")
    }

    fn extract_correlation_ids(&self, event: &Value) -> CorrelationIds {
        pick_correlation_ids(&event["headers"])
    }
}

/// DynamoDB Stream 批量事件
///
/// 与队列类事件不同，这里会扫描所有记录，取第一条 `OldImage` 中带有
/// `__context__` 的记录。
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamoDbStreamMatcher;

impl EventMatcher for DynamoDbStreamMatcher {
    fn name(&self) -> &'static str {
        "dynamodb-stream"
    }

    fn matches(&self, event: &Value) -> bool {
        first_record_has(event, "dynamodb")
    }

    fn extract_correlation_ids(&self, event: &Value) -> CorrelationIds {
        let Some(records) = event["Records"].as_array() else {
            return CorrelationIds::new();
        };

        let old_image = records
            .iter()
            .map(|record| &record["dynamodb"]["OldImage"])
            .find(|image| is_truthy(&image[CONTEXT_FIELD]));

        match old_image {
            Some(image) => {
                let item = dynamodb::unmarshall_object(image);
                item.get(CONTEXT_FIELD)
                    .map(pick_correlation_ids)
                    .unwrap_or_default()
            }
            None => CorrelationIds::new(),
        }
    }
}

/// EventBridge 事件，上下文放在 `detail.__context__` 中
#[derive(Debug, Clone, Copy, Default)]
pub struct EventBridgeMatcher;

impl EventMatcher for EventBridgeMatcher {
    fn name(&self) -> &'static str {
        "eventbridge"
    }

    fn matches(&self, event: &Value) -> bool {
        has_field(event, "source") && has_field(event, "detail-type")
    }

    fn extract_correlation_ids(&self, event: &Value) -> CorrelationIds {
        let context = &event["detail"][CONTEXT_FIELD];
        if context.is_object() {
            pick_correlation_ids(context)
        } else {
            CorrelationIds::new()
        }
    }
}

/// SQS 批量事件，读取第一条消息的 `messageAttributes`
#[derive(Debug, Clone, Copy, Default)]
pub struct SqsMatcher;

impl EventMatcher for SqsMatcher {
    fn name(&self) -> &'static str {
        "sqs"
    }

    fn matches(&self, event: &Value) -> bool {
        first_record_has(event, "messageId")
    }

    fn extract_correlation_ids(&self, event: &Value) -> CorrelationIds {
        pick_message_attributes(&event["Records"][0]["messageAttributes"], "stringValue")
    }
}

/// SNS 批量事件，读取第一条记录的 `Sns.MessageAttributes`
#[derive(Debug, Clone, Copy, Default)]
pub struct SnsMatcher;

impl EventMatcher for SnsMatcher {
    fn name(&self) -> &'static str {
        "sns"
    }

    fn matches(&self, event: &Value) -> bool {
        first_record_has(event, "Sns")
    }

    fn extract_correlation_ids(&self, event: &Value) -> CorrelationIds {
        pick_message_attributes(&event["Records"][0]["Sns"]["MessageAttributes"], "Value")
    }
}

/// 内置匹配器，按优先级排列
///
/// 顺序很重要：部分事件形状在结构上可能重叠，先匹配者胜出。
pub static SUPPORTED_MATCHERS: [&dyn EventMatcher; 7] = [
    &DirectInvokeMatcher,
    &ApiGatewayV1Matcher,
    &ApiGatewayV2Matcher,
    &DynamoDbStreamMatcher,
    &EventBridgeMatcher,
    &SqsMatcher,
    &SnsMatcher,
];

/// 触发方式
///
/// 宿主如果已经知道事件来源，可以直接用 [`extract_correlation_ids_for`] 跳过探测。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    DirectInvoke,
    ApiGatewayV1,
    ApiGatewayV2,
    DynamoDbStream,
    EventBridge,
    Sqs,
    Sns,
}

impl TriggerKind {
    /// 与 [`SUPPORTED_MATCHERS`] 顺序一致
    pub const ALL: [TriggerKind; 7] = [
        TriggerKind::DirectInvoke,
        TriggerKind::ApiGatewayV1,
        TriggerKind::ApiGatewayV2,
        TriggerKind::DynamoDbStream,
        TriggerKind::EventBridge,
        TriggerKind::Sqs,
        TriggerKind::Sns,
    ];

    /// 按优先级探测事件的触发方式
    pub fn detect(event: &Value) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.matcher().matches(event))
    }

    pub fn matcher(self) -> &'static dyn EventMatcher {
        match self {
            TriggerKind::DirectInvoke => &DirectInvokeMatcher,
            TriggerKind::ApiGatewayV1 => &ApiGatewayV1Matcher,
            TriggerKind::ApiGatewayV2 => &ApiGatewayV2Matcher,
            TriggerKind::DynamoDbStream => &DynamoDbStreamMatcher,
            TriggerKind::EventBridge => &EventBridgeMatcher,
            TriggerKind::Sqs => &SqsMatcher,
            TriggerKind::Sns => &SnsMatcher,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.matcher().name())
    }
}

/// 从任意触发事件中提取关联ID
///
/// 按优先级依次尝试内置匹配器，第一个匹配的匹配器的结果直接返回，
/// 即使结果为空也不会继续尝试后面的匹配器。没有匹配器匹配时返回空记录。
pub fn extract_correlation_ids(event: &Value) -> CorrelationIds {
    extract_correlation_ids_with(event, &[])
}

/// 同 [`extract_correlation_ids`]，内置匹配器都不匹配时再依次尝试自定义匹配器
pub fn extract_correlation_ids_with(
    event: &Value,
    custom: &[Arc<dyn EventMatcher>],
) -> CorrelationIds {
    for matcher in SUPPORTED_MATCHERS {
        if matcher.matches(event) {
            return extract_matched(matcher, event);
        }
    }

    for matcher in custom {
        if matcher.matches(event) {
            return extract_matched(matcher.as_ref(), event);
        }
    }

    tracing::debug!("No event matcher matched the trigger event");
    CorrelationIds::new()
}

fn extract_matched(matcher: &dyn EventMatcher, event: &Value) -> CorrelationIds {
    let ids = matcher.extract_correlation_ids(event);
    tracing::debug!(
        matcher = matcher.name(),
        found = ids.len(),
        "Matched trigger event shape"
    );
    ids
}

/// 已知触发方式时直接提取，不做形状探测
pub fn extract_correlation_ids_for(kind: TriggerKind, event: &Value) -> CorrelationIds {
    kind.matcher().extract_correlation_ids(event)
}

/// 从一个扁平映射中挑出约定字段
///
/// 只接受非空字符串；数字按十进制转成字符串（DynamoDB 中的 `N` 解码后是数字）。
pub fn pick_correlation_ids(source: &Value) -> CorrelationIds {
    let Some(fields) = source.as_object() else {
        return CorrelationIds::new();
    };

    HEADER_KEYS
        .iter()
        .filter_map(|&key| Some((key, scalar_to_string(fields.get(key)?)?)))
        .collect()
}

/// 消息属性的形状是 `{ key: { <value_field>: "..." } }`
fn pick_message_attributes(attributes: &Value, value_field: &str) -> CorrelationIds {
    let Some(attributes) = attributes.as_object() else {
        return CorrelationIds::new();
    };

    HEADER_KEYS
        .iter()
        .filter_map(|&key| {
            let value = attributes.get(key)?.get(value_field)?;
            Some((key, scalar_to_string(value)?))
        })
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[inline]
fn has_field(value: &Value, field: &str) -> bool {
    value.as_object().is_some_and(|map| map.contains_key(field))
}

/// `Records` 是非空数组，且第一条记录带有指定字段
fn first_record_has(event: &Value, field: &str) -> bool {
    event["Records"]
        .as_array()
        .and_then(|records| records.first())
        .is_some_and(|record| has_field(record, field))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
