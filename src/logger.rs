//! 把关联ID注入日志组件

use crate::context::use_correlation_ids;
use crate::ids::{CorrelationIds, AWS_REQUEST_ID, CALL_CHAIN_LENGTH, X_CORRELATION_ID};
use tracing::Span;

/// 支持持久日志属性的日志组件
///
/// 写入的属性会附加到之后输出的每一条日志上。
pub trait PersistentLogAttributes {
    fn add_persistent_log_attributes(&self, attributes: CorrelationIds);
}

/// 把当前调用的关联ID写入日志组件的持久属性
pub fn inject_correlation_ids<L>(logger: &L)
where
    L: PersistentLogAttributes + ?Sized,
{
    logger.add_persistent_log_attributes(use_correlation_ids());
}

/// 约定字段在 span 中对应的字段名
const SPAN_FIELDS: [(&str, &str); 3] = [
    (AWS_REQUEST_ID, "aws_request_id"),
    (X_CORRELATION_ID, "correlation_id"),
    (CALL_CHAIN_LENGTH, "call_chain_length"),
];

/// 写入 span 上预先声明的 `aws_request_id`、`correlation_id`、`call_chain_length` 字段
///
/// 未声明的字段会被 tracing 忽略。其余的自定义字段只以一条 debug 事件输出一次，
/// 不会附加到之后的日志上。
impl PersistentLogAttributes for Span {
    fn add_persistent_log_attributes(&self, mut attributes: CorrelationIds) {
        for (key, field) in SPAN_FIELDS {
            if let Some(value) = attributes.remove(key) {
                self.record(field, value.as_str());
            }
        }

        if !attributes.is_empty() {
            self.in_scope(|| {
                tracing::debug!(attributes = %attributes, "Additional correlation attributes");
            });
        }
    }
}
