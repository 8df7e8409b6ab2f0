//! 关联ID访问接口
//!
//! 供业务代码在调用的任意位置读取当前记录，无需显式传参。

use crate::ids::CorrelationIds;
use crate::store;

/// 找不到关联ID时输出的警告
pub const MISSING_CORRELATION_IDS_WARNING: &str =
    "No correlation ids found. You must enable correlation ids via enableCorrelationIds first";

/// 获取当前调用的关联ID
///
/// 当前不在调用作用域内、或记录为空时，记录一条警告并返回空记录，不会失败。
/// 返回的是独立副本，修改它不会影响存储中的记录。
pub fn use_correlation_ids() -> CorrelationIds {
    match store::get() {
        Some(ids) if !ids.is_empty() => ids,
        _ => {
            tracing::warn!("{}", MISSING_CORRELATION_IDS_WARNING);
            CorrelationIds::new()
        }
    }
}
