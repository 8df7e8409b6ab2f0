//! 关联ID记录的数据模型

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

/// 平台分配的调用ID字段名
pub const AWS_REQUEST_ID: &str = "awsRequestId";

/// 跨调用传递的关联ID字段名
pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// 调用链长度字段名
pub const CALL_CHAIN_LENGTH: &str = "call-chain-length";

/// 从触发事件中提取时只关心这三个字段
pub const HEADER_KEYS: [&str; 3] = [AWS_REQUEST_ID, X_CORRELATION_ID, CALL_CHAIN_LENGTH];

/// 一次调用的关联ID记录
///
/// 除了三个约定字段外，还可以携带任意额外的字符串字段，它们会被原样传递。
/// 内部使用 `BTreeMap`，因此两条记录可以直接比较是否相等，迭代顺序也是确定的。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationIds(BTreeMap<String, String>);

impl CorrelationIds {
    /// 创建一条空记录
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// 没有任何上游信息时使用的默认记录
    ///
    /// `awsRequestId` 和 `x-correlation-id` 都取当前调用的平台ID，调用链长度为 `"1"`。
    pub fn defaults_for(invocation_id: &str) -> Self {
        let mut ids = Self::new();
        ids.insert(AWS_REQUEST_ID, invocation_id);
        ids.insert(X_CORRELATION_ID, invocation_id);
        ids.insert(CALL_CHAIN_LENGTH, "1");
        ids
    }

    /// 只包含 `call-chain-length: "1"` 的最小记录
    pub fn minimal() -> Self {
        let mut ids = Self::new();
        ids.insert(CALL_CHAIN_LENGTH, "1");
        ids
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// 写入一个字段，返回旧值
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn aws_request_id(&self) -> Option<&str> {
        self.get(AWS_REQUEST_ID)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.get(X_CORRELATION_ID)
    }

    /// 以整数形式读取调用链长度
    ///
    /// 字段缺失或不是合法的非负整数时返回 `None`。
    pub fn call_chain_length(&self) -> Option<u64> {
        self.get(CALL_CHAIN_LENGTH)?.trim().parse().ok()
    }

    /// 调用链长度加一，其余字段保持不变
    ///
    /// 缺失的长度按 `"0"` 处理。解析规则较宽松：跳过前导空白，只读取开头的数字；
    /// 没有数字时按 0 处理，溢出时取 `u64::MAX`。
    pub fn increment_chain_length(mut self) -> Self {
        let current = self.get(CALL_CHAIN_LENGTH).map_or(0, parse_leading_digits);
        self.insert(CALL_CHAIN_LENGTH, current.saturating_add(1).to_string());
        self
    }
}

/// 读取字符串开头的十进制数字
fn parse_leading_digits(value: &str) -> u64 {
    let trimmed = value.trim_start();
    let digits_end = trimmed
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(trimmed.len());

    if digits_end == 0 {
        return 0;
    }

    trimmed[..digits_end].parse().unwrap_or(u64::MAX)
}

impl fmt::Display for CorrelationIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

impl<K, V> FromIterator<(K, V)> for CorrelationIds
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V> Extend<(K, V)> for CorrelationIds
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.0
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl IntoIterator for CorrelationIds {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CorrelationIds {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
