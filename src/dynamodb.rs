//! DynamoDB 属性值格式的解码
//!
//! 变更流记录中的 `OldImage`/`NewImage` 使用带类型描述符的编码，
//! 例如 `{"S": "abc"}`、`{"N": "42"}`、`{"M": {...}}`。这里把它还原成普通的 JSON。

use serde_json::{Map, Number, Value};

/// 把一个属性值映射（即一条 item）解码为普通 JSON 对象
///
/// 输入不是对象时返回 `Value::Null`，任何输入都不会 panic。
pub fn unmarshall(item: &Value) -> Value {
    match item.as_object() {
        Some(attributes) => Value::Object(
            attributes
                .iter()
                .map(|(name, attribute)| (name.clone(), unmarshall_attribute(attribute)))
                .collect(),
        ),
        None => Value::Null,
    }
}

/// 解码单个属性值
///
/// 未知的类型描述符解码为 `Value::Null`。
pub fn unmarshall_attribute(attribute: &Value) -> Value {
    let Some(descriptor) = attribute.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = descriptor.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "S" | "B" => inner.as_str().map_or(Value::Null, |s| Value::String(s.to_owned())),
        "N" => inner.as_str().map_or(Value::Null, parse_number),
        "BOOL" => inner.as_bool().map_or(Value::Null, Value::Bool),
        "NULL" => Value::Null,
        "M" => unmarshall(inner),
        "L" => inner.as_array().map_or(Value::Null, |items| {
            Value::Array(items.iter().map(unmarshall_attribute).collect())
        }),
        "SS" | "BS" => inner.as_array().map_or(Value::Null, |items| {
            Value::Array(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| Value::String(s.to_owned()))
                    .collect(),
            )
        }),
        "NS" => inner.as_array().map_or(Value::Null, |items| {
            Value::Array(items.iter().filter_map(Value::as_str).map(parse_number).collect())
        }),
        _ => Value::Null,
    }
}

/// `N` 类型以字符串传输；无法表示为 JSON 数字时保留原字符串
fn parse_number(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(n) = raw.parse::<u64>() {
        return Value::Number(n.into());
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(raw.to_owned()), Value::Number)
}

/// 方便测试和调用方直接取出对象
pub(crate) fn unmarshall_object(item: &Value) -> Map<String, Value> {
    match unmarshall(item) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
