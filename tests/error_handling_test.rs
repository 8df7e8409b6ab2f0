//! 错误处理和边界情况测试
//!
//! 验证关联ID模块在各种异常输入下的健壮性：不 panic、不报错，总是得到确定的记录

use lambda_correlation::{
    enable_correlation_ids, extract_correlation_ids, inject_correlation_ids, store,
    use_correlation_ids, CorrelationIds, Handler, InvocationContext, ScopeError, TriggerKind,
    MISSING_CORRELATION_IDS_WARNING, SUPPORTED_MATCHERS,
};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// 收集日志输出，用于断言警告内容
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn with_captured_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

/// 各种畸形事件，匹配和提取都不能 panic
fn malformed_events() -> Vec<Value> {
    vec![
        Value::Null,
        json!(true),
        json!(42),
        json!("string event"),
        json!([]),
        json!([{ "__context__": {} }]),
        json!({ "Records": null }),
        json!({ "Records": [] }),
        json!({ "Records": [null] }),
        json!({ "Records": ["text"] }),
        json!({ "Records": [{ "messageId": "m", "messageAttributes": null }] }),
        json!({
            "Records": [{ "messageId": "m", "messageAttributes": { "x-correlation-id": null } }]
        }),
        json!({
            "Records": [{ "messageId": "m", "messageAttributes": { "x-correlation-id": "flat" } }]
        }),
        json!({ "Records": [{ "Sns": null }] }),
        json!({ "Records": [{ "Sns": { "MessageAttributes": [] } }] }),
        json!({ "Records": [{ "dynamodb": null }] }),
        json!({ "Records": [{ "dynamodb": { "OldImage": { "__context__": "raw" } } }] }),
        json!({
            "Records": [{ "dynamodb": { "OldImage": { "__context__": { "M": null } } } }]
        }),
        json!({
            "Records": [{ "dynamodb": { "OldImage": { "__context__": { "S": "not a map" } } } }]
        }),
        json!({ "__context__": [1, 2, 3] }),
        json!({
            "__context__": { "x-correlation-id": { "nested": true }, "call-chain-length": [] }
        }),
        json!({ "httpMethod": null, "headers": "text", "path": 1 }),
        json!({ "requestContext": "text", "headers": {} }),
        json!({ "requestContext": { "http": null }, "headers": null }),
        json!({ "source": null, "detail-type": null, "detail": null }),
        json!({ "source": "s", "detail-type": "t", "detail": { "__context__": null } }),
    ]
}

/// 测试畸形事件的匹配和提取
#[test]
fn test_malformed_events_never_panic() {
    for event in malformed_events() {
        for matcher in SUPPORTED_MATCHERS {
            if matcher.matches(&event) {
                let ids = matcher.extract_correlation_ids(&event);
                assert!(
                    ids.is_empty(),
                    "匹配器 {} 不应从畸形事件中提取到字段: {event}",
                    matcher.name()
                );
            }
        }

        assert!(extract_correlation_ids(&event).is_empty(), "事件: {event}");
        let _ = TriggerKind::detect(&event);
    }
}

/// 测试畸形事件通过中间件后得到默认记录
#[tokio::test]
async fn test_malformed_events_fall_back_to_defaults() {
    let handler = Handler::new(|_event: Value, _context: InvocationContext| async move {
        Ok::<_, Infallible>(use_correlation_ids())
    })
    .with_hook(enable_correlation_ids(None));

    for event in malformed_events() {
        let seen = handler
            .call(event.clone(), InvocationContext::new("malformed"))
            .await
            .unwrap();
        assert_eq!(seen, CorrelationIds::defaults_for("malformed"), "事件: {event}");
    }
}

/// 测试没有记录时访问接口输出警告并返回空记录
#[test]
fn test_missing_ids_warns_and_returns_empty() {
    let (ids, logs) = with_captured_logs(|| store::sync_scope(use_correlation_ids));

    assert!(ids.is_empty());
    assert!(logs.contains("WARN"), "应输出 warn 级别日志: {logs}");
    assert!(logs.contains(MISSING_CORRELATION_IDS_WARNING), "警告内容不正确: {logs}");
    assert_eq!(
        MISSING_CORRELATION_IDS_WARNING,
        "No correlation ids found. You must enable correlation ids via enableCorrelationIds first"
    );
}

/// 测试在任何作用域之外调用访问接口
#[test]
fn test_outside_scope_warns_once() {
    let (ids, logs) = with_captured_logs(use_correlation_ids);

    assert!(ids.is_empty());
    assert_eq!(logs.matches(MISSING_CORRELATION_IDS_WARNING).count(), 1);
}

/// 测试存在记录时不输出警告
#[test]
fn test_present_ids_do_not_warn() {
    let (ids, logs) = with_captured_logs(|| {
        store::sync_scope(|| {
            store::set([("key1", "value1")].into_iter().collect()).unwrap();
            use_correlation_ids()
        })
    });

    assert_eq!(ids, [("key1", "value1")].into_iter().collect::<CorrelationIds>());
    assert!(!logs.contains(MISSING_CORRELATION_IDS_WARNING));
}

/// 测试作用域之外的存储写入返回错误而不是 panic
#[test]
fn test_store_outside_scope() {
    assert_eq!(store::set(CorrelationIds::minimal()), Err(ScopeError::NoScope));
    assert_eq!(store::clear(), Err(ScopeError::NoScope));
    assert_eq!(store::get(), None);
    assert_eq!(
        ScopeError::NoScope.to_string(),
        "no correlation scope is active for the current task"
    );
}

/// 测试非法的调用链长度被规范化为合法的非负整数
#[tokio::test]
async fn test_invalid_chain_length_is_normalised() {
    let handler = Handler::new(|_event: Value, _context: InvocationContext| async move {
        Ok::<_, Infallible>(use_correlation_ids())
    })
    .with_hook(enable_correlation_ids(None));

    for (raw, expected) in [("abc", 1), ("-5", 1), ("3.9", 4), (" 10 ", 11)] {
        let event = json!({ "__context__": { "x-correlation-id": "c", "call-chain-length": raw } });
        let seen = handler
            .call(event, InvocationContext::new("n"))
            .await
            .unwrap();
        assert_eq!(seen.call_chain_length(), Some(expected), "输入: {raw:?}");
        assert_eq!(seen.correlation_id(), Some("c"));
    }
}

/// 测试注入 span 时约定字段写入 `invocation` span，其余字段以 debug 事件输出
#[test]
fn test_inject_records_fields_on_invocation_span() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let handler = Handler::new(|_event: Value, _context: InvocationContext| async move {
        tracing::info!("user log line");
        Ok::<_, Infallible>(())
    })
    .with_hook(enable_correlation_ids(None))
    .before(|_| {
        let mut ids = use_correlation_ids();
        ids.insert("tenant", "acme");
        store::set(ids).unwrap();
    })
    .before(|_| inject_correlation_ids(&tracing::Span::current()));

    let event = json!({ "__context__": { "x-correlation-id": "abc", "call-chain-length": "2" } });
    let ((), logs) = with_captured_logs(|| {
        runtime
            .block_on(handler.call(event, InvocationContext::new("r1")))
            .unwrap()
    });

    let line = logs
        .lines()
        .find(|line| line.contains("user log line"))
        .unwrap_or_else(|| panic!("缺少用户日志: {logs}"));
    assert!(line.contains("invocation{"), "日志应位于 invocation span 中: {line}");
    assert!(line.contains("aws_request_id=r1"), "{line}");
    assert!(line.contains(r#"correlation_id="abc""#), "{line}");
    assert!(line.contains(r#"call_chain_length="3""#), "{line}");

    assert!(logs.contains("DEBUG"), "应输出 debug 事件: {logs}");
    assert!(logs.contains("Additional correlation attributes"), "{logs}");
    assert!(logs.contains("tenant=acme"), "{logs}");
    assert!(!line.contains("tenant"), "额外字段不会附加到之后的日志上: {line}");
}
