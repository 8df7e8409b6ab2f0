//! 调用级关联ID存储
//!
//! 使用 `tokio::task_local` 为每次调用保存一条关联ID记录。
//! 并发执行的调用各自拥有独立的存储槽，互不可见；嵌套作用域会遮蔽外层作用域。

use crate::ids::CorrelationIds;
use std::cell::RefCell;
use std::future::Future;
use tokio::task_local;

// 当前调用的关联ID记录，None 表示尚未写入或已被清除
task_local! {
    static CORRELATION_STORE: RefCell<Option<CorrelationIds>>;
}

/// 存储操作错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// 当前任务不在任何调用作用域内
    #[error("no correlation scope is active for the current task")]
    NoScope,
}

/// 在一个新的、空的调用作用域中执行异步操作
pub async fn with_correlation_scope<F, T>(future: F) -> T
where
    F: Future<Output = T>,
{
    CORRELATION_STORE.scope(RefCell::new(None), future).await
}

/// 在已写入关联ID的调用作用域中执行异步操作
///
/// # 参数
/// * `ids` - 作用域的初始记录
/// * `future` - 要执行的异步操作
pub async fn with_correlation_ids<F, T>(ids: CorrelationIds, future: F) -> T
where
    F: Future<Output = T>,
{
    CORRELATION_STORE.scope(RefCell::new(Some(ids)), future).await
}

/// 同步版本的作用域，用于同步处理函数
pub fn sync_scope<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    CORRELATION_STORE.sync_scope(RefCell::new(None), f)
}

/// 当前是否处于调用作用域内
pub fn in_scope() -> bool {
    CORRELATION_STORE.try_with(|_| ()).is_ok()
}

/// 写入当前调用的记录，覆盖已有记录
pub fn set(ids: CorrelationIds) -> Result<(), ScopeError> {
    CORRELATION_STORE
        .try_with(|slot| {
            *slot.borrow_mut() = Some(ids);
        })
        .map_err(|_| ScopeError::NoScope)
}

/// 读取当前调用的记录
///
/// 不在作用域内或尚未写入时返回 `None`。返回的是独立的副本。
pub fn get() -> Option<CorrelationIds> {
    CORRELATION_STORE
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// 清除当前调用的记录
pub fn clear() -> Result<(), ScopeError> {
    CORRELATION_STORE
        .try_with(|slot| {
            slot.borrow_mut().take();
        })
        .map_err(|_| ScopeError::NoScope)
}
