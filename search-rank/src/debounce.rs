use chrono::{DateTime, Duration, Utc};

/// 防抖器 - 将重复触发的动作推迟到输入停顿之后执行
///
/// 时间基准由调用方显式传入，便于测试，也与排序核心的显式now参数保持一致。
/// 后提交的值会覆盖之前未执行的值（最后一次提交获胜）。
#[derive(Debug)]
pub struct Debouncer<T> {
    /// 静默期时长
    delay: Duration,
    /// 待执行的值及其提交时间
    pending: Option<(T, DateTime<Utc>)>,
}

impl<T> Debouncer<T> {
    /// 创建指定静默期的防抖器
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// 提交一个值，重置静默期并丢弃之前未执行的值
    pub fn submit(&mut self, value: T, now: DateTime<Utc>) {
        self.pending = Some((value, now));
    }

    /// 是否有待执行的值
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// 如果静默期已过，取出待执行的值
    pub fn take_ready(&mut self, now: DateTime<Utc>) -> Option<T> {
        match &self.pending {
            Some((_, submitted_at)) if now.signed_duration_since(*submitted_at) >= self.delay => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    /// 丢弃待执行的值
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
