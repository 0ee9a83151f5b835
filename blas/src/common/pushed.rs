use std::cell::Cell;

/// 临时修改一项上下文状态，离开作用域时恢复原值。
///
/// 多个覆盖按获取的相反顺序释放，即普通的栈式作用域。
#[must_use]
pub struct PushedState<'a, T: Copy> {
    state: &'a Cell<T>,
    old: T,
}

impl<'a, T: Copy> PushedState<'a, T> {
    #[inline]
    pub fn new(state: &'a Cell<T>, new: T) -> Self {
        Self {
            old: state.replace(new),
            state,
        }
    }

    /// 被覆盖前的值。
    #[inline]
    pub fn old(&self) -> T {
        self.old
    }
}

impl<T: Copy> Drop for PushedState<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.state.set(self.old)
    }
}
