use crate::{precision_string, routine_name, BlasScalar, Handle, Hardware, PointerMode};
use bitflags::bitflags;
use log::info;
use std::fmt;

bitflags! {
    /// 日志通道掩码。
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
    pub struct LayerMode: u32 {
        /// 例程名和全部参数。
        const LOG_TRACE = 1;
        /// 复现调用的性能测试命令行。
        const LOG_BENCH = 1 << 1;
        /// 例程名和尺寸参数组成的映射，用于统计调用分布。
        const LOG_PROFILE = 1 << 2;
    }
}

impl LayerMode {
    pub const NONE: Self = Self::empty();
}

pub(crate) const TARGET_TRACE: &str = "blas::trace";
pub(crate) const TARGET_BENCH: &str = "blas::bench";
pub(crate) const TARGET_PROFILE: &str = "blas::profile";

/// 一次例程调用的日志记录器。
///
/// 各通道只在句柄上对应的位打开时格式化并输出。
pub(crate) struct RoutineLogger<'a, H: Hardware> {
    handle: &'a Handle<H>,
    base: &'static str,
    name: String,
    precision: &'static str,
}

impl<'a, H: Hardware> RoutineLogger<'a, H> {
    pub fn new<T: BlasScalar>(handle: &'a Handle<H>, base: &'static str) -> Self {
        Self {
            handle,
            base,
            name: routine_name::<T>(base),
            precision: precision_string(T::DT),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn enabled(&self, channel: LayerMode) -> bool {
        self.handle.layer_mode().contains(channel)
    }

    pub fn trace(&self, args: &[&dyn fmt::Display]) {
        if !self.enabled(LayerMode::LOG_TRACE) {
            return;
        }
        let mut line = self.name.clone();
        for arg in args {
            line.push(',');
            line.push_str(&arg.to_string());
        }
        info!(target: TARGET_TRACE, "{line}")
    }

    /// 指针模式为设备时标量值无法在主机上得到，不输出。
    pub fn bench(&self, args: &[(&str, &dyn fmt::Display)]) {
        if !self.enabled(LayerMode::LOG_BENCH) || self.handle.pointer_mode() != PointerMode::Host
        {
            return;
        }
        let mut line = format!("blas-bench -f {} -r {}", self.base, self.precision);
        for (key, val) in args {
            line.push_str(&format!(" {key} {val}"));
        }
        info!(target: TARGET_BENCH, "{line}")
    }

    pub fn profile(&self, args: &[(&str, &dyn fmt::Display)]) {
        if !self.enabled(LayerMode::LOG_PROFILE) {
            return;
        }
        let mut line = format!("{{function: {}", self.name);
        for (key, val) in args {
            line.push_str(&format!(", {key}: {val}"));
        }
        line.push('}');
        info!(target: TARGET_PROFILE, "{line}")
    }
}

/// 按地址显示指针，空指针显示为 `nullptr`。
pub(crate) struct Ptr<T>(pub *const T);

impl<T> fmt::Display for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_null() {
            write!(f, "nullptr")
        } else {
            write!(f, "{:p}", self.0)
        }
    }
}

/// 主机指针模式下显示标量的值，设备指针模式下显示地址。
pub(crate) struct Scalar<T>(pub PointerMode, pub *const T);

impl<T: BlasScalar> fmt::Display for Scalar<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            PointerMode::Host if !self.1.is_null() => {
                write!(f, "{}", unsafe { self.1.read() }.to_f64())
            }
            _ => fmt::Display::fmt(&Ptr(self.1), f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{LayerMode, Ptr, Scalar};
    use crate::PointerMode;
    use std::ptr::null;

    #[test]
    fn test_layer_mode() {
        let mode = LayerMode::LOG_TRACE | LayerMode::LOG_BENCH;
        assert_eq!(mode.bits(), 3);
        assert!(mode.contains(LayerMode::LOG_TRACE));
        assert!(!mode.contains(LayerMode::LOG_PROFILE));
        assert_eq!(LayerMode::from_bits_truncate(0xff).bits(), 7);
        assert_eq!(LayerMode::default(), LayerMode::NONE);
    }

    #[test]
    fn test_display() {
        let alpha = 2.5f32;
        assert_eq!(Scalar(PointerMode::Host, &alpha as *const _).to_string(), "2.5");
        assert!(Scalar(PointerMode::Device, &alpha as *const _)
            .to_string()
            .starts_with("0x"));
        assert_eq!(Ptr::<f32>(null()).to_string(), "nullptr");
        assert_eq!(Scalar::<f64>(PointerMode::Host, null()).to_string(), "nullptr");
    }
}
