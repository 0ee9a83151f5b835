pub mod common_cpu;

mod malloc;
mod memory;

pub use malloc::{DeviceMalloc, GsuMalloc};
pub use memory::{roundup_device_memory_size, Ownership, MIN_CHUNK_SIZE};

use crate::{
    AtomicsMode, BlasError, CheckNumerics, Hardware, LayerMode, MutPtr, PointerMode, PushedState,
    QueueOf,
};
use log::{debug, warn};
use memory::DeviceMemory;
use std::{cell::Cell, env::var, ptr::null_mut};

/// 句柄的初始配置。
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// 启用的日志通道。
    pub layer_mode: LayerMode,
    /// 数值检查模式。
    pub check_numerics: CheckNumerics,
    /// 非零时句柄创建时即分配固定大小的设备存储，不再增长。
    pub device_memory_size: Option<usize>,
}

impl Config {
    pub const ENV_LAYER: &'static str = "BLAS_LAYER";
    pub const ENV_CHECK_NUMERICS: &'static str = "BLAS_CHECK_NUMERICS";
    pub const ENV_DEVICE_MEMORY_SIZE: &'static str = "BLAS_DEVICE_MEMORY_SIZE";

    /// 从环境变量读取配置，无法解析的值被忽略。
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(bits) = env_number(Self::ENV_LAYER) {
            config.layer_mode = LayerMode::from_bits_truncate(bits as _);
        }
        if let Some(bits) = env_number(Self::ENV_CHECK_NUMERICS) {
            config.check_numerics = CheckNumerics::from_bits_truncate(bits as _);
        }
        config.device_memory_size = env_number(Self::ENV_DEVICE_MEMORY_SIZE).filter(|&n| n != 0);
        config
    }
}

fn env_number(key: &str) -> Option<usize> {
    let val = var(key).ok()?;
    let parsed = parse_number(&val);
    if parsed.is_none() {
        warn!("ignore {key}={val:?}: not a number");
    }
    parsed
}

fn parse_number(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

/// 例程执行上下文。
///
/// 句柄持有任务队列、各种模式开关和一块可复用的设备存储。
/// 所有状态都在 [`Cell`] 中，句柄只能在一个线程上使用，不做任何内部同步。
pub struct Handle<H: Hardware> {
    hardware: H,
    stream: Cell<QueueOf<H>>,
    pointer_mode: Cell<PointerMode>,
    layer_mode: Cell<LayerMode>,
    atomics_mode: Cell<AtomicsMode>,
    any_order: Cell<bool>,
    check_numerics: Cell<CheckNumerics>,

    memory: DeviceMemory<H>,
    gsu_workspace: Cell<MutPtr<H>>,
    gsu_workspace_size: Cell<usize>,
}

impl<H: Hardware> Handle<H> {
    /// 创建句柄。
    ///
    /// 只有配置了固定设备存储且硬件无法提供时失败。
    pub fn new(hardware: H, config: Config) -> Result<Self, BlasError> {
        let Config {
            layer_mode,
            check_numerics,
            device_memory_size,
        } = config;
        let memory = match device_memory_size {
            Some(size) if size > 0 => DeviceMemory::fixed(&hardware, size)?,
            _ => DeviceMemory::managed(),
        };
        debug!(
            "handle created: layer mode {layer_mode:?}, check numerics {check_numerics:?}, \
             {} bytes of device memory",
            memory.size()
        );
        Ok(Self {
            hardware,
            stream: Cell::default(),
            pointer_mode: Cell::default(),
            layer_mode: Cell::new(layer_mode),
            atomics_mode: Cell::default(),
            any_order: Cell::new(false),
            check_numerics: Cell::new(check_numerics),

            memory,
            gsu_workspace: Cell::new(null_mut()),
            gsu_workspace_size: Cell::new(0),
        })
    }

    #[inline]
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    #[inline]
    pub fn stream(&self) -> QueueOf<H> {
        self.stream.get()
    }
    #[inline]
    pub fn set_stream(&self, stream: QueueOf<H>) {
        self.stream.set(stream)
    }

    #[inline]
    pub fn pointer_mode(&self) -> PointerMode {
        self.pointer_mode.get()
    }
    #[inline]
    pub fn set_pointer_mode(&self, mode: PointerMode) {
        self.pointer_mode.set(mode)
    }
    /// 临时修改指针模式，返回值析构时恢复。
    #[inline]
    pub fn push_pointer_mode(&self, mode: PointerMode) -> PushedState<'_, PointerMode> {
        PushedState::new(&self.pointer_mode, mode)
    }

    #[inline]
    pub fn layer_mode(&self) -> LayerMode {
        self.layer_mode.get()
    }
    #[inline]
    pub fn set_layer_mode(&self, mode: LayerMode) {
        self.layer_mode.set(mode)
    }

    #[inline]
    pub fn atomics_mode(&self) -> AtomicsMode {
        self.atomics_mode.get()
    }
    #[inline]
    pub fn set_atomics_mode(&self, mode: AtomicsMode) {
        self.atomics_mode.set(mode)
    }

    /// 后端调度内核时是否允许任意执行顺序。
    #[inline]
    pub fn any_order(&self) -> bool {
        self.any_order.get()
    }
    #[inline]
    pub fn set_any_order(&self, any_order: bool) {
        self.any_order.set(any_order)
    }
    #[inline]
    pub fn push_any_order(&self, any_order: bool) -> PushedState<'_, bool> {
        PushedState::new(&self.any_order, any_order)
    }

    #[inline]
    pub fn check_numerics(&self) -> CheckNumerics {
        self.check_numerics.get()
    }
    #[inline]
    pub fn set_check_numerics(&self, mode: CheckNumerics) {
        self.check_numerics.set(mode)
    }

    /// 当前挂在句柄上的 GSU 工作空间，只在 [`GsuMalloc`] 存活期间非空。
    #[inline]
    pub fn gsu_workspace(&self) -> (MutPtr<H>, usize) {
        (self.gsu_workspace.get(), self.gsu_workspace_size.get())
    }
}

impl<H: Hardware> Drop for Handle<H> {
    fn drop(&mut self) {
        self.memory.clear(&self.hardware);
        debug!("handle destroyed");
    }
}
