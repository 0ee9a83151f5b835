// #![deny(warnings)]

mod common;
mod handle;
mod logging;
mod numerics;

pub mod capi;
pub mod dot;
pub mod gemm;
pub mod gemv;
pub mod nrm2;
pub mod scal;

pub use common::*;
pub use handle::{
    common_cpu, roundup_device_memory_size, Config, DeviceMalloc, GsuMalloc, Handle, Ownership,
    MIN_CHUNK_SIZE,
};
pub use logging::LayerMode;
pub use numerics::{CheckNumerics, NumericsCount};

use std::{fmt, ops::DerefMut};

/// 算力硬件抽象。
///
/// 约定硬件如何存储和运行。
/// 这个特质应该由管理硬件的基本单元的映射类型实现，通常是**硬件上下文**。
pub trait Hardware {
    /// 硬件的存储单元类型，按字节计。
    type Byte;
    /// 硬件的任务队列类型，在句柄上只作为标识记录。
    type Queue: Copy + Default + PartialEq + fmt::Debug;
    /// 硬件分配和回收的对象，表示对某块存储区域的所有权。
    type DevMem: DerefMut<Target = [Self::Byte]>;

    /// 分配一块存储区域。
    ///
    /// 返回的存储区域基址至少按 [`MIN_CHUNK_SIZE`] 对齐。
    /// 硬件无法提供时返回 `None`，不会重试。
    fn malloc(&self, size: usize) -> Option<Self::DevMem>;

    /// 回收一块存储区域。
    ///
    /// 实现需要保证在队列中已发射的任务完成后才真正释放。
    fn free(&self, mem: Self::DevMem);
}

pub type ByteOf<H> = <H as Hardware>::Byte;
pub type QueueOf<H> = <H as Hardware>::Queue;
pub type DevMemOf<H> = <H as Hardware>::DevMem;
pub type MutPtr<H> = *mut <H as Hardware>::Byte;

/// 不使用临时存储的例程在尺寸查询模式下直接返回。
macro_rules! return_zero_device_memory_size_if_queried {
    ($handle:expr) => {
        if $handle.is_device_memory_size_query() {
            return Ok($crate::Status::SizeUnchanged);
        }
    };
}

pub(crate) use return_zero_device_memory_size_if_queried;
