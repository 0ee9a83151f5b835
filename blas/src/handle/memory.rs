use super::{DeviceMalloc, GsuMalloc, Handle};
use crate::{
    internal_error, memory_error, size_query_mismatch, BlasError, DevMemOf, Hardware, MutPtr,
    Status,
};
use log::{debug, error};
use std::{cell::Cell, ptr::null_mut};

/// 设备存储分配的最小粒度，每个子分配的大小都向上取整到它的整数倍。
pub const MIN_CHUNK_SIZE: usize = 64;

const _: () = assert!(MIN_CHUNK_SIZE.is_power_of_two());

/// 将大小向上取整到 [`MIN_CHUNK_SIZE`] 的整数倍。
#[inline]
pub const fn roundup_device_memory_size(size: usize) -> usize {
    size.next_multiple_of(MIN_CHUNK_SIZE)
}

/// 多个请求取整后的总大小，溢出时返回 `None`。
pub(super) fn total_size(sizes: &[usize]) -> Option<usize> {
    sizes.iter().try_fold(0usize, |acc, &size| {
        acc.checked_add(size.checked_next_multiple_of(MIN_CHUNK_SIZE)?)
    })
}

/// 设备存储的归属。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Ownership {
    /// 库分配并按需增长。
    Managed,
    /// 库分配的固定大小存储，不增长。
    Fixed,
    /// 调用者提供的存储，库不增长也不释放。
    User,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum QueryState {
    Idle,
    Querying { required: usize },
}

pub(super) struct DeviceMemory<H: Hardware> {
    owned: Cell<Option<DevMemOf<H>>>,
    base: Cell<MutPtr<H>>,
    size: Cell<usize>,
    ownership: Cell<Ownership>,
    in_use: Cell<bool>,
    query: Cell<QueryState>,
}

impl<H: Hardware> DeviceMemory<H> {
    pub fn managed() -> Self {
        Self {
            owned: Cell::new(None),
            base: Cell::new(null_mut()),
            size: Cell::new(0),
            ownership: Cell::new(Ownership::Managed),
            in_use: Cell::new(false),
            query: Cell::new(QueryState::Idle),
        }
    }

    pub fn fixed(hardware: &H, size: usize) -> Result<Self, BlasError> {
        let ans = Self::managed();
        ans.ownership.set(Ownership::Fixed);
        ans.alloc_fixed(hardware, size)?;
        Ok(ans)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// 释放库持有的存储，句柄回到没有存储的状态。
    pub fn clear(&self, hardware: &H) {
        if let Some(mem) = self.owned.take() {
            hardware.free(mem)
        }
        self.base.set(null_mut());
        self.size.set(0);
    }

    fn alloc_fixed(&self, hardware: &H, size: usize) -> Result<(), BlasError> {
        let size = size
            .checked_next_multiple_of(MIN_CHUNK_SIZE)
            .ok_or_else(|| memory_error(format!("{size} bytes overflows")))?;
        let Some(mut mem) = hardware.malloc(size) else {
            return Err(memory_error(format!("failed to allocate {size} bytes")));
        };
        self.base.set(mem.as_mut_ptr());
        self.size.set(size);
        self.owned.set(Some(mem));
        Ok(())
    }

    /// 占用整块设备存储，需要时增长。
    ///
    /// 成功后存储标记为使用中，由 [`DeviceMemory::release`] 解除。
    /// 失败时不改变现有存储。
    pub fn acquire(&self, hardware: &H, size: usize) -> Option<MutPtr<H>> {
        if self.in_use.get() {
            error!("device memory requested while it is already in use");
            return None;
        }
        if size > self.size.get() {
            if self.ownership.get() != Ownership::Managed {
                debug!(
                    "{size} bytes requested, {} bytes available in {:?} device memory",
                    self.size.get(),
                    self.ownership.get(),
                );
                return None;
            }
            let Some(mut mem) = hardware.malloc(size) else {
                error!("failed to grow device memory to {size} bytes");
                return None;
            };
            debug!("device memory grows from {} to {size} bytes", self.size.get());
            let base = mem.as_mut_ptr();
            debug_assert_eq!(base as usize % MIN_CHUNK_SIZE, 0);
            if let Some(old) = self.owned.replace(Some(mem)) {
                hardware.free(old)
            }
            self.base.set(base);
            self.size.set(size);
        }
        self.in_use.set(true);
        Some(self.base.get())
    }

    #[inline]
    pub fn release(&self) {
        self.in_use.set(false)
    }
}

impl<H: Hardware> Handle<H> {
    /// 当前调用是否处于设备存储尺寸查询中。
    #[inline]
    pub fn is_device_memory_size_query(&self) -> bool {
        matches!(self.memory.query.get(), QueryState::Querying { .. })
    }

    /// 开始尺寸查询。
    ///
    /// 查询期间例程只记录需要的设备存储大小，不分配存储也不计算。
    pub fn start_device_memory_size_query(&self) -> Result<(), BlasError> {
        if self.is_device_memory_size_query() {
            return Err(size_query_mismatch("size query already started"));
        }
        self.memory
            .query
            .set(QueryState::Querying { required: 0 });
        Ok(())
    }

    /// 结束尺寸查询，返回查询期间记录的最大需求。
    pub fn stop_device_memory_size_query(&self) -> Result<usize, BlasError> {
        match self.memory.query.replace(QueryState::Idle) {
            QueryState::Querying { required } => Ok(required),
            QueryState::Idle => Err(size_query_mismatch("size query not started")),
        }
    }

    /// 记录一次调用需要的设备存储，各项分别取整后求和。
    ///
    /// 返回 [`Status::SizeIncreased`] 或 [`Status::SizeUnchanged`]。
    pub fn set_optimal_device_memory_size(&self, sizes: &[usize]) -> Result<Status, BlasError> {
        let QueryState::Querying { required } = self.memory.query.get() else {
            return Err(internal_error(
                "optimal device memory size set while not querying",
            ));
        };
        let total = total_size(sizes).unwrap_or(usize::MAX);
        if total > required {
            self.memory
                .query
                .set(QueryState::Querying { required: total });
            Ok(Status::SizeIncreased)
        } else {
            Ok(Status::SizeUnchanged)
        }
    }

    #[inline]
    pub fn device_memory_size(&self) -> usize {
        self.memory.size.get()
    }

    /// 设置设备存储大小。
    ///
    /// 0 表示由库管理并按需增长，非零值取整后立即分配，之后不再增长。
    pub fn set_device_memory_size(&self, size: usize) -> Result<(), BlasError> {
        if self.memory.in_use.get() {
            return Err(internal_error(
                "device memory size changed while it is in use",
            ));
        }
        self.memory.clear(&self.hardware);
        if size == 0 {
            self.memory.ownership.set(Ownership::Managed);
            Ok(())
        } else {
            self.memory.ownership.set(Ownership::Fixed);
            self.memory.alloc_fixed(&self.hardware, size)
        }
    }

    /// 使用调用者提供的存储作为设备存储。
    ///
    /// 空指针或 0 大小表示归还给库管理。
    /// 起始地址向上对齐到 [`MIN_CHUNK_SIZE`]，
    /// 头部的填充和不足一个分配粒度的尾部不会被使用，剩余部分为空时同样归还给库管理。
    ///
    /// # Safety
    ///
    /// `addr` 指向至少 `size` 字节的设备存储，并在句柄使用它期间保持有效。
    pub unsafe fn set_workspace(&self, addr: MutPtr<H>, size: usize) -> Result<(), BlasError> {
        if self.memory.in_use.get() {
            return Err(internal_error("workspace changed while it is in use"));
        }
        self.memory.clear(&self.hardware);
        let pad = (addr as usize).wrapping_neg() % MIN_CHUNK_SIZE;
        let size = size.saturating_sub(pad) / MIN_CHUNK_SIZE * MIN_CHUNK_SIZE;
        if addr.is_null() || size == 0 {
            self.memory.ownership.set(Ownership::Managed);
        } else {
            if pad != 0 {
                debug!("workspace {addr:p} aligned up by {pad} bytes");
            }
            self.memory.ownership.set(Ownership::User);
            self.memory.base.set(addr.wrapping_add(pad));
            self.memory.size.set(size);
        }
        Ok(())
    }

    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.memory.ownership.get()
    }

    /// 设备存储是否由库管理并可以按需增长。
    #[inline]
    pub fn is_managing_device_memory(&self) -> bool {
        self.ownership() == Ownership::Managed
    }

    /// 是否有一个分配正在使用设备存储。
    #[inline]
    pub fn is_device_memory_in_use(&self) -> bool {
        self.memory.in_use.get()
    }

    /// 从设备存储上切分出多块临时存储。
    ///
    /// 同一时间每个句柄只能有一个存活的分配。
    #[inline]
    pub fn device_malloc<const N: usize>(&self, sizes: [usize; N]) -> DeviceMalloc<'_, H, N> {
        DeviceMalloc::new(self, sizes)
    }

    /// 占用当前全部设备存储作为 GSU 工作空间。
    #[inline]
    pub fn gsu_malloc(&self) -> GsuMalloc<'_, H> {
        GsuMalloc::new(self)
    }
}
