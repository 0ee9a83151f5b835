use super::{memory::MIN_CHUNK_SIZE, Handle};
use crate::{Hardware, MutPtr};
use log::error;
use std::{ops::Range, ptr::null_mut};

/// 从句柄的设备存储上切分出的一组临时存储。
///
/// 各块大小向上取整到 [`MIN_CHUNK_SIZE`] 后依次排列，偏移都是 [`MIN_CHUNK_SIZE`] 的整数倍。
/// 大小为 0 的块对应空指针。总大小为 0 时不占用设备存储，直接成功。
///
/// 存活期间句柄的设备存储处于使用中，析构时解除。
/// 分配失败时所有指针为空，句柄的设备存储不变。
#[must_use]
pub struct DeviceMalloc<'a, H: Hardware, const N: usize> {
    handle: &'a Handle<H>,
    success: bool,
    guarded: bool,
    total: usize,
    base: MutPtr<H>,
    offsets: [usize; N],
    sizes: [usize; N],
}

impl<'a, H: Hardware, const N: usize> DeviceMalloc<'a, H, N> {
    pub(super) fn new(handle: &'a Handle<H>, sizes: [usize; N]) -> Self {
        let mut ans = Self {
            handle,
            success: false,
            guarded: false,
            total: 0,
            base: null_mut(),
            offsets: [0; N],
            sizes,
        };

        for (offset, &size) in ans.offsets.iter_mut().zip(&sizes) {
            *offset = ans.total;
            let Some(total) = size
                .checked_next_multiple_of(MIN_CHUNK_SIZE)
                .and_then(|size| ans.total.checked_add(size))
            else {
                error!("device memory request {sizes:?} overflows");
                return ans;
            };
            ans.total = total;
        }

        if ans.total == 0 {
            ans.success = true;
            return ans;
        }

        if let Some(base) = handle.memory.acquire(&handle.hardware, ans.total) {
            ans.base = base;
            ans.success = true;
            ans.guarded = true;
        }
        ans
    }

    /// 分配是否成功。
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.success
    }

    /// 所有块取整后的总大小。
    #[inline]
    pub fn total_size(&self) -> usize {
        self.total
    }

    /// 第 `i` 块在设备存储中的字节范围，失败或大小为 0 时为 `None`。
    pub fn slot(&self, i: usize) -> Option<Range<usize>> {
        if self.base.is_null() || self.sizes[i] == 0 {
            None
        } else {
            let start = self.offsets[i];
            Some(start..start + self.sizes[i])
        }
    }

    /// 第 `i` 块的基址。
    pub fn ptr(&self, i: usize) -> MutPtr<H> {
        match self.slot(i) {
            // SAFETY: 偏移不超过已占用的设备存储
            Some(range) => unsafe { self.base.add(range.start) },
            None => null_mut(),
        }
    }

    /// 第 `i` 块按 `T` 解释的基址。
    ///
    /// 块基址按 [`MIN_CHUNK_SIZE`] 对齐，满足所有基本数值类型的对齐要求。
    #[inline]
    pub fn ptr_as<T>(&self, i: usize) -> *mut T {
        const { assert!(std::mem::align_of::<T>() <= MIN_CHUNK_SIZE) };
        self.ptr(i).cast()
    }

    /// 所有块的基址。
    pub fn ptrs(&self) -> [MutPtr<H>; N] {
        std::array::from_fn(|i| self.ptr(i))
    }
}

impl<H: Hardware> DeviceMalloc<'_, H, 1> {
    #[inline]
    pub fn as_ptr(&self) -> MutPtr<H> {
        self.ptr(0)
    }
}

impl<H: Hardware, const N: usize> Drop for DeviceMalloc<'_, H, N> {
    fn drop(&mut self) {
        if self.guarded {
            self.handle.memory.release()
        }
    }
}

/// 占用句柄当前全部设备存储的 GSU 工作空间。
///
/// 存活期间工作空间的基址和大小挂在句柄上，由后端直接读取，析构时清空。
#[must_use]
pub struct GsuMalloc<'a, H: Hardware>(DeviceMalloc<'a, H, 1>);

impl<'a, H: Hardware> GsuMalloc<'a, H> {
    pub(super) fn new(handle: &'a Handle<H>) -> Self {
        let mem = DeviceMalloc::new(handle, [handle.device_memory_size()]);
        let size = if mem.is_ok() { mem.total_size() } else { 0 };
        handle.gsu_workspace.set(mem.as_ptr());
        handle.gsu_workspace_size.set(size);
        Self(mem)
    }
}

impl<'a, H: Hardware> std::ops::Deref for GsuMalloc<'a, H> {
    type Target = DeviceMalloc<'a, H, 1>;
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<H: Hardware> Drop for GsuMalloc<'_, H> {
    fn drop(&mut self) {
        let handle = self.0.handle;
        handle.gsu_workspace.set(null_mut());
        handle.gsu_workspace_size.set(0);
    }
}
