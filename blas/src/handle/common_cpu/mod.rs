use crate::{invalid_pointer, AtomicsMode, BlasError, BlasScalar, Blob, Handle, Hardware};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::{ffi::c_void, ptr::null_mut};

/// 以主存为设备存储、在调用线程上同步执行的硬件。
#[derive(Clone, Copy, Default, Debug)]
pub struct Cpu;

/// 任务队列标识，空指针表示默认队列。
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Stream(pub *mut c_void);

impl Default for Stream {
    #[inline]
    fn default() -> Self {
        Self(null_mut())
    }
}

impl Hardware for Cpu {
    type Byte = u8;
    type Queue = Stream;
    type DevMem = Blob;

    #[inline]
    fn malloc(&self, size: usize) -> Option<Blob> {
        Blob::new(size)
    }
    #[inline]
    fn free(&self, mem: Blob) {
        drop(mem)
    }
}

/// 读出 alpha 和 beta 的值。
///
/// 主存即设备存储，两种指针模式下都可以直接读取。
pub(crate) fn copy_alpha_beta_to_host_if_on_device<T: BlasScalar>(
    _handle: &Handle<Cpu>,
    alpha: *const T,
    beta: *const T,
) -> Result<(T, T), BlasError> {
    if alpha.is_null() || beta.is_null() {
        return Err(invalid_pointer("alpha or beta is null"));
    }
    Ok(unsafe { (alpha.read(), beta.read()) })
}

/// 归约内核每块处理的元素数。
pub(crate) const REDUCE_BLOCK: usize = 512;

/// 归约 `n` 个元素需要的部分和存储。
#[inline]
pub(crate) const fn reduce_workspace_size(n: usize) -> usize {
    n.div_ceil(REDUCE_BLOCK) * std::mem::size_of::<f64>()
}

/// 分块归约。
///
/// 每块的部分和写入 `partials`，再汇总为结果。
/// 允许原子操作时各块和汇总都并行进行，否则按固定顺序串行，结果可复现。
///
/// # Safety
///
/// `partials` 至少容纳 `n.div_ceil(REDUCE_BLOCK)` 个 `f64`。
pub(crate) unsafe fn block_reduce(
    handle: &Handle<Cpu>,
    n: usize,
    partials: *mut f64,
    f: impl Fn(usize) -> f64 + Sync,
) -> f64 {
    let blocks = n.div_ceil(REDUCE_BLOCK);
    let partials = partials as usize;
    let block = |b: usize| {
        let end = usize::min(n, (b + 1) * REDUCE_BLOCK);
        let sum = (b * REDUCE_BLOCK..end).map(&f).sum::<f64>();
        unsafe { (partials as *mut f64).add(b).write(sum) }
    };
    let mode = handle.atomics_mode();
    match mode {
        AtomicsMode::Allowed => (0..blocks).into_par_iter().for_each(block),
        AtomicsMode::NotAllowed => (0..blocks).for_each(block),
    }
    let partials = std::slice::from_raw_parts(partials as *const f64, blocks);
    match mode {
        AtomicsMode::Allowed => partials.into_par_iter().sum(),
        AtomicsMode::NotAllowed => partials.iter().sum(),
    }
}

#[cfg(test)]
mod test {
    use super::{block_reduce, reduce_workspace_size, Cpu, REDUCE_BLOCK};
    use crate::{AtomicsMode, Config, Handle};

    #[test]
    fn test_block_reduce() {
        let handle = Handle::new(Cpu, Config::default()).unwrap();
        for n in [1, REDUCE_BLOCK, 3 * REDUCE_BLOCK + 7] {
            let mut partials = vec![0.; reduce_workspace_size(n) / 8];
            let expected = (n * (n - 1) / 2) as f64;
            for mode in [AtomicsMode::Allowed, AtomicsMode::NotAllowed] {
                handle.set_atomics_mode(mode);
                let sum = unsafe { block_reduce(&handle, n, partials.as_mut_ptr(), |i| i as f64) };
                assert_eq!(sum, expected);
            }
        }
    }
}
