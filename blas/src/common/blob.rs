use crate::MIN_CHUNK_SIZE;
use std::{
    alloc::{alloc, dealloc, Layout},
    ops::{Deref, DerefMut},
    ptr::NonNull,
    slice::{from_raw_parts, from_raw_parts_mut},
};

/// 按 [`MIN_CHUNK_SIZE`] 对齐的主存储块。
pub struct Blob {
    ptr: NonNull<u8>,
    len: usize,
}

#[repr(C, align(64))]
struct Chunk([u8; MIN_CHUNK_SIZE]);

const _: () = assert!(std::mem::align_of::<Chunk>() == MIN_CHUNK_SIZE);

impl Blob {
    /// 分配 `size` 字节，空间不足时返回 `None`。
    pub fn new(size: usize) -> Option<Self> {
        if size == 0 {
            return Some(Self {
                ptr: NonNull::<Chunk>::dangling().cast(),
                len: 0,
            });
        }
        let layout = Layout::from_size_align(size, MIN_CHUNK_SIZE).ok()?;
        NonNull::new(unsafe { alloc(layout) }).map(|ptr| Self { ptr, len: size })
    }
}

impl Drop for Blob {
    #[inline]
    fn drop(&mut self) {
        let &mut Blob { ptr, len } = self;
        if len != 0 {
            unsafe { dealloc(ptr.as_ptr(), layout(len)) }
        }
    }
}

#[inline(always)]
const fn layout(size: usize) -> Layout {
    unsafe { Layout::from_size_align_unchecked(size, MIN_CHUNK_SIZE) }
}

impl Deref for Blob {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        unsafe { from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for Blob {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

#[test]
fn test_blob_alignment() {
    for size in [0, 1, 63, 64, 100, 4096] {
        let mut blob = Blob::new(size).unwrap();
        assert_eq!(blob.len(), size);
        assert_eq!(blob.as_mut_ptr() as usize % MIN_CHUNK_SIZE, 0);
    }
    assert!(Blob::new(usize::MAX).is_none());
}
