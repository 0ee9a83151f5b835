//! C 接口。
//!
//! 所有函数返回 [`Status`]，错误和 panic 都不会越过边界。
//! 句柄为空时返回 [`Status::InvalidHandle`]，输出指针为空时返回 [`Status::InvalidPointer`]，
//! 枚举参数无法识别时返回 [`Status::InvalidValue`]。

use crate::{
    common_cpu::{Cpu, Stream},
    dot::dot,
    gemm::gemm,
    gemv::gemv,
    invalid_handle, invalid_pointer, invalid_value,
    nrm2::nrm2,
    scal::scal,
    AtomicsMode, BlasError, CheckNumerics, Config, Handle, LayerMode, Operation, PointerMode,
    Status,
};
use half::f16;
use log::{debug, error};
use std::{
    ffi::c_void,
    panic::{catch_unwind, AssertUnwindSafe},
    slice::from_raw_parts,
};

pub type BlasHandle = *mut Handle<Cpu>;

fn guard(f: impl FnOnce() -> Result<Status, BlasError>) -> Status {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            debug!("{e}");
            e.into()
        }
        Err(_) => {
            error!("panic caught at C boundary");
            Status::InternalError
        }
    }
}

unsafe fn handle<'a>(handle: BlasHandle) -> Result<&'a Handle<Cpu>, BlasError> {
    handle.as_ref().ok_or_else(|| invalid_handle("handle is null"))
}

unsafe fn out<'a, T>(ptr: *mut T) -> Result<&'a mut T, BlasError> {
    ptr.as_mut().ok_or_else(|| invalid_pointer("output is null"))
}

fn enum_arg<T: TryFrom<u32, Error = u32>>(name: &str, val: u32) -> Result<T, BlasError> {
    T::try_from(val).map_err(|val| invalid_value(format!("{name} = {val}")))
}

/// 创建句柄，配置从环境变量读取。
///
/// # Safety
///
/// `handle` 为空或指向可写的句柄位置。
#[no_mangle]
pub unsafe extern "C" fn blas_create_handle(handle: *mut BlasHandle) -> Status {
    guard(|| {
        let out = out(handle)?;
        let new = Handle::new(Cpu, Config::from_env())?;
        *out = Box::into_raw(Box::new(new));
        Ok(Status::Success)
    })
}

/// # Safety
///
/// `handle` 由 [`blas_create_handle`] 创建且未被销毁。
#[no_mangle]
pub unsafe extern "C" fn blas_destroy_handle(handle: BlasHandle) -> Status {
    guard(|| {
        if handle.is_null() {
            return Err(invalid_handle("handle is null"));
        }
        drop(Box::from_raw(handle));
        Ok(Status::Success)
    })
}

macro_rules! getter {
    ($name:ident: $ty:ty = |$h:ident| $get:expr) => {
        /// # Safety
        ///
        /// `handle` 为空或有效；`out` 为空或可写。
        #[no_mangle]
        pub unsafe extern "C" fn $name(handle: BlasHandle, out: *mut $ty) -> Status {
            guard(|| {
                let $h = self::handle(handle)?;
                *self::out(out)? = $get;
                Ok(Status::Success)
            })
        }
    };
}

macro_rules! setter {
    ($name:ident: $ty:ty = |$h:ident, $v:ident| $set:expr) => {
        /// # Safety
        ///
        /// `handle` 为空或有效。
        #[no_mangle]
        pub unsafe extern "C" fn $name(handle: BlasHandle, $v: $ty) -> Status {
            guard(|| {
                let $h = self::handle(handle)?;
                $set;
                Ok(Status::Success)
            })
        }
    };
}

getter!(blas_get_stream: *mut c_void = |h| h.stream().0);
setter!(blas_set_stream: *mut c_void = |h, stream| h.set_stream(Stream(stream)));

getter!(blas_get_pointer_mode: u32 = |h| h.pointer_mode() as u32);
setter!(blas_set_pointer_mode: u32 = |h, mode| {
    h.set_pointer_mode(enum_arg::<PointerMode>("pointer mode", mode)?)
});

getter!(blas_get_atomics_mode: u32 = |h| h.atomics_mode() as u32);
setter!(blas_set_atomics_mode: u32 = |h, mode| {
    h.set_atomics_mode(enum_arg::<AtomicsMode>("atomics mode", mode)?)
});

getter!(blas_get_any_order: bool = |h| h.any_order());
setter!(blas_set_any_order: bool = |h, any_order| h.set_any_order(any_order));

getter!(blas_get_layer_mode: u32 = |h| h.layer_mode().bits());
setter!(blas_set_layer_mode: u32 = |h, bits| {
    h.set_layer_mode(LayerMode::from_bits_truncate(bits))
});

getter!(blas_get_check_numerics: u32 = |h| h.check_numerics().bits());
setter!(blas_set_check_numerics: u32 = |h, bits| {
    h.set_check_numerics(CheckNumerics::from_bits_truncate(bits))
});

setter!(blas_set_device_memory_size: usize = |h, size| h.set_device_memory_size(size)?);
getter!(blas_get_device_memory_size: usize = |h| h.device_memory_size());

/// 使用调用者提供的设备存储，空指针或 0 大小表示归还给库管理。
///
/// # Safety
///
/// `addr` 指向至少 `size` 字节的存储，在句柄使用它期间保持有效。
#[no_mangle]
pub unsafe extern "C" fn blas_set_workspace(
    handle: BlasHandle,
    addr: *mut c_void,
    size: usize,
) -> Status {
    guard(|| {
        self::handle(handle)?.set_workspace(addr.cast(), size)?;
        Ok(Status::Success)
    })
}

/// # Safety
///
/// `handle` 为空或有效。
#[no_mangle]
pub unsafe extern "C" fn blas_is_managing_device_memory(handle: BlasHandle) -> bool {
    handle.as_ref().is_some_and(Handle::is_managing_device_memory)
}

/// # Safety
///
/// `handle` 为空或有效。
#[no_mangle]
pub unsafe extern "C" fn blas_is_device_memory_size_query(handle: BlasHandle) -> bool {
    handle.as_ref().is_some_and(Handle::is_device_memory_size_query)
}

/// # Safety
///
/// `handle` 为空或有效。
#[no_mangle]
pub unsafe extern "C" fn blas_start_device_memory_size_query(handle: BlasHandle) -> Status {
    guard(|| {
        self::handle(handle)?.start_device_memory_size_query()?;
        Ok(Status::Success)
    })
}

/// # Safety
///
/// `handle` 为空或有效；`size` 为空或可写。
#[no_mangle]
pub unsafe extern "C" fn blas_stop_device_memory_size_query(
    handle: BlasHandle,
    size: *mut usize,
) -> Status {
    guard(|| {
        let handle = self::handle(handle)?;
        let out = out(size)?;
        *out = handle.stop_device_memory_size_query()?;
        Ok(Status::Success)
    })
}

/// 记录一次调用需要的 `count` 块设备存储。
///
/// # Safety
///
/// `handle` 为空或有效；`count` 非零时 `sizes` 指向 `count` 个元素。
#[no_mangle]
pub unsafe extern "C" fn blas_set_optimal_device_memory_size(
    handle: BlasHandle,
    count: usize,
    sizes: *const usize,
) -> Status {
    guard(|| {
        let handle = self::handle(handle)?;
        let sizes = match count {
            0 => &[][..],
            _ if sizes.is_null() => return Err(invalid_pointer("sizes is null")),
            _ => from_raw_parts(sizes, count),
        };
        handle.set_optimal_device_memory_size(sizes)
    })
}

macro_rules! scal {
    ($name:ident: $ty:ty) => {
        /// # Safety
        ///
        /// 参数遵循 BLAS 约定。
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            handle: BlasHandle,
            n: i32,
            alpha: *const $ty,
            x: *mut $ty,
            incx: i32,
        ) -> Status {
            guard(|| scal(self::handle(handle)?, n, alpha, x, incx))
        }
    };
}

scal!(blas_hscal: f16);
scal!(blas_sscal: f32);
scal!(blas_dscal: f64);

macro_rules! dot {
    ($name:ident: $ty:ty) => {
        /// # Safety
        ///
        /// 参数遵循 BLAS 约定。
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            handle: BlasHandle,
            n: i32,
            x: *const $ty,
            incx: i32,
            y: *const $ty,
            incy: i32,
            result: *mut $ty,
        ) -> Status {
            guard(|| dot(self::handle(handle)?, n, x, incx, y, incy, result))
        }
    };
}

dot!(blas_hdot: f16);
dot!(blas_sdot: f32);
dot!(blas_ddot: f64);

macro_rules! nrm2 {
    ($name:ident: $ty:ty) => {
        /// # Safety
        ///
        /// 参数遵循 BLAS 约定。
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            handle: BlasHandle,
            n: i32,
            x: *const $ty,
            incx: i32,
            result: *mut $ty,
        ) -> Status {
            guard(|| nrm2(self::handle(handle)?, n, x, incx, result))
        }
    };
}

nrm2!(blas_snrm2: f32);
nrm2!(blas_dnrm2: f64);

macro_rules! gemv {
    ($name:ident: $ty:ty) => {
        /// # Safety
        ///
        /// 参数遵循 BLAS 约定。
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            handle: BlasHandle,
            trans: u32,
            m: i32,
            n: i32,
            alpha: *const $ty,
            a: *const $ty,
            lda: i32,
            x: *const $ty,
            incx: i32,
            beta: *const $ty,
            y: *mut $ty,
            incy: i32,
        ) -> Status {
            guard(|| {
                let handle = self::handle(handle)?;
                let trans = enum_arg::<Operation>("trans", trans)?;
                gemv(handle, trans, m, n, alpha, a, lda, x, incx, beta, y, incy)
            })
        }
    };
}

gemv!(blas_sgemv: f32);
gemv!(blas_dgemv: f64);

macro_rules! gemm {
    ($name:ident: $ty:ty) => {
        /// # Safety
        ///
        /// 参数遵循 BLAS 约定。
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            handle: BlasHandle,
            transa: u32,
            transb: u32,
            m: i32,
            n: i32,
            k: i32,
            alpha: *const $ty,
            a: *const $ty,
            lda: i32,
            b: *const $ty,
            ldb: i32,
            beta: *const $ty,
            c: *mut $ty,
            ldc: i32,
        ) -> Status {
            guard(|| {
                let handle = self::handle(handle)?;
                let transa = enum_arg::<Operation>("transa", transa)?;
                let transb = enum_arg::<Operation>("transb", transb)?;
                gemm(handle, transa, transb, m, n, k, alpha, a, lda, b, ldb, beta, c, ldc)
            })
        }
    };
}

gemm!(blas_hgemm: f16);
gemm!(blas_sgemm: f32);
gemm!(blas_dgemm: f64);
