//! result := x . y

mod common_cpu;

use crate::{
    common_cpu::{reduce_workspace_size, Cpu},
    logging::{Ptr, RoutineLogger},
    memory_error,
    numerics::check_numerics_vector,
    utils::non_null,
    BlasError, BlasScalar, Handle, Status,
};

/// 点积需要的部分和存储。
#[inline]
pub fn workspace_size(n: i32) -> usize {
    if n <= 0 {
        0
    } else {
        reduce_workspace_size(n as usize)
    }
}

pub fn dot<T: BlasScalar>(
    handle: &Handle<Cpu>,
    n: i32,
    x: *const T,
    incx: i32,
    y: *const T,
    incy: i32,
    result: *mut T,
) -> Result<Status, BlasError> {
    let size = workspace_size(n);
    if handle.is_device_memory_size_query() {
        return if size == 0 {
            Ok(Status::SizeUnchanged)
        } else {
            handle.set_optimal_device_memory_size(&[size])
        };
    }

    let log = RoutineLogger::new::<T>(handle, "dot");
    log.trace(&[&n, &Ptr(x), &incx, &Ptr(y), &incy]);
    log.bench(&[("-n", &n), ("--incx", &incx), ("--incy", &incy)]);
    log.profile(&[("N", &n), ("incx", &incx), ("incy", &incy)]);

    non_null("result", result)?;
    if n <= 0 {
        unsafe { result.write(T::ZERO) };
        return Ok(Status::Success);
    }
    non_null("x", x)?;
    non_null("y", y)?;

    let n = n as usize;
    let (incx, incy) = (incx as isize, incy as isize);
    check_numerics_vector(handle, log.name(), "x", n, x, incx, true)?;
    check_numerics_vector(handle, log.name(), "y", n, y, incy, true)?;

    let mem = handle.device_malloc([size]);
    if !mem.is_ok() {
        return Err(memory_error(format!(
            "{} needs {size} bytes of device memory",
            log.name()
        )));
    }
    common_cpu::dot(handle, n, x, incx, y, incy, result, mem.ptr_as(0));
    check_numerics_vector(handle, log.name(), "result", 1, result.cast_const(), 1, false)?;
    Ok(Status::Success)
}
