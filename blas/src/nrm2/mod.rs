//! result := ||x||₂

mod common_cpu;

use crate::{
    common_cpu::{reduce_workspace_size, Cpu},
    logging::{Ptr, RoutineLogger},
    memory_error, not_implemented,
    numerics::check_numerics_vector,
    utils::non_null,
    BlasError, BlasScalar, Handle, Status,
};
use digit_layout::types as ty;

pub fn nrm2<T: BlasScalar>(
    handle: &Handle<Cpu>,
    n: i32,
    x: *const T,
    incx: i32,
    result: *mut T,
) -> Result<Status, BlasError> {
    if !matches!(T::DT, ty::F32 | ty::F64) {
        return Err(not_implemented(format!("nrm2 for {}", T::DT)));
    }

    let size = if n <= 0 || incx <= 0 {
        0
    } else {
        reduce_workspace_size(n as usize)
    };
    if handle.is_device_memory_size_query() {
        return if size == 0 {
            Ok(Status::SizeUnchanged)
        } else {
            handle.set_optimal_device_memory_size(&[size])
        };
    }

    let log = RoutineLogger::new::<T>(handle, "nrm2");
    log.trace(&[&n, &Ptr(x), &incx]);
    log.bench(&[("-n", &n), ("--incx", &incx)]);
    log.profile(&[("N", &n), ("incx", &incx)]);

    non_null("result", result)?;
    if size == 0 {
        unsafe { result.write(T::ZERO) };
        return Ok(Status::Success);
    }
    non_null("x", x)?;

    let n = n as usize;
    let incx = incx as isize;
    check_numerics_vector(handle, log.name(), "x", n, x, incx, true)?;

    let mem = handle.device_malloc([size]);
    if !mem.is_ok() {
        return Err(memory_error(format!(
            "{} needs {size} bytes of device memory",
            log.name()
        )));
    }
    common_cpu::nrm2(handle, n, x, incx, result, mem.ptr_as(0));
    check_numerics_vector(handle, log.name(), "result", 1, result.cast_const(), 1, false)?;
    Ok(Status::Success)
}
