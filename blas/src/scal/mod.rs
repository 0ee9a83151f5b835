//! x := alpha * x

mod common_cpu;

use crate::{
    common_cpu::Cpu,
    logging::{Ptr, RoutineLogger, Scalar},
    numerics::check_numerics_vector,
    return_zero_device_memory_size_if_queried,
    utils::non_null,
    BlasError, BlasScalar, Handle, Status,
};

pub fn scal<T: BlasScalar>(
    handle: &Handle<Cpu>,
    n: i32,
    alpha: *const T,
    x: *mut T,
    incx: i32,
) -> Result<Status, BlasError> {
    return_zero_device_memory_size_if_queried!(handle);

    let log = RoutineLogger::new::<T>(handle, "scal");
    let mode = handle.pointer_mode();
    log.trace(&[&n, &Scalar(mode, alpha), &Ptr(x.cast_const()), &incx]);
    log.bench(&[("-n", &n), ("--alpha", &Scalar(mode, alpha)), ("--incx", &incx)]);
    log.profile(&[("N", &n), ("incx", &incx)]);

    if n <= 0 || incx <= 0 {
        return Ok(Status::Success);
    }
    non_null("alpha", alpha)?;
    non_null("x", x)?;

    let n = n as usize;
    let incx = incx as isize;
    check_numerics_vector(handle, log.name(), "x", n, x.cast_const(), incx, true)?;
    let alpha = unsafe { alpha.read() };
    common_cpu::scal(n, alpha, x, incx);
    check_numerics_vector(handle, log.name(), "x", n, x.cast_const(), incx, false)?;
    Ok(Status::Success)
}
