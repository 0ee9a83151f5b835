use crate::{
    common_cpu::{block_reduce, Cpu},
    utils::shift,
    BlasScalar, Handle,
};

#[allow(clippy::too_many_arguments)]
pub(super) fn dot<T: BlasScalar>(
    handle: &Handle<Cpu>,
    n: usize,
    x: *const T,
    incx: isize,
    y: *const T,
    incy: isize,
    result: *mut T,
    partials: *mut f64,
) {
    let x = x.wrapping_offset(shift(n, incx)) as isize;
    let y = y.wrapping_offset(shift(n, incy)) as isize;
    let sum = unsafe {
        block_reduce(handle, n, partials, |i| {
            let i = i as isize;
            let x = (x as *const T).offset(i * incx).read();
            let y = (y as *const T).offset(i * incy).read();
            x.to_f64() * y.to_f64()
        })
    };
    unsafe { result.write(T::from_f64(sum)) }
}
