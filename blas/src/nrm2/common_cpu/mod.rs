use crate::{
    common_cpu::{block_reduce, Cpu},
    BlasScalar, Handle,
};

pub(super) fn nrm2<T: BlasScalar>(
    handle: &Handle<Cpu>,
    n: usize,
    x: *const T,
    incx: isize,
    result: *mut T,
    partials: *mut f64,
) {
    let x = x as isize;
    let sum = unsafe {
        block_reduce(handle, n, partials, |i| {
            let x = (x as *const T).offset(i as isize * incx).read().to_f64();
            x * x
        })
    };
    unsafe { result.write(T::from_f64(sum.sqrt())) }
}
