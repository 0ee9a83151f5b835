use crate::BlasScalar;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

pub(super) fn scal<T: BlasScalar>(n: usize, alpha: T, x: *mut T, incx: isize) {
    let x = x as isize;
    let alpha = alpha.to_f64();
    (0..n as isize).into_par_iter().for_each(|i| {
        let x = (x as *mut T).wrapping_offset(i * incx);
        unsafe { *x = T::from_f64(x.read().to_f64() * alpha) }
    });
}
