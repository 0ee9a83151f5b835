use crate::{utils::shift, BlasScalar, Operation};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// 每个输出元素由一个任务计算，beta 为 0 时不读取 y。
#[allow(clippy::too_many_arguments)]
pub(super) fn gemv<T: BlasScalar>(
    trans: Operation,
    m: usize,
    n: usize,
    alpha: T,
    a: *const T,
    lda: usize,
    x: *const T,
    incx: isize,
    beta: T,
    y: *mut T,
    incy: isize,
) {
    let (rows, cols) = if trans.is_trans() { (n, m) } else { (m, n) };
    // 按行和列的步长访问 op(A)
    let (rs, cs) = if trans.is_trans() {
        (lda as isize, 1)
    } else {
        (1, lda as isize)
    };
    let a = a as isize;
    let x = x.wrapping_offset(shift(cols, incx)) as isize;
    let y = y.wrapping_offset(shift(rows, incy)) as isize;
    let (alpha, beta) = (alpha.to_f64(), beta.to_f64());

    (0..rows as isize).into_par_iter().for_each(|i| {
        let sum = if alpha == 0. {
            0.
        } else {
            (0..cols as isize)
                .map(|j| unsafe {
                    let aij = (a as *const T).offset(i * rs + j * cs).read().to_f64();
                    let xj = (x as *const T).offset(j * incx).read().to_f64();
                    aij * xj
                })
                .sum::<f64>()
        };
        let y = (y as *mut T).wrapping_offset(i * incy);
        let val = if beta == 0. {
            alpha * sum
        } else {
            alpha * sum + beta * unsafe { y.read() }.to_f64()
        };
        unsafe { y.write(T::from_f64(val)) }
    });
}
