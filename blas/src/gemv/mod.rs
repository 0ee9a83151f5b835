//! y := alpha * op(A) * x + beta * y

mod common_cpu;

use crate::{
    common_cpu::{copy_alpha_beta_to_host_if_on_device, Cpu},
    invalid_size,
    logging::{Ptr, RoutineLogger, Scalar},
    not_implemented,
    numerics::{check_numerics_matrix, check_numerics_vector},
    return_zero_device_memory_size_if_queried,
    utils::non_null,
    BlasError, BlasScalar, Handle, Operation, PointerMode, Status,
};
use digit_layout::types as ty;

/// 列主序矩阵向量乘。
#[allow(clippy::too_many_arguments)]
pub fn gemv<T: BlasScalar>(
    handle: &Handle<Cpu>,
    trans: Operation,
    m: i32,
    n: i32,
    alpha: *const T,
    a: *const T,
    lda: i32,
    x: *const T,
    incx: i32,
    beta: *const T,
    y: *mut T,
    incy: i32,
) -> Result<Status, BlasError> {
    if !matches!(T::DT, ty::F32 | ty::F64) {
        return Err(not_implemented(format!("gemv for {}", T::DT)));
    }
    return_zero_device_memory_size_if_queried!(handle);

    let log = RoutineLogger::new::<T>(handle, "gemv");
    let mode = handle.pointer_mode();
    let t = trans.letter();
    log.trace(&[
        &t,
        &m,
        &n,
        &Scalar(mode, alpha),
        &Ptr(a),
        &lda,
        &Ptr(x),
        &incx,
        &Scalar(mode, beta),
        &Ptr(y.cast_const()),
        &incy,
    ]);
    log.bench(&[
        ("--transposeA", &t),
        ("-m", &m),
        ("-n", &n),
        ("--alpha", &Scalar(mode, alpha)),
        ("--lda", &lda),
        ("--incx", &incx),
        ("--beta", &Scalar(mode, beta)),
        ("--incy", &incy),
    ]);
    log.profile(&[
        ("transA", &t),
        ("M", &m),
        ("N", &n),
        ("lda", &lda),
        ("incx", &incx),
        ("incy", &incy),
    ]);

    if m < 0 || n < 0 || lda < m.max(1) || incx == 0 || incy == 0 {
        return Err(invalid_size(format!(
            "m = {m}, n = {n}, lda = {lda}, incx = {incx}, incy = {incy}"
        )));
    }
    if m == 0 || n == 0 {
        return Ok(Status::Success);
    }

    let (alpha, beta) = copy_alpha_beta_to_host_if_on_device(handle, alpha, beta)?;
    let _host = handle.push_pointer_mode(PointerMode::Host);
    if alpha == T::ZERO && beta == T::ONE {
        return Ok(Status::Success);
    }
    if alpha != T::ZERO {
        non_null("A", a)?;
        non_null("x", x)?;
    }
    non_null("y", y)?;

    let (m, n, lda) = (m as usize, n as usize, lda as usize);
    let (incx, incy) = (incx as isize, incy as isize);
    let (xlen, ylen) = if trans.is_trans() { (m, n) } else { (n, m) };
    if alpha != T::ZERO {
        check_numerics_matrix(handle, log.name(), "A", m, n, a, lda, true)?;
        check_numerics_vector(handle, log.name(), "x", xlen, x, incx, true)?;
    }
    if beta != T::ZERO {
        check_numerics_vector(handle, log.name(), "y", ylen, y.cast_const(), incy, true)?;
    }

    common_cpu::gemv(trans, m, n, alpha, a, lda, x, incx, beta, y, incy);

    check_numerics_vector(handle, log.name(), "y", ylen, y.cast_const(), incy, false)?;
    Ok(Status::Success)
}

#[cfg(test)]
mod test {
    use super::gemv;
    use crate::{
        common_cpu::Cpu, test_utils::compare, Config, ErrorKind, Handle, Operation, PointerMode,
        Status,
    };
    use rand::Rng;
    use std::ptr::null;

    fn reference(
        trans: Operation,
        m: usize,
        n: usize,
        alpha: f64,
        a: &[f64],
        lda: usize,
        x: &[f64],
        beta: f64,
        y: &[f64],
    ) -> Vec<f64> {
        let (rows, cols) = if trans.is_trans() { (n, m) } else { (m, n) };
        (0..rows)
            .map(|i| {
                let sum = (0..cols)
                    .map(|j| {
                        let aij = if trans.is_trans() {
                            a[i * lda + j]
                        } else {
                            a[j * lda + i]
                        };
                        aij * x[j]
                    })
                    .sum::<f64>();
                alpha * sum + beta * y[i]
            })
            .collect()
    }

    #[test]
    fn test_compute() {
        let handle = Handle::new(Cpu, Config::default()).unwrap();
        let mut rng = rand::thread_rng();
        let (m, n, lda) = (37, 23, 40);
        let a = (0..lda * n).map(|_| rng.gen_range(-1.0..1.0)).collect::<Vec<f64>>();
        for trans in [Operation::None, Operation::Transpose] {
            let (xlen, ylen) = if trans.is_trans() { (m, n) } else { (n, m) };
            let x = (0..xlen).map(|_| rng.gen_range(-1.0..1.0)).collect::<Vec<f64>>();
            let y0 = (0..ylen).map(|_| rng.gen_range(-1.0..1.0)).collect::<Vec<f64>>();
            let ans = reference(trans, m, n, 1.5, &a, lda, &x, -0.5, &y0);

            let mut y = y0.clone();
            let status = gemv(
                &handle,
                trans,
                m as _,
                n as _,
                &1.5,
                a.as_ptr(),
                lda as _,
                x.as_ptr(),
                1,
                &-0.5,
                y.as_mut_ptr(),
                1,
            )
            .unwrap();
            assert_eq!(status, Status::Success);
            assert_eq!(compare(ans, y, 1e-12, 1e-12), 0);
        }
    }

    #[test]
    fn test_pointer_mode_restored() {
        let handle = Handle::new(Cpu, Config::default()).unwrap();
        handle.set_pointer_mode(PointerMode::Device);
        let a = [1.0f32, 2., 3., 4.];
        let x = [1.0f32, 1.];
        let mut y = [f32::NAN; 2];
        gemv(
            &handle,
            Operation::None,
            2,
            2,
            &1.,
            a.as_ptr(),
            2,
            x.as_ptr(),
            1,
            &0.,
            y.as_mut_ptr(),
            1,
        )
        .unwrap();
        assert_eq!(y, [4., 6.]);
        assert_eq!(handle.pointer_mode(), PointerMode::Device);

        // 出错返回时同样恢复
        let e = gemv::<f32>(
            &handle,
            Operation::None,
            2,
            2,
            &1.,
            null(),
            2,
            x.as_ptr(),
            1,
            &0.,
            y.as_mut_ptr(),
            1,
        )
        .unwrap_err();
        assert_eq!(e.kind, ErrorKind::InvalidPointer);
        assert_eq!(handle.pointer_mode(), PointerMode::Device);
    }

    #[test]
    fn test_invalid_size() {
        let handle = Handle::new(Cpu, Config::default()).unwrap();
        let mut y = [0.0f64; 4];
        let e = gemv::<f64>(
            &handle,
            Operation::None,
            4,
            4,
            &1.,
            null(),
            3,
            null(),
            1,
            &0.,
            y.as_mut_ptr(),
            1,
        )
        .unwrap_err();
        assert_eq!(e.kind, ErrorKind::InvalidSize);
        let status = gemv::<f64>(
            &handle,
            Operation::None,
            0,
            4,
            null(),
            null(),
            1,
            null(),
            1,
            null(),
            y.as_mut_ptr(),
            1,
        )
        .unwrap();
        assert_eq!(status, Status::Success);
    }
}
