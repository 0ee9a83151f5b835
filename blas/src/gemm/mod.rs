//! C := alpha * op(A) * op(B) + beta * C

mod common_cpu;

use crate::{
    common_cpu::{copy_alpha_beta_to_host_if_on_device, Cpu},
    invalid_size,
    logging::{Ptr, RoutineLogger, Scalar},
    numerics::check_numerics_matrix,
    utils::non_null,
    BlasError, BlasScalar, Handle, Operation, PointerMode, Status,
};
use digit_layout::types as ty;

/// 半精度矩阵乘以单精度累加时，A、B、C 的单精度副本需要的存储。
///
/// 溢出时饱和。
pub fn hpa_workspace_size(m: usize, n: usize, k: usize) -> usize {
    let elements = m
        .checked_mul(k)
        .zip(k.checked_mul(n))
        .zip(m.checked_mul(n))
        .and_then(|((a, b), c)| a.checked_add(b)?.checked_add(c));
    elements
        .and_then(|e| e.checked_mul(std::mem::size_of::<f32>()))
        .unwrap_or(usize::MAX)
}

/// 列主序矩阵乘。
///
/// 半精度时占用句柄的全部设备存储作为工作空间，
/// 足够存放单精度副本则以单精度累加，否则直接以半精度计算。
#[allow(clippy::too_many_arguments)]
pub fn gemm<T: BlasScalar>(
    handle: &Handle<Cpu>,
    transa: Operation,
    transb: Operation,
    m: i32,
    n: i32,
    k: i32,
    alpha: *const T,
    a: *const T,
    lda: i32,
    b: *const T,
    ldb: i32,
    beta: *const T,
    c: *mut T,
    ldc: i32,
) -> Result<Status, BlasError> {
    if handle.is_device_memory_size_query() {
        return if T::DT == ty::F16 && m > 0 && n > 0 && k > 0 {
            let size = hpa_workspace_size(m as _, n as _, k as _);
            handle.set_optimal_device_memory_size(&[size])
        } else {
            Ok(Status::SizeUnchanged)
        };
    }

    let log = RoutineLogger::new::<T>(handle, "gemm");
    let mode = handle.pointer_mode();
    let (ta, tb) = (transa.letter(), transb.letter());
    log.trace(&[
        &ta,
        &tb,
        &m,
        &n,
        &k,
        &Scalar(mode, alpha),
        &Ptr(a),
        &lda,
        &Ptr(b),
        &ldb,
        &Scalar(mode, beta),
        &Ptr(c.cast_const()),
        &ldc,
    ]);
    log.bench(&[
        ("--transposeA", &ta),
        ("--transposeB", &tb),
        ("-m", &m),
        ("-n", &n),
        ("-k", &k),
        ("--alpha", &Scalar(mode, alpha)),
        ("--lda", &lda),
        ("--ldb", &ldb),
        ("--beta", &Scalar(mode, beta)),
        ("--ldc", &ldc),
    ]);
    log.profile(&[
        ("transA", &ta),
        ("transB", &tb),
        ("M", &m),
        ("N", &n),
        ("K", &k),
        ("lda", &lda),
        ("ldb", &ldb),
        ("ldc", &ldc),
    ]);

    // op(A) 为 m x k，op(B) 为 k x n
    let (a_rows, a_cols) = if transa.is_trans() { (k, m) } else { (m, k) };
    let (b_rows, b_cols) = if transb.is_trans() { (n, k) } else { (k, n) };
    if m < 0 || n < 0 || k < 0 || lda < a_rows.max(1) || ldb < b_rows.max(1) || ldc < m.max(1) {
        return Err(invalid_size(format!(
            "m = {m}, n = {n}, k = {k}, lda = {lda}, ldb = {ldb}, ldc = {ldc}"
        )));
    }
    if m == 0 || n == 0 {
        return Ok(Status::Success);
    }

    let (alpha, beta) = copy_alpha_beta_to_host_if_on_device(handle, alpha, beta)?;
    let _host = handle.push_pointer_mode(PointerMode::Host);
    let product = k != 0 && alpha != T::ZERO;
    if !product && beta == T::ONE {
        return Ok(Status::Success);
    }
    if product {
        non_null("A", a)?;
        non_null("B", b)?;
    }
    non_null("C", c)?;

    let (m, n, k) = (m as usize, n as usize, k as usize);
    let (lda, ldb, ldc) = (lda as usize, ldb as usize, ldc as usize);
    if product {
        let (ar, ac) = (a_rows as usize, a_cols as usize);
        let (br, bc) = (b_rows as usize, b_cols as usize);
        check_numerics_matrix(handle, log.name(), "A", ar, ac, a, lda, true)?;
        check_numerics_matrix(handle, log.name(), "B", br, bc, b, ldb, true)?;
    }
    if beta != T::ZERO {
        check_numerics_matrix(handle, log.name(), "C", m, n, c.cast_const(), ldc, true)?;
    }

    let args = common_cpu::Args {
        transa,
        transb,
        m,
        n,
        k,
        alpha,
        a,
        lda,
        b,
        ldb,
        beta,
        c,
        ldc,
    };
    if product {
        common_cpu::gemm(handle, args);
    } else {
        common_cpu::scale_c(args);
    }

    check_numerics_matrix(handle, log.name(), "C", m, n, c.cast_const(), ldc, false)?;
    Ok(Status::Success)
}

#[cfg(test)]
mod test {
    use super::{gemm, hpa_workspace_size};
    use crate::{
        common_cpu::Cpu, test_utils::compare, BlasScalar, Config, ErrorKind, Handle, Operation,
        Status,
    };
    use half::f16;
    use rand::Rng;
    use std::ptr::null;

    struct Problem<T> {
        transa: Operation,
        transb: Operation,
        m: usize,
        n: usize,
        k: usize,
        a: Vec<T>,
        lda: usize,
        b: Vec<T>,
        ldb: usize,
        c: Vec<T>,
        ldc: usize,
    }

    impl<T: BlasScalar> Problem<T> {
        /// 元素取小整数，所有精度下结果都精确。
        fn random(transa: Operation, transb: Operation, m: usize, n: usize, k: usize) -> Self {
            let mut rng = rand::thread_rng();
            let mut fill = |len: usize| {
                (0..len)
                    .map(|_| T::from_f64(rng.gen_range(-3..=3) as f64))
                    .collect::<Vec<_>>()
            };
            let (ar, ac) = if transa.is_trans() { (k, m) } else { (m, k) };
            let (br, bc) = if transb.is_trans() { (n, k) } else { (k, n) };
            let (lda, ldb, ldc) = (ar + 1, br + 2, m + 3);
            Self {
                transa,
                transb,
                m,
                n,
                k,
                a: fill(lda * ac),
                lda,
                b: fill(ldb * bc),
                ldb,
                c: fill(ldc * n),
                ldc,
            }
        }

        fn reference(&self, alpha: f64, beta: f64) -> Vec<f64> {
            let opa = |i: usize, l: usize| {
                let idx = if self.transa.is_trans() {
                    l + i * self.lda
                } else {
                    i + l * self.lda
                };
                self.a[idx].to_f64()
            };
            let opb = |l: usize, j: usize| {
                let idx = if self.transb.is_trans() {
                    j + l * self.ldb
                } else {
                    l + j * self.ldb
                };
                self.b[idx].to_f64()
            };
            let mut ans = Vec::with_capacity(self.m * self.n);
            for j in 0..self.n {
                for i in 0..self.m {
                    let sum = (0..self.k).map(|l| opa(i, l) * opb(l, j)).sum::<f64>();
                    ans.push(alpha * sum + beta * self.c[i + j * self.ldc].to_f64());
                }
            }
            ans
        }

        fn run(
            &mut self,
            handle: &Handle<Cpu>,
            alpha: T,
            beta: T,
        ) -> Result<Status, crate::BlasError> {
            gemm(
                handle,
                self.transa,
                self.transb,
                self.m as _,
                self.n as _,
                self.k as _,
                &alpha,
                self.a.as_ptr(),
                self.lda as _,
                self.b.as_ptr(),
                self.ldb as _,
                &beta,
                self.c.as_mut_ptr(),
                self.ldc as _,
            )
        }

        fn result(&self) -> Vec<f64> {
            let mut ans = Vec::with_capacity(self.m * self.n);
            for j in 0..self.n {
                for i in 0..self.m {
                    ans.push(self.c[i + j * self.ldc].to_f64());
                }
            }
            ans
        }
    }

    const OPS: [Operation; 2] = [Operation::None, Operation::Transpose];

    fn check<T: BlasScalar>(handle: &Handle<Cpu>) {
        for transa in OPS {
            for transb in OPS {
                let mut p = Problem::<T>::random(transa, transb, 13, 7, 9);
                let ans = p.reference(2., -1.);
                let status = p.run(handle, T::from_f64(2.), T::from_f64(-1.)).unwrap();
                assert_eq!(status, Status::Success);
                assert_eq!(compare(ans, p.result(), 0., 0.), 0);
            }
        }
    }

    #[test]
    fn test_compute() {
        let handle = Handle::new(Cpu, Config::default()).unwrap();
        check::<f32>(&handle);
        check::<f64>(&handle);
        handle.set_any_order(true);
        check::<f32>(&handle);
        check::<f64>(&handle);
    }

    #[test]
    fn test_f16_paths() {
        let handle = Handle::new(Cpu, Config::default()).unwrap();
        // 没有设备存储，直接以半精度计算
        check::<f16>(&handle);
        assert_eq!(handle.device_memory_size(), 0);

        handle.start_device_memory_size_query().unwrap();
        let mut p = Problem::<f16>::random(Operation::None, Operation::Transpose, 13, 7, 9);
        let status = p.run(&handle, f16::ONE, f16::ZERO).unwrap();
        assert_eq!(status, Status::SizeIncreased);
        let size = handle.stop_device_memory_size_query().unwrap();
        assert!(size >= hpa_workspace_size(13, 7, 9));

        // 存储足够，以单精度累加
        handle.set_device_memory_size(size).unwrap();
        check::<f16>(&handle);
        let (ptr, len) = handle.gsu_workspace();
        assert!(ptr.is_null());
        assert_eq!(len, 0);
        assert!(!handle.is_device_memory_in_use());
    }

    #[test]
    fn test_query_non_f16() {
        let handle = Handle::new(Cpu, Config::default()).unwrap();
        handle.start_device_memory_size_query().unwrap();
        let mut p = Problem::<f32>::random(Operation::None, Operation::None, 4, 4, 4);
        let c = p.c.clone();
        assert_eq!(p.run(&handle, 1., 1.).unwrap(), Status::SizeUnchanged);
        assert_eq!(handle.stop_device_memory_size_query().unwrap(), 0);
        assert_eq!(p.c, c);
    }

    #[test]
    fn test_degenerate() {
        let handle = Handle::new(Cpu, Config::default()).unwrap();
        // k = 0 时 C := beta * C，A 和 B 可以为空
        let mut c = [1.0f64, 2., 3., 4.];
        let status = gemm(
            &handle,
            Operation::None,
            Operation::None,
            2,
            2,
            0,
            &1.,
            null(),
            2,
            null(),
            1,
            &3.,
            c.as_mut_ptr(),
            2,
        )
        .unwrap();
        assert_eq!(status, Status::Success);
        assert_eq!(c, [3., 6., 9., 12.]);

        // beta = 0 时不读取 C
        let mut c = [f64::NAN; 4];
        let a = [1.0f64, 0., 0., 1.];
        gemm(
            &handle,
            Operation::None,
            Operation::None,
            2,
            2,
            2,
            &2.,
            a.as_ptr(),
            2,
            a.as_ptr(),
            2,
            &0.,
            c.as_mut_ptr(),
            2,
        )
        .unwrap();
        assert_eq!(c, [2., 0., 0., 2.]);

        let e = gemm::<f32>(
            &handle,
            Operation::Transpose,
            Operation::None,
            4,
            4,
            8,
            &1.,
            null(),
            4,
            null(),
            8,
            &0.,
            std::ptr::null_mut(),
            4,
        )
        .unwrap_err();
        assert_eq!(e.kind, ErrorKind::InvalidSize);
    }

    #[test]
    fn test_hpa_workspace_size() {
        assert_eq!(hpa_workspace_size(2, 3, 4), 4 * (8 + 12 + 6));
        assert_eq!(hpa_workspace_size(usize::MAX, 2, 2), usize::MAX);
    }
}
