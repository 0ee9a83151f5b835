use super::hpa_workspace_size;
use crate::{common_cpu::Cpu, BlasScalar, Handle, Operation};
use digit_layout::types as ty;
use gemm::Parallelism;
use half::f16;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

pub(super) struct Args<T> {
    pub transa: Operation,
    pub transb: Operation,
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub alpha: T,
    pub a: *const T,
    pub lda: usize,
    pub b: *const T,
    pub ldb: usize,
    pub beta: T,
    pub c: *mut T,
    pub ldc: usize,
}

impl<T> Args<T> {
    /// op(A) 和 op(B) 的列步长与行步长。
    fn strides(&self) -> ((isize, isize), (isize, isize)) {
        let (lda, ldb) = (self.lda as isize, self.ldb as isize);
        let a = if self.transa.is_trans() { (1, lda) } else { (lda, 1) };
        let b = if self.transb.is_trans() { (1, ldb) } else { (ldb, 1) };
        (a, b)
    }
}

fn parallelism(handle: &Handle<Cpu>) -> Parallelism {
    if handle.any_order() {
        Parallelism::Rayon(0)
    } else {
        Parallelism::None
    }
}

pub(super) fn gemm<T: BlasScalar>(handle: &Handle<Cpu>, args: Args<T>) {
    if T::DT == ty::F16 {
        let Args {
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
        } = args;
        let args = Args {
            transa,
            transb,
            m,
            n,
            k,
            alpha: f16::from_f64(alpha.to_f64()),
            a: a.cast::<f16>(),
            lda,
            b: b.cast::<f16>(),
            ldb,
            beta: f16::from_f64(beta.to_f64()),
            c: c.cast::<f16>(),
            ldc,
        };
        let gsu = handle.gsu_malloc();
        let (workspace, size) = handle.gsu_workspace();
        if gsu.is_ok() && size >= hpa_workspace_size(m, n, k) {
            hpa(handle, args, workspace.cast());
        } else {
            direct(handle, args);
        }
    } else {
        direct(handle, args);
    }
}

fn direct<T: BlasScalar>(handle: &Handle<Cpu>, args: Args<T>) {
    let ((lhs_cs, lhs_rs), (rhs_cs, rhs_rs)) = args.strides();
    let Args {
        m,
        n,
        k,
        alpha,
        a,
        b,
        beta,
        c,
        ldc,
        ..
    } = args;
    unsafe {
        gemm::gemm(
            m,
            n,
            k,
            c,
            ldc as isize,
            1,
            beta != T::ZERO,
            a,
            lhs_cs,
            lhs_rs,
            b,
            rhs_cs,
            rhs_rs,
            beta,
            alpha,
            false,
            false,
            false,
            parallelism(handle),
        )
    }
}

/// 把 A、B、C 转为连续存放的单精度副本，以单精度计算后写回。
fn hpa(handle: &Handle<Cpu>, args: Args<f16>, workspace: *mut f32) {
    let ((lhs_cs, lhs_rs), (rhs_cs, rhs_rs)) = args.strides();
    let Args {
        m,
        n,
        k,
        alpha,
        a,
        b,
        beta,
        c,
        ldc,
        ..
    } = args;
    let a32 = workspace;
    let b32 = a32.wrapping_add(m * k);
    let c32 = b32.wrapping_add(k * n);

    // 行 i 列 j 的元素位于 base + j * cs + i * rs
    let widen = |dst: *mut f32, src: *const f16, rows: usize, cols: usize, cs: isize, rs: isize| {
        let (dst, src) = (dst as usize, src as usize);
        (0..rows * cols).into_par_iter().for_each(|idx| {
            let (i, j) = ((idx % rows) as isize, (idx / rows) as isize);
            unsafe {
                let val = (src as *const f16).offset(j * cs + i * rs).read();
                (dst as *mut f32).add(idx).write(val.to_f32())
            }
        })
    };
    widen(a32, a, m, k, lhs_cs, lhs_rs);
    widen(b32, b, k, n, rhs_cs, rhs_rs);
    let read_dst = beta != f16::ZERO;
    if read_dst {
        widen(c32, c, m, n, ldc as isize, 1);
    }

    unsafe {
        gemm::gemm(
            m,
            n,
            k,
            c32,
            m as isize,
            1,
            read_dst,
            a32,
            m as isize,
            1,
            b32,
            k as isize,
            1,
            beta.to_f32(),
            alpha.to_f32(),
            false,
            false,
            false,
            parallelism(handle),
        )
    }

    let (c, c32) = (c as usize, c32 as usize);
    (0..m * n).into_par_iter().for_each(|idx| {
        let (i, j) = (idx % m, idx / m);
        unsafe {
            let val = (c32 as *const f32).add(idx).read();
            (c as *mut f16).add(j * ldc + i).write(f16::from_f32(val))
        }
    });
}

/// `k` 为 0 或 alpha 为 0 时 C := beta * C，beta 为 0 时不读取 C。
pub(super) fn scale_c<T: BlasScalar>(args: Args<T>) {
    let Args {
        m, n, beta, c, ldc, ..
    } = args;
    let c = c as usize;
    let beta = beta.to_f64();
    (0..m * n).into_par_iter().for_each(|idx| {
        let (i, j) = (idx % m, idx / m);
        let c = (c as *mut T).wrapping_add(j * ldc + i);
        let val = if beta == 0. {
            0.
        } else {
            beta * unsafe { c.read() }.to_f64()
        };
        unsafe { c.write(T::from_f64(val)) }
    });
}
