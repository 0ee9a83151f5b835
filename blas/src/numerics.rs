use crate::{
    check_numerics_fail, common_cpu::Cpu, utils::shift, BlasError, BlasScalar, Handle,
};
use bitflags::bitflags;
use log::{info, warn};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::{num::FpCategory, ops::Add};

bitflags! {
    /// 数值检查模式掩码。
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
    pub struct CheckNumerics: u32 {
        /// 输出统计结果。
        const INFO = 1;
        /// 发现 NaN 或 Inf 时警告。
        const WARN = 1 << 1;
        /// 发现 NaN 或 Inf 时例程失败。
        const FAIL = 1 << 2;
    }
}

impl CheckNumerics {
    pub const NO_CHECK: Self = Self::empty();
}

/// 各类特殊值的数量。
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct NumericsCount {
    pub nan: usize,
    pub inf: usize,
    pub zero: usize,
    pub denorm: usize,
}

impl NumericsCount {
    fn of(category: FpCategory) -> Self {
        let mut ans = Self::default();
        match category {
            FpCategory::Nan => ans.nan = 1,
            FpCategory::Infinite => ans.inf = 1,
            FpCategory::Zero => ans.zero = 1,
            FpCategory::Subnormal => ans.denorm = 1,
            FpCategory::Normal => {}
        }
        ans
    }

    #[inline]
    pub fn has_nan_or_inf(&self) -> bool {
        self.nan > 0 || self.inf > 0
    }
}

impl Add for NumericsCount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            nan: self.nan + rhs.nan,
            inf: self.inf + rhs.inf,
            zero: self.zero + rhs.zero,
            denorm: self.denorm + rhs.denorm,
        }
    }
}

fn count<T: BlasScalar>(len: usize, elem: impl Fn(usize) -> T + Sync) -> NumericsCount {
    (0..len)
        .into_par_iter()
        .map(|i| NumericsCount::of(elem(i).classify()))
        .reduce(NumericsCount::default, Add::add)
}

fn report(
    handle: &Handle<Cpu>,
    name: &str,
    arg: &str,
    is_input: bool,
    count: NumericsCount,
) -> Result<(), BlasError> {
    let mode = handle.check_numerics();
    let io = if is_input { "input" } else { "output" };
    if mode.contains(CheckNumerics::INFO) {
        info!("{name} {io} {arg}: {count:?}");
    }
    if count.has_nan_or_inf() {
        if mode.contains(CheckNumerics::WARN) {
            warn!(
                "{name} {io} {arg} has {} NaN and {} Inf",
                count.nan, count.inf
            );
        }
        if mode.contains(CheckNumerics::FAIL) {
            return Err(check_numerics_fail(format!(
                "{name} {io} {arg} has NaN or Inf"
            )));
        }
    }
    Ok(())
}

/// 检查步长为 `inc` 的 `n` 元向量。
pub(crate) fn check_numerics_vector<T: BlasScalar>(
    handle: &Handle<Cpu>,
    name: &str,
    arg: &str,
    n: usize,
    x: *const T,
    inc: isize,
    is_input: bool,
) -> Result<(), BlasError> {
    if handle.check_numerics().is_empty() || n == 0 || x.is_null() {
        return Ok(());
    }
    let x = unsafe { x.offset(shift(n, inc)) } as usize;
    let count = count(n, |i| unsafe { (x as *const T).offset(i as isize * inc).read() });
    report(handle, name, arg, is_input, count)
}

/// 检查列主序的 `m` x `n` 矩阵。
pub(crate) fn check_numerics_matrix<T: BlasScalar>(
    handle: &Handle<Cpu>,
    name: &str,
    arg: &str,
    m: usize,
    n: usize,
    a: *const T,
    lda: usize,
    is_input: bool,
) -> Result<(), BlasError> {
    if handle.check_numerics().is_empty() || m == 0 || n == 0 || a.is_null() {
        return Ok(());
    }
    let a = a as usize;
    let count = count(m * n, |i| unsafe {
        (a as *const T).add(i / m * lda + i % m).read()
    });
    report(handle, name, arg, is_input, count)
}

#[cfg(test)]
mod test {
    use super::{
        check_numerics_matrix, check_numerics_vector, count, CheckNumerics, NumericsCount,
    };
    use crate::{common_cpu::Cpu, Config, ErrorKind, Handle};

    #[test]
    fn test_count() {
        let x = [0., 1., f64::NAN, f64::INFINITY, f64::MIN_POSITIVE / 2., -0.];
        let count = count(x.len(), |i| x[i]);
        assert_eq!(
            count,
            NumericsCount {
                nan: 1,
                inf: 1,
                zero: 2,
                denorm: 1,
            }
        );
    }

    #[test]
    fn test_modes() {
        let handle = Handle::new(Cpu, Config::default()).unwrap();
        let x = [1.0f32, f32::NAN, 2.0, 3.0];

        // 默认不检查
        assert!(check_numerics_vector(&handle, "sdot", "x", 4, x.as_ptr(), 1, true).is_ok());

        handle.set_check_numerics(CheckNumerics::INFO | CheckNumerics::WARN);
        assert!(check_numerics_vector(&handle, "sdot", "x", 4, x.as_ptr(), 1, true).is_ok());

        handle.set_check_numerics(CheckNumerics::FAIL);
        let e = check_numerics_vector(&handle, "sdot", "x", 4, x.as_ptr(), 1, true).unwrap_err();
        assert_eq!(e.kind, ErrorKind::CheckNumericsFail);
        // 步长 2 跳过 NaN
        assert!(check_numerics_vector(&handle, "sdot", "x", 2, x.as_ptr(), 2, true).is_ok());
        assert!(check_numerics_vector(&handle, "sdot", "x", 2, x[2..].as_ptr(), -1, true).is_ok());

        // 2x2 子矩阵，lda = 3，NaN 在填充行上
        let a = [1.0f64, 2., f64::NAN, 3., 4., 5.];
        assert!(check_numerics_matrix(&handle, "sgemm", "A", 2, 2, a.as_ptr(), 3, false).is_ok());
        assert!(check_numerics_matrix(&handle, "sgemm", "A", 3, 2, a.as_ptr(), 3, false).is_err());
    }
}
