mod blob;
mod error;
mod mode;
mod pushed;
mod scalar;

pub use blob::Blob;
pub use error::{functions::*, BlasError, ErrorKind, Status};
pub use mode::{AtomicsMode, Operation, PointerMode};
pub use pushed::PushedState;
pub use scalar::{precision_string, routine_name, type_prefix, BlasScalar};

pub mod utils {
    use super::{invalid_pointer, BlasError};

    /// 按 BLAS 约定，负步长的向量从 `(1 - n) * inc` 处开始。
    #[inline]
    pub(crate) const fn shift(n: usize, inc: isize) -> isize {
        if inc < 0 {
            (1 - n as isize) * inc
        } else {
            0
        }
    }

    #[inline]
    pub(crate) fn non_null<T>(name: &str, ptr: *const T) -> Result<(), BlasError> {
        if ptr.is_null() {
            Err(invalid_pointer(format!("{name} is null")))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::Blob;
    use crate::{common_cpu::Stream, Hardware};
    use std::{cell::Cell, fmt, rc::Rc};

    /// 一对数值的绝对误差和相对误差。
    #[derive(Clone, Copy, Default)]
    struct Diff {
        abs: f64,
        rel: f64,
    }

    impl Diff {
        fn new(a: f64, b: f64) -> Self {
            let abs = (a - b).abs();
            let rel = abs / (a.abs() + b.abs() + f64::EPSILON);
            Self { abs, rel }
        }
    }

    /// 绝对误差和相对误差同时超过阈值的点计为离群点。
    struct ErrorCollector {
        threshold: Diff,
        max_diff: Diff,
        outliers: usize,
        count: usize,
    }

    impl ErrorCollector {
        fn new(abs: f64, rel: f64) -> Self {
            Self {
                threshold: Diff { abs, rel },
                max_diff: Diff::default(),
                outliers: 0,
                count: 0,
            }
        }

        fn push(&mut self, diff: Diff) {
            self.max_diff.abs = f64::max(self.max_diff.abs, diff.abs);
            self.max_diff.rel = f64::max(self.max_diff.rel, diff.rel);
            if diff.abs > self.threshold.abs && diff.rel > self.threshold.rel {
                self.outliers += 1;
            }
            self.count += 1;
        }
    }

    impl fmt::Display for ErrorCollector {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(
                f,
                "abs: {:.3e}, rel: {:.3e}, outliers: {}/{}",
                self.max_diff.abs, self.max_diff.rel, self.outliers, self.count,
            )
        }
    }

    /// 比较两组数据，返回离群点数量。
    pub fn compare(
        ans: impl IntoIterator<Item = f64>,
        res: impl IntoIterator<Item = f64>,
        abs: f64,
        rel: f64,
    ) -> usize {
        let mut ec = ErrorCollector::new(abs, rel);
        ans.into_iter()
            .zip(res)
            .for_each(|(a, b)| ec.push(Diff::new(a, b)));
        println!("{ec}");
        assert!(ec.count > 0);
        ec.outliers
    }

    /// 容量有限并统计存活分配数的测试硬件。
    pub struct Limited {
        capacity: usize,
        live: Rc<Cell<usize>>,
        mallocs: Cell<usize>,
    }

    impl Limited {
        pub fn new(capacity: usize) -> Self {
            Self {
                capacity,
                live: Rc::new(Cell::new(0)),
                mallocs: Cell::new(0),
            }
        }

        pub fn live(&self) -> usize {
            self.live.get()
        }

        pub fn live_counter(&self) -> Rc<Cell<usize>> {
            self.live.clone()
        }

        pub fn mallocs(&self) -> usize {
            self.mallocs.get()
        }
    }

    impl Hardware for Limited {
        type Byte = u8;
        type Queue = Stream;
        type DevMem = Blob;

        fn malloc(&self, size: usize) -> Option<Blob> {
            if size > self.capacity {
                return None;
            }
            let blob = Blob::new(size)?;
            self.live.set(self.live.get() + 1);
            self.mallocs.set(self.mallocs.get() + 1);
            Some(blob)
        }

        fn free(&self, mem: Blob) {
            self.live.set(self.live.get() - 1);
            drop(mem)
        }
    }
}
