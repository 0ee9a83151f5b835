use digit_layout::{types as ty, DigitLayout};
use half::f16;
use std::{fmt, num::FpCategory};

/// 例程支持的数据类型。
///
/// 每个类型由一个 [`DigitLayout`] 标记，例程名和日志中的精度串都由标记查表得到。
pub trait BlasScalar: Copy + Send + Sync + PartialEq + fmt::Debug + 'static {
    const DT: DigitLayout;
    const ZERO: Self;
    const ONE: Self;

    fn from_f64(val: f64) -> Self;
    fn to_f64(self) -> f64;
    fn classify(self) -> FpCategory;
}

macro_rules! impl_scalar {
    ($( $ty:ty => $dt:expr )+) => {
        $(
            impl BlasScalar for $ty {
                const DT: DigitLayout = $dt;
                const ZERO: Self = 0.;
                const ONE: Self = 1.;

                #[inline]
                fn from_f64(val: f64) -> Self {
                    val as _
                }
                #[inline]
                fn to_f64(self) -> f64 {
                    self as _
                }
                #[inline]
                fn classify(self) -> FpCategory {
                    <$ty>::classify(self)
                }
            }
        )+
    };
}

impl_scalar! {
    f32 => ty::F32
    f64 => ty::F64
}

impl BlasScalar for f16 {
    const DT: DigitLayout = ty::F16;
    const ZERO: Self = f16::ZERO;
    const ONE: Self = f16::ONE;

    #[inline]
    fn from_f64(val: f64) -> Self {
        f16::from_f64(val)
    }
    #[inline]
    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }
    #[inline]
    fn classify(self) -> FpCategory {
        f16::classify(self)
    }
}

/// 例程名中的类型前缀。
pub fn type_prefix(dt: DigitLayout) -> &'static str {
    match dt {
        ty::F16 => "h",
        ty::F32 => "s",
        ty::F64 => "d",
        _ => "unknown",
    }
}

/// 性能测试命令行中的精度串。
pub fn precision_string(dt: DigitLayout) -> &'static str {
    match dt {
        ty::F16 => "f16_r",
        ty::F32 => "f32_r",
        ty::F64 => "f64_r",
        _ => "invalid",
    }
}

/// 生成类型化的例程名，例如 `blas_sdot`。
#[inline]
pub fn routine_name<T: BlasScalar>(base: &str) -> String {
    format!("blas_{}{base}", type_prefix(T::DT))
}

#[test]
fn test_registry() {
    assert_eq!(routine_name::<f16>("gemm"), "blas_hgemm");
    assert_eq!(routine_name::<f32>("dot"), "blas_sdot");
    assert_eq!(routine_name::<f64>("nrm2"), "blas_dnrm2");
    assert_eq!(precision_string(f32::DT), "f32_r");
    assert_eq!(precision_string(ty::U32), "invalid");

    assert_eq!(f16::from_f64(1.5).to_f64(), 1.5);
    assert_eq!(f32::NAN.classify(), FpCategory::Nan);
    assert_eq!(
        <f16 as BlasScalar>::classify(f16::INFINITY),
        FpCategory::Infinite
    );
}
