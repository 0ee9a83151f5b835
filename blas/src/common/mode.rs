/// 标量参数（alpha、beta、归约结果）所在的存储位置。
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum PointerMode {
    /// 标量在主存中，例程同步读取。
    #[default]
    Host = 0,
    /// 标量在设备存储中，由后端异步读取。
    Device = 1,
}

/// 是否允许内核使用原子操作（结果可能不可复现）。
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum AtomicsMode {
    NotAllowed = 0,
    #[default]
    Allowed = 1,
}

/// 矩阵参数的变换。
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operation {
    None = 111,
    Transpose = 112,
    ConjugateTranspose = 113,
}

impl Operation {
    #[inline]
    pub const fn letter(self) -> char {
        match self {
            Self::None => 'N',
            Self::Transpose => 'T',
            Self::ConjugateTranspose => 'C',
        }
    }

    #[inline]
    pub const fn is_trans(self) -> bool {
        !matches!(self, Self::None)
    }
}

macro_rules! try_from_u32 {
    ($ty:ident { $( $variant:ident )+ }) => {
        impl TryFrom<u32> for $ty {
            type Error = u32;
            fn try_from(value: u32) -> Result<Self, Self::Error> {
                $(
                    if value == Self::$variant as u32 {
                        return Ok(Self::$variant);
                    }
                )+
                Err(value)
            }
        }
    };
}

try_from_u32!(PointerMode { Host Device });
try_from_u32!(AtomicsMode { NotAllowed Allowed });
try_from_u32!(Operation { None Transpose ConjugateTranspose });

#[test]
fn test_try_from() {
    assert_eq!(PointerMode::try_from(1), Ok(PointerMode::Device));
    assert_eq!(AtomicsMode::try_from(0), Ok(AtomicsMode::NotAllowed));
    assert_eq!(Operation::try_from(112), Ok(Operation::Transpose));
    assert_eq!(Operation::try_from(0), Err(0));
    assert_eq!(PointerMode::try_from(2), Err(2));
}
