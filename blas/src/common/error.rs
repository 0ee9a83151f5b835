use std::{error::Error, fmt};

/// 例程和句柄操作对外报告的状态码。
///
/// 数值是 C 接口的一部分，不能改变。
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Status {
    Success = 0,
    InvalidHandle = 1,
    NotImplemented = 2,
    InvalidPointer = 3,
    InvalidSize = 4,
    MemoryError = 5,
    InternalError = 6,
    PerfDegraded = 7,
    SizeQueryMismatch = 8,
    SizeIncreased = 9,
    SizeUnchanged = 10,
    InvalidValue = 11,
    Continue = 12,
    CheckNumericsFail = 13,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    InvalidHandle,
    NotImplemented,
    InvalidPointer,
    InvalidSize,
    InvalidValue,
    MemoryError,
    InternalError,
    SizeQueryMismatch,
    CheckNumericsFail,
}

#[derive(Clone, Debug)]
pub struct BlasError {
    pub kind: ErrorKind,
    pub info: String,
}

impl From<ErrorKind> for Status {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidHandle => Self::InvalidHandle,
            ErrorKind::NotImplemented => Self::NotImplemented,
            ErrorKind::InvalidPointer => Self::InvalidPointer,
            ErrorKind::InvalidSize => Self::InvalidSize,
            ErrorKind::InvalidValue => Self::InvalidValue,
            ErrorKind::MemoryError => Self::MemoryError,
            ErrorKind::InternalError => Self::InternalError,
            ErrorKind::SizeQueryMismatch => Self::SizeQueryMismatch,
            ErrorKind::CheckNumericsFail => Self::CheckNumericsFail,
        }
    }
}

impl From<BlasError> for Status {
    #[inline]
    fn from(e: BlasError) -> Self {
        e.kind.into()
    }
}

impl fmt::Display for BlasError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.info)
    }
}

impl Error for BlasError {}

pub(super) mod functions {
    use super::{BlasError, ErrorKind::*};

    macro_rules! builder {
        ($ty:ident: $name:ident $kind:expr) => {
            #[inline]
            pub fn $name(info: impl Into<String>) -> $ty {
                $ty {
                    kind: $kind,
                    info: info.into(),
                }
            }
        };
    }

    builder!(BlasError: invalid_handle      InvalidHandle    );
    builder!(BlasError: not_implemented     NotImplemented   );
    builder!(BlasError: invalid_pointer     InvalidPointer   );
    builder!(BlasError: invalid_size        InvalidSize      );
    builder!(BlasError: invalid_value       InvalidValue     );
    builder!(BlasError: memory_error        MemoryError      );
    builder!(BlasError: internal_error      InternalError    );
    builder!(BlasError: size_query_mismatch SizeQueryMismatch);
    builder!(BlasError: check_numerics_fail CheckNumericsFail);
}

#[test]
fn test_status_of_error() {
    use functions::*;

    assert_eq!(Status::from(invalid_size("n < 0")), Status::InvalidSize);
    assert_eq!(Status::from(memory_error("")), Status::MemoryError);
    assert_eq!(
        Status::from(size_query_mismatch("")),
        Status::SizeQueryMismatch
    );
    assert_eq!(Status::CheckNumericsFail as i32, 13);

    let e = invalid_pointer("x is null");
    assert_eq!(e.to_string(), "InvalidPointer: x is null");
}
