use core::fmt;

use crate::codec::CodecError;

/// Result Code carried in a User Control Point response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResultCode {
    Success = 0x01,
    OpCodeNotSupported = 0x02,
    InvalidParameter = 0x03,
    OperationFailed = 0x04,
    UserNotAuthorized = 0x05,
}

impl ResultCode {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ResultCode {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ResultCode::Success),
            0x02 => Ok(ResultCode::OpCodeNotSupported),
            0x03 => Ok(ResultCode::InvalidParameter),
            0x04 => Ok(ResultCode::OperationFailed),
            0x05 => Ok(ResultCode::UserNotAuthorized),
            _ => Err(CodecError::InvalidValue),
        }
    }
}

/// Why a control point write could not be turned into a procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestError {
    /// Zero-length write
    Empty,
    /// Longer than the characteristic allows
    TooLong(usize),
    /// Reserved or unknown op code
    UnsupportedOpCode(u8),
    /// Known op code whose parameters are missing
    MissingParameters { opcode: u8, error: CodecError },
    /// Known op code with more parameter octets than any procedure takes
    ParametersTooLong { opcode: u8, len: usize },
}

impl RequestError {
    /// The Result Code reported back for this request
    pub fn result_code(&self) -> ResultCode {
        match self {
            RequestError::UnsupportedOpCode(_) => ResultCode::OpCodeNotSupported,
            _ => ResultCode::InvalidParameter,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Empty => write!(f, "empty control point write"),
            RequestError::TooLong(len) => write!(f, "control point write of {} octets", len),
            RequestError::UnsupportedOpCode(op) => write!(f, "unsupported op code {:#04x}", op),
            RequestError::MissingParameters { opcode, error } => {
                write!(f, "op code {:#04x}: {}", opcode, error)
            }
            RequestError::ParametersTooLong { opcode, len } => {
                write!(f, "op code {:#04x} with {} parameter octets", opcode, len)
            }
        }
    }
}
