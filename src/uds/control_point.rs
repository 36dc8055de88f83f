//! User Control Point wire format.
//!
//! Request: `[op code][parameters]`. Response: `[0x20][request op code][result][parameters]`.

use super::error::{RequestError, ResultCode};
use crate::codec::{CodecError, Decode, Encode, Reader, RecordBuilder};

/// Op code of every procedure-complete response
pub const RESPONSE_CODE: u8 = 0x20;

/// Largest write the characteristic accepts: op code plus 17 parameter octets
pub const MAX_REQUEST_LEN: usize = 18;

/// Largest request parameter any supported procedure defines
pub const MAX_REQUEST_PARAMETER_LEN: usize = 8;

pub const MAX_RESPONSE_PARAMETER_LEN: usize = 18;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OpCode {
    RegisterNewUser = 0x01,
    Consent = 0x02,
    DeleteUserData = 0x03,
    ListAllUsers = 0x04,
    DeleteUser = 0x05,
}

impl OpCode {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = RequestError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(OpCode::RegisterNewUser),
            0x02 => Ok(OpCode::Consent),
            0x03 => Ok(OpCode::DeleteUserData),
            0x04 => Ok(OpCode::ListAllUsers),
            0x05 => Ok(OpCode::DeleteUser),
            other => Err(RequestError::UnsupportedOpCode(other)),
        }
    }
}

/// A parsed control point request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Procedure {
    RegisterNewUser { consent_code: u16 },
    Consent { user_index: u8, consent_code: u16 },
    DeleteUserData,
    ListAllUsers,
    DeleteUser,
}

impl Procedure {
    pub fn opcode(&self) -> OpCode {
        match self {
            Procedure::RegisterNewUser { .. } => OpCode::RegisterNewUser,
            Procedure::Consent { .. } => OpCode::Consent,
            Procedure::DeleteUserData => OpCode::DeleteUserData,
            Procedure::ListAllUsers => OpCode::ListAllUsers,
            Procedure::DeleteUser => OpCode::DeleteUser,
        }
    }

    /// Parse a written value. Trailing octets past the known parameters are
    /// ignored, up to [`MAX_REQUEST_PARAMETER_LEN`] parameter octets in total.
    pub fn parse(data: &[u8]) -> Result<Self, RequestError> {
        if data.len() > MAX_REQUEST_LEN {
            return Err(RequestError::TooLong(data.len()));
        }

        let mut reader = Reader::new(data);
        let opcode = reader.get_u8().map_err(|_| RequestError::Empty)?;
        let missing = |error| RequestError::MissingParameters { opcode, error };

        let known = OpCode::try_from(opcode)?;

        let len = reader.remaining().len();
        if len > MAX_REQUEST_PARAMETER_LEN {
            return Err(RequestError::ParametersTooLong { opcode, len });
        }

        match known {
            OpCode::RegisterNewUser => Ok(Procedure::RegisterNewUser {
                consent_code: reader.get_u16_le().map_err(missing)?,
            }),
            OpCode::Consent => {
                let user_index = reader.get_u8().map_err(missing)?;
                let consent_code = reader.get_u16_le().map_err(missing)?;
                Ok(Procedure::Consent {
                    user_index,
                    consent_code,
                })
            }
            OpCode::DeleteUserData => Ok(Procedure::DeleteUserData),
            // Parameters are not looked at; the procedures are not supported
            OpCode::ListAllUsers => Ok(Procedure::ListAllUsers),
            OpCode::DeleteUser => Ok(Procedure::DeleteUser),
        }
    }
}

/// Procedure-complete response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcedureResponse {
    pub request_opcode: u8,
    pub result: ResultCode,
    pub parameters: heapless::Vec<u8, MAX_RESPONSE_PARAMETER_LEN>,
}

impl ProcedureResponse {
    pub fn new(request_opcode: u8, result: ResultCode) -> Self {
        Self {
            request_opcode,
            result,
            parameters: heapless::Vec::new(),
        }
    }

    /// Success response carrying `parameters`.
    pub fn success(request_opcode: u8, parameters: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            request_opcode,
            result: ResultCode::Success,
            parameters: heapless::Vec::from_slice(parameters).map_err(|_| CodecError::Overflow)?,
        })
    }
}

impl Encode for ProcedureResponse {
    fn encoded_len(&self) -> usize {
        3 + self.parameters.len()
    }

    fn encode_into(&self, builder: &mut RecordBuilder) -> Result<(), CodecError> {
        builder.put_u8(RESPONSE_CODE)?;
        builder.put_u8(self.request_opcode)?;
        builder.put_u8(self.result.code())?;
        builder.put_slice(&self.parameters)
    }
}

impl Decode for ProcedureResponse {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        if reader.get_u8()? != RESPONSE_CODE {
            return Err(CodecError::InvalidValue);
        }

        let request_opcode = reader.get_u8()?;
        let result = ResultCode::try_from(reader.get_u8()?)?;
        let parameters =
            heapless::Vec::from_slice(reader.remaining()).map_err(|_| CodecError::Overflow)?;

        Ok(Self {
            request_opcode,
            result,
            parameters,
        })
    }
}
