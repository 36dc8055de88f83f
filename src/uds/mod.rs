//! User Data Service: user registry, consent and the User Control Point.
//!
//! Control point writes are parsed when they arrive and the procedure is
//! deferred to the task queue. Executing a procedure emits exactly one
//! procedure-complete response. Responses are indicated only while the
//! collector has indications enabled; otherwise they are stored silently and the
//! procedure's effect on the registry still takes place.

pub mod control_point;
pub mod error;
pub mod registry;

use control_point::{OpCode, Procedure, ProcedureResponse};
use error::{RequestError, ResultCode};
use registry::{UserRegistry, MAX_CONSENT_CODE, USER_INDEX_UNKNOWN};

use crate::ble::config::{Config, UserDataHandles};
use crate::ble::error::{AttError, TransportError};
use crate::ble::transport::{CccdFlags, Dispatch, GattTransport};
use crate::ble::{ReadOutcome, WriteOutcome};
use crate::codec::Reader;
use crate::scheduler::{Task, TaskQueue};

/// From this many wrong consent codes on, the answer is Operation Failed
pub const MAX_CONSENT_ATTEMPTS: u8 = 3;

pub struct UserDataService<const N: usize> {
    handles: UserDataHandles,
    registry: UserRegistry<N>,
    access_permitted: bool,
    consent_attempts: u8,
    control_point_cccd: CccdFlags,
    database_change_increment: u32,
    single_trusted_collector: bool,
}

impl<const N: usize> UserDataService<N> {
    pub fn new(config: &Config) -> Self {
        Self {
            handles: config.handles.user_data,
            registry: UserRegistry::new(config.multiple_users),
            access_permitted: false,
            consent_attempts: 0,
            control_point_cccd: CccdFlags::empty(),
            database_change_increment: 0,
            single_trusted_collector: config.single_trusted_collector,
        }
    }

    pub fn handles(&self) -> &UserDataHandles {
        &self.handles
    }

    pub fn registry(&self) -> &UserRegistry<N> {
        &self.registry
    }

    /// Whether consent was given for the active user
    pub fn access_permitted(&self) -> bool {
        self.access_permitted
    }

    pub fn consent_attempts(&self) -> u8 {
        self.consent_attempts
    }

    pub fn database_change_increment(&self) -> u32 {
        self.database_change_increment
    }

    pub fn indications_enabled(&self) -> bool {
        self.control_point_cccd.contains(CccdFlags::INDICATE)
    }

    /// Index of the active user, or [`USER_INDEX_UNKNOWN`]
    pub fn active_user_index(&self) -> u8 {
        self.registry
            .active()
            .map(|user| user.index)
            .unwrap_or(USER_INDEX_UNKNOWN)
    }

    pub fn init(&self, transport: &mut impl GattTransport) -> Result<(), TransportError> {
        transport.update_characteristic(
            self.handles.user_index,
            0,
            &[USER_INDEX_UNKNOWN],
            Dispatch::Silent,
        )?;
        transport.publish(
            self.handles.database_change_increment,
            &self.database_change_increment,
            Dispatch::Silent,
        )
    }

    pub fn on_control_point_subscription(&mut self, cccd: CccdFlags) {
        debug!("[uds] control point cccd {:#x}", cccd.bits());
        self.control_point_cccd = cccd;
    }

    /// A collector wrote the User Control Point.
    ///
    /// Recognized requests are queued and acknowledged. Reserved op codes are
    /// answered at once and not acknowledged.
    pub fn on_control_point_write(
        &mut self,
        data: &[u8],
        queue: &TaskQueue,
        transport: &mut impl GattTransport,
    ) -> WriteOutcome {
        let task = match Procedure::parse(data) {
            Ok(procedure) => {
                info!("[uds] request {:?}", procedure.opcode());
                Task::Procedure(procedure)
            }
            Err(err @ RequestError::UnsupportedOpCode(opcode)) => {
                warn!("[uds] unsupported op code {:#x}", opcode);
                self.respond(&ProcedureResponse::new(opcode, err.result_code()), transport);
                return WriteOutcome::NotAcknowledged;
            }
            Err(
                err @ (RequestError::MissingParameters { opcode, .. }
                | RequestError::ParametersTooLong { opcode, .. }),
            ) => {
                warn!("[uds] malformed request: {:?}", err);
                Task::Reject {
                    opcode,
                    result: err.result_code(),
                }
            }
            Err(RequestError::Empty) => {
                return WriteOutcome::Rejected(AttError::InvalidAttributeValueLength)
            }
            Err(RequestError::TooLong(len)) => {
                warn!("[uds] control point write of {} octets", len);
                return WriteOutcome::Rejected(AttError::InvalidAttributeValueLength);
            }
        };

        match queue.schedule(task) {
            Ok(()) => WriteOutcome::Accepted,
            Err(task) => {
                error!("[uds] task queue full, dropping {:?}", task);
                let opcode = data.first().copied().unwrap_or_default();
                self.respond(
                    &ProcedureResponse::new(opcode, ResultCode::OperationFailed),
                    transport,
                );
                WriteOutcome::NotAcknowledged
            }
        }
    }

    /// Run a deferred procedure and emit its response.
    pub fn execute(&mut self, procedure: Procedure, transport: &mut impl GattTransport) -> ResultCode {
        let opcode = procedure.opcode();

        let result = match procedure {
            Procedure::RegisterNewUser { consent_code } => {
                self.register_new_user(consent_code, transport)
            }
            Procedure::Consent {
                user_index,
                consent_code,
            } => self.consent(user_index, consent_code, transport),
            Procedure::DeleteUserData => self.delete_user_data(transport),
            Procedure::ListAllUsers | Procedure::DeleteUser => {
                self.fail(opcode, ResultCode::OpCodeNotSupported, transport)
            }
        };

        info!("[uds] {:?} -> {:?}", opcode, result);
        result
    }

    /// Answer a request that was accepted but could not be parsed.
    pub fn reject(&mut self, opcode: u8, result: ResultCode, transport: &mut impl GattTransport) {
        self.respond(&ProcedureResponse::new(opcode, result), transport);
    }

    fn register_new_user(&mut self, consent_code: u16, transport: &mut impl GattTransport) -> ResultCode {
        if consent_code > MAX_CONSENT_CODE {
            return self.fail(OpCode::RegisterNewUser, ResultCode::InvalidParameter, transport);
        }

        let index = match self.registry.register(consent_code) {
            Ok(index) => index,
            Err(result) => return self.fail(OpCode::RegisterNewUser, result, transport),
        };

        self.consent_attempts = 0;
        self.access_permitted = false;

        self.succeed(OpCode::RegisterNewUser, &[index], transport)
    }

    fn consent(&mut self, user_index: u8, consent_code: u16, transport: &mut impl GattTransport) -> ResultCode {
        if consent_code > MAX_CONSENT_CODE
            || user_index == 0
            || user_index == USER_INDEX_UNKNOWN
            || user_index > self.registry.count()
        {
            return self.fail(OpCode::Consent, ResultCode::InvalidParameter, transport);
        }

        let Some(user) = self.registry.get(user_index).copied() else {
            return self.fail(OpCode::Consent, ResultCode::InvalidParameter, transport);
        };

        if user.consent_code != consent_code {
            self.consent_attempts = self.consent_attempts.saturating_add(1);
            let result = if self.consent_attempts < MAX_CONSENT_ATTEMPTS {
                ResultCode::UserNotAuthorized
            } else {
                ResultCode::OperationFailed
            };
            return self.fail(OpCode::Consent, result, transport);
        }

        self.registry.select(user_index);
        let result = self.succeed(OpCode::Consent, &[], transport);

        self.store(self.handles.user_index, &[user_index], transport);
        if user.height > 0 {
            self.store(self.handles.height, &user.height.to_le_bytes(), transport);
        }
        if user.weight > 0 {
            self.store(self.handles.weight, &user.weight.to_le_bytes(), transport);
        }

        self.access_permitted = true;
        result
    }

    fn delete_user_data(&mut self, transport: &mut impl GattTransport) -> ResultCode {
        if let Err(result) = self.registry.delete_active() {
            return self.fail(OpCode::DeleteUserData, result, transport);
        }

        self.access_permitted = false;
        self.succeed(OpCode::DeleteUserData, &[], transport)
    }

    fn succeed(&self, opcode: OpCode, parameters: &[u8], transport: &mut impl GattTransport) -> ResultCode {
        match ProcedureResponse::success(opcode.code(), parameters) {
            Ok(response) => self.respond(&response, transport),
            Err(err) => warn!("[uds] {:?} response parameters: {:?}", opcode, err),
        }
        ResultCode::Success
    }

    fn fail(&self, opcode: OpCode, result: ResultCode, transport: &mut impl GattTransport) -> ResultCode {
        self.respond(&ProcedureResponse::new(opcode.code(), result), transport);
        result
    }

    fn respond(&self, response: &ProcedureResponse, transport: &mut impl GattTransport) {
        let dispatch = Dispatch::gated(Dispatch::Indicate, self.control_point_cccd);
        if !dispatch.transmits() {
            debug!("[uds] indications disabled, response stored only");
        }

        if let Err(err) = transport.publish(self.handles.control_point, response, dispatch) {
            warn!("[uds] failed to send response: {:?}", err);
        }
    }

    fn store(&self, handle: u16, value: &[u8], transport: &mut impl GattTransport) {
        if let Err(err) = transport.update_characteristic(handle, 0, value, Dispatch::Silent) {
            warn!("[uds] failed to update {:#x}: {:?}", handle, err);
        }
    }

    /// Gate height and weight reads on consent. The database change
    /// increment stays readable.
    pub fn on_read(&self, handle: u16) -> ReadOutcome {
        if handle != self.handles.height && handle != self.handles.weight {
            return ReadOutcome::Allow;
        }

        if self.access_permitted {
            ReadOutcome::Allow
        } else {
            ReadOutcome::Deny(AttError::UserDataAccessNotPermitted)
        }
    }

    /// Height, weight and database change increment writes.
    pub fn on_write(&mut self, handle: u16, data: &[u8]) -> WriteOutcome {
        if !self.is_user_data(handle) {
            return WriteOutcome::Unhandled;
        }

        if !self.access_permitted {
            warn!("[uds] write to {:#x} without consent", handle);
            return WriteOutcome::Rejected(AttError::UserDataAccessNotPermitted);
        }

        let mut reader = Reader::new(data);

        if handle == self.handles.database_change_increment {
            let Ok(value) = reader.get_u32_le() else {
                return WriteOutcome::Rejected(AttError::InvalidAttributeValueLength);
            };
            self.database_change_increment = value;
            return WriteOutcome::Accepted;
        }

        let Ok(value) = reader.get_u16_le() else {
            return WriteOutcome::Rejected(AttError::InvalidAttributeValueLength);
        };

        let height = handle == self.handles.height;
        if let Some(user) = self.registry.active_mut() {
            if height {
                user.height = value;
            } else {
                user.weight = value;
            }
        }

        WriteOutcome::Accepted
    }

    fn is_user_data(&self, handle: u16) -> bool {
        handle == self.handles.height
            || handle == self.handles.weight
            || handle == self.handles.database_change_increment
    }

    /// Connection closed: drop the subscription and consent, and unless this is
    /// the single trusted collector, every registered user.
    pub fn reset(&mut self) {
        self.control_point_cccd = CccdFlags::empty();
        self.access_permitted = false;

        if !self.single_trusted_collector {
            self.registry.clear();
        }
    }
}
