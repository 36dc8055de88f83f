use core::fmt;

/// Application error codes returned in ATT error responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttError {
    /// UDS: user data read or written before consent was given
    UserDataAccessNotPermitted,
    /// CTS: the current time is not writable on this device
    DataFieldIgnored,
    /// The written value does not have the characteristic's fixed length
    InvalidAttributeValueLength,
}

impl AttError {
    pub const fn code(self) -> u8 {
        match self {
            AttError::UserDataAccessNotPermitted => 0x80,
            AttError::DataFieldIgnored => 0x80,
            AttError::InvalidAttributeValueLength => 0x0D,
        }
    }
}

impl fmt::Display for AttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttError::UserDataAccessNotPermitted => write!(f, "user data access not permitted"),
            AttError::DataFieldIgnored => write!(f, "data field ignored"),
            AttError::InvalidAttributeValueLength => write!(f, "invalid attribute value length"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No central is connected to receive the update
    NotConnected,
    /// The stack refused the update (status code from the stack)
    Rejected(u8),
    /// A record could not be built for the update
    Encoding,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotConnected => write!(f, "not connected"),
            TransportError::Rejected(status) => write!(f, "stack rejected update ({:#04x})", status),
            TransportError::Encoding => write!(f, "record encoding failed"),
        }
    }
}

impl From<crate::codec::CodecError> for TransportError {
    fn from(_: crate::codec::CodecError) -> Self {
        TransportError::Encoding
    }
}
