use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Writing would go past the end of the record buffer
    Overflow,
    /// The source ended before the field being read
    UnexpectedEnd { needed: usize, available: usize },
    /// A field holds a value the format does not allow
    InvalidValue,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Overflow => write!(f, "record buffer overflow"),
            CodecError::UnexpectedEnd { needed, available } => {
                write!(f, "needed {} bytes, {} available", needed, available)
            }
            CodecError::InvalidValue => write!(f, "invalid field value"),
        }
    }
}
