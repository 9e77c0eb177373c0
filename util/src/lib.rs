use std::{error::Error, fmt};

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ParseEnumError {
    pub value: String,
    pub enum_name: &'static str,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Failed to parse \"{}\" as {}.",
            &self.value, &self.enum_name
        )
    }
}

impl Error for ParseEnumError {
    fn description(&self) -> &str {
        "Failed to parse enum."
    }
}

/// Implemented by closed enums that can be parsed case-insensitively from a string,
/// e.g. an instruction opcode or argument type read from XML.
pub trait EnumFromStrCI: Sized {
    fn from_str_ci(s: &str) -> Result<Self, ParseEnumError>;
}
