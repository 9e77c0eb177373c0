use crate::error::Error;
use crate::value::Value;

/// A named slot in a [`MemoryFrame`](crate::memory::MemoryFrame). Created uninitialized;
/// may be assigned a [`Value`] of any [`DataType`](crate::value::DataType) afterwards,
/// and a later assignment may change its type.
#[derive(Clone, Debug)]
pub struct Variable {
    name: String,
    value: Option<Value>,
}

impl Variable {
    pub fn new(name: String) -> Variable {
        Variable { name, value: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }

    /// Returns the stored value, or `GetValueFromUninitialized` if the variable was never assigned.
    pub fn value(&self) -> Result<&Value, Error> {
        self.value.as_ref().ok_or_else(|| {
            Error::GetValueFromUninitialized(format!(
                "variable \"{}\" was read before being assigned a value",
                self.name
            ))
        })
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = Some(value);
    }
}
