use crate::error::Error;
use crate::variable::Variable;

use super::frame::{LocalFrameStack, MemoryFrame};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum FramePrefix {
    Global,
    Local,
    Temporary,
}

/// Splits a fully qualified variable name such as `GF@counter` into its frame
/// prefix and bare name.
fn split_full_name(full_name: &str) -> Result<(FramePrefix, &str), Error> {
    let (prefix, name) = full_name.split_once('@').ok_or_else(|| {
        Error::Internal(format!("variable name \"{}\" has no frame prefix", full_name))
    })?;

    let prefix = match prefix {
        "GF" => FramePrefix::Global,
        "LF" => FramePrefix::Local,
        "TF" => FramePrefix::Temporary,
        other => {
            return Err(Error::Internal(format!(
                "unknown frame prefix \"{}\"",
                other
            )))
        }
    };

    Ok((prefix, name))
}

/// Facade over the three memory frames an IPPcode22 program operates on: the
/// always-present global frame, the stack of local frames, and the single
/// optional temporary frame staged before a call.
#[derive(Default, Debug)]
pub struct ProcessMemory {
    global: MemoryFrame,
    locals: LocalFrameStack,
    temporary: Option<MemoryFrame>,
}

impl ProcessMemory {
    pub fn new() -> ProcessMemory {
        Default::default()
    }

    fn frame(&self, prefix: FramePrefix) -> Result<&MemoryFrame, Error> {
        match prefix {
            FramePrefix::Global => Ok(&self.global),
            FramePrefix::Local => self.locals.top(),
            FramePrefix::Temporary => self
                .temporary
                .as_ref()
                .ok_or_else(|| Error::UndefinedFrame("temporary frame is not defined".to_owned())),
        }
    }

    fn frame_mut(&mut self, prefix: FramePrefix) -> Result<&mut MemoryFrame, Error> {
        match prefix {
            FramePrefix::Global => Ok(&mut self.global),
            FramePrefix::Local => self.locals.top_mut(),
            FramePrefix::Temporary => self
                .temporary
                .as_mut()
                .ok_or_else(|| Error::UndefinedFrame("temporary frame is not defined".to_owned())),
        }
    }

    pub fn define(&mut self, full_name: &str) -> Result<&mut Variable, Error> {
        let (prefix, name) = split_full_name(full_name)?;
        self.frame_mut(prefix)?.define(name)
    }

    pub fn get(&self, full_name: &str) -> Result<&Variable, Error> {
        let (prefix, name) = split_full_name(full_name)?;
        self.frame(prefix)?.get(name)
    }

    pub fn get_mut(&mut self, full_name: &str) -> Result<&mut Variable, Error> {
        let (prefix, name) = split_full_name(full_name)?;
        self.frame_mut(prefix)?.get_mut(name)
    }

    pub fn create_frame(&mut self) {
        self.temporary = Some(MemoryFrame::new());
    }

    pub fn push_frame(&mut self) -> Result<(), Error> {
        let frame = self
            .temporary
            .take()
            .ok_or_else(|| Error::UndefinedFrame("temporary frame is not defined".to_owned()))?;
        self.locals.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) -> Result<(), Error> {
        self.temporary = Some(self.locals.pop()?);
        Ok(())
    }

    pub fn has_temporary_frame(&self) -> bool {
        self.temporary.is_some()
    }

    pub fn local_frame_depth(&self) -> usize {
        self.locals.depth()
    }

    pub fn global_frame_len(&self) -> usize {
        self.global.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Value;

    #[test]
    fn global_frame_is_always_available() {
        let mut mem = ProcessMemory::new();
        mem.define("GF@x").unwrap();
        assert!(mem.get("GF@x").is_ok());
    }

    #[test]
    fn temporary_frame_access_without_create_fails() {
        let mut mem = ProcessMemory::new();
        assert!(mem.define("TF@x").is_err());
        assert!(mem.get("TF@x").is_err());
    }

    #[test]
    fn local_frame_access_with_empty_stack_fails() {
        let mem = ProcessMemory::new();
        assert!(mem.get("LF@x").is_err());
    }

    #[test]
    fn frame_lifecycle_round_trip_preserves_depth_and_emptiness() {
        let mut mem = ProcessMemory::new();
        let depth_before = mem.local_frame_depth();

        mem.create_frame();
        mem.define("TF@v").unwrap();
        mem.push_frame().unwrap();
        mem.pop_frame().unwrap();

        assert!(mem.has_temporary_frame());
        assert_eq!(mem.local_frame_depth(), depth_before);
        // the popped frame is back in TF, with its variable intact
        assert!(mem.get("TF@v").is_ok());
    }

    #[test]
    fn redefinition_in_same_frame_fails() {
        let mut mem = ProcessMemory::new();
        mem.define("GF@x").unwrap();
        assert!(mem.define("GF@x").is_err());
    }

    #[test]
    fn variables_persist_across_frame_selection() {
        let mut mem = ProcessMemory::new();
        mem.define("GF@x").unwrap();
        mem.get_mut("GF@x").unwrap().set_value(Value::Int(5));
        assert_eq!(mem.get("GF@x").unwrap().value().unwrap().as_int(), Some(5));
    }
}
