//! Interpreter core for IPPcode22: the value model, memory frames, stacks, the
//! loaded [`program::Program`] representation, and the [`executor::Executor`] that
//! runs it. Turning an XML document into a `Program` is the loader's job (see the
//! `ippxml` crate); wiring CLI arguments, the loader, and the executor together is
//! the driver's job (see the `ippvm` crate).

pub mod error;
pub mod executor;
pub mod memory;
pub mod program;
pub mod stack;
pub mod value;
pub mod variable;
