mod frame;
mod process;

pub use frame::{LocalFrameStack, MemoryFrame};
pub use process::ProcessMemory;
