#[macro_use]
extern crate bitflags;

pub mod errors;
pub mod zcpu;
pub mod zmachine;
pub mod zmemory;
pub mod zobjects;
pub mod zscreen;
pub mod zstring;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{ZmError, ZmResult};
pub use zmachine::header::ZMachineVersion;
pub use zmachine::{ZMachine, ZMachineHeader};
pub use zscreen::{NullScreen, ZScreen};
