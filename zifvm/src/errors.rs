use thiserror::Error;

use crate::zcpu::opcodes::OpcodeKind;
use crate::zmachine::header::ZMachineVersion;
use crate::zmemory::ZMemoryAddress;

pub type ZmResult<T> = Result<T, ZmError>;

/// A Z-machine Interpreter Error.
#[derive(Error, Debug)]
pub enum ZmError {
    #[error("Machine IO error: {0}")]
    MachineIO(#[from] std::io::Error),
    #[error("Unknown Z-machine version V{0}")]
    MachineUnknownVersion(u8),
    #[error("Invalid memory access at address {0:#X}")]
    MemoryInvalidAccess(usize),
    #[error("Invalid or unexpected memory address {0}")]
    MemoryInvalidAddress(ZMemoryAddress),
    /// Writes are only legal below the static memory mark.
    #[error("Write to read-only memory at address {0:#X}")]
    MemoryViolation(usize),
    #[error("Unknown opcode {kind:?}:{number:#04X} in {version}")]
    DecodeUnknownOpcode {
        version: ZMachineVersion,
        kind: OpcodeKind,
        number: u8,
    },
    #[error("Malformed instruction at {address:#X}: {reason}")]
    DecodeMalformed { address: u32, reason: &'static str },
    #[error("Evaluation stack underflow")]
    StackUnderflow,
    #[error("Local variable {index} out of range ({count} locals in frame)")]
    LocalOutOfRange { index: u8, count: usize },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Illegal machine state: {0}")]
    IllegalState(String),
    #[error("Invalid object number {0}")]
    ObjectInvalidIndex(u16),
    #[error("Invalid attribute number {0}")]
    ObjectInvalidAttribute(u16),
    #[error("Object {object} has no property {property}")]
    ObjectMissingProperty { object: u16, property: u16 },
    #[error("Invalid alphabet shift character {0}")]
    StringInvalidAlphabetShiftCharacter(u8),
    #[error("Invalid ZSCII character code {0}")]
    StringInvalidZSCIICharacterCode(u16),
    #[error("Abbreviation reference inside an abbreviation string")]
    StringIllegalAbbreviation,
}
