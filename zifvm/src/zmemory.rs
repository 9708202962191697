pub mod reader;

use std::convert::TryFrom;
use std::fmt;
use std::io::Read;

use crate::errors::{ZmError, ZmResult};
use crate::zmachine::header::ZMachineVersion;

/// The different kinds of addresses in the Z-machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZMemoryAddress {
    /// An individual byte by absolute address.
    Byte(u32),
    /// A word in the bottom 128K of memory equal to twice the address value.
    ///
    /// Only used in the abbreviations table.
    Word(u16),
    /// The packed relative location of a routine in high memory.
    PackedRoutine(u16),
    /// The packed relative location of a string in high memory.
    PackedString(u16),
}

use self::ZMemoryAddress::*;

impl fmt::Display for ZMemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Byte(address) => write!(f, "ZMemoryAddress Byte = {:#X}", address),
            Word(address) => write!(f, "ZMemoryAddress Word = {:#X}", address),
            PackedRoutine(address) => write!(f, "ZMemoryAddress PackedRoutine = {:#X}", address),
            PackedString(address) => write!(f, "ZMemoryAddress PackedString = {:#X}", address),
        }
    }
}

/// The Z-machine's memory management unit.
///
/// Reference: section 1 of the Standards Document
/// http://inform-fiction.org/zmachine/standards/z1point1/sect01.html
pub struct ZMemory {
    /// The raw array of bytes, which is divided into 3 regions:
    /// - dynamic memory: starts at 0x00 and ends at the start of static memory.
    ///   Must contains at least 64 bytes for the header (which ends at 0x40).
    ///   Unrestricted access for games.
    /// - static memory: starts at the address specified in the header up to either
    ///   the last byte of the story file or 0xFFFF (whichever is lower).
    ///   Read-only for games.
    /// - high memory: starts at the "high memory mark" specified in the header and continues
    ///   to the end of the story file. May overlap with static memory.
    ///   Unaccessible directly from games since strings and routines are stored here.
    buffer: Vec<u8>,
    /// A copy of the dynamic region as loaded, used to honor `restart`.
    pristine_dynamic: Vec<u8>,
    version: ZMachineVersion,
    /// Start of static memory; everything below is writable by games.
    static_memory_base: usize,
    /// (V6-V7) Routines offset from header word 0x28, already scaled by 8.
    routines_offset: u32,
    /// (V6-V7) Strings offset from header word 0x2A, already scaled by 8.
    strings_offset: u32,
}

/// First byte after the header.
pub const HEADER_SIZE: usize = 0x40;

impl ZMemory {
    pub fn from_story_reader(reader: &mut dyn Read) -> ZmResult<Self> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        if buffer.len() < HEADER_SIZE {
            return Err(ZmError::MemoryInvalidAccess(buffer.len()));
        }
        let version = ZMachineVersion::try_from(buffer[0x00])?;
        let static_memory_base = ((buffer[0x0E] as usize) << 8) | buffer[0x0F] as usize;
        let routines_offset = 8 * (((buffer[0x28] as u32) << 8) | buffer[0x29] as u32);
        let strings_offset = 8 * (((buffer[0x2A] as u32) << 8) | buffer[0x2B] as u32);
        let pristine_dynamic = buffer[..static_memory_base.min(buffer.len())].to_vec();
        Ok(ZMemory {
            buffer,
            pristine_dynamic,
            version,
            static_memory_base,
            routines_offset,
            strings_offset,
        })
    }

    pub fn story_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn version(&self) -> ZMachineVersion {
        self.version
    }

    pub fn static_memory_base(&self) -> usize {
        self.static_memory_base
    }

    pub fn in_dynamic(&self, address: usize) -> bool {
        address < self.static_memory_base
    }

    /// Turns any address kind into an absolute byte offset.
    ///
    /// Packed addresses are unpacked with the version multiplier (R1.2.3):
    /// x2 up to V3, x4 for V4-V5, x4 plus the header offsets for V6-V7,
    /// and x8 for V8.
    pub fn resolve(&self, address: ZMemoryAddress) -> usize {
        use ZMachineVersion::*;
        match address {
            Byte(a) => a as usize,
            Word(a) => 2 * a as usize,
            PackedRoutine(p) => match self.version {
                V1 | V2 | V3 => 2 * p as usize,
                V4 | V5 => 4 * p as usize,
                V6 | V7 => 4 * p as usize + self.routines_offset as usize,
                V8 => 8 * p as usize,
            },
            PackedString(p) => match self.version {
                V1 | V2 | V3 => 2 * p as usize,
                V4 | V5 => 4 * p as usize,
                V6 | V7 => 4 * p as usize + self.strings_offset as usize,
                V8 => 8 * p as usize,
            },
        }
    }

    pub fn read_byte(&self, address: usize) -> ZmResult<u8> {
        self.buffer
            .get(address)
            .copied()
            .ok_or(ZmError::MemoryInvalidAccess(address))
    }

    /// Reads a Big Endian 16 bits word.
    pub fn read_word(&self, address: usize) -> ZmResult<u16> {
        let high = self.read_byte(address)?;
        let low = self.read_byte(address + 1)?;
        Ok(((high as u16) << 8) | low as u16)
    }

    pub fn write_byte(&mut self, address: usize, value: u8) -> ZmResult<()> {
        if !self.in_dynamic(address) {
            return Err(ZmError::MemoryViolation(address));
        }
        match self.buffer.get_mut(address) {
            Some(byte) => {
                *byte = value;
                Ok(())
            }
            None => Err(ZmError::MemoryInvalidAccess(address)),
        }
    }

    /// Writes a Big Endian 16 bits word.
    pub fn write_word(&mut self, address: usize, value: u16) -> ZmResult<()> {
        self.write_byte(address, (value >> 8) as u8)?;
        self.write_byte(address + 1, value as u8)
    }

    /// Restores the dynamic region to its as-loaded contents (`restart`).
    pub fn reset_dynamic(&mut self) {
        let len = self.pristine_dynamic.len();
        self.buffer[..len].copy_from_slice(&self.pristine_dynamic);
    }

    /// Checks the story file against the checksum stored in the header.
    ///
    /// The checksum is the 16-bit wrapping sum of all bytes from 0x40 up to the
    /// file length claimed by the header (stored scaled down by the version
    /// factor, R11.1.6).
    pub fn verify_checksum(&self) -> ZmResult<bool> {
        use ZMachineVersion::*;
        let expected = self.read_word(0x1C)?;
        let scale = match self.version {
            V1 | V2 | V3 => 2,
            V4 | V5 => 4,
            V6 | V7 | V8 => 8,
        };
        let file_length = (self.read_word(0x1A)? as usize * scale).min(self.buffer.len());
        let mut sum = 0u16;
        for byte in &self.buffer[HEADER_SIZE.min(file_length)..file_length] {
            sum = sum.wrapping_add(*byte as u16);
        }
        Ok(sum == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StoryBuilder;

    #[test]
    fn words_are_big_endian() {
        let memory = StoryBuilder::new(ZMachineVersion::V3).build_memory();
        assert_eq!(memory.read_byte(0x0E).unwrap(), 0x04);
        assert_eq!(memory.read_word(0x0E).unwrap(), 0x0400);
    }

    #[test]
    fn dynamic_writes_only() {
        let mut memory = StoryBuilder::new(ZMachineVersion::V5).build_memory();
        memory.write_word(0x0100, 0xBEEF).unwrap();
        assert_eq!(memory.read_word(0x0100).unwrap(), 0xBEEF);
        // static/high memory is read-only for games
        let static_base = memory.static_memory_base();
        match memory.write_byte(static_base, 0xFF) {
            Err(ZmError::MemoryViolation(address)) => assert_eq!(address, static_base),
            other => panic!("expected MemoryViolation, got {:?}", other.err()),
        }
    }

    #[test]
    fn out_of_bounds_read_fails() {
        let memory = StoryBuilder::new(ZMachineVersion::V3).build_memory();
        let len = memory.story_len();
        assert!(matches!(
            memory.read_byte(len),
            Err(ZmError::MemoryInvalidAccess(_))
        ));
    }

    #[test]
    fn packed_addresses_unpack_per_version() {
        let v3 = StoryBuilder::new(ZMachineVersion::V3).build_memory();
        assert_eq!(v3.resolve(ZMemoryAddress::PackedRoutine(0x0300)), 0x0600);
        let v5 = StoryBuilder::new(ZMachineVersion::V5).build_memory();
        assert_eq!(v5.resolve(ZMemoryAddress::PackedRoutine(0x0180)), 0x0600);
        let v8 = StoryBuilder::new(ZMachineVersion::V8).build_memory();
        assert_eq!(v8.resolve(ZMemoryAddress::PackedString(0x00C0)), 0x0600);
    }

    #[test]
    fn packed_addresses_use_v6_offsets() {
        let memory = StoryBuilder::new(ZMachineVersion::V6)
            .set_header_word(0x28, 0x0010) // routines offset: 8 * 0x10 = 0x80
            .set_header_word(0x2A, 0x0020) // strings offset: 8 * 0x20 = 0x100
            .build_memory();
        assert_eq!(memory.resolve(ZMemoryAddress::PackedRoutine(0x0100)), 0x0480);
        assert_eq!(memory.resolve(ZMemoryAddress::PackedString(0x0100)), 0x0500);
    }

    #[test]
    fn checksum_round_trip() {
        let memory = StoryBuilder::new(ZMachineVersion::V5)
            .with_code(&[0xB4]) // nop
            .build_memory();
        assert!(memory.verify_checksum().unwrap());
    }

    #[test]
    fn reset_dynamic_restores_initial_contents() {
        let mut memory = StoryBuilder::new(ZMachineVersion::V3).build_memory();
        let initial = memory.read_word(0x0100).unwrap();
        memory.write_word(0x0100, 0x1234).unwrap();
        memory.reset_dynamic();
        assert_eq!(memory.read_word(0x0100).unwrap(), initial);
    }
}
