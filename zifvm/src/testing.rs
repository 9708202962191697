//! Assembles synthetic story images for unit tests.
use std::io::Cursor;

use crate::zmachine::{header::ZMachineVersion, ZMachine};
use crate::zmemory::ZMemory;

/// Memory map used by all tests: globals at 0x100, objects at 0x300,
/// dictionary at 0x3C0, static memory from 0x400, code from 0x500.
pub(crate) struct StoryBuilder {
    bytes: Vec<u8>,
    version: ZMachineVersion,
}

impl StoryBuilder {
    pub(crate) fn new(version: ZMachineVersion) -> Self {
        let mut builder = StoryBuilder {
            bytes: vec![0u8; 0x800],
            version,
        };
        builder.bytes[0x00] = version as u8;
        builder.put_word(0x04, 0x0400); // high memory base
        if version == ZMachineVersion::V6 {
            // packed address of the main routine header at 0x500
            builder.put_word(0x06, 0x0140);
        } else {
            builder.put_word(0x06, 0x0500);
        }
        builder.put_word(0x08, 0x03C0); // dictionary
        builder.put_word(0x0A, 0x0300); // object table
        builder.put_word(0x0C, 0x0100); // global variables
        builder.put_word(0x0E, 0x0400); // static memory base
        builder.put_word(0x18, 0x0046); // abbreviations
        builder.put_bytes(0x12, b"000000");
        builder
    }

    fn put_word(&mut self, address: usize, value: u16) {
        self.bytes[address] = (value >> 8) as u8;
        self.bytes[address + 1] = value as u8;
    }

    fn put_bytes(&mut self, address: usize, bytes: &[u8]) {
        self.bytes[address..address + bytes.len()].copy_from_slice(bytes);
    }

    pub(crate) fn set_header_byte(mut self, address: usize, value: u8) -> Self {
        self.bytes[address] = value;
        self
    }

    pub(crate) fn set_header_word(mut self, address: usize, value: u16) -> Self {
        self.put_word(address, value);
        self
    }

    pub(crate) fn set_header_bytes(mut self, address: usize, bytes: &[u8]) -> Self {
        self.put_bytes(address, bytes);
        self
    }

    pub(crate) fn set_serial(self, serial: &[u8]) -> Self {
        self.set_header_bytes(0x12, serial)
    }

    pub(crate) fn set_inform_version(self, stamp: &[u8]) -> Self {
        self.set_header_bytes(0x3C, stamp)
    }

    /// Where `with_code` bytes land; for V6 this is the first byte after the
    /// main routine's local count.
    pub(crate) fn code_address(&self) -> usize {
        if self.version == ZMachineVersion::V6 {
            0x501
        } else {
            0x500
        }
    }

    pub(crate) fn with_code(mut self, code: &[u8]) -> Self {
        let address = self.code_address();
        self.put_bytes(address, code);
        self
    }

    /// Seeds entries of the object property defaults table.
    pub(crate) fn with_object_defaults(mut self, defaults: &[(u16, u16)]) -> Self {
        for (property, value) in defaults {
            self.put_word(0x300 + 2 * (*property as usize - 1), *value);
        }
        self
    }

    /// Writes a V1-V3 object entry (attributes, tree links, property table).
    pub(crate) fn with_legacy_object(
        mut self,
        object: u16,
        attributes: [u8; 4],
        parent: u8,
        sibling: u8,
        child: u8,
        properties: u16,
    ) -> Self {
        let entry = 0x300 + 62 + (object as usize - 1) * 9;
        self.put_bytes(entry, &attributes);
        self.bytes[entry + 4] = parent;
        self.bytes[entry + 5] = sibling;
        self.bytes[entry + 6] = child;
        self.put_word(entry + 7, properties);
        self
    }

    pub(crate) fn build_bytes(&self) -> Vec<u8> {
        use ZMachineVersion::*;
        let mut bytes = self.bytes.clone();
        let scale = match self.version {
            V1 | V2 | V3 => 2,
            V4 | V5 => 4,
            V6 | V7 | V8 => 8,
        };
        let length_word = (bytes.len() / scale) as u16;
        bytes[0x1A] = (length_word >> 8) as u8;
        bytes[0x1B] = length_word as u8;
        let mut checksum = 0u16;
        for byte in &bytes[0x40..] {
            checksum = checksum.wrapping_add(*byte as u16);
        }
        bytes[0x1C] = (checksum >> 8) as u8;
        bytes[0x1D] = checksum as u8;
        bytes
    }

    pub(crate) fn build_memory(&self) -> ZMemory {
        ZMemory::from_story_reader(&mut Cursor::new(self.build_bytes()))
            .expect("test story should load")
    }

    pub(crate) fn build_machine(&self) -> ZMachine {
        ZMachine::from_story_reader(&mut Cursor::new(self.build_bytes()))
            .expect("test machine should initialize")
    }
}
