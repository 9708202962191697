use crate::errors::ZmResult;
use crate::zcpu::instructions::{ZBranch, ZBranchTarget, ZVariable};
use crate::zmemory::ZMemory;

/// A forward cursor over `ZMemory`, used to pull apart instructions and
/// in-line encoded strings byte by byte.
pub struct ZMemoryReader<'a> {
    memory: &'a ZMemory,
    address: usize,
}

impl<'a> ZMemoryReader<'a> {
    pub fn new(memory: &'a ZMemory, address: usize) -> Self {
        ZMemoryReader { memory, address }
    }

    pub fn position(&self) -> usize {
        self.address
    }

    pub fn seek(&mut self, address: usize) {
        self.address = address;
    }

    pub fn next_byte(&mut self) -> ZmResult<u8> {
        let value = self.memory.read_byte(self.address)?;
        self.address += 1;
        Ok(value)
    }

    /// Reads a Big Endian 16 bits word.
    pub fn next_word(&mut self) -> ZmResult<u16> {
        let value = self.memory.read_word(self.address)?;
        self.address += 2;
        Ok(value)
    }

    pub fn next_variable(&mut self) -> ZmResult<ZVariable> {
        Ok(ZVariable::from_wire(self.next_byte()?))
    }

    /// Reads a branch field (R4.7).
    ///
    /// Bit 7 of the first byte gives the condition sense. If bit 6 is set the
    /// offset is the bottom 6 bits, unsigned; otherwise a second byte follows
    /// and the offset is a 14-bit signed quantity. Offsets 0 and 1 mean
    /// "return false" and "return true" instead of an in-routine jump.
    pub fn next_branch(&mut self) -> ZmResult<ZBranch> {
        let first = self.next_byte()?;
        let condition = first & 0b_1000_0000 != 0;
        let offset: i16 = if first & 0b_0100_0000 != 0 {
            (first & 0b_0011_1111) as i16
        } else {
            let second = self.next_byte()?;
            let raw = (((first & 0b_0011_1111) as u16) << 8) | second as u16;
            // sign-extend from bit 13
            if raw & 0x2000 != 0 {
                (raw | 0xC000) as i16
            } else {
                raw as i16
            }
        };
        Ok(ZBranch {
            condition,
            target: match offset {
                0 => ZBranchTarget::ReturnFalse,
                1 => ZBranchTarget::ReturnTrue,
                offset => ZBranchTarget::Offset(offset),
            },
        })
    }

    /// Reads encoded text words up to and including the one carrying the
    /// terminator bit (R3.2).
    pub fn next_z_words(&mut self) -> ZmResult<Vec<u16>> {
        let mut words = Vec::new();
        loop {
            let word = self.next_word()?;
            words.push(word);
            if word & 0x8000 != 0 {
                return Ok(words);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StoryBuilder;
    use crate::zmachine::header::ZMachineVersion;

    fn reader_over(code: &[u8]) -> (ZMemory, usize) {
        let builder = StoryBuilder::new(ZMachineVersion::V5).with_code(code);
        let start = builder.code_address();
        (builder.build_memory(), start)
    }

    #[test]
    fn bytes_and_words_advance_the_cursor() {
        let (memory, start) = reader_over(&[0xAB, 0xCD, 0xEF]);
        let mut reader = ZMemoryReader::new(&memory, start);
        assert_eq!(reader.next_byte().unwrap(), 0xAB);
        assert_eq!(reader.next_word().unwrap(), 0xCDEF);
        assert_eq!(reader.position(), start + 3);
    }

    #[test]
    fn variables_decode_from_their_wire_byte() {
        let (memory, start) = reader_over(&[0x00, 0x01, 0x0F, 0x10, 0xFF]);
        let mut reader = ZMemoryReader::new(&memory, start);
        assert_eq!(reader.next_variable().unwrap(), ZVariable::Stack);
        assert_eq!(reader.next_variable().unwrap(), ZVariable::Local(0));
        assert_eq!(reader.next_variable().unwrap(), ZVariable::Local(14));
        assert_eq!(reader.next_variable().unwrap(), ZVariable::Global(0));
        assert_eq!(reader.next_variable().unwrap(), ZVariable::Global(239));
    }

    #[test]
    fn short_branches_use_six_unsigned_bits() {
        let (memory, start) = reader_over(&[0b_1100_0101]);
        let mut reader = ZMemoryReader::new(&memory, start);
        let branch = reader.next_branch().unwrap();
        assert!(branch.condition);
        assert_eq!(branch.target, ZBranchTarget::Offset(5));
        assert_eq!(reader.position(), start + 1);
    }

    #[test]
    fn long_branches_sign_extend_from_bit_13() {
        // offset -4 in 14 bits is 0x3FFC
        let (memory, start) = reader_over(&[0b_0011_1111, 0xFC]);
        let mut reader = ZMemoryReader::new(&memory, start);
        let branch = reader.next_branch().unwrap();
        assert!(!branch.condition);
        assert_eq!(branch.target, ZBranchTarget::Offset(-4));
        assert_eq!(reader.position(), start + 2);
    }

    #[test]
    fn offsets_zero_and_one_mean_return() {
        let (memory, start) = reader_over(&[0b_1100_0000, 0b_1100_0001]);
        let mut reader = ZMemoryReader::new(&memory, start);
        assert_eq!(
            reader.next_branch().unwrap().target,
            ZBranchTarget::ReturnFalse
        );
        assert_eq!(
            reader.next_branch().unwrap().target,
            ZBranchTarget::ReturnTrue
        );
    }

    #[test]
    fn long_branch_offsets_round_trip() {
        for offset in (-8192i16..8191).step_by(57) {
            if offset == 0 || offset == 1 {
                continue;
            }
            let raw = (offset as u16) & 0x3FFF;
            let (memory, start) = reader_over(&[(raw >> 8) as u8, raw as u8]);
            let mut reader = ZMemoryReader::new(&memory, start);
            let branch = reader.next_branch().unwrap();
            assert_eq!(branch.target, ZBranchTarget::Offset(offset));
        }
    }

    #[test]
    fn z_words_stop_at_the_terminator_bit() {
        let (memory, start) = reader_over(&[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0x00, 0x00]);
        let mut reader = ZMemoryReader::new(&memory, start);
        let words = reader.next_z_words().unwrap();
        assert_eq!(words, vec![0x1234, 0x5678, 0x9ABC]);
        assert_eq!(reader.position(), start + 6);
    }
}
