use tinyvec::ArrayVec;

use crate::errors::ZmResult;
use crate::zcpu::opcodes::{lookup_opcode, OpcodeEntry, OpcodeFlags, OpcodeKind};
use crate::zmemory::reader::ZMemoryReader;
use crate::{ZMachineVersion, ZMachineVersion::*};

/// A routine-context variable reference.
///
/// On the wire, 0x00 refers to the top of the stack, [0x01, 0x0F] to the
/// routine's local variables and [0x10, 0xFF] to the global variables.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZVariable {
    Stack,
    Local(u8),
    Global(u8),
}

impl ZVariable {
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            0x00 => ZVariable::Stack,
            0x01..=0x0F => ZVariable::Local(byte - 0x01),
            _ => ZVariable::Global(byte - 0x10),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            ZVariable::Stack => 0x00,
            ZVariable::Local(index) => index + 0x01,
            ZVariable::Global(index) => index + 0x10,
        }
    }
}

/// The different types of operand for an operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZOperand {
    /// A 2 bytes constant.
    ConstantLarge(u16),
    /// A 1 byte constant.
    ConstantSmall(u8),
    /// A variable in the context of the current routine.
    Variable(ZVariable),
    /// No operand type.
    ///
    /// Terminates an operand list on the wire; never stored in a decoded
    /// instruction (it only exists so the inline operand array has a filler).
    Omitted,
}

impl Default for ZOperand {
    fn default() -> Self {
        ZOperand::Omitted
    }
}

/// The four 2-bit operand kind fields of a types byte (R4.4.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZOperandKind {
    ConstantLarge,
    ConstantSmall,
    Variable,
    Omitted,
}

impl Default for ZOperandKind {
    fn default() -> Self {
        ZOperandKind::Omitted
    }
}

impl ZOperandKind {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => ZOperandKind::ConstantLarge,
            0b01 => ZOperandKind::ConstantSmall,
            0b10 => ZOperandKind::Variable,
            _ => ZOperandKind::Omitted,
        }
    }

    /// Splits a types byte into its four kind fields, highest bits first.
    pub fn list_from_byte(byte: u8) -> [Self; 4] {
        [
            Self::from_bits(byte >> 6),
            Self::from_bits(byte >> 4),
            Self::from_bits(byte >> 2),
            Self::from_bits(byte),
        ]
    }
}

/// Where a branch lands when taken.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZBranchTarget {
    /// Return false from the current routine.
    ReturnFalse,
    /// Return true from the current routine.
    ReturnTrue,
    /// Jump to (address after branch data) + offset - 2.
    Offset(i16),
}

/// A decoded branch field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ZBranch {
    /// The predicate value that makes the branch fire.
    pub condition: bool,
    pub target: ZBranchTarget,
}

/// The different forms an instruction can take.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InstructionForm {
    Long,
    Short,
    Extended,
    Variable,
}

impl InstructionForm {
    /// Determines an instruction's form from its opcode (R4.3).
    pub fn from_opcode(opcode_msb: u8, target: ZMachineVersion) -> Self {
        use InstructionForm::*;
        if opcode_msb == 0xBE && target >= V5 {
            Extended
        } else {
            match opcode_msb & 0b_1100_0000 {
                0b_1100_0000 => Variable,
                0b_1000_0000 => Short,
                _ => Long,
            }
        }
    }
}

/// A decoded instruction for the `ZCpu` to execute.
///
/// An instruction is described in memory according to the following layout,
/// with parentheses marking optional parameters:
///
/// Opcode                    1-2 bytes
/// (Types of operands)       1-2 bytes: 4 or 8 2-bit fields
/// Operands                  0 to 8, each 1-2 bytes
/// (Store variable)          1 byte
/// (Branch offset)           1-2 bytes
/// (Text to print)           encoded string with dynamic length
///
/// Each instruction has a long, short or variable form, and extended form for V5+
///
/// Reference: section 4 of the Standards Document.
/// http://inform-fiction.org/zmachine/standards/z1point1/sect04.html
#[derive(Clone, Debug, PartialEq)]
pub struct ZInstruction {
    /// Address of the first opcode byte.
    pub address: u32,
    /// Exact number of bytes between `address` and the byte after the last field.
    pub length: u32,
    pub form: InstructionForm,
    pub kind: OpcodeKind,
    pub number: u8,
    pub operands: ArrayVec<[ZOperand; 8]>,
    pub store_variable: Option<ZVariable>,
    pub branch: Option<ZBranch>,
    /// In-line encoded text for `print` and `print_ret`.
    pub z_text: Option<Vec<u16>>,
}

impl ZInstruction {
    /// Decodes one instruction at the reader's current position and leaves the
    /// cursor on the byte after its last field.
    pub fn decoded(target: ZMachineVersion, reader: &mut ZMemoryReader) -> ZmResult<Self> {
        let address = reader.position() as u32;
        let opcode_msb = reader.next_byte()?;
        let form = InstructionForm::from_opcode(opcode_msb, target);
        let (kind, number) = match form {
            InstructionForm::Short => {
                // R4.3.1: the single operand kind sits in bits 5-4; 0b11 means no operand at all
                match (opcode_msb & 0b_0011_0000) >> 4 {
                    0b11 => (OpcodeKind::ZeroOp, opcode_msb & 0b_0000_1111),
                    _ => (OpcodeKind::OneOp, opcode_msb & 0b_0000_1111),
                }
            }
            // R4.3.2
            InstructionForm::Long => (OpcodeKind::TwoOp, opcode_msb & 0b_0001_1111),
            InstructionForm::Variable => {
                // R4.3.3
                let kind = if opcode_msb & 0b_0010_0000 != 0 {
                    OpcodeKind::VarOp
                } else {
                    OpcodeKind::TwoOp
                };
                (kind, opcode_msb & 0b_0001_1111)
            }
            // R4.3.4
            InstructionForm::Extended => (OpcodeKind::Ext, reader.next_byte()?),
        };
        let entry = lookup_opcode(target, kind, number)?;

        let mut operands: ArrayVec<[ZOperand; 8]> = ArrayVec::new();
        match form {
            InstructionForm::Long => {
                // R4.4.2: bit 6 and bit 5 pick small constant vs variable
                for mask in &[0b_0100_0000u8, 0b_0010_0000u8] {
                    operands.push(if opcode_msb & mask != 0 {
                        ZOperand::Variable(reader.next_variable()?)
                    } else {
                        ZOperand::ConstantSmall(reader.next_byte()?)
                    });
                }
            }
            InstructionForm::Short => {
                if kind == OpcodeKind::OneOp {
                    let operand_kind = ZOperandKind::from_bits((opcode_msb & 0b_0011_0000) >> 4);
                    if let Some(operand) = Self::read_operand(operand_kind, reader)? {
                        operands.push(operand);
                    }
                }
            }
            InstructionForm::Variable | InstructionForm::Extended => {
                // R4.4.3/R4.4.3.1: one types byte, two for the double-variable calls
                let mut kinds: ArrayVec<[ZOperandKind; 8]> = ArrayVec::new();
                let types = reader.next_byte()?;
                kinds.extend(ZOperandKind::list_from_byte(types).iter().copied());
                if entry.flags.contains(OpcodeFlags::DOUBLE_VAR) {
                    let types = reader.next_byte()?;
                    kinds.extend(ZOperandKind::list_from_byte(types).iter().copied());
                }
                for operand_kind in kinds {
                    match Self::read_operand(operand_kind, reader)? {
                        Some(operand) => operands.push(operand),
                        None => break,
                    }
                }
            }
        }

        let store_variable = if entry.flags.contains(OpcodeFlags::STORE) {
            Some(reader.next_variable()?)
        } else {
            None
        };
        let branch = if entry.flags.contains(OpcodeFlags::BRANCH) {
            Some(reader.next_branch()?)
        } else {
            None
        };
        let z_text = if entry.flags.contains(OpcodeFlags::TEXT) {
            Some(reader.next_z_words()?)
        } else {
            None
        };

        Ok(ZInstruction {
            address,
            length: reader.position() as u32 - address,
            form,
            kind,
            number,
            operands,
            store_variable,
            branch,
            z_text,
        })
    }

    fn read_operand(
        kind: ZOperandKind,
        reader: &mut ZMemoryReader,
    ) -> ZmResult<Option<ZOperand>> {
        Ok(match kind {
            ZOperandKind::ConstantLarge => Some(ZOperand::ConstantLarge(reader.next_word()?)),
            ZOperandKind::ConstantSmall => Some(ZOperand::ConstantSmall(reader.next_byte()?)),
            ZOperandKind::Variable => Some(ZOperand::Variable(reader.next_variable()?)),
            ZOperandKind::Omitted => None,
        })
    }

    /// Looks the instruction's opcode up in the version's table.
    pub fn opcode(&self, target: ZMachineVersion) -> ZmResult<OpcodeEntry> {
        lookup_opcode(target, self.kind, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ZmError;
    use crate::testing::StoryBuilder;
    use crate::zmemory::ZMemory;

    fn decode(version: ZMachineVersion, code: &[u8]) -> ZInstruction {
        let builder = StoryBuilder::new(version).with_code(code);
        let start = builder.code_address();
        let memory = builder.build_memory();
        let mut reader = ZMemoryReader::new(&memory, start);
        ZInstruction::decoded(version, &mut reader).expect("instruction should decode")
    }

    #[test]
    fn long_form_kinds_come_from_bits_6_and_5() {
        // add 5, 7 -> sp
        let add = decode(V3, &[0x14, 0x05, 0x07, 0x00]);
        assert_eq!(add.form, InstructionForm::Long);
        assert_eq!(add.kind, OpcodeKind::TwoOp);
        assert_eq!(add.number, 20);
        assert_eq!(
            &add.operands[..],
            &[ZOperand::ConstantSmall(5), ZOperand::ConstantSmall(7)]
        );
        assert_eq!(add.store_variable, Some(ZVariable::Stack));
        assert_eq!(add.length, 4);

        // add local0, g0 -> sp
        let add = decode(V3, &[0x74, 0x01, 0x10, 0x00]);
        assert_eq!(
            &add.operands[..],
            &[
                ZOperand::Variable(ZVariable::Local(0)),
                ZOperand::Variable(ZVariable::Global(0))
            ]
        );
    }

    #[test]
    fn short_form_zero_op() {
        let rtrue = decode(V3, &[0xB0]);
        assert_eq!(rtrue.form, InstructionForm::Short);
        assert_eq!(rtrue.kind, OpcodeKind::ZeroOp);
        assert_eq!(rtrue.number, 0);
        assert!(rtrue.operands.is_empty());
        assert_eq!(rtrue.length, 1);
    }

    #[test]
    fn short_form_one_op_large_constant() {
        // jump +0x1234
        let jump = decode(V3, &[0x8C, 0x12, 0x34]);
        assert_eq!(jump.kind, OpcodeKind::OneOp);
        assert_eq!(jump.number, 12);
        assert_eq!(&jump.operands[..], &[ZOperand::ConstantLarge(0x1234)]);
        assert_eq!(jump.length, 3);
    }

    #[test]
    fn variable_form_kinds_byte_truncates_at_omitted() {
        // call_vs packed, #7 -> sp: kinds 00 01 11 11
        let call = decode(V5, &[0xE0, 0x1F, 0x01, 0x80, 0x07, 0x00]);
        assert_eq!(call.kind, OpcodeKind::VarOp);
        assert_eq!(call.number, 0);
        assert_eq!(
            &call.operands[..],
            &[
                ZOperand::ConstantLarge(0x0180),
                ZOperand::ConstantSmall(0x07)
            ]
        );
        assert_eq!(call.store_variable, Some(ZVariable::Stack));
        assert_eq!(call.length, 6);
    }

    #[test]
    fn operand_kind_fields_split_high_to_low() {
        assert_eq!(
            ZOperandKind::list_from_byte(0b_00_01_10_11),
            [
                ZOperandKind::ConstantLarge,
                ZOperandKind::ConstantSmall,
                ZOperandKind::Variable,
                ZOperandKind::Omitted,
            ]
        );
    }

    #[test]
    fn double_variable_calls_read_two_kinds_bytes() {
        // call_vs2 packed, 1, 2, 3, 4, 5, 6, 7 -> sp
        let call = decode(
            V5,
            &[
                0xEC, 0x15, 0x55, 0x01, 0x80, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x00,
            ],
        );
        assert_eq!(call.number, 12);
        assert_eq!(call.operands.len(), 8);
        assert_eq!(call.operands[0], ZOperand::ConstantLarge(0x0180));
        assert_eq!(call.operands[7], ZOperand::ConstantSmall(0x07));
        assert_eq!(call.length, 13);
    }

    #[test]
    fn extended_form_reads_the_number_from_the_second_byte() {
        // log_shift 8, 2 -> sp
        let shift = decode(V5, &[0xBE, 0x02, 0x5F, 0x08, 0x02, 0x00]);
        assert_eq!(shift.form, InstructionForm::Extended);
        assert_eq!(shift.kind, OpcodeKind::Ext);
        assert_eq!(shift.number, 2);
        assert_eq!(shift.length, 6);
    }

    #[test]
    fn extended_marker_is_not_an_opcode_before_v5() {
        // 0xBE reads as 0OP:14, which no version defines
        let builder = StoryBuilder::new(V4).with_code(&[0xBE, 0x01, 0x00]);
        let start = builder.code_address();
        let memory = builder.build_memory();
        let mut reader = ZMemoryReader::new(&memory, start);
        assert!(matches!(
            ZInstruction::decoded(V4, &mut reader),
            Err(ZmError::DecodeUnknownOpcode { .. })
        ));
    }

    #[test]
    fn branch_and_text_fields_follow_the_operands() {
        // je 1, 2 ?~+0x0A (branch on false, one byte)
        let je = decode(V3, &[0x01, 0x01, 0x02, 0x4A]);
        let branch = je.branch.expect("je should carry a branch");
        assert!(!branch.condition);
        assert_eq!(branch.target, ZBranchTarget::Offset(0x0A));
        assert_eq!(je.length, 4);

        // print "hello"
        let print = decode(V3, &[0xB2, 0x35, 0x51, 0xC6, 0x85]);
        assert_eq!(print.z_text, Some(vec![0x3551, 0xC685]));
        assert_eq!(print.length, 5);
    }

    #[test]
    fn redecoding_yields_equal_instructions() {
        let builder = StoryBuilder::new(V5).with_code(&[0xE0, 0x1F, 0x01, 0x80, 0x07, 0x00]);
        let start = builder.code_address();
        let memory: ZMemory = builder.build_memory();
        let mut first_pass = ZMemoryReader::new(&memory, start);
        let mut second_pass = ZMemoryReader::new(&memory, start);
        let first = ZInstruction::decoded(V5, &mut first_pass).unwrap();
        let second = ZInstruction::decoded(V5, &mut second_pass).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_opcodes_fail_to_decode() {
        let builder = StoryBuilder::new(V3).with_code(&[0x00, 0x01, 0x02]);
        let start = builder.code_address();
        let memory = builder.build_memory();
        let mut reader = ZMemoryReader::new(&memory, start);
        assert!(matches!(
            ZInstruction::decoded(V3, &mut reader),
            Err(ZmError::DecodeUnknownOpcode { .. })
        ));
    }
}
