pub mod cache;
pub mod events;
pub mod handlers;
pub mod instructions;
pub mod opcodes;
pub mod stack;

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::errors::{ZmError, ZmResult};
use crate::zmachine::header::ZMachineHeader;
use crate::zmemory::{reader::ZMemoryReader, ZMemory, ZMemoryAddress::*};
use crate::zobjects::ZObjectsTable;
use crate::zscreen::ZScreen;
use crate::zstring;
use crate::{ZMachineVersion, ZMachineVersion::*};

use cache::ZInstructionCache;
use events::{EventSystem, Observer, ZCpuEvent};
use instructions::{ZBranchTarget, ZInstruction, ZOperand, ZVariable};
use stack::{ZCallStack, ZStackFrame};

/// A 16-bit machine word. Arithmetic opcodes reinterpret it as signed
/// two's complement; truncation back to 16 bits is defined behavior.
pub type ZValue = u16;

pub const ZERO: ZValue = 0;
pub const ONE: ZValue = 1;

/// Reinterprets a word the way signed opcodes see it.
pub fn signed(value: ZValue) -> i16 {
    value as i16
}

pub fn unsigned(value: i16) -> ZValue {
    value as u16
}

/// Branch targets are relative to the address after the branch data, minus 2.
fn offset_pc(pc: u32, offset: i16) -> u32 {
    (pc as i64 + offset as i64 - 2) as u32
}

/// What a suspended input opcode still needs once the host answers.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingInput {
    Char {
        store_variable: Option<ZVariable>,
    },
    Line {
        text_buffer: u32,
        parse_buffer: u32,
        store_variable: Option<ZVariable>,
    },
}

/// The kind of input the processor is suspended on, for the host's loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputRequest {
    Char,
    Line,
}

enum ZCpuState {
    Running,
    AwaitingInput(PendingInput),
    Halted,
}

/// The Z-machine's processing unit.
///
/// This virtual processor is Big Endian, which means a 2-bytes word (16 bits)
/// will be processed by Most Significant Byte first (the 8 highest bits).
///
/// The processor owns the call stack, the program counter, the instruction
/// cache and the random generator; memory and screen are borrowed per step.
pub struct ZCpu {
    /// The targeted Z-machine version.
    target: ZMachineVersion,
    /// The Program Counter points to the current instruction.
    pc: u32,
    stack: ZCallStack,
    cache: ZInstructionCache,
    rng: XorShiftRng,
    events: EventSystem<ZCpuEvent>,
    state: ZCpuState,
    executing: Option<Rc<ZInstruction>>,
}

impl ZCpu {
    pub fn from_header(header: &ZMachineHeader, memory: &ZMemory) -> ZmResult<Self> {
        let mut cpu = ZCpu {
            target: header.get_version(),
            pc: 0,
            stack: ZCallStack::with_main_frame(ZStackFrame::main(0, Vec::new())),
            cache: ZInstructionCache::new(),
            rng: XorShiftRng::from_entropy(),
            events: EventSystem::new(),
            state: ZCpuState::Running,
            executing: None,
        };
        cpu.reset(header, memory)?;
        Ok(cpu)
    }

    /// Puts the processor back at the story's entry point (load and restart).
    pub(crate) fn reset(&mut self, header: &ZMachineHeader, memory: &ZMemory) -> ZmResult<()> {
        self.state = ZCpuState::Running;
        self.executing = None;
        match header.get_initial_pc() {
            Byte(pc) => {
                self.stack = ZCallStack::with_main_frame(ZStackFrame::main(0, Vec::new()));
                self.pc = pc;
            }
            // V6+: the entry point is a routine called with no arguments
            PackedRoutine(packed) => {
                let routine = memory.resolve(PackedRoutine(packed)) as u32;
                let count = memory.read_byte(routine as usize)?;
                if count > 15 {
                    return Err(ZmError::IllegalState(format!(
                        "main routine at {:#X} claims {} locals",
                        routine, count
                    )));
                }
                self.stack = ZCallStack::with_main_frame(ZStackFrame::main(
                    routine,
                    vec![ZERO; count as usize],
                ));
                self.pc = routine + 1;
            }
            address => return Err(ZmError::MemoryInvalidAddress(address)),
        }
        Ok(())
    }

    /// Fetch, decode and execute exactly one instruction.
    ///
    /// Errors abort the step and leave the pc at the faulting instruction's
    /// start address; a later `step` re-attempts the same instruction.
    pub fn step(
        &mut self,
        memory: &mut ZMemory,
        header: &ZMachineHeader,
        objects: &ZObjectsTable,
        screen: &mut dyn ZScreen,
    ) -> ZmResult<()> {
        match &self.state {
            ZCpuState::Running => {}
            ZCpuState::AwaitingInput(_) => {
                return Err(ZmError::IllegalState(
                    "stepping while awaiting input".into(),
                ))
            }
            ZCpuState::Halted => {
                return Err(ZmError::IllegalState("stepping a halted processor".into()))
            }
        }
        let old_pc = self.pc;
        self.events.handle_event(&ZCpuEvent::Stepping { pc: old_pc });
        let instruction = self.fetch_instruction(memory)?;
        self.executing = Some(instruction.clone());
        let opcode = instruction.opcode(self.target)?;
        trace!("step {:#07X}: {}", old_pc, opcode.name);
        let next_pc = {
            let mut context =
                StepContext::new(self, memory, header, objects, screen, &instruction)?;
            (opcode.handler)(&mut context, &instruction)?;
            context.next_pc
        };
        self.pc = next_pc;
        self.events.handle_event(&ZCpuEvent::Stepped {
            old_pc,
            new_pc: self.pc,
        });
        Ok(())
    }

    fn fetch_instruction(&mut self, memory: &ZMemory) -> ZmResult<Rc<ZInstruction>> {
        if let Some(instruction) = self.cache.get(self.pc) {
            return Ok(instruction);
        }
        let mut reader = ZMemoryReader::new(memory, self.pc as usize);
        let instruction = Rc::new(ZInstruction::decoded(self.target, &mut reader)?);
        self.cache.insert(instruction.clone());
        Ok(instruction)
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn target(&self) -> ZMachineVersion {
        self.target
    }

    pub fn current_frame(&self) -> ZmResult<&ZStackFrame> {
        self.stack.current()
    }

    pub fn frames(&self) -> &[ZStackFrame] {
        self.stack.frames()
    }

    /// The instruction the last `step` worked on, for the debugger.
    pub fn executing_instruction(&self) -> Option<Rc<ZInstruction>> {
        self.executing.clone()
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, ZCpuState::Halted)
    }

    pub fn input_request(&self) -> Option<InputRequest> {
        match &self.state {
            ZCpuState::AwaitingInput(PendingInput::Char { .. }) => Some(InputRequest::Char),
            ZCpuState::AwaitingInput(PendingInput::Line { .. }) => Some(InputRequest::Line),
            _ => None,
        }
    }

    pub fn register_observer(&mut self, observer: Rc<RefCell<dyn Observer<ZCpuEvent>>>) -> usize {
        self.events.register_observer(observer)
    }

    pub fn remove_observer(
        &mut self,
        index: usize,
    ) -> Option<Rc<RefCell<dyn Observer<ZCpuEvent>>>> {
        self.events.remove_observer(index)
    }

    /// Puts back an input request claimed with the wrong resume kind.
    pub(crate) fn restore_pending(&mut self, pending: PendingInput) {
        self.state = ZCpuState::AwaitingInput(pending);
    }

    /// Claims the pending input request; the machine resumes through this.
    pub(crate) fn take_pending_input(&mut self) -> ZmResult<PendingInput> {
        match std::mem::replace(&mut self.state, ZCpuState::Running) {
            ZCpuState::AwaitingInput(pending) => Ok(pending),
            other => {
                self.state = other;
                Err(ZmError::IllegalState("no input request pending".into()))
            }
        }
    }

    /// Reads a variable; a `Stack` read pops the evaluation stack.
    pub(crate) fn read_variable(
        &mut self,
        memory: &ZMemory,
        globals_base: usize,
        variable: ZVariable,
    ) -> ZmResult<ZValue> {
        match variable {
            ZVariable::Stack => self.stack.current_mut()?.pop_eval(),
            ZVariable::Local(index) => self.stack.current()?.local(index),
            ZVariable::Global(index) => memory.read_word(globals_base + 2 * index as usize),
        }
    }

    /// Reads a variable in place; a `Stack` read peeks without popping.
    pub(crate) fn read_variable_indirectly(
        &self,
        memory: &ZMemory,
        globals_base: usize,
        variable: ZVariable,
    ) -> ZmResult<ZValue> {
        match variable {
            ZVariable::Stack => self.stack.current()?.peek_eval(),
            ZVariable::Local(index) => self.stack.current()?.local(index),
            ZVariable::Global(index) => memory.read_word(globals_base + 2 * index as usize),
        }
    }

    /// Writes a variable; a `Stack` write pushes onto the evaluation stack.
    pub(crate) fn write_variable(
        &mut self,
        memory: &mut ZMemory,
        globals_base: usize,
        variable: ZVariable,
        value: ZValue,
    ) -> ZmResult<()> {
        match variable {
            ZVariable::Stack => {
                self.stack.current_mut()?.push_eval(value);
                Ok(())
            }
            ZVariable::Local(index) => {
                let old_value = self.stack.current()?.local(index)?;
                self.stack.current_mut()?.set_local(index, value)?;
                self.events.handle_event(&ZCpuEvent::LocalVariableChanged {
                    index,
                    old_value,
                    new_value: value,
                });
                Ok(())
            }
            ZVariable::Global(index) => memory.write_word(globals_base + 2 * index as usize, value),
        }
    }

    /// Writes a variable in place; a `Stack` write overwrites the top.
    pub(crate) fn write_variable_indirectly(
        &mut self,
        memory: &mut ZMemory,
        globals_base: usize,
        variable: ZVariable,
        value: ZValue,
    ) -> ZmResult<()> {
        match variable {
            ZVariable::Stack => {
                let frame = self.stack.current_mut()?;
                frame.pop_eval()?;
                frame.push_eval(value);
                Ok(())
            }
            variable => self.write_variable(memory, globals_base, variable, value),
        }
    }
}

/// The capability surface opcode handlers run against.
///
/// One implementation exists per live `step` (borrowing the processor, the
/// memory and the screen together); keeping handlers behind this interface
/// keeps their semantics testable and the dispatch a plain function call.
pub trait ExecutionContext {
    fn version(&self) -> ZMachineVersion;

    /// Resolves an operand to its value, left-to-right order is the caller's
    /// responsibility; a `Stack` variable operand pops.
    fn operand_value(&mut self, instruction: &ZInstruction, index: usize) -> ZmResult<ZValue>;

    /// Reads an operand naming a variable (store/load/inc/dec/pull family).
    fn operand_variable(&mut self, instruction: &ZInstruction, index: usize)
        -> ZmResult<ZVariable>;

    fn read_byte(&self, address: u32) -> ZmResult<u8>;
    fn read_word(&self, address: u32) -> ZmResult<u16>;
    fn write_byte(&mut self, address: u32, value: u8) -> ZmResult<()>;
    fn write_word(&mut self, address: u32, value: u16) -> ZmResult<()>;

    fn read_variable(&mut self, variable: ZVariable) -> ZmResult<ZValue>;
    fn read_variable_indirectly(&self, variable: ZVariable) -> ZmResult<ZValue>;
    fn write_variable(&mut self, variable: ZVariable, value: ZValue) -> ZmResult<()>;
    fn write_variable_indirectly(&mut self, variable: ZVariable, value: ZValue) -> ZmResult<()>;

    /// Writes through the instruction's store variable, when it has one.
    fn store_result(&mut self, instruction: &ZInstruction, value: ZValue) -> ZmResult<()>;

    fn push_eval(&mut self, value: ZValue) -> ZmResult<()>;
    fn pop_eval(&mut self) -> ZmResult<ZValue>;

    fn call_routine(
        &mut self,
        packed_address: ZValue,
        arguments: &[ZValue],
        store_variable: Option<ZVariable>,
    ) -> ZmResult<()>;
    fn return_value(&mut self, value: ZValue) -> ZmResult<()>;
    fn throw_to_frame(&mut self, frame_count: usize, value: ZValue) -> ZmResult<()>;
    fn branch(&mut self, instruction: &ZInstruction, predicate: bool) -> ZmResult<()>;
    fn jump_by(&mut self, offset: i16);
    fn argument_count(&self) -> ZmResult<usize>;
    fn frame_count(&self) -> usize;

    fn unpack_routine_address(&self, packed: ZValue) -> u32;
    fn unpack_string_address(&self, packed: ZValue) -> u32;

    fn object_parent(&self, object: u16) -> ZmResult<u16>;
    fn object_sibling(&self, object: u16) -> ZmResult<u16>;
    fn object_child(&self, object: u16) -> ZmResult<u16>;
    fn object_test_attribute(&self, object: u16, attribute: u16) -> ZmResult<bool>;
    fn object_set_attribute(&mut self, object: u16, attribute: u16, on: bool) -> ZmResult<()>;
    fn object_insert(&mut self, object: u16, destination: u16) -> ZmResult<()>;
    fn object_remove(&mut self, object: u16) -> ZmResult<()>;
    fn object_short_name(&self, object: u16) -> ZmResult<String>;
    fn property_value(&self, object: u16, property: u16) -> ZmResult<ZValue>;
    fn property_put(&mut self, object: u16, property: u16, value: ZValue) -> ZmResult<()>;
    fn property_address(&self, object: u16, property: u16) -> ZmResult<ZValue>;
    fn property_length(&self, data_address: ZValue) -> ZmResult<ZValue>;
    fn property_next(&self, object: u16, property: u16) -> ZmResult<ZValue>;

    fn decode_z_words(&self, words: &[u16]) -> ZmResult<String>;
    fn decode_z_text_at(&self, address: u32) -> ZmResult<String>;
    fn print(&mut self, text: &str) -> ZmResult<()>;
    fn print_zscii(&mut self, code: ZValue) -> ZmResult<()>;
    fn show_status(&mut self) -> ZmResult<()>;
    fn screen(&mut self) -> &mut dyn ZScreen;

    /// Reseeds the generator; seed 0 falls back to system entropy.
    fn randomize(&mut self, seed: ZValue);
    /// Uniform value in [1, range].
    fn next_random(&mut self, range: ZValue) -> ZValue;

    fn request_char_input(&mut self, store_variable: Option<ZVariable>) -> ZmResult<()>;
    fn request_line_input(
        &mut self,
        text_buffer: u32,
        parse_buffer: u32,
        store_variable: Option<ZVariable>,
    ) -> ZmResult<()>;
    fn quit(&mut self);
    fn restart(&mut self) -> ZmResult<()>;
    fn verify_checksum(&self) -> ZmResult<bool>;
}

/// The borrow of processor, memory, header, objects and screen alive for one
/// instruction.
pub(crate) struct StepContext<'a> {
    cpu: &'a mut ZCpu,
    memory: &'a mut ZMemory,
    header: &'a ZMachineHeader,
    objects: &'a ZObjectsTable,
    screen: &'a mut dyn ZScreen,
    globals_base: usize,
    abbreviations: Option<usize>,
    /// Where the pc lands when the handler neither jumps, calls nor returns.
    pub(crate) next_pc: u32,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        cpu: &'a mut ZCpu,
        memory: &'a mut ZMemory,
        header: &'a ZMachineHeader,
        objects: &'a ZObjectsTable,
        screen: &'a mut dyn ZScreen,
        instruction: &ZInstruction,
    ) -> ZmResult<Self> {
        let globals_base = memory.resolve(header.get_location_global_variables_table());
        let abbreviations = header
            .get_location_abbreviations_table()
            .map(|address| memory.resolve(address));
        let next_pc = instruction.address + instruction.length;
        Ok(StepContext {
            cpu,
            memory,
            header,
            objects,
            screen,
            globals_base,
            abbreviations,
            next_pc,
        })
    }
}

impl<'a> ExecutionContext for StepContext<'a> {
    fn version(&self) -> ZMachineVersion {
        self.cpu.target
    }

    fn operand_value(&mut self, instruction: &ZInstruction, index: usize) -> ZmResult<ZValue> {
        let operand =
            instruction
                .operands
                .get(index)
                .copied()
                .ok_or(ZmError::DecodeMalformed {
                    address: instruction.address,
                    reason: "missing operand",
                })?;
        match operand {
            ZOperand::ConstantLarge(value) => Ok(value),
            ZOperand::ConstantSmall(value) => Ok(value as ZValue),
            ZOperand::Variable(variable) => self.read_variable(variable),
            ZOperand::Omitted => Err(ZmError::DecodeMalformed {
                address: instruction.address,
                reason: "omitted operand",
            }),
        }
    }

    fn operand_variable(
        &mut self,
        instruction: &ZInstruction,
        index: usize,
    ) -> ZmResult<ZVariable> {
        Ok(ZVariable::from_wire(
            self.operand_value(instruction, index)? as u8,
        ))
    }

    fn read_byte(&self, address: u32) -> ZmResult<u8> {
        self.memory.read_byte(address as usize)
    }

    fn read_word(&self, address: u32) -> ZmResult<u16> {
        self.memory.read_word(address as usize)
    }

    fn write_byte(&mut self, address: u32, value: u8) -> ZmResult<()> {
        self.memory.write_byte(address as usize, value)
    }

    fn write_word(&mut self, address: u32, value: u16) -> ZmResult<()> {
        self.memory.write_word(address as usize, value)
    }

    fn read_variable(&mut self, variable: ZVariable) -> ZmResult<ZValue> {
        self.cpu
            .read_variable(self.memory, self.globals_base, variable)
    }

    fn read_variable_indirectly(&self, variable: ZVariable) -> ZmResult<ZValue> {
        self.cpu
            .read_variable_indirectly(self.memory, self.globals_base, variable)
    }

    fn write_variable(&mut self, variable: ZVariable, value: ZValue) -> ZmResult<()> {
        self.cpu
            .write_variable(self.memory, self.globals_base, variable, value)
    }

    fn write_variable_indirectly(&mut self, variable: ZVariable, value: ZValue) -> ZmResult<()> {
        self.cpu
            .write_variable_indirectly(self.memory, self.globals_base, variable, value)
    }

    fn store_result(&mut self, instruction: &ZInstruction, value: ZValue) -> ZmResult<()> {
        match instruction.store_variable {
            Some(variable) => self.write_variable(variable, value),
            None => Ok(()),
        }
    }

    fn push_eval(&mut self, value: ZValue) -> ZmResult<()> {
        self.cpu.stack.current_mut()?.push_eval(value);
        Ok(())
    }

    fn pop_eval(&mut self) -> ZmResult<ZValue> {
        self.cpu.stack.current_mut()?.pop_eval()
    }

    /// The call protocol (R6.4): unpack, read the local count, fill locals
    /// with in-line initial values (V1-V4) or zeroes (V5+), then overlay the
    /// arguments. Calling packed address 0 stores false and pushes nothing.
    fn call_routine(
        &mut self,
        packed_address: ZValue,
        arguments: &[ZValue],
        store_variable: Option<ZVariable>,
    ) -> ZmResult<()> {
        if packed_address == 0 {
            if let Some(variable) = store_variable {
                self.write_variable(variable, ZERO)?;
            }
            return Ok(());
        }
        let routine = self.memory.resolve(PackedRoutine(packed_address)) as u32;
        let count = self.memory.read_byte(routine as usize)?;
        if count > 15 {
            return Err(ZmError::IllegalState(format!(
                "routine at {:#X} claims {} locals",
                routine, count
            )));
        }
        let mut locals = Vec::with_capacity(count as usize);
        let mut entry_pc = routine + 1;
        if self.cpu.target <= V4 {
            for _ in 0..count {
                locals.push(self.memory.read_word(entry_pc as usize)?);
                entry_pc += 2;
            }
        } else {
            locals.resize(count as usize, ZERO);
        }
        // extra arguments are discarded, unfilled locals keep their initial value
        for (local, argument) in locals.iter_mut().zip(arguments.iter()) {
            *local = *argument;
        }
        let old_routine = self.cpu.stack.current()?.routine_address();
        self.cpu.stack.push(ZStackFrame::for_call(
            routine,
            arguments.to_vec(),
            locals,
            self.next_pc,
            store_variable,
        ));
        self.cpu.events.handle_event(&ZCpuEvent::EnterFrame {
            old_routine,
            new_routine: routine,
        });
        self.next_pc = entry_pc;
        Ok(())
    }

    fn return_value(&mut self, value: ZValue) -> ZmResult<()> {
        let frame = self.cpu.stack.pop()?;
        let return_address = frame.return_address().ok_or_else(|| {
            ZmError::IllegalState("return from a frame with no return address".into())
        })?;
        if let Some(variable) = frame.store_variable() {
            self.write_variable(variable, value)?;
        }
        self.next_pc = return_address;
        self.cpu.events.handle_event(&ZCpuEvent::ExitFrame {
            old_routine: frame.routine_address(),
            new_routine: self.cpu.stack.current()?.routine_address(),
        });
        Ok(())
    }

    fn throw_to_frame(&mut self, frame_count: usize, value: ZValue) -> ZmResult<()> {
        if frame_count == 0 || frame_count > self.cpu.stack.len() {
            return Err(ZmError::IllegalState(format!(
                "throw to invalid frame {}",
                frame_count
            )));
        }
        while self.cpu.stack.len() > frame_count {
            self.cpu.stack.pop()?;
        }
        self.return_value(value)
    }

    fn branch(&mut self, instruction: &ZInstruction, predicate: bool) -> ZmResult<()> {
        let branch = instruction.branch.ok_or_else(|| {
            ZmError::IllegalState("branch on an opcode without a branch field".into())
        })?;
        if predicate != branch.condition {
            return Ok(());
        }
        match branch.target {
            ZBranchTarget::ReturnFalse => self.return_value(ZERO),
            ZBranchTarget::ReturnTrue => self.return_value(ONE),
            ZBranchTarget::Offset(offset) => {
                self.next_pc = offset_pc(self.next_pc, offset);
                Ok(())
            }
        }
    }

    fn jump_by(&mut self, offset: i16) {
        self.next_pc = offset_pc(self.next_pc, offset);
    }

    fn argument_count(&self) -> ZmResult<usize> {
        Ok(self.cpu.stack.current()?.argument_count())
    }

    fn frame_count(&self) -> usize {
        self.cpu.stack.len()
    }

    fn unpack_routine_address(&self, packed: ZValue) -> u32 {
        self.memory.resolve(PackedRoutine(packed)) as u32
    }

    fn unpack_string_address(&self, packed: ZValue) -> u32 {
        self.memory.resolve(PackedString(packed)) as u32
    }

    fn object_parent(&self, object: u16) -> ZmResult<u16> {
        self.objects.get_parent(self.memory, object)
    }

    fn object_sibling(&self, object: u16) -> ZmResult<u16> {
        self.objects.get_sibling(self.memory, object)
    }

    fn object_child(&self, object: u16) -> ZmResult<u16> {
        self.objects.get_child(self.memory, object)
    }

    fn object_test_attribute(&self, object: u16, attribute: u16) -> ZmResult<bool> {
        self.objects.test_attribute(self.memory, object, attribute)
    }

    fn object_set_attribute(&mut self, object: u16, attribute: u16, on: bool) -> ZmResult<()> {
        self.objects
            .set_attribute(self.memory, object, attribute, on)
    }

    fn object_insert(&mut self, object: u16, destination: u16) -> ZmResult<()> {
        self.objects.insert(self.memory, object, destination)
    }

    fn object_remove(&mut self, object: u16) -> ZmResult<()> {
        self.objects.remove(self.memory, object)
    }

    fn object_short_name(&self, object: u16) -> ZmResult<String> {
        let address = self.objects.short_name_address(self.memory, object)?;
        let (text, _) =
            zstring::decode_z_text_at(self.memory, address, self.cpu.target, self.abbreviations)?;
        Ok(text)
    }

    fn property_value(&self, object: u16, property: u16) -> ZmResult<ZValue> {
        self.objects.get_property(self.memory, object, property)
    }

    fn property_put(&mut self, object: u16, property: u16, value: ZValue) -> ZmResult<()> {
        self.objects
            .put_property(self.memory, object, property, value)
    }

    fn property_address(&self, object: u16, property: u16) -> ZmResult<ZValue> {
        self.objects
            .get_property_address(self.memory, object, property)
    }

    fn property_length(&self, data_address: ZValue) -> ZmResult<ZValue> {
        self.objects.get_property_length(self.memory, data_address)
    }

    fn property_next(&self, object: u16, property: u16) -> ZmResult<ZValue> {
        self.objects
            .get_next_property(self.memory, object, property)
    }

    fn decode_z_words(&self, words: &[u16]) -> ZmResult<String> {
        zstring::decode_z_words(self.memory, words, self.cpu.target, self.abbreviations)
    }

    fn decode_z_text_at(&self, address: u32) -> ZmResult<String> {
        let (text, _) = zstring::decode_z_text_at(
            self.memory,
            address as usize,
            self.cpu.target,
            self.abbreviations,
        )?;
        Ok(text)
    }

    fn print(&mut self, text: &str) -> ZmResult<()> {
        self.screen.print(text);
        Ok(())
    }

    fn print_zscii(&mut self, code: ZValue) -> ZmResult<()> {
        if let Some(ch) = zstring::ZSCII(code).to_char()? {
            self.screen.print_char(ch);
        }
        Ok(())
    }

    /// Rebuilds the V1-V3 status line from globals G0 (location), G1 and G2
    /// (score/turns or hours/minutes, R8.2).
    fn show_status(&mut self) -> ZmResult<()> {
        let object = self.memory.read_word(self.globals_base)?;
        let location = if object != 0 {
            self.object_short_name(object)?
        } else {
            String::new()
        };
        let score = signed(self.memory.read_word(self.globals_base + 2)?);
        let turns = self.memory.read_word(self.globals_base + 4)?;
        let status = format!("{}/{}", score, turns);
        self.screen.show_status(&location, &status);
        Ok(())
    }

    fn screen(&mut self) -> &mut dyn ZScreen {
        &mut *self.screen
    }

    fn randomize(&mut self, seed: ZValue) {
        self.cpu.rng = if seed == 0 {
            XorShiftRng::from_entropy()
        } else {
            XorShiftRng::seed_from_u64(seed as u64)
        };
    }

    fn next_random(&mut self, range: ZValue) -> ZValue {
        if range == 0 {
            return ZERO;
        }
        self.cpu.rng.gen_range(1..=range)
    }

    fn request_char_input(&mut self, store_variable: Option<ZVariable>) -> ZmResult<()> {
        self.screen.request_char();
        self.cpu.state = ZCpuState::AwaitingInput(PendingInput::Char { store_variable });
        Ok(())
    }

    fn request_line_input(
        &mut self,
        text_buffer: u32,
        parse_buffer: u32,
        store_variable: Option<ZVariable>,
    ) -> ZmResult<()> {
        let max_length = self.memory.read_byte(text_buffer as usize)? as usize;
        self.screen.request_line(max_length);
        self.cpu.state = ZCpuState::AwaitingInput(PendingInput::Line {
            text_buffer,
            parse_buffer,
            store_variable,
        });
        Ok(())
    }

    fn quit(&mut self) {
        self.cpu.state = ZCpuState::Halted;
        self.cpu.events.handle_event(&ZCpuEvent::Quit);
    }

    fn restart(&mut self) -> ZmResult<()> {
        self.memory.reset_dynamic();
        self.cpu.reset(self.header, self.memory)?;
        self.next_pc = self.cpu.pc;
        Ok(())
    }

    fn verify_checksum(&self) -> ZmResult<bool> {
        self.memory.verify_checksum()
    }
}
