pub mod header;

use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

use log::info;

use crate::errors::{ZmError, ZmResult};
use crate::zcpu::events::{Observer, ZCpuEvent};
use crate::zcpu::instructions::ZInstruction;
use crate::zcpu::stack::ZStackFrame;
use crate::zcpu::{InputRequest, PendingInput, ZCpu};
use crate::zmemory::ZMemory;
use crate::zobjects::ZObjectsTable;
use crate::zscreen::{NullScreen, ZScreen};
use crate::zstring::ZSCII;
pub use header::{ZMachineHeader, ZMachineVersion};

/// The core of zif's Z-machine interpreter.
///
/// Owns the loaded story memory, the decoded header, the object table view
/// and the processor; the host plugs in a screen and optionally observers,
/// then drives `step` until the story quits or asks for input.
pub struct ZMachine {
    /// The virtual memory management unit.
    memory: ZMemory,
    /// The story header information, decoded from the first 64 bytes of memory.
    header: ZMachineHeader,
    objects: ZObjectsTable,
    cpu: ZCpu,
    screen: Box<dyn ZScreen>,
}

impl ZMachine {
    /// Create a new Z-machine interpreter instance and try to load the given
    /// binary source into memory and initialize the VM according to the parsed header data.
    pub fn from_story_reader(reader: &mut dyn Read) -> ZmResult<Self> {
        let mut memory = ZMemory::from_story_reader(reader)?;
        let mut header = ZMachineHeader::from_memory(&memory)?;
        header.reset(&mut memory)?;
        let objects = ZObjectsTable::from_memory_and_header(&memory, &header)?;
        let cpu = ZCpu::from_header(&header, &memory)?;
        info!(
            "loaded {} story: release {}, serial {}",
            header.get_version(),
            header.get_release(),
            header.get_serial()
        );
        Ok(ZMachine {
            memory,
            header,
            objects,
            cpu,
            screen: Box::new(NullScreen),
        })
    }

    /// Installs the host's output sink, replacing the default null screen.
    pub fn register_screen(&mut self, screen: Box<dyn ZScreen>) {
        self.screen = screen;
    }

    pub fn register_observer(&mut self, observer: Rc<RefCell<dyn Observer<ZCpuEvent>>>) -> usize {
        self.cpu.register_observer(observer)
    }

    pub fn remove_observer(
        &mut self,
        index: usize,
    ) -> Option<Rc<RefCell<dyn Observer<ZCpuEvent>>>> {
        self.cpu.remove_observer(index)
    }

    /// Executes exactly one instruction.
    pub fn step(&mut self) -> ZmResult<()> {
        self.cpu.step(
            &mut self.memory,
            &self.header,
            &self.objects,
            self.screen.as_mut(),
        )
    }

    pub fn pc(&self) -> u32 {
        self.cpu.pc()
    }

    pub fn current_frame(&self) -> ZmResult<&ZStackFrame> {
        self.cpu.current_frame()
    }

    pub fn frames(&self) -> &[ZStackFrame] {
        self.cpu.frames()
    }

    pub fn executing_instruction(&self) -> Option<Rc<ZInstruction>> {
        self.cpu.executing_instruction()
    }

    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// What the processor is suspended on, if anything.
    pub fn input_request(&self) -> Option<InputRequest> {
        self.cpu.input_request()
    }

    /// Read-only story memory, for the debugger panes.
    pub fn memory(&self) -> &ZMemory {
        &self.memory
    }

    pub fn header(&self) -> &ZMachineHeader {
        &self.header
    }

    pub fn verify_checksum(&self) -> ZmResult<bool> {
        self.memory.verify_checksum()
    }

    /// Completes a suspended `read_char` with the host's keypress.
    pub fn resume_with_char(&mut self, ch: char) -> ZmResult<()> {
        let pending = self.cpu.take_pending_input()?;
        match pending {
            PendingInput::Char { store_variable } => {
                if let Some(variable) = store_variable {
                    let globals_base = self.globals_base();
                    let code = ZSCII::from_input_char(ch).0;
                    self.cpu
                        .write_variable(&mut self.memory, globals_base, variable, code)?;
                }
                Ok(())
            }
            other => {
                self.cpu.restore_pending(other);
                Err(ZmError::IllegalState(
                    "a line of input is pending, not a character".into(),
                ))
            }
        }
    }

    /// Completes a suspended `read` with the host's line of input.
    ///
    /// The text lands in the story's text buffer per the version's layout
    /// (R15, read). Tokenisation into the parse buffer is the dictionary
    /// layer's concern; the token count is left at zero.
    pub fn resume_with_line(&mut self, line: &str) -> ZmResult<()> {
        let pending = self.cpu.take_pending_input()?;
        match pending {
            PendingInput::Line {
                text_buffer,
                parse_buffer,
                store_variable,
            } => {
                let text = text_buffer as usize;
                let max_length = self.memory.read_byte(text)? as usize;
                let input: Vec<u8> = line
                    .trim_end_matches(|ch| ch == '\n' || ch == '\r')
                    .chars()
                    .map(|ch| ZSCII::from_input_char(ch.to_ascii_lowercase()).0 as u8)
                    .collect();
                if self.header.get_version() >= ZMachineVersion::V5 {
                    let accepted = &input[..input.len().min(max_length)];
                    self.memory.write_byte(text + 1, accepted.len() as u8)?;
                    for (offset, byte) in accepted.iter().enumerate() {
                        self.memory.write_byte(text + 2 + offset, *byte)?;
                    }
                    if let Some(variable) = store_variable {
                        // the terminating character, always a plain newline here
                        let globals_base = self.globals_base();
                        self.cpu
                            .write_variable(&mut self.memory, globals_base, variable, 13)?;
                    }
                } else {
                    let accepted = &input[..input.len().min(max_length.saturating_sub(1))];
                    for (offset, byte) in accepted.iter().enumerate() {
                        self.memory.write_byte(text + 1 + offset, *byte)?;
                    }
                    self.memory.write_byte(text + 1 + accepted.len(), 0)?;
                }
                if parse_buffer != 0 {
                    self.memory.write_byte(parse_buffer as usize + 1, 0)?;
                }
                Ok(())
            }
            other => {
                self.cpu.restore_pending(other);
                Err(ZmError::IllegalState(
                    "a character is pending, not a line of input".into(),
                ))
            }
        }
    }

    fn globals_base(&self) -> usize {
        self.memory
            .resolve(self.header.get_location_global_variables_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StoryBuilder;

    #[test]
    fn v5_line_input_fills_the_buffer_with_a_length_byte() {
        // aread text-buffer parse-buffer -> sp, buffers at 0x200/0x240
        let mut machine = StoryBuilder::new(ZMachineVersion::V5)
            .set_header_byte(0x200, 20)
            .with_code(&[0xE4, 0x0F, 0x02, 0x00, 0x02, 0x40, 0x00])
            .build_machine();
        machine.step().unwrap();
        assert_eq!(machine.input_request(), Some(InputRequest::Line));
        assert!(machine.step().is_err());

        machine.resume_with_line("Open the Mailbox\n").unwrap();
        assert_eq!(machine.input_request(), None);
        let memory = machine.memory();
        assert_eq!(memory.read_byte(0x201).unwrap(), 16);
        assert_eq!(memory.read_byte(0x202).unwrap(), b'o');
        assert_eq!(memory.read_byte(0x211).unwrap(), b'x');
        // terminator stored through the store variable
        assert_eq!(machine.current_frame().unwrap().eval_stack(), &[13]);
        // no tokens in the parse buffer
        assert_eq!(memory.read_byte(0x241).unwrap(), 0);
    }

    #[test]
    fn v3_line_input_is_zero_terminated() {
        // sread text-buffer parse-buffer
        let mut machine = StoryBuilder::new(ZMachineVersion::V3)
            .set_header_byte(0x200, 20)
            .with_code(&[0xE4, 0x0F, 0x02, 0x00, 0x02, 0x40])
            .build_machine();
        machine.step().unwrap();
        machine.resume_with_line("look").unwrap();
        let memory = machine.memory();
        assert_eq!(memory.read_byte(0x201).unwrap(), b'l');
        assert_eq!(memory.read_byte(0x204).unwrap(), b'k');
        assert_eq!(memory.read_byte(0x205).unwrap(), 0);
    }

    #[test]
    fn char_input_resumes_through_the_store_variable() {
        // read_char 1 -> sp
        let mut machine = StoryBuilder::new(ZMachineVersion::V5)
            .with_code(&[0xF6, 0x7F, 0x01, 0x00])
            .build_machine();
        machine.step().unwrap();
        assert_eq!(machine.input_request(), Some(InputRequest::Char));
        machine.resume_with_char('a').unwrap();
        assert_eq!(machine.current_frame().unwrap().eval_stack(), &[97]);
    }

    #[test]
    fn resuming_with_the_wrong_kind_keeps_the_request() {
        let mut machine = StoryBuilder::new(ZMachineVersion::V5)
            .with_code(&[0xF6, 0x7F, 0x01, 0x00])
            .build_machine();
        machine.step().unwrap();
        assert!(machine.resume_with_line("nope").is_err());
        assert_eq!(machine.input_request(), Some(InputRequest::Char));
    }
}
