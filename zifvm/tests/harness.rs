//! End-to-end scenarios against hand-assembled story images.
use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use zifvm::zcpu::events::{Observer, ZCpuEvent};
use zifvm::zmachine::header::ZMachineHeader;
use zifvm::zmemory::ZMemory;
use zifvm::{ZMachine, ZMachineVersion};

/// Offsets shared by every scenario: globals at 0x100, static memory from
/// 0x400, main code at 0x500, one helper routine at 0x600.
const GLOBALS: usize = 0x0100;
const CODE: usize = 0x0500;
const ROUTINE: usize = 0x0600;

struct Scenario {
    bytes: Vec<u8>,
}

impl Scenario {
    fn new(version: ZMachineVersion) -> Self {
        let mut bytes = vec![0u8; 0x800];
        bytes[0x00] = version as u8;
        let words: &[(usize, u16)] = &[
            (0x04, 0x0400), // high memory base
            (0x06, CODE as u16),
            (0x08, 0x03C0), // dictionary
            (0x0A, 0x0300), // object table
            (0x0C, GLOBALS as u16),
            (0x0E, 0x0400), // static memory base
            (0x18, 0x0046), // abbreviations
        ];
        let mut scenario = Scenario { bytes };
        for (address, value) in words {
            scenario.set_word(*address, *value);
        }
        scenario
    }

    fn set_word(&mut self, address: usize, value: u16) {
        self.bytes[address] = (value >> 8) as u8;
        self.bytes[address + 1] = value as u8;
    }

    fn code(mut self, code: &[u8]) -> Self {
        self.bytes[CODE..CODE + code.len()].copy_from_slice(code);
        self
    }

    fn routine(mut self, body: &[u8]) -> Self {
        self.bytes[ROUTINE..ROUTINE + body.len()].copy_from_slice(body);
        self
    }

    fn machine(&self) -> ZMachine {
        ZMachine::from_story_reader(&mut Cursor::new(self.bytes.clone()))
            .expect("should init harness ZMachine")
    }
}

fn step_times(machine: &mut ZMachine, times: usize) {
    for _ in 0..times {
        machine.step().expect("should step the instruction properly");
    }
}

#[test]
fn header_fields_read_as_stored() {
    let mut bytes = vec![0u8; 0x800];
    bytes[0x00] = 5;
    let fields: &[(usize, u16)] = &[
        (0x02, 1),      // release
        (0x04, 0x07DC), // high memory base
        (0x06, 0x07DD), // initial pc
        (0x08, 0x07D3), // dictionary
        (0x0A, 0x010E), // object table
        (0x0C, 0x04F0), // global variables
        (0x0E, 0x07D1), // static memory base
        (0x18, 0x0046), // abbreviations
    ];
    for (address, value) in fields {
        bytes[*address] = (*value >> 8) as u8;
        bytes[*address + 1] = *value as u8;
    }
    bytes[0x12..0x18].copy_from_slice(b"031102");
    bytes[0x3C..0x40].copy_from_slice(b"6.21");

    let memory = ZMemory::from_story_reader(&mut Cursor::new(bytes)).unwrap();
    let header = ZMachineHeader::from_memory(&memory).unwrap();
    assert_eq!(header.get_version(), ZMachineVersion::V5);
    assert_eq!(header.get_release(), 1);
    assert_eq!(header.get_serial(), "031102");
    assert_eq!(memory.resolve(header.get_base_high_memory()), 0x07DC);
    assert_eq!(memory.resolve(header.get_initial_pc()), 0x07DD);
    assert_eq!(memory.resolve(header.get_location_dictionary()), 0x07D3);
    assert_eq!(memory.resolve(header.get_location_object_table()), 0x010E);
    assert_eq!(
        memory.resolve(header.get_location_global_variables_table()),
        0x04F0
    );
    assert_eq!(memory.resolve(header.get_base_static_memory()), 0x07D1);
    assert_eq!(
        header
            .get_location_abbreviations_table()
            .map(|address| memory.resolve(address)),
        Some(0x0046)
    );
    assert_eq!(header.get_inform_version(), Some("6.21"));
}

#[test]
fn add_wraps_around_signed_overflow() {
    // call_vs 0x600 -> g0, then inside: add -32768, -1 -> local0
    let mut machine = Scenario::new(ZMachineVersion::V5)
        .code(&[0xE0, 0x3F, 0x01, 0x80, 0x10])
        .routine(&[0x01, 0xD4, 0x0F, 0x80, 0x00, 0xFF, 0xFF, 0x01])
        .machine();
    step_times(&mut machine, 2);
    assert_eq!(machine.frames().len(), 2);
    assert_eq!(machine.current_frame().unwrap().locals(), &[0x7FFF]);
}

#[test]
fn je_pops_the_stack_once_and_branches() {
    // push 2, then je sp, 1, 2, 3 with a branch-on-true offset of 5
    let mut machine = Scenario::new(ZMachineVersion::V5)
        .code(&[
            0xE8, 0x7F, 0x02, // push 2
            0xC1, 0x95, 0x00, 0x01, 0x02, 0x03, 0xC5, // je
        ])
        .machine();
    step_times(&mut machine, 2);
    // exactly one pop
    assert!(machine.current_frame().unwrap().eval_stack().is_empty());
    // taken branch lands at instruction end + offset - 2
    let je_address = (CODE + 3) as u32;
    let je_length = 7;
    assert_eq!(machine.pc(), je_address + je_length + 5 - 2);
}

#[test]
fn call_to_packed_address_zero_just_stores_false() {
    // call_vs 0 -> sp
    let mut machine = Scenario::new(ZMachineVersion::V5)
        .code(&[0xE0, 0x3F, 0x00, 0x00, 0x00])
        .machine();
    step_times(&mut machine, 1);
    assert_eq!(machine.frames().len(), 1);
    assert_eq!(machine.current_frame().unwrap().eval_stack(), &[0]);
    assert_eq!(machine.pc(), (CODE + 5) as u32);
}

#[test]
fn nested_call_returns_through_the_store_variable() {
    // call_vs 0x600, 7, 8 -> g0; f(a, b) { push a + b; ret_popped }
    let mut machine = Scenario::new(ZMachineVersion::V5)
        .code(&[0xE0, 0x17, 0x01, 0x80, 0x07, 0x08, 0x10])
        .routine(&[
            0x02, // two locals
            0x74, 0x01, 0x02, 0x00, // add local0, local1 -> sp
            0xB8, // ret_popped
        ])
        .machine();
    step_times(&mut machine, 1);
    assert_eq!(machine.frames().len(), 2);
    assert_eq!(machine.current_frame().unwrap().locals(), &[7, 8]);
    assert_eq!(machine.current_frame().unwrap().argument_count(), 2);
    step_times(&mut machine, 2);
    assert_eq!(machine.frames().len(), 1);
    assert_eq!(machine.memory().read_word(GLOBALS).unwrap(), 15);
    assert_eq!(machine.pc(), (CODE + 7) as u32);
}

#[test]
fn branch_to_rtrue_returns_one_to_the_caller() {
    // call_1s 0x600 -> g1; f() { jz 0 ?rtrue }
    let mut machine = Scenario::new(ZMachineVersion::V5)
        .code(&[0x88, 0x01, 0x80, 0x11])
        .routine(&[0x00, 0x90, 0x00, 0xC1])
        .machine();
    step_times(&mut machine, 2);
    assert_eq!(machine.frames().len(), 1);
    assert_eq!(machine.memory().read_word(GLOBALS + 2).unwrap(), 1);
    assert_eq!(machine.pc(), (CODE + 4) as u32);
}

#[test]
fn seeded_random_sequences_are_reproducible() {
    // random -5 -> sp (reseed), then random 100 -> sp
    let scenario = Scenario::new(ZMachineVersion::V5).code(&[
        0xE7, 0x3F, 0xFF, 0xFB, 0x00, // random -5 -> sp
        0xE7, 0x7F, 0x64, 0x00, // random 100 -> sp
    ]);
    let mut first = scenario.machine();
    let mut second = scenario.machine();
    step_times(&mut first, 2);
    step_times(&mut second, 2);
    let drawn = first.current_frame().unwrap().eval_stack().to_vec();
    assert_eq!(drawn, second.current_frame().unwrap().eval_stack());
    // the reseed stored 0, the draw is uniform in [1, 100]
    assert_eq!(drawn[0], 0);
    assert!((1..=100).contains(&drawn[1]));
}

#[test]
fn quit_halts_the_machine() {
    let mut machine = Scenario::new(ZMachineVersion::V5).code(&[0xBA]).machine();
    step_times(&mut machine, 1);
    assert!(machine.is_halted());
    assert!(machine.step().is_err());
}

#[test]
fn failed_steps_leave_the_pc_at_the_faulting_instruction() {
    // div 1, 0 -> sp
    let mut machine = Scenario::new(ZMachineVersion::V5)
        .code(&[0x17, 0x01, 0x00, 0x00])
        .machine();
    assert!(machine.step().is_err());
    assert_eq!(machine.pc(), CODE as u32);
    // re-attempting hits the same fault
    assert!(machine.step().is_err());
    assert_eq!(machine.pc(), CODE as u32);
}

#[derive(Default)]
struct EventLog {
    events: Vec<ZCpuEvent>,
}

impl Observer<ZCpuEvent> for EventLog {
    fn on_notify(&mut self, event: &ZCpuEvent) {
        self.events.push(*event);
    }
}

#[test]
fn stepping_and_frame_events_fire_in_order() {
    let mut machine = Scenario::new(ZMachineVersion::V5)
        .code(&[0xE0, 0x3F, 0x01, 0x80, 0x10])
        .routine(&[0x00, 0xB0])
        .machine();
    let log = Rc::new(RefCell::new(EventLog::default()));
    machine.register_observer(log.clone());
    step_times(&mut machine, 2);

    let call_address = CODE as u32;
    let events = log.borrow().events.clone();
    assert_eq!(
        events,
        vec![
            ZCpuEvent::Stepping { pc: call_address },
            ZCpuEvent::EnterFrame {
                old_routine: 0,
                new_routine: ROUTINE as u32,
            },
            ZCpuEvent::Stepped {
                old_pc: call_address,
                new_pc: (ROUTINE + 1) as u32,
            },
            ZCpuEvent::Stepping {
                pc: (ROUTINE + 1) as u32,
            },
            ZCpuEvent::ExitFrame {
                old_routine: ROUTINE as u32,
                new_routine: 0,
            },
            ZCpuEvent::Stepped {
                old_pc: (ROUTINE + 1) as u32,
                new_pc: call_address + 5,
            },
        ]
    );
}

#[test]
fn local_variable_changes_are_announced() {
    // call_vs 0x600 -> g0; f() { one local } inside: store local0, 9
    let mut machine = Scenario::new(ZMachineVersion::V5)
        .code(&[0xE0, 0x3F, 0x01, 0x80, 0x10])
        .routine(&[0x01, 0x0D, 0x01, 0x09])
        .machine();
    let log = Rc::new(RefCell::new(EventLog::default()));
    machine.register_observer(log.clone());
    step_times(&mut machine, 2);
    assert!(log.borrow().events.contains(&ZCpuEvent::LocalVariableChanged {
        index: 0,
        old_value: 0,
        new_value: 9,
    }));
    assert_eq!(machine.current_frame().unwrap().locals(), &[9]);
}
