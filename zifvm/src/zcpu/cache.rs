use std::rc::Rc;

use hashbrown::HashMap;

use crate::zcpu::instructions::ZInstruction;

/// Memoizes decoded instructions by address.
///
/// Code lives in high memory, which is immutable by contract, so entries are
/// never invalidated; dynamic-memory writes cannot touch decoded code. The
/// cache is unbounded: it only ever holds as many entries as the story has
/// distinct executed instructions.
pub struct ZInstructionCache {
    decoded: HashMap<u32, Rc<ZInstruction>>,
}

impl ZInstructionCache {
    pub fn new() -> Self {
        ZInstructionCache {
            decoded: HashMap::new(),
        }
    }

    pub fn get(&self, address: u32) -> Option<Rc<ZInstruction>> {
        self.decoded.get(&address).cloned()
    }

    pub fn insert(&mut self, instruction: Rc<ZInstruction>) {
        self.decoded.insert(instruction.address, instruction);
    }

    pub fn len(&self) -> usize {
        self.decoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty()
    }
}

impl Default for ZInstructionCache {
    fn default() -> Self {
        Self::new()
    }
}
