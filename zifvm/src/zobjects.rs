use crate::{
    zmachine::ZMachineHeader,
    zmemory::ZMemory,
    ZMachineVersion, ZmError, ZmResult,
};

/// Size of objects from V1 to V3 included, in bytes.
const OBJECT_LEGACY_SIZE: usize = 9;
/// Size of objects from V4 on, in bytes.
const OBJECT_SIZE: usize = 14;

/// One entry of a property list during a walk: number, data location and size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct PropertyField {
    number: u16,
    data_address: usize,
    data_length: usize,
}

/// The objects table, held in dynamic memory.
///
/// It consists of a property defaults table followed by a list of entries,
/// one for each object. Objects are numbered consecutively from 1 upward,
/// with object number 0 being used to mean "nothing". Objects form a tree:
/// each one records a parent, a sibling and a first child.
///
/// All accessors work in place over `ZMemory`; the table owns no copies, so
/// games rewiring the tree at runtime are always observed faithfully.
///
/// See: http://inform-fiction.org/zmachine/standards/z1point1/sect12.html
pub struct ZObjectsTable {
    /// Stored at address 0x0A in the header (see R12.1).
    address: usize,
    version: ZMachineVersion,
}

impl ZObjectsTable {
    pub fn from_memory_and_header(memory: &ZMemory, header: &ZMachineHeader) -> ZmResult<Self> {
        Ok(Self {
            address: memory.resolve(header.get_location_object_table()),
            version: header.get_version(),
        })
    }

    fn legacy(&self) -> bool {
        self.version <= ZMachineVersion::V3
    }

    /// Number of words in the property defaults table (R12.2).
    fn defaults_len(&self) -> usize {
        if self.legacy() {
            31
        } else {
            63
        }
    }

    /// When a game reads property n from an object not providing it, the n-th
    /// defaults entry is the resulting value (R12.2).
    pub fn get_default_property(&self, memory: &ZMemory, property: u16) -> ZmResult<u16> {
        if property == 0 || property as usize > self.defaults_len() {
            return Err(ZmError::ObjectMissingProperty {
                object: 0,
                property,
            });
        }
        memory.read_word(self.address + 2 * (property as usize - 1))
    }

    /// Byte address of an object's entry (R12.3).
    fn entry_address(&self, object: u16) -> ZmResult<usize> {
        if object == 0 || (self.legacy() && object > 255) {
            return Err(ZmError::ObjectInvalidIndex(object));
        }
        let entry_size = if self.legacy() {
            OBJECT_LEGACY_SIZE
        } else {
            OBJECT_SIZE
        };
        Ok(self.address + 2 * self.defaults_len() + (object as usize - 1) * entry_size)
    }

    pub fn get_parent(&self, memory: &ZMemory, object: u16) -> ZmResult<u16> {
        let entry = self.entry_address(object)?;
        if self.legacy() {
            Ok(memory.read_byte(entry + 4)? as u16)
        } else {
            memory.read_word(entry + 6)
        }
    }

    pub fn get_sibling(&self, memory: &ZMemory, object: u16) -> ZmResult<u16> {
        let entry = self.entry_address(object)?;
        if self.legacy() {
            Ok(memory.read_byte(entry + 5)? as u16)
        } else {
            memory.read_word(entry + 8)
        }
    }

    pub fn get_child(&self, memory: &ZMemory, object: u16) -> ZmResult<u16> {
        let entry = self.entry_address(object)?;
        if self.legacy() {
            Ok(memory.read_byte(entry + 6)? as u16)
        } else {
            memory.read_word(entry + 10)
        }
    }

    fn set_parent(&self, memory: &mut ZMemory, object: u16, parent: u16) -> ZmResult<()> {
        let entry = self.entry_address(object)?;
        if self.legacy() {
            memory.write_byte(entry + 4, parent as u8)
        } else {
            memory.write_word(entry + 6, parent)
        }
    }

    fn set_sibling(&self, memory: &mut ZMemory, object: u16, sibling: u16) -> ZmResult<()> {
        let entry = self.entry_address(object)?;
        if self.legacy() {
            memory.write_byte(entry + 5, sibling as u8)
        } else {
            memory.write_word(entry + 8, sibling)
        }
    }

    fn set_child(&self, memory: &mut ZMemory, object: u16, child: u16) -> ZmResult<()> {
        let entry = self.entry_address(object)?;
        if self.legacy() {
            memory.write_byte(entry + 6, child as u8)
        } else {
            memory.write_word(entry + 10, child)
        }
    }

    fn check_attribute(&self, attribute: u16) -> ZmResult<()> {
        let count = if self.legacy() { 32 } else { 48 };
        if attribute >= count {
            return Err(ZmError::ObjectInvalidAttribute(attribute));
        }
        Ok(())
    }

    /// Attributes are a bitmap at the start of the entry, numbered from the
    /// high bit of the first byte down (R12.3.1).
    pub fn test_attribute(&self, memory: &ZMemory, object: u16, attribute: u16) -> ZmResult<bool> {
        self.check_attribute(attribute)?;
        let entry = self.entry_address(object)?;
        let byte = memory.read_byte(entry + attribute as usize / 8)?;
        Ok(byte & (0x80 >> (attribute % 8)) != 0)
    }

    pub fn set_attribute(
        &self,
        memory: &mut ZMemory,
        object: u16,
        attribute: u16,
        on: bool,
    ) -> ZmResult<()> {
        self.check_attribute(attribute)?;
        let entry = self.entry_address(object)?;
        let address = entry + attribute as usize / 8;
        let mask = 0x80 >> (attribute % 8);
        let byte = memory.read_byte(address)?;
        memory.write_byte(address, if on { byte | mask } else { byte & !mask })
    }

    /// Detaches an object from its parent, stitching the sibling chain back
    /// together around it.
    pub fn remove(&self, memory: &mut ZMemory, object: u16) -> ZmResult<()> {
        let parent = self.get_parent(memory, object)?;
        if parent != 0 {
            let sibling = self.get_sibling(memory, object)?;
            if self.get_child(memory, parent)? == object {
                self.set_child(memory, parent, sibling)?;
            } else {
                let mut cursor = self.get_child(memory, parent)?;
                while cursor != 0 {
                    let next = self.get_sibling(memory, cursor)?;
                    if next == object {
                        self.set_sibling(memory, cursor, sibling)?;
                        break;
                    }
                    cursor = next;
                }
            }
        }
        self.set_parent(memory, object, 0)?;
        self.set_sibling(memory, object, 0)
    }

    /// Makes an object the first child of a destination.
    pub fn insert(&self, memory: &mut ZMemory, object: u16, destination: u16) -> ZmResult<()> {
        self.remove(memory, object)?;
        let first_child = self.get_child(memory, destination)?;
        self.set_sibling(memory, object, first_child)?;
        self.set_child(memory, destination, object)?;
        self.set_parent(memory, object, destination)
    }

    /// Byte address of the encoded short name inside the property table (R12.4).
    pub fn short_name_address(&self, memory: &ZMemory, object: u16) -> ZmResult<usize> {
        let entry = self.entry_address(object)?;
        let properties = memory.read_word(entry + if self.legacy() { 7 } else { 12 })?;
        Ok(properties as usize + 1)
    }

    fn first_property_address(&self, memory: &ZMemory, object: u16) -> ZmResult<usize> {
        let entry = self.entry_address(object)?;
        let properties =
            memory.read_word(entry + if self.legacy() { 7 } else { 12 })? as usize;
        let name_words = memory.read_byte(properties)? as usize;
        Ok(properties + 1 + 2 * name_words)
    }

    /// Decodes the size-and-number byte(s) at `address` (R12.4.1/R12.4.2).
    fn property_at(&self, memory: &ZMemory, address: usize) -> ZmResult<Option<PropertyField>> {
        let size_byte = memory.read_byte(address)?;
        if size_byte == 0 {
            return Ok(None);
        }
        Ok(Some(if self.legacy() {
            // size byte is 32 * (length - 1) + number
            PropertyField {
                number: (size_byte % 32) as u16,
                data_address: address + 1,
                data_length: size_byte as usize / 32 + 1,
            }
        } else if size_byte & 0x80 != 0 {
            // two size-and-number bytes; a length of 0 means 64 (R12.4.2.1.1)
            let second = memory.read_byte(address + 1)?;
            let data_length = match second as usize & 0x3F {
                0 => 64,
                length => length,
            };
            PropertyField {
                number: (size_byte & 0x3F) as u16,
                data_address: address + 2,
                data_length,
            }
        } else {
            PropertyField {
                number: (size_byte & 0x3F) as u16,
                data_address: address + 1,
                data_length: if size_byte & 0x40 != 0 { 2 } else { 1 },
            }
        }))
    }

    /// Finds a property on an object; properties are listed in descending
    /// numerical order and the walk stops early once below the target.
    fn find_property(
        &self,
        memory: &ZMemory,
        object: u16,
        property: u16,
    ) -> ZmResult<Option<PropertyField>> {
        let mut address = self.first_property_address(memory, object)?;
        while let Some(field) = self.property_at(memory, address)? {
            if field.number == property {
                return Ok(Some(field));
            }
            if field.number < property {
                break;
            }
            address = field.data_address + field.data_length;
        }
        Ok(None)
    }

    /// `get_prop`: the property value, or the table default when absent.
    pub fn get_property(&self, memory: &ZMemory, object: u16, property: u16) -> ZmResult<u16> {
        match self.find_property(memory, object, property)? {
            Some(field) => match field.data_length {
                1 => Ok(memory.read_byte(field.data_address)? as u16),
                2 => memory.read_word(field.data_address),
                _ => Err(ZmError::IllegalState(format!(
                    "get_prop on property {} of object {} with {} data bytes",
                    property, object, field.data_length
                ))),
            },
            None => self.get_default_property(memory, property),
        }
    }

    /// `get_prop_addr`: byte address of the property data, or 0 when absent.
    pub fn get_property_address(
        &self,
        memory: &ZMemory,
        object: u16,
        property: u16,
    ) -> ZmResult<u16> {
        Ok(match self.find_property(memory, object, property)? {
            Some(field) => field.data_address as u16,
            None => 0,
        })
    }

    /// `get_prop_len`: data length of the property whose data starts at the
    /// given address; 0 for the null address (R15, get_prop_len).
    pub fn get_property_length(&self, memory: &ZMemory, data_address: u16) -> ZmResult<u16> {
        if data_address == 0 {
            return Ok(0);
        }
        let size_byte = memory.read_byte(data_address as usize - 1)?;
        Ok(if self.legacy() {
            size_byte as u16 / 32 + 1
        } else if size_byte & 0x80 != 0 {
            match size_byte as u16 & 0x3F {
                0 => 64,
                length => length,
            }
        } else if size_byte & 0x40 != 0 {
            2
        } else {
            1
        })
    }

    /// `get_next_prop`: the number after `property` in the object's list, with
    /// 0 meaning "first" on the way in and "none left" on the way out.
    pub fn get_next_property(
        &self,
        memory: &ZMemory,
        object: u16,
        property: u16,
    ) -> ZmResult<u16> {
        if property == 0 {
            let first = self.first_property_address(memory, object)?;
            return Ok(match self.property_at(memory, first)? {
                Some(field) => field.number,
                None => 0,
            });
        }
        match self.find_property(memory, object, property)? {
            Some(field) => Ok(
                match self.property_at(memory, field.data_address + field.data_length)? {
                    Some(next) => next.number,
                    None => 0,
                },
            ),
            None => Err(ZmError::ObjectMissingProperty { object, property }),
        }
    }

    /// `put_prop`: writes a property that must exist, as a byte or a word.
    pub fn put_property(
        &self,
        memory: &mut ZMemory,
        object: u16,
        property: u16,
        value: u16,
    ) -> ZmResult<()> {
        match self.find_property(memory, object, property)? {
            Some(field) => match field.data_length {
                1 => memory.write_byte(field.data_address, value as u8),
                2 => memory.write_word(field.data_address, value),
                _ => Err(ZmError::IllegalState(format!(
                    "put_prop on property {} of object {} with {} data bytes",
                    property, object, field.data_length
                ))),
            },
            None => Err(ZmError::ObjectMissingProperty { object, property }),
        }
    }
}
