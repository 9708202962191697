use crate::{
    zmemory::{reader::ZMemoryReader, ZMemory, ZMemoryAddress},
    ZMachineVersion, ZmError, ZmResult,
};

/// A ZCharacter is encoded over 5 bits.
pub type ZCharacter = u8;

/// R3.2.1: There are three 'alphabets', A0 (lower case), A1 (upper case) and A2 (punctuation)
/// and during printing one of these is current at any given time.
///
/// Initially A0 is current. The meaning of a Z-character may depend on which alphabet is current.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZAlphabet {
    A0LowerCase,
    A1UpperCase,
    A2Punctuation,
}

const A0_CHARS: &[char; 32] = &[
    ' ', ' ', ' ', ' ', ' ', ' ', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm',
    'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const A1_CHARS: &[char; 32] = &[
    ' ', ' ', ' ', ' ', ' ', ' ', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M',
    'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];
const A2_CHARS: &[char; 32] = &[
    ' ', ' ', ' ', ' ', ' ', ' ', ' ', '\n', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.',
    ',', '!', '?', '_', '#', '\'', '"', '/', '\\', '-', ':', '(', ')',
];
const A2_V1_CHARS: &[char; 32] = &[
    ' ', ' ', ' ', ' ', ' ', ' ', ' ', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', ',',
    '!', '?', '_', '#', '\'', '"', '/', '\\', '<', '-', ':', '(', ')',
];

impl ZAlphabet {
    /// Returns the shifted `ZAlphabet` according to the given shifting character (V1 and V2).
    ///
    /// The shifted alphabet may be permanent (bool true) or only for the next character (bool false).
    ///
    /// R3.2.2: Z-characters 2 and 3 are 'shift' characters changing the alphabet for the
    /// next character only; 4 and 5 are their 'shift lock' versions:
    ///
    /// ```md
    ///             from A0  from A1  from A2
    /// Z-char 2      A1       A2       A0
    /// Z-char 3      A2       A0       A1
    /// ```
    pub fn shifted_with_maybe_lock(&self, shift_character: ZCharacter) -> ZmResult<(Self, bool)> {
        match shift_character {
            2 => Ok((self.next(), false)),
            3 => Ok((self.previous(), false)),
            4 => Ok((self.next(), true)),
            5 => Ok((self.previous(), true)),
            _ => Err(ZmError::StringInvalidAlphabetShiftCharacter(
                shift_character,
            )),
        }
    }

    /// Returns the shifted `ZAlphabet` according to the given shifting character (V3+) for the next character.
    ///
    /// R3.2.3: In Versions 3 and later, the current alphabet is always A0 unless changed for
    /// 1 character only: 4 means "the next character is in A1" and 5 means "the next is in A2".
    pub fn shifted(shift_character: ZCharacter) -> ZmResult<Self> {
        match shift_character {
            4 => Ok(ZAlphabet::A1UpperCase),
            5 => Ok(ZAlphabet::A2Punctuation),
            _ => Err(ZmError::StringInvalidAlphabetShiftCharacter(
                shift_character,
            )),
        }
    }

    /// Get the UTF-8 character corresponding to the given `ZCharacter` and `ZMachineVersion`.
    ///
    /// R3.5.3/R3.5.4: Version 1 has a slightly different A2 row in its alphabet table
    /// (new-line is not needed, making room for the < character).
    pub fn get_character(&self, character: ZCharacter, version: ZMachineVersion) -> char {
        let char_index = character as usize & 0x1F;
        match (self, version) {
            (ZAlphabet::A0LowerCase, _) => A0_CHARS[char_index],
            (ZAlphabet::A1UpperCase, _) => A1_CHARS[char_index],
            (ZAlphabet::A2Punctuation, ZMachineVersion::V1) => A2_V1_CHARS[char_index],
            (ZAlphabet::A2Punctuation, _) => A2_CHARS[char_index],
        }
    }

    fn previous(&self) -> ZAlphabet {
        match self {
            ZAlphabet::A0LowerCase => ZAlphabet::A2Punctuation,
            ZAlphabet::A1UpperCase => ZAlphabet::A0LowerCase,
            ZAlphabet::A2Punctuation => ZAlphabet::A1UpperCase,
        }
    }

    fn next(&self) -> ZAlphabet {
        match self {
            ZAlphabet::A0LowerCase => ZAlphabet::A1UpperCase,
            ZAlphabet::A1UpperCase => ZAlphabet::A2Punctuation,
            ZAlphabet::A2Punctuation => ZAlphabet::A0LowerCase,
        }
    }
}

/// R3.8: The character set of the Z-machine is called ZSCII
/// (Zork Standard Code for Information Interchange; pronounced to rhyme with "xyzzy").
///
/// ZSCII codes are 10-bit unsigned values between 0 and 1023.
pub struct ZSCII(pub u16);

impl ZSCII {
    /// Translates the code for output; `None` is the "no character" null code.
    pub fn to_char(&self) -> ZmResult<Option<char>> {
        match self.0 {
            // R3.8.2.1: code 0 ("null") is defined for output but has no effect.
            0 => Ok(None),
            // R3.8.2.5: code 13 is carriage return.
            13 => Ok(Some('\n')),
            // R3.8.3: codes 32 to 126 agree with standard ASCII.
            32..=126 => Ok(Some(self.0 as u8 as char)),
            // R3.8.5: the "extra characters" block, via the default translation table.
            155..=251 => Ok(Some(DEFAULT_UNICODE_TABLE[(self.0 as usize) - 155])),
            _ => Err(ZmError::StringInvalidZSCIICharacterCode(self.0)),
        }
    }

    /// Encodes a host character for input buffers; unrepresentable input
    /// becomes a question mark.
    pub fn from_input_char(ch: char) -> Self {
        match ch {
            '\n' | '\r' => ZSCII(13),
            ' '..='~' => ZSCII(ch as u16),
            ch => match DEFAULT_UNICODE_TABLE.iter().position(|entry| *entry == ch) {
                Some(index) => ZSCII(155 + index as u16),
                None => ZSCII(b'?' as u16),
            },
        }
    }
}

/// Default Unicode characters table (Table 1, see R3.8.5.3).
const DEFAULT_UNICODE_TABLE: &[char] = &[
    'ä', 'ö', 'ü', 'Ä', 'Ö', 'Ü', 'ß', '»', '«', 'ë', 'ï', 'ÿ', 'Ë', 'Ï', 'á', 'é', 'í', 'ó', 'ú',
    'ý', 'Á', 'É', 'Í', 'Ó', 'Ú', 'Ý', 'à', 'è', 'ì', 'ò', 'ù', 'À', 'È', 'Ì', 'Ò', 'Ù', 'â', 'ê',
    'î', 'ô', 'û', 'Â', 'Ê', 'Î', 'Ô', 'Û', 'å', 'Å', 'ø', 'Ø', 'ã', 'ñ', 'õ', 'Ã', 'Ñ', 'Õ', 'æ',
    'Æ', 'ç', 'Ç', 'þ', 'ð', 'Þ', 'Ð', '£', 'œ', 'Œ', '¡', '¿',
];

/// Decodes a terminated run of text words into UTF-8 (R3.2).
///
/// Each word packs three 5-bit Z-characters; bit 15 marks the final word.
/// `abbreviations` is the byte address of the abbreviations table, absent for
/// V1 stories and while already expanding an abbreviation (no nesting, R3.3).
pub fn decode_z_words(
    memory: &ZMemory,
    words: &[u16],
    version: ZMachineVersion,
    abbreviations: Option<usize>,
) -> ZmResult<String> {
    use ZMachineVersion::*;

    let mut characters: Vec<ZCharacter> = Vec::with_capacity(words.len() * 3);
    for word in words {
        characters.push(((word >> 10) & 0x1F) as ZCharacter);
        characters.push(((word >> 5) & 0x1F) as ZCharacter);
        characters.push((word & 0x1F) as ZCharacter);
        if word & 0x8000 != 0 {
            break;
        }
    }

    let mut result = String::with_capacity(characters.len());
    let mut locked = ZAlphabet::A0LowerCase;
    let mut current = ZAlphabet::A0LowerCase;
    let mut index = 0;
    while index < characters.len() {
        let character = characters[index];
        index += 1;
        match (version, character) {
            (_, 0) => {
                result.push(' ');
                current = locked;
            }
            (V1, 1) => {
                result.push('\n');
                current = locked;
            }
            (V1, 2..=5) | (V2, 2..=5) => {
                let (shifted, lock) = current.shifted_with_maybe_lock(character)?;
                current = shifted;
                if lock {
                    locked = shifted;
                }
            }
            // V2 char 1 and V3+ chars 1-3; the V1/V2 arms above took the rest
            (_, 1..=3) => {
                // abbreviation reference; the next character picks the entry
                if index >= characters.len() {
                    break;
                }
                let entry = characters[index];
                index += 1;
                let table = abbreviations.ok_or(ZmError::StringIllegalAbbreviation)?;
                let slot = 32 * (character as usize - 1) + entry as usize;
                let word_address = memory.read_word(table + 2 * slot)?;
                let mut reader =
                    ZMemoryReader::new(memory, memory.resolve(ZMemoryAddress::Word(word_address)));
                let expansion_words = reader.next_z_words()?;
                result.push_str(&decode_z_words(memory, &expansion_words, version, None)?);
                current = locked;
            }
            (_, 4..=5) => {
                current = ZAlphabet::shifted(character)?;
            }
            (_, 6) if current == ZAlphabet::A2Punctuation => {
                // ten-bit ZSCII escape (R3.4)
                if index + 1 >= characters.len() {
                    break;
                }
                let code =
                    ((characters[index] as u16) << 5) | characters[index + 1] as u16;
                index += 2;
                if let Some(ch) = ZSCII(code).to_char()? {
                    result.push(ch);
                }
                current = locked;
            }
            (_, character) => {
                result.push(current.get_character(character, version));
                current = locked;
            }
        }
    }
    Ok(result)
}

/// Decodes the text starting at a byte address; returns the string and the
/// number of bytes it occupies.
pub fn decode_z_text_at(
    memory: &ZMemory,
    address: usize,
    version: ZMachineVersion,
    abbreviations: Option<usize>,
) -> ZmResult<(String, usize)> {
    let mut reader = ZMemoryReader::new(memory, address);
    let words = reader.next_z_words()?;
    let text = decode_z_words(memory, &words, version, abbreviations)?;
    Ok((text, reader.position() - address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StoryBuilder;
    use ZMachineVersion::*;

    #[test]
    fn plain_lowercase_text_decodes() {
        let memory = StoryBuilder::new(V3).build_memory();
        // "hello": h-e-l / l-o-pad
        let words = [0x3551, 0xC685];
        assert_eq!(
            decode_z_words(&memory, &words, V3, None).unwrap(),
            "hello"
        );
    }

    #[test]
    fn shifts_pick_the_other_alphabets_for_one_character() {
        let memory = StoryBuilder::new(V3).build_memory();
        // shift-A1 'h', then plain 'i': [4, 13, 14] -> "Hi"
        let words = [0x8000 | (4 << 10) | (13 << 5) | 14];
        assert_eq!(decode_z_words(&memory, &words, V3, None).unwrap(), "Hi");
    }

    #[test]
    fn zscii_escape_decodes_ten_bit_codes() {
        let memory = StoryBuilder::new(V3).build_memory();
        // shift-A2, escape, then 'A' (65 = 0b00010_00001): [5, 6, 2] [1, pad, pad]
        let words = [
            (5 << 10) | (6 << 5) | 2,
            0x8000 | (1 << 10) | (5 << 5) | 5,
        ];
        assert_eq!(decode_z_words(&memory, &words, V3, None).unwrap(), "A");
    }

    #[test]
    fn abbreviations_expand_from_their_table() {
        let expansion: usize = 0x00C0;
        let memory = StoryBuilder::new(V3)
            // entry 0 of the table at 0x46 holds the expansion's word address
            .set_header_word(0x46, (expansion / 2) as u16)
            // the expansion encodes "hi" = [13, 14, pad]
            .set_header_word(expansion, 0x8000 | (13 << 10) | (14 << 5) | 5)
            .build_memory();
        // text: [abbrev-1, entry-0, pad]
        let words = [0x8000 | (1 << 10) | (0 << 5) | 5];
        assert_eq!(
            decode_z_words(&memory, &words, V3, Some(0x46)).unwrap(),
            "hi"
        );
    }

    #[test]
    fn nested_abbreviations_are_rejected() {
        let expansion: usize = 0x00C0;
        let memory = StoryBuilder::new(V3)
            .set_header_word(0x46, (expansion / 2) as u16)
            // the expansion itself starts with an abbreviation character
            .set_header_word(expansion, 0x8000 | (1 << 10) | (0 << 5) | 5)
            .build_memory();
        let words = [0x8000 | (1 << 10) | (0 << 5) | 5];
        assert!(matches!(
            decode_z_words(&memory, &words, V3, Some(0x46)),
            Err(ZmError::StringIllegalAbbreviation)
        ));
    }

    #[test]
    fn input_characters_encode_to_zscii() {
        assert_eq!(ZSCII::from_input_char('a').0, 97);
        assert_eq!(ZSCII::from_input_char('\n').0, 13);
        assert_eq!(ZSCII::from_input_char('é').0, 170);
        assert_eq!(ZSCII::from_input_char('☃').0, b'?' as u16);
    }
}
