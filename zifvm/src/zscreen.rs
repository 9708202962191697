use crate::zcpu::ZValue;

bitflags! {
    /// What the host's presentation layer can actually render.
    pub struct ZScreenCapabilities: u8 {
        const COLORS = 0b_0000_0001;
        const BOLD = 0b_0000_0010;
        const ITALIC = 0b_0000_0100;
        const FIXED_FONT = 0b_0000_1000;
    }
}

bitflags! {
    /// Text style bits as passed to `set_text_style` (R8.7.2).
    pub struct ZTextStyle: u8 {
        const REVERSE_VIDEO = 0b_0000_0001;
        const BOLD = 0b_0000_0010;
        const ITALIC = 0b_0000_0100;
        const FIXED_PITCH = 0b_0000_1000;
    }
}

/// Colour codes as used by `set_colour` (R8.3.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZColor {
    Current,
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl ZColor {
    pub fn from_code(code: ZValue) -> Option<Self> {
        use ZColor::*;
        match code {
            0 => Some(Current),
            1 => Some(Default),
            2 => Some(Black),
            3 => Some(Red),
            4 => Some(Green),
            5 => Some(Yellow),
            6 => Some(Blue),
            7 => Some(Magenta),
            8 => Some(Cyan),
            9 => Some(White),
            _ => None,
        }
    }
}

/// The presentation capability the host hands to the interpreter.
///
/// The processor drives this interface from screen opcodes; everything here
/// defaults to a no-op so hosts only implement what they can display. Input
/// is callback-free: `request_char`/`request_line` merely announce that the
/// processor has suspended, and the host answers later through the machine's
/// `resume_with_char`/`resume_with_line`.
pub trait ZScreen {
    fn capabilities(&self) -> ZScreenCapabilities {
        ZScreenCapabilities::empty()
    }

    /// (rows, columns) of the display area.
    fn dimensions(&self) -> (u16, u16) {
        (24, 80)
    }

    /// (line, column) of the cursor in the current window, 1-based.
    fn cursor(&self) -> (u16, u16) {
        (1, 1)
    }

    fn clear_window(&mut self, _window: i16) {}

    /// Clears the whole screen, optionally collapsing the upper window.
    fn clear_all(&mut self, _unsplit: bool) {}

    fn split(&mut self, _upper_height: u16) {}

    fn unsplit(&mut self) {}

    fn set_window(&mut self, _window: u16) {}

    fn set_cursor(&mut self, _line: u16, _column: u16) {}

    fn set_text_style(&mut self, _style: ZTextStyle) {}

    fn set_foreground_color(&mut self, _color: ZColor) {}

    fn set_background_color(&mut self, _color: ZColor) {}

    /// Redraws the V1-V3 status line.
    fn show_status(&mut self, _location: &str, _status: &str) {}

    fn print(&mut self, text: &str);

    fn print_char(&mut self, ch: char);

    /// Announces that the processor now waits for a single character.
    fn request_char(&mut self) {}

    /// Announces that the processor now waits for a line of input.
    fn request_line(&mut self, _max_length: usize) {}
}

/// The default sink installed before the host registers a real screen.
pub struct NullScreen;

impl ZScreen for NullScreen {
    fn print(&mut self, _text: &str) {}

    fn print_char(&mut self, _ch: char) {}
}
