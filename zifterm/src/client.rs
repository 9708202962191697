use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;

use log::warn;

use crate::errors::{IFtError, IFtResult};
use zifvm::zcpu::InputRequest;
use zifvm::zscreen::{ZScreen, ZScreenCapabilities};
use zifvm::ZMachine;

/// The Interactive Fiction Terminal Client is the frontend interface
/// used to play a story file by managing user input and game output.
pub struct IFTerminalClient {
    vm: ZMachine,
}

impl IFTerminalClient {
    pub fn with_story_file(story_path: &Path) -> IFtResult<Self> {
        let mut story_file = File::open(story_path)?;
        let mut vm = ZMachine::from_story_reader(&mut story_file)?;
        vm.register_screen(Box::new(TerminalScreen));
        Ok(IFTerminalClient { vm })
    }

    /// Steps the story, feeding it stdin lines whenever it suspends on input.
    pub fn run(&mut self) -> IFtResult<()> {
        loop {
            if self.vm.is_halted() {
                return Ok(());
            }
            match self.vm.input_request() {
                Some(InputRequest::Line) => {
                    let line = read_stdin_line()?;
                    self.vm.resume_with_line(&line)?;
                }
                Some(InputRequest::Char) => {
                    // no raw terminal mode: take the first key of a line
                    let line = read_stdin_line()?;
                    self.vm.resume_with_char(line.chars().next().unwrap_or('\n'))?;
                }
                None => self.vm.step()?,
            }
        }
    }
}

fn read_stdin_line() -> IFtResult<String> {
    io::stdout().flush()?;
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Err(IFtError::EndOfInput);
    }
    Ok(line)
}

/// A plain stdout sink; window control is out of reach of a dumb terminal
/// and quietly ignored.
struct TerminalScreen;

impl ZScreen for TerminalScreen {
    fn capabilities(&self) -> ZScreenCapabilities {
        ZScreenCapabilities::empty()
    }

    fn show_status(&mut self, location: &str, status: &str) {
        println!("[{:<60}{:>18}]", location, status);
    }

    fn print(&mut self, text: &str) {
        print!("{}", text);
    }

    fn print_char(&mut self, ch: char) {
        print!("{}", ch);
    }

    fn request_line(&mut self, _max_length: usize) {
        if io::stdout().flush().is_err() {
            warn!("could not flush the prompt before reading input");
        }
    }
}
