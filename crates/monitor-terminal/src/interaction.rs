//! Output sink abstraction used by every command.

use std::collections::VecDeque;
use std::io::Read;

/// Where commands write their output and read interactive input from.
///
/// The engine never assumes a terminal: a sink that only records text is a
/// valid implementation.
pub trait CommandInteraction {
    fn write_char(&mut self, c: char);

    fn write(&mut self, text: &str) {
        for c in text.chars() {
            self.write_char(c);
        }
    }

    fn write_line(&mut self, text: &str) {
        self.write(text);
        self.write_char('\n');
    }

    /// Write one line of error output.
    fn write_error(&mut self, text: &str);

    /// Read one line of input; `None` at end of input.
    fn read_line(&mut self) -> Option<String>;

    /// Raw input stream, for commands that consume binary data.
    fn input(&mut self) -> Option<&mut dyn Read> {
        None
    }
}

/// A sink that records everything in memory. Used for command substitution,
/// scripted execution and tests.
#[derive(Debug, Default)]
pub struct BufferInteraction {
    output: String,
    errors: String,
    input: VecDeque<String>,
}

impl BufferInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `read_line` replays `lines`.
    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn errors(&self) -> &str {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn clear(&mut self) {
        self.output.clear();
        self.errors.clear();
    }
}

impl CommandInteraction for BufferInteraction {
    fn write_char(&mut self, c: char) {
        self.output.push(c);
    }

    fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn write_error(&mut self, text: &str) {
        self.errors.push_str(text);
        self.errors.push('\n');
    }

    fn read_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }
}
