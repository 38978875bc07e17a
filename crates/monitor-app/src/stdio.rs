//! Output sink bound to the process's standard streams.

use std::io::{self, BufRead, Read, Write};

use monitor_terminal::CommandInteraction;

pub struct StdioInteraction {
    stdin: io::Stdin,
    stdout: io::Stdout,
}

impl StdioInteraction {
    pub fn new() -> Self {
        Self {
            stdin: io::stdin(),
            stdout: io::stdout(),
        }
    }

    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl Default for StdioInteraction {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandInteraction for StdioInteraction {
    fn write_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        let _ = self.stdout.write_all(c.encode_utf8(&mut buf).as_bytes());
    }

    fn write(&mut self, text: &str) {
        let _ = self.stdout.write_all(text.as_bytes());
    }

    fn write_error(&mut self, text: &str) {
        self.flush();
        let _ = writeln!(io::stderr(), "{text}");
    }

    fn read_line(&mut self) -> Option<String> {
        self.flush();
        let mut line = String::new();
        match self.stdin.lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                log::warn!("failed to read input: {e}");
                None
            }
        }
    }

    fn input(&mut self) -> Option<&mut dyn Read> {
        Some(&mut self.stdin)
    }
}
