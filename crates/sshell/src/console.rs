//! Operator console: the numeric menu and its prompts.
//!
//! The console is only read while a menu request is being handled, so the
//! control loop never blocks on operator input while waiting for status
//! records. Every prompt gives the operator [`MAX_ATTEMPTS`] tries; a blank
//! line or end of input abandons the request.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Unparseable input is reported and re-prompted, never a panic

use std::io::{self, Write};

use sshell_core::{validate_address, validate_topic, DomainError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::registry::ClientRegistry;

/// Tries per prompt before a request is abandoned.
pub const MAX_ATTEMPTS: usize = 3;

const INVALID_INPUT: &str = "error: invalid input";

/// The menu shown on every request.
pub const MENU: &str = "What to do:\n\
                        1. Terminate the shell\n\
                        2. Connect to sensor\n\
                        3. Disconnect from sensor\n\
                        4. Show clients\n\
                        5. Close the menu";

// ============================================================================
// Menu Commands
// ============================================================================

/// A menu choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    /// Signal every client and shut down once they are gone
    Terminate,
    /// Spawn a new agent
    Connect,
    /// Signal one client
    Disconnect,
    /// Print the registry
    List,
    /// Leave the menu
    Close,
}

impl MenuCommand {
    /// Maps a menu number to its command.
    pub fn from_option(option: u32) -> Option<Self> {
        match option {
            1 => Some(Self::Terminate),
            2 => Some(Self::Connect),
            3 => Some(Self::Disconnect),
            4 => Some(Self::List),
            5 => Some(Self::Close),
            _ => None,
        }
    }
}

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A non-blank line, trailing newline removed
    Line(String),
    /// An empty or whitespace-only line
    Blank,
    /// A line that is not valid UTF-8
    Invalid,
    /// End of input
    Eof,
}

// ============================================================================
// Console
// ============================================================================

/// Line-oriented operator console over any async reader and sync writer.
#[derive(Debug)]
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Prints one line.
    pub fn say(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.output, "{line}")?;
        self.output.flush()
    }

    /// Prints a prompt without a newline.
    pub fn prompt(&mut self, text: &str) -> io::Result<()> {
        write!(self.output, "{text}")?;
        self.output.flush()
    }

    /// Reads one line of input.
    ///
    /// Undecodable bytes are operator input like any other and come back as
    /// `Input::Invalid`; only a failing reader is an error.
    pub async fn read_line(&mut self) -> io::Result<Input> {
        let mut raw = Vec::new();
        if self.input.read_until(b'\n', &mut raw).await? == 0 {
            return Ok(Input::Eof);
        }
        let Ok(line) = String::from_utf8(raw) else {
            return Ok(Input::Invalid);
        };
        let line = line.trim_end_matches(&['\n', '\r'][..]);
        if line.trim().is_empty() {
            return Ok(Input::Blank);
        }
        Ok(Input::Line(line.to_string()))
    }

    /// Shows the menu and reads a choice.
    ///
    /// `Ok(None)` when the operator gave up. Unknown numbers and non-numeric
    /// input are reported as `error: invalid option` and re-prompted.
    pub async fn read_command(&mut self) -> io::Result<Option<MenuCommand>> {
        self.say(MENU)?;
        for _ in 0..MAX_ATTEMPTS {
            self.prompt("option: ")?;
            let line = match self.read_line().await? {
                Input::Line(line) => line,
                Input::Invalid => {
                    self.say(INVALID_INPUT)?;
                    continue;
                }
                Input::Blank | Input::Eof => return Ok(None),
            };
            match line.trim().parse::<u32>().ok().and_then(MenuCommand::from_option) {
                Some(command) => return Ok(Some(command)),
                None => self.say("error: invalid option")?,
            }
        }
        Ok(None)
    }

    /// Prompts for a broker address.
    pub async fn prompt_address(&mut self) -> io::Result<Option<String>> {
        self.prompt_validated("enter ip address of the broker: ", validate_address)
            .await
    }

    /// Prompts for a subscription topic.
    pub async fn prompt_topic(&mut self) -> io::Result<Option<String>> {
        self.prompt_validated("enter topic of the sensor: ", validate_topic)
            .await
    }

    /// Lists the registry and prompts for an occupied slot.
    pub async fn prompt_slot(&mut self, registry: &ClientRegistry) -> io::Result<Option<usize>> {
        self.show_clients(registry)?;
        for _ in 0..MAX_ATTEMPTS {
            self.prompt("option: ")?;
            let line = match self.read_line().await? {
                Input::Line(line) => line,
                Input::Invalid => {
                    self.say(INVALID_INPUT)?;
                    continue;
                }
                Input::Blank | Input::Eof => return Ok(None),
            };
            match line.trim().parse::<usize>() {
                Ok(slot) if registry.get(slot).is_some() => return Ok(Some(slot)),
                _ => self.say("error: invalid option, no such option is available")?,
            }
        }
        Ok(None)
    }

    async fn prompt_validated(
        &mut self,
        text: &str,
        validate: fn(&str) -> Result<(), DomainError>,
    ) -> io::Result<Option<String>> {
        for _ in 0..MAX_ATTEMPTS {
            self.prompt(text)?;
            let line = match self.read_line().await? {
                Input::Line(line) => line,
                Input::Invalid => {
                    self.say(INVALID_INPUT)?;
                    continue;
                }
                Input::Blank | Input::Eof => return Ok(None),
            };
            match validate(&line) {
                Ok(()) => return Ok(Some(line)),
                Err(e) => self.say(&format!("error: {e}"))?,
            }
        }
        Ok(None)
    }

    /// Prints the registry as a table, one row per occupied slot.
    pub fn show_clients(&mut self, registry: &ClientRegistry) -> io::Result<()> {
        self.say("connected clients:")?;
        self.say("OPTION\tCID\tPID\tSTATUS\tSENSOR\tIP")?;
        for (slot, record) in registry.list() {
            self.say(&format!(
                "{slot}\t{}\t{}\t{}\t{}\t{}",
                record.id,
                record.pid,
                record.last_status.label(),
                record.topic,
                record.ip
            ))?;
        }
        Ok(())
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_parts(self) -> (R, W) {
        (self.input, self.output)
    }
}
