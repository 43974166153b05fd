use async_trait::async_trait;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal;
use futures::StreamExt;
use patchit_core::{Error, Result};
use patchit_session::{Key, KeySource};
use std::io;

/// Reads Enter and Esc from the terminal.
///
/// Raw mode is only held while a key is awaited, so watch and install
/// output printed between keys renders normally.
pub struct KeyListener {
    events: EventStream,
}

impl KeyListener {
    pub fn new() -> Self {
        Self {
            events: EventStream::new(),
        }
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

#[async_trait]
impl KeySource for KeyListener {
    async fn next_key(&mut self) -> Result<Key> {
        let _raw = RawMode::enable()?;

        loop {
            let event = match self.events.next().await {
                Some(event) => event?,
                None => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "terminal input closed",
                    )))
                }
            };

            if let Event::Key(key) = event {
                if let Some(key) = key_of_interest(&key) {
                    return Ok(key);
                }
            }
        }
    }
}

/// Enter confirms and Esc cancels. Everything else, Ctrl+C included, is
/// ignored while a key is awaited.
fn key_of_interest(event: &KeyEvent) -> Option<Key> {
    if event.kind != KeyEventKind::Press {
        return None;
    }
    match event.code {
        KeyCode::Enter => Some(Key::Confirm),
        KeyCode::Esc => Some(Key::Cancel),
        _ => None,
    }
}
