//! # Key Input Module
//!
//! Turns physical or host input into the four navigation events the
//! instrument understands.
//!
//! This module handles:
//! - The [`KeySource`] capability polled once per tick
//! - Touchpad decoding for the 3-key and 4-key pad variants
//! - Console input for host runs
//! - Scripted input for unattended runs and tests

pub mod console;
pub mod touchpad;

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

pub use console::ConsoleKeys;
pub use touchpad::{KeyLayout, Orientation, TouchSense, Touchpad};

/// Navigation event produced by a key source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    Next,
    Prev,
    Select,
    Back,
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyEvent::Next => "next",
            KeyEvent::Prev => "prev",
            KeyEvent::Select => "select",
            KeyEvent::Back => "back",
        };
        f.write_str(name)
    }
}

impl FromStr for KeyEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "next" => Ok(KeyEvent::Next),
            "p" | "prev" => Ok(KeyEvent::Prev),
            "s" | "select" => Ok(KeyEvent::Select),
            "b" | "back" => Ok(KeyEvent::Back),
            other => Err(format!("unknown key '{}'", other)),
        }
    }
}

/// Capability to fetch the next pending key event without blocking.
#[cfg_attr(test, mockall::automock)]
pub trait KeySource {
    /// Return the next key event, if one is pending.
    fn poll(&mut self) -> Option<KeyEvent>;
}

impl<K: KeySource + ?Sized> KeySource for Box<K> {
    fn poll(&mut self) -> Option<KeyEvent> {
        (**self).poll()
    }
}

/// Fixed sequence of polls; `None` entries are ticks without a key.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    script: VecDeque<Option<KeyEvent>>,
}

impl ScriptedKeys {
    /// Script with one entry per poll.
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Option<KeyEvent>>,
    {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Script delivering `keys` on consecutive polls.
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = KeyEvent>,
    {
        Self::new(keys.into_iter().map(Some))
    }

    /// Queue another poll result.
    pub fn push(&mut self, key: Option<KeyEvent>) {
        self.script.push_back(key);
    }

    /// True once every scripted poll has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.script.is_empty()
    }
}

impl KeySource for ScriptedKeys {
    fn poll(&mut self) -> Option<KeyEvent> {
        self.script.pop_front().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_long_names() {
        assert_eq!("n".parse::<KeyEvent>().unwrap(), KeyEvent::Next);
        assert_eq!("Prev".parse::<KeyEvent>().unwrap(), KeyEvent::Prev);
        assert_eq!(" select \n".parse::<KeyEvent>().unwrap(), KeyEvent::Select);
        assert_eq!("B".parse::<KeyEvent>().unwrap(), KeyEvent::Back);
        assert!("start".parse::<KeyEvent>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for key in [KeyEvent::Next, KeyEvent::Prev, KeyEvent::Select, KeyEvent::Back] {
            assert_eq!(key.to_string().parse::<KeyEvent>().unwrap(), key);
        }
    }

    #[test]
    fn test_scripted_keys_with_gaps() {
        let mut keys = ScriptedKeys::new([Some(KeyEvent::Select), None, Some(KeyEvent::Back)]);

        assert_eq!(keys.poll(), Some(KeyEvent::Select));
        assert_eq!(keys.poll(), None);
        assert!(!keys.is_exhausted());
        assert_eq!(keys.poll(), Some(KeyEvent::Back));
        assert!(keys.is_exhausted());
        assert_eq!(keys.poll(), None);
    }
}
