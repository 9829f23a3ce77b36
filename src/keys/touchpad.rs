//! # Touchpad Decoder
//!
//! Maps raw pad touches from a capacitive touch controller to [`KeyEvent`]s.
//!
//! ## Layouts
//!
//! | Pad | 4-key | 3-key |
//! |-----|-------|-------|
//! | 0 | Prev | Prev |
//! | 1 | Next | Next |
//! | 2 | Select | Select (tap) / Back (hold) |
//! | 3 | Back | - |
//!
//! In landscape orientation the pad order is mirrored.
//!
//! Events fire on the touch edge, except the 3-key Select pad: a tap fires
//! `Select` on release, and holding it for [`LONG_PRESS`] fires `Back` while
//! the pad is still held. A touch on the same pad within [`DEBOUNCE`] of the
//! previous one is ignored.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::{KeyEvent, KeySource};

/// Minimum time between two accepted touches of the same pad.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// Hold time that turns the 3-key Select pad into Back.
pub const LONG_PRESS: Duration = Duration::from_millis(800);

/// Raw touch controller access.
#[cfg_attr(test, mockall::automock)]
pub trait TouchSense {
    /// Index of the lowest pad currently touched, if any.
    fn touched(&mut self) -> Option<u8>;
}

/// Number of keys fitted to the pad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLayout {
    FourKey,
    ThreeKey,
}

/// Mounting orientation of the pad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl KeyLayout {
    fn keys(self) -> &'static [KeyEvent] {
        match self {
            KeyLayout::FourKey => &[KeyEvent::Prev, KeyEvent::Next, KeyEvent::Select, KeyEvent::Back],
            KeyLayout::ThreeKey => &[KeyEvent::Prev, KeyEvent::Next, KeyEvent::Select],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Press {
    pad: u8,
    since: Instant,
    suppressed: bool,
    long_fired: bool,
}

/// Key source over a raw touch controller
#[derive(Debug)]
pub struct Touchpad<T> {
    sense: T,
    layout: KeyLayout,
    orientation: Orientation,
    held: Option<Press>,
    last_touch: Option<(u8, Instant)>,
}

impl<T: TouchSense> Touchpad<T> {
    pub fn new(sense: T, layout: KeyLayout, orientation: Orientation) -> Self {
        Self {
            sense,
            layout,
            orientation,
            held: None,
            last_touch: None,
        }
    }

    /// Logical key bound to a physical pad, if any.
    fn key_for(&self, pad: u8) -> Option<KeyEvent> {
        let keys = self.layout.keys();
        let index = usize::from(pad);
        if index >= keys.len() {
            return None;
        }
        match self.orientation {
            Orientation::Portrait => Some(keys[index]),
            Orientation::Landscape => Some(keys[keys.len() - 1 - index]),
        }
    }

    /// Whether `key` is the 3-key pad that doubles as Back.
    fn is_dual_select(&self, key: KeyEvent) -> bool {
        self.layout == KeyLayout::ThreeKey && key == KeyEvent::Select
    }

    /// Poll the controller as of `now`.
    pub fn poll_at(&mut self, now: Instant) -> Option<KeyEvent> {
        let touched = self.sense.touched();

        match (self.held, touched) {
            (None, None) => None,
            (None, Some(pad)) => self.press(pad, now),
            (Some(press), Some(pad)) if press.pad == pad => self.hold(press, now),
            (Some(press), _) => {
                // Sliding onto another pad counts as a release; the new pad
                // is picked up on the next poll.
                self.held = None;
                self.release(press)
            }
        }
    }

    fn press(&mut self, pad: u8, now: Instant) -> Option<KeyEvent> {
        let suppressed = matches!(
            self.last_touch,
            Some((last_pad, at)) if last_pad == pad && now.duration_since(at) < DEBOUNCE
        );
        self.last_touch = Some((pad, now));
        self.held = Some(Press {
            pad,
            since: now,
            suppressed,
            long_fired: false,
        });

        if suppressed {
            trace!("Debounced touch on pad {}", pad);
            return None;
        }

        let key = self.key_for(pad)?;
        if self.is_dual_select(key) {
            return None;
        }
        Some(key)
    }

    fn hold(&mut self, mut press: Press, now: Instant) -> Option<KeyEvent> {
        let key = self.key_for(press.pad)?;
        if press.suppressed || press.long_fired || !self.is_dual_select(key) {
            return None;
        }

        if now.duration_since(press.since) >= LONG_PRESS {
            press.long_fired = true;
            self.held = Some(press);
            return Some(KeyEvent::Back);
        }
        None
    }

    fn release(&mut self, press: Press) -> Option<KeyEvent> {
        let key = self.key_for(press.pad)?;
        if self.is_dual_select(key) && !press.suppressed && !press.long_fired {
            return Some(KeyEvent::Select);
        }
        None
    }
}

impl<T: TouchSense> KeySource for Touchpad<T> {
    fn poll(&mut self) -> Option<KeyEvent> {
        self.poll_at(Instant::now())
    }
}
