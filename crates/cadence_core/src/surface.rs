//! Window/input/audio surface abstraction
//!
//! The simulation loop only talks to the outside world through [`Surface`]:
//! it drains input events, submits drawables and requests sounds. The
//! windowed implementation lives in `cadence_render`; [`HeadlessSurface`]
//! runs the loop without a window.

use crate::math::{Color, Vec2};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Keyboard keys the engine knows by name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Space,
    Enter,
    Tab,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    /// Letter or digit, stored lowercase.
    Char(char),
}

const NAMED_KEYS: &[(Key, &str)] = &[
    (Key::Escape, "Escape"),
    (Key::Space, "Space"),
    (Key::Enter, "Enter"),
    (Key::Tab, "Tab"),
    (Key::Backspace, "Backspace"),
    (Key::Up, "Up"),
    (Key::Down, "Down"),
    (Key::Left, "Left"),
    (Key::Right, "Right"),
];

impl Key {
    /// Letter/digit key; other characters have no key.
    pub fn from_char(c: char) -> Option<Self> {
        c.is_ascii_alphanumeric()
            .then(|| Key::Char(c.to_ascii_lowercase()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            named => {
                let name = NAMED_KEYS
                    .iter()
                    .find(|(key, _)| key == named)
                    .map(|(_, name)| *name)
                    .unwrap_or("?");
                f.write_str(name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key `{0}`")]
pub struct UnknownKey(pub String);

impl FromStr for Key {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((key, _)) = NAMED_KEYS
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
        {
            return Ok(*key);
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Key::from_char(c).ok_or_else(|| UnknownKey(s.to_string())),
            _ => Err(UnknownKey(s.to_string())),
        }
    }
}

/// Input/window events produced by a surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Closed,
    KeyPressed(Key),
    KeyReleased(Key),
    Resized { width: u32, height: u32 },
    FocusChanged(bool),
}

/// Something the surface can draw. Coordinates are normalized device
/// coordinates: `[-1, 1]` on both axes, y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drawable {
    Clear(Color),
    Rect {
        center: Vec2,
        half_extent: Vec2,
        color: Color,
    },
}

/// Window, input queue and audio output as seen by the simulation loop.
pub trait Surface {
    /// Sound resource type accepted by `play_sound`.
    type Sound;

    /// Drain pending events without blocking.
    fn poll_events(&mut self) -> Vec<Event>;

    fn begin_frame(&mut self);

    fn submit(&mut self, drawable: Drawable);

    /// Present the frame. May block to pace the frame rate.
    fn end_frame(&mut self);

    fn play_sound(&mut self, sound: &Self::Sound);
}

/// Surface with no window: events are injected by the caller, draws and
/// sounds are only counted.
pub struct HeadlessSurface<S = ()> {
    events: VecDeque<Event>,
    frame_open: bool,
    frames: u64,
    draws: Vec<Drawable>,
    sounds_played: Vec<S>,
}

impl<S> HeadlessSurface<S> {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            frame_open: false,
            frames: 0,
            draws: Vec::new(),
            sounds_played: Vec::new(),
        }
    }

    pub fn push_event(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Completed frames.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Drawables submitted during the last completed (or current) frame.
    pub fn draws(&self) -> &[Drawable] {
        &self.draws
    }

    pub fn sounds_played(&self) -> &[S] {
        &self.sounds_played
    }
}

impl<S> Default for HeadlessSurface<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone> Surface for HeadlessSurface<S> {
    type Sound = S;

    fn poll_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    fn begin_frame(&mut self) {
        assert!(!self.frame_open, "begin_frame called twice without end_frame");
        self.frame_open = true;
        self.draws.clear();
    }

    fn submit(&mut self, drawable: Drawable) {
        assert!(self.frame_open, "submit outside of a frame");
        self.draws.push(drawable);
    }

    fn end_frame(&mut self) {
        assert!(self.frame_open, "end_frame without begin_frame");
        self.frame_open = false;
        self.frames += 1;
    }

    fn play_sound(&mut self, sound: &S) {
        self.sounds_played.push(sound.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_round_trip() {
        for name in ["Escape", "Space", "Up", "Down", "Q", "V", "7"] {
            let key: Key = name.parse().unwrap();
            assert_eq!(key.to_string(), name);
        }
        assert_eq!("space".parse::<Key>(), Ok(Key::Space));
        assert_eq!("q".parse::<Key>(), Ok(Key::Char('q')));
        assert!("F13".parse::<Key>().is_err());
        assert!("?".parse::<Key>().is_err());
    }

    #[test]
    fn headless_surface_records_frames() {
        let mut surface = HeadlessSurface::<u8>::new();
        surface.push_event(Event::Closed);
        assert_eq!(surface.poll_events(), [Event::Closed]);
        assert!(surface.poll_events().is_empty());

        surface.begin_frame();
        surface.submit(Drawable::Clear(Color::BLACK));
        surface.play_sound(&3);
        surface.end_frame();
        assert_eq!(surface.frames(), 1);
        assert_eq!(surface.draws().len(), 1);
        assert_eq!(surface.sounds_played(), [3]);
    }

    #[test]
    #[should_panic(expected = "submit outside of a frame")]
    fn submit_requires_open_frame() {
        let mut surface = HeadlessSurface::<()>::new();
        surface.submit(Drawable::Clear(Color::WHITE));
    }
}
