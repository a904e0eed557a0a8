//! Key identifiers, modifier tracking, and held-key state
//!
//! Maps macOS virtual keycodes to stable lowercase identifiers, tracks
//! modifier keys from CGEventFlags (macOS reports those as FlagsChanged,
//! not KeyDown/KeyUp), and provides the held-keys set the recorder uses
//! to detect the exit combination.

use std::collections::HashSet;

use core_graphics::event::CGEventFlags;

/// Modifier key flag masks from macOS CGEventFlags
pub mod flags {
    use core_graphics::event::CGEventFlags;

    /// Shift key modifier flag
    pub const SHIFT: CGEventFlags = CGEventFlags::CGEventFlagShift;
    /// Control key modifier flag
    pub const CONTROL: CGEventFlags = CGEventFlags::CGEventFlagControl;
    /// Option/Alt key modifier flag
    pub const OPTION: CGEventFlags = CGEventFlags::CGEventFlagAlternate;
    /// Command key modifier flag
    pub const COMMAND: CGEventFlags = CGEventFlags::CGEventFlagCommand;
}

/// Name of a key derived from its macOS virtual keycode.
///
/// Unknown codes map to `key(<code>)` so nothing is silently dropped.
pub fn key_name(keycode: i64) -> String {
    let name = match keycode {
        0 => "a",
        1 => "s",
        2 => "d",
        3 => "f",
        4 => "h",
        5 => "g",
        6 => "z",
        7 => "x",
        8 => "c",
        9 => "v",
        11 => "b",
        12 => "q",
        13 => "w",
        14 => "e",
        15 => "r",
        16 => "y",
        17 => "t",
        18 => "1",
        19 => "2",
        20 => "3",
        21 => "4",
        22 => "6",
        23 => "5",
        24 => "=",
        25 => "9",
        26 => "7",
        27 => "-",
        28 => "8",
        29 => "0",
        30 => "]",
        31 => "o",
        32 => "u",
        33 => "[",
        34 => "i",
        35 => "p",
        36 => "enter",
        37 => "l",
        38 => "j",
        39 => "'",
        40 => "k",
        41 => ";",
        42 => "\\",
        43 => ",",
        44 => "/",
        45 => "n",
        46 => "m",
        47 => ".",
        48 => "tab",
        49 => "space",
        50 => "`",
        51 => "backspace",
        53 => "esc",
        55 => "cmd",
        56 => "shift",
        57 => "capslock",
        58 => "option",
        59 => "ctrl",
        60 => "shift_r",
        61 => "option_r",
        62 => "ctrl_r",
        63 => "fn",
        96 => "f5",
        97 => "f6",
        98 => "f7",
        99 => "f3",
        100 => "f8",
        101 => "f9",
        103 => "f11",
        109 => "f10",
        111 => "f12",
        115 => "home",
        116 => "pageup",
        117 => "delete",
        118 => "f4",
        119 => "end",
        120 => "f2",
        121 => "pagedown",
        122 => "f1",
        123 => "left",
        124 => "right",
        125 => "down",
        126 => "up",
        _ => return format!("key({})", keycode),
    };
    name.to_string()
}

/// Tracks which modifier keys are currently pressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift key is held
    pub shift: bool,
    /// Control key is held
    pub control: bool,
    /// Option/Alt key is held
    pub option: bool,
    /// Command key is held
    pub command: bool,
}

impl Modifiers {
    /// Create a new Modifiers snapshot from CGEventFlags
    pub fn from_flags(event_flags: CGEventFlags) -> Self {
        Self {
            shift: event_flags.contains(flags::SHIFT),
            control: event_flags.contains(flags::CONTROL),
            option: event_flags.contains(flags::OPTION),
            command: event_flags.contains(flags::COMMAND),
        }
    }

    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.control && !self.option && !self.command
    }

    /// Per-key transitions from `self` to `next`: (key identifier, pressed)
    pub fn diff(&self, next: &Modifiers) -> Vec<(&'static str, bool)> {
        let mut changes = Vec::new();
        if self.shift != next.shift {
            changes.push(("shift", next.shift));
        }
        if self.control != next.control {
            changes.push(("ctrl", next.control));
        }
        if self.option != next.option {
            changes.push(("option", next.option));
        }
        if self.command != next.command {
            changes.push(("cmd", next.command));
        }
        changes
    }
}

/// Set of key identifiers currently held down.
///
/// The recorder mutates this on every press/release and asks it whether
/// the exit combination is satisfied. Removal is guarded: releasing a key
/// that is not held is reported to the caller, never a panic.
#[derive(Debug, Clone, Default)]
pub struct HeldKeys {
    keys: HashSet<String>,
}

impl HeldKeys {
    /// Create an empty held-keys set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as held. Returns false if it was already held
    /// (e.g. a press seen again before its release).
    pub fn press(&mut self, key: &str) -> bool {
        self.keys.insert(key.to_string())
    }

    /// Clear a key's held marker. Returns false if the key was not held.
    pub fn release(&mut self, key: &str) -> bool {
        self.keys.remove(key)
    }

    /// Check whether a single key is held
    pub fn is_held(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Check whether every given key is simultaneously held
    pub fn holds_all<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> bool {
        keys.into_iter().all(|k| self.keys.contains(k))
    }

    /// Number of keys currently held
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if no key is held
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Error parsing an exit combination spec
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ComboParseError {
    #[error("exit combination is empty")]
    Empty,

    #[error("exit combination has an empty key between separators")]
    EmptyKey,
}

/// The key combination that terminates recording.
///
/// All listed keys must be held at the same time. Defaults to "q" + "esc".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitCombo {
    keys: Vec<String>,
}

impl ExitCombo {
    /// Build a combination from key identifiers
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a "+"-separated spec such as `"q+esc"`
    pub fn parse(spec: &str) -> Result<Self, ComboParseError> {
        if spec.trim().is_empty() {
            return Err(ComboParseError::Empty);
        }

        let mut keys = Vec::new();
        for part in spec.split('+') {
            let key = part.trim().to_lowercase();
            if key.is_empty() {
                return Err(ComboParseError::EmptyKey);
            }
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        Ok(Self { keys })
    }

    /// Check whether the combination is satisfied by the held-keys set
    pub fn is_satisfied(&self, held: &HeldKeys) -> bool {
        held.holds_all(self.keys.iter())
    }

    /// The key identifiers making up the combination
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Default for ExitCombo {
    fn default() -> Self {
        Self::new(["q", "esc"])
    }
}

impl std::fmt::Display for ExitCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keys.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_name_letters() {
        assert_eq!(key_name(12), "q");
        assert_eq!(key_name(0), "a");
        assert_eq!(key_name(53), "esc");
    }

    #[test]
    fn test_key_name_unknown() {
        assert_eq!(key_name(999), "key(999)");
    }

    #[test]
    fn test_modifier_diff() {
        let before = Modifiers::default();
        let after = Modifiers {
            shift: true,
            control: true,
            ..Default::default()
        };

        let changes = before.diff(&after);
        assert_eq!(changes, vec![("shift", true), ("ctrl", true)]);

        let back = after.diff(&before);
        assert_eq!(back, vec![("shift", false), ("ctrl", false)]);
    }

    #[test]
    fn test_modifier_diff_no_change() {
        let state = Modifiers {
            command: true,
            ..Default::default()
        };
        assert!(state.diff(&state).is_empty());
        assert!(!state.is_empty());
    }

    #[test]
    fn test_held_keys_press_release() {
        let mut held = HeldKeys::new();
        assert!(held.press("q"));
        assert!(held.is_held("q"));
        assert!(!held.press("q")); // already held

        assert!(held.release("q"));
        assert!(!held.is_held("q"));
        assert!(held.is_empty());
    }

    #[test]
    fn test_held_keys_guarded_release() {
        let mut held = HeldKeys::new();
        assert!(!held.release("x"));
        assert_eq!(held.len(), 0);
    }

    #[test]
    fn test_exit_combo_default() {
        let combo = ExitCombo::default();
        let mut held = HeldKeys::new();

        held.press("q");
        assert!(!combo.is_satisfied(&held));

        held.press("esc");
        assert!(combo.is_satisfied(&held));

        held.release("q");
        assert!(!combo.is_satisfied(&held));
    }

    #[test]
    fn test_exit_combo_parse() {
        let combo = ExitCombo::parse("Q + Esc").unwrap();
        assert_eq!(combo.keys(), &["q".to_string(), "esc".to_string()]);
        assert_eq!(combo.to_string(), "q+esc");
    }

    #[test]
    fn test_exit_combo_parse_rejects_empty() {
        assert_eq!(ExitCombo::parse("  "), Err(ComboParseError::Empty));
        assert_eq!(ExitCombo::parse("q++esc"), Err(ComboParseError::EmptyKey));
    }
}
