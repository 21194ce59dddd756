//! Input actions and key bindings

use cadence_core::surface::{Key, UnknownKey};
use fnv::FnvHashMap;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Things the user can ask the running simulation to do.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Quit,
    TogglePause,
    Step,
    SpeedUp,
    SlowDown,
    ToggleVsync,
    Reset,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Quit,
        Action::TogglePause,
        Action::Step,
        Action::SpeedUp,
        Action::SlowDown,
        Action::ToggleVsync,
        Action::Reset,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Action::Quit => "Quit",
            Action::TogglePause => "TogglePause",
            Action::Step => "Step",
            Action::SpeedUp => "SpeedUp",
            Action::SlowDown => "SlowDown",
            Action::ToggleVsync => "ToggleVsync",
            Action::Reset => "Reset",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.name() == s)
            .ok_or_else(|| BindingError::UnknownAction(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error(transparent)]
    UnknownKey(#[from] UnknownKey),
}

static DEFAULT_BINDINGS: Lazy<InputBindings> = Lazy::new(|| {
    let mut bindings = InputBindings::empty();
    bindings
        .bind(Key::Char('q'), Action::Quit)
        .bind(Key::Escape, Action::Quit)
        .bind(Key::Space, Action::TogglePause)
        .bind(Key::Char('u'), Action::Step)
        .bind(Key::Up, Action::SpeedUp)
        .bind(Key::Down, Action::SlowDown)
        .bind(Key::Char('v'), Action::ToggleVsync)
        .bind(Key::Char('r'), Action::Reset);
    bindings
});

/// Key → action table. A key triggers at most one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBindings {
    by_key: FnvHashMap<Key, Action>,
}

impl Default for InputBindings {
    fn default() -> Self {
        DEFAULT_BINDINGS.clone()
    }
}

impl InputBindings {
    pub fn empty() -> Self {
        Self {
            by_key: FnvHashMap::default(),
        }
    }

    /// Defaults with `overrides` (action name → key names) applied. An
    /// overridden action loses all of its default keys.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Result<Self, BindingError> {
        let mut bindings = Self::default();
        for (action_name, key_names) in overrides {
            let action: Action = action_name.parse()?;
            let keys = key_names
                .iter()
                .map(|name| name.parse::<Key>())
                .collect::<Result<Vec<_>, _>>()?;
            bindings.unbind_action(action);
            for key in keys {
                bindings.bind(key, action);
            }
            tracing::debug!(%action, keys = ?key_names, "binding overridden");
        }
        Ok(bindings)
    }

    /// Bind `key` to `action`, replacing whatever `key` did before.
    pub fn bind(&mut self, key: Key, action: Action) -> &mut Self {
        self.by_key.insert(key, action);
        self
    }

    pub fn unbind_action(&mut self, action: Action) {
        self.by_key.retain(|_, bound| *bound != action);
    }

    pub fn action_for(&self, key: Key) -> Option<Action> {
        self.by_key.get(&key).copied()
    }

    /// Keys bound to `action`, sorted by name.
    pub fn keys_for(&self, action: Action) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .by_key
            .iter()
            .filter(|(_, bound)| **bound == action)
            .map(|(key, _)| *key)
            .collect();
        keys.sort_by_key(|key| key.to_string());
        keys
    }

    /// One line per action, e.g. `Quit: Escape, Q`.
    pub fn describe(&self) -> Vec<String> {
        Action::ALL
            .into_iter()
            .map(|action| {
                let keys: Vec<String> = self.keys_for(action).iter().map(Key::to_string).collect();
                format!("{action}: {}", keys.join(", "))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keys() {
        let bindings = InputBindings::default();
        assert_eq!(bindings.action_for(Key::Char('q')), Some(Action::Quit));
        assert_eq!(bindings.action_for(Key::Escape), Some(Action::Quit));
        assert_eq!(bindings.action_for(Key::Space), Some(Action::TogglePause));
        assert_eq!(bindings.action_for(Key::Char('u')), Some(Action::Step));
        assert_eq!(bindings.action_for(Key::Up), Some(Action::SpeedUp));
        assert_eq!(bindings.action_for(Key::Down), Some(Action::SlowDown));
        assert_eq!(bindings.action_for(Key::Char('v')), Some(Action::ToggleVsync));
        assert_eq!(bindings.action_for(Key::Char('r')), Some(Action::Reset));
        assert_eq!(bindings.action_for(Key::Char('z')), None);
    }

    #[test]
    fn action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.name().parse::<Action>(), Ok(action));
        }
        assert_eq!(
            "Jump".parse::<Action>(),
            Err(BindingError::UnknownAction("Jump".to_string()))
        );
    }

    #[test]
    fn overrides_replace_default_keys() {
        let overrides = BTreeMap::from([("Quit".to_string(), vec!["X".to_string()])]);
        let bindings = InputBindings::with_overrides(&overrides).unwrap();
        assert_eq!(bindings.keys_for(Action::Quit), [Key::Char('x')]);
        assert_eq!(bindings.action_for(Key::Escape), None);
        assert_eq!(bindings.action_for(Key::Space), Some(Action::TogglePause));
    }

    #[test]
    fn overrides_reject_unknown_names() {
        let bad_action = BTreeMap::from([("Fly".to_string(), vec!["F".to_string()])]);
        assert!(matches!(
            InputBindings::with_overrides(&bad_action),
            Err(BindingError::UnknownAction(_))
        ));

        let bad_key = BTreeMap::from([("Quit".to_string(), vec!["Hyper".to_string()])]);
        assert!(matches!(
            InputBindings::with_overrides(&bad_key),
            Err(BindingError::UnknownKey(_))
        ));
    }

    #[test]
    fn describe_lists_every_action() {
        let lines = InputBindings::default().describe();
        assert_eq!(lines.len(), Action::ALL.len());
        assert_eq!(lines[0], "Quit: Escape, Q");
    }
}
