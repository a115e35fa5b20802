use std::collections::{BTreeMap, BTreeSet};

/// Keys the demo distinguishes. Hosts map everything else to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Escape,
    Space,
    Enter,
    F1,
    Other(u32),
}

/// A high-level action produced from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Leave the frame loop.
    Exit,
    /// Input mapping that hasn't been bound.
    Noop,
}

/// Key to action bindings.
#[derive(Debug, Clone)]
pub struct KeyMap {
    bindings: BTreeMap<Key, Action>,
}

impl Default for KeyMap {
    /// Escape exits.
    fn default() -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert(Key::Escape, Action::Exit);
        Self { bindings }
    }
}

impl KeyMap {
    pub fn empty() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    pub fn bind(&mut self, key: Key, action: Action) {
        self.bindings.insert(key, action);
    }

    pub fn action(&self, key: Key) -> Action {
        self.bindings.get(&key).copied().unwrap_or(Action::Noop)
    }
}

/// Keys currently held, polled once per tick.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: BTreeSet<Key>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key transition from the host.
    pub fn set_key(&mut self, key: Key, pressed: bool) {
        if pressed {
            if self.held.insert(key) {
                tracing::debug!(?key, "key down");
            }
        } else {
            self.held.remove(&key);
        }
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Whether any held key is bound to `action`.
    pub fn wants(&self, keymap: &KeyMap, action: Action) -> bool {
        self.held.iter().any(|k| keymap.action(*k) == action)
    }

    pub fn release_all(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_exits_by_default() {
        let keymap = KeyMap::default();
        assert_eq!(keymap.action(Key::Escape), Action::Exit);
        assert_eq!(keymap.action(Key::Space), Action::Noop);
    }

    #[test]
    fn held_key_produces_action() {
        let keymap = KeyMap::default();
        let mut input = InputState::new();
        assert!(!input.wants(&keymap, Action::Exit));

        input.set_key(Key::Escape, true);
        assert!(input.is_down(Key::Escape));
        assert!(input.wants(&keymap, Action::Exit));

        input.set_key(Key::Escape, false);
        assert!(!input.wants(&keymap, Action::Exit));
    }

    #[test]
    fn rebinding() {
        let mut keymap = KeyMap::empty();
        keymap.bind(Key::Other(81), Action::Exit);
        let mut input = InputState::new();
        input.set_key(Key::Escape, true);
        assert!(!input.wants(&keymap, Action::Exit));
        input.set_key(Key::Other(81), true);
        assert!(input.wants(&keymap, Action::Exit));
    }

    #[test]
    fn release_all_clears() {
        let mut input = InputState::new();
        input.set_key(Key::F1, true);
        input.set_key(Key::Enter, true);
        input.release_all();
        assert!(!input.is_down(Key::F1));
    }
}
