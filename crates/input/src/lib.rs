//! Input: platform key events mapped to actions the frame driver consumes.
//!
//! # Invariants
//! - Hosts translate their native key codes into [`Key`]; games only ever
//!   see [`Action`]s, never raw events.

pub mod action;

pub use action::{Action, InputState, Key, KeyMap};

pub fn crate_info() -> &'static str {
    "blendlab-input v0.1.0"
}
