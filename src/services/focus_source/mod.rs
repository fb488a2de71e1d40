//! Focus source service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for observing the active
//! window through desktop tools and forwarding raw focus notifications to the
//! engine handle. It MUST NOT resolve identifiers, consult the lock registry or
//! decide anything about challenges: that belongs to the focus resolver and the
//! lock engine.

mod dry_run;
mod polling;
mod sway;
mod window;
mod wmctrl;
mod xdotool;
mod r#trait;

pub use self::r#trait::{create_focus_source, FocusSourceTrait};
