pub mod challenge;
pub mod focus;

pub use challenge::{TriggerChallenge, UnlockGrant};
pub use focus::{ApplicationId, RawFocusEvent};
