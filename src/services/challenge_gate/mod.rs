//! Challenge Presentation Gate: shows the challenge for a locked application.
//!
//! The gate only consumes `TriggerChallenge` and publishes grants on success.
//! A failed or cancelled challenge needs no action: without a grant the
//! application stays locked on its next foreground transition.

mod console;
mod dry_run;
mod r#trait;

pub use self::r#trait::{create_challenge_gate, run_challenge_gate, ChallengeGate};
