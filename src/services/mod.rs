pub mod challenge_gate;
pub mod credential;
pub mod focus_resolver;
pub mod focus_source;
pub mod grant_bus;
pub mod input_methods;
pub mod lock_engine;
pub mod lock_registry;

pub use challenge_gate::{create_challenge_gate, run_challenge_gate};
pub use credential::CredentialStore;
pub use focus_resolver::{FocusResolver, IgnoreSet};
pub use focus_source::create_focus_source;
pub use grant_bus::UnlockGrantBus;
pub use lock_engine::LockCoordinator;
pub use lock_registry::{LockRegistry, RegistryFeed};
