//! The application-facing engine and the events it hands to the front end.
pub mod engine;
pub mod events;

pub use engine::Engine;
pub use events::EngineEvent;
