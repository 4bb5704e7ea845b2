//! Chat session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! the runtime feeds events in, executes the returned effects, and feeds
//! workflow results back as events.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{ChatMessage, ErrorKind, Role, Session, SessionContext, SessionState};
pub use transition::{transition, TransitionError, TransitionResult};
