pub mod engine;
pub mod notify;
pub mod recording;
pub mod registry;
pub mod session;

pub use engine::{DetectionEngine, EngineBuilder, EngineStatus, StartOutcome};
pub use notify::{
    EventKind, HttpNotifier, NotificationDispatcher, NotificationEvent, NotificationTransport,
    WirePayload,
};
pub use recording::RecordingSink;
pub use registry::SessionRegistry;
pub use session::{DetectionSession, SessionSnapshot};
