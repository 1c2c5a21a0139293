pub mod connector;
pub mod echo;
pub mod gemini;
pub mod protocol;
pub mod registry;

pub use connector::{LiveConnection, LiveConnector, LiveEvent, SessionSetup};
pub use echo::EchoConnector;
pub use gemini::GeminiConnector;
pub use protocol::{ClientMessage, Modality};
pub use registry::ConnectorRegistry;
