//! Streaming update sources.

pub mod fallback;
pub mod simulation;
pub mod websocket;

pub use fallback::FallbackUpdateSource;
pub use simulation::SimulatedUpdateSource;
pub use websocket::WebSocketUpdateSource;
