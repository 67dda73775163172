// Domain layer - Session, telemetry and volume models
pub mod optimistic;
pub mod session;
pub mod telemetry;
pub mod volume;
pub mod wire;
