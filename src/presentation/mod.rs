// Presentation layer - HTTP surface over the control panels
pub mod app_state;
pub mod handlers;
