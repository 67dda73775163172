// Application layer - Control panel use cases and the ports they depend on
pub mod control_gateway;
pub mod control_panel;
pub mod panel_registry;
pub mod panel_view;
pub mod session_store;

#[cfg(test)]
pub(crate) mod fake_gateway;
