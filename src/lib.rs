//! callmeter — terminal host for metered consultation sessions.

pub mod app;
pub mod render;
