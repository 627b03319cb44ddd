//! Session lifecycle for the chat agent: one [`SessionManager`] per agent,
//! owning the transport and the current [`Session`], and enforcing the
//! tool-call pipeline (structural schema check, required-parameter
//! validation, optional-default auto-fill).

pub mod manager;
pub mod session;

pub use manager::SessionManager;
pub use session::Session;
