//! Desktop client for the Docs Generator backend.
//!
//! A ZIP of source code is uploaded to the backend, the resulting session is
//! polled until documentation is ready, and the generated archive can then
//! be downloaded. [`upload::SessionManager`] holds the state machine and
//! drives all I/O; [`app::DocsUploader`] is the eframe front end on top.

pub mod app;
pub mod config;
pub mod error;
pub mod upload;
pub mod utils;
