//! cream-sessiond — desktop session daemon.
//!
//! Tracks user activity through the X11 screensaver extension, launches and
//! supervises session modules and autostart applications, and reports status
//! changes and process crashes over `DBus`.

pub mod activity;
pub mod config;
pub mod crash;
pub mod domain;
pub mod idle;
pub mod ipc;
pub mod launch;
pub mod power;
pub mod process;
pub mod session;
pub mod supervisor;
