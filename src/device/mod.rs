//! Device I/O: aligned buffers, direct reads, and discard requests.

pub mod aligned;
pub mod discard;
pub mod reader;
#[cfg(target_os = "linux")]
mod sys;
