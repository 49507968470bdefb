#![deny(unsafe_code)]

//! ssd-linux-runtime: background service that keeps an SSD exercised.
//!
//! Every cycle, in order:
//! 1. **Direct read**: one `O_DIRECT | O_SYNC` positioned read of an aligned block
//! 2. **Discard**: one TRIM request over a configured byte range
//! 3. **Health check**: an external SMART tool, judged by exit status only
//!
//! then a cancellable wait until the next cycle. Failures are logged and the
//! loop carries on.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use ssd_linux_runtime::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use ssd_linux_runtime::core::config::Config;
//! use ssd_linux_runtime::device::aligned::AlignedBuffer;
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod device;
pub mod logger;
pub mod monitor;
