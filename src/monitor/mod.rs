//! Device health monitoring through an external SMART tool.

pub mod health_probe;
