//! # Architecture Ports
//!
//! The hardware boundary of the kernel. One submodule per supported
//! processor; only the Cortex-M4 port exists today.

pub mod cortex_m4;
