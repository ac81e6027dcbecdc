//! # FBus Link Library
//!
//! Half-duplex FBus receiver link for a companion processor and its host.
//!
//! The companion side ([`link`]) frames and validates the wire protocol,
//! publishes channel data into a lock-free shared block and answers
//! telemetry polls. The host side ([`receiver`]) samples that block,
//! decodes arming and drive commands ([`command`]) and feeds telemetry back.

pub mod command;
pub mod config;
pub mod error;
pub mod fbus;
pub mod link;
pub mod receiver;
pub mod serial;
pub mod status;
pub mod telemetry;
