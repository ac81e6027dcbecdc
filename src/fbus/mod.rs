//! # FBus Protocol Module
//!
//! Stateless codec for the half-duplex FBus receiver protocol.
//!
//! This module handles:
//! - Control frames (8/16/24 channels, 11-bit resolution)
//! - Downlink/uplink telemetry frames
//! - The folded-sum checksum
//! - Raw channel to servo pulse scaling

pub mod protocol;
pub mod channels;
pub mod checksum;
pub mod encoder;
pub mod decoder;
