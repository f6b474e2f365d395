//! `korri-switchbank` library: device side of an NMEA 2000 binary switch bank
//! in a `no_std` environment. It answers group functions (PGN 126208) about
//! Binary Switch Bank Status (PGN 127501), applies Switch Bank Control
//! (PGN 127502), and broadcasts the bank status on a reconfigurable schedule.
#![no_std]
//==================================================================================
/// Message container and addressing helpers shared by every layer.
pub mod core;
/// Domain and low-level errors (message bounds, header decoding, sending,
/// configuration).
pub mod error;
/// NMEA 2000 protocol pieces: group functions, message codecs, transmission
/// scheduler, and bus abstraction traits.
pub mod protocol;
/// Switch bank state, message dispatch, and the async bus service.
pub mod application;
//==================================================================================
