//! HTTP facade of the sidecar
//!
//! Routes health probes, tool listing, tool calls and the legacy execute
//! envelope onto the tool bridge.

pub mod handlers;
