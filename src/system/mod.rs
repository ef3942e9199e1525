//! # System Interaction Layer
//!
//! The boundary between the resolution engine and the operating system. The
//! engine hands this layer fully resolved steps; nothing external is mutated
//! before that handoff.

pub mod executor;
