//! # Audio Module
//!
//! Per-guild playback coordination on top of a remote audio node.
//!
//! ## Architecture
//!
//! ### [`session`] - Session actor
//! - One task per guild owning queue, votes, DJ and loop flags
//! - Reacts to commands, node events and voice updates in arrival order
//! - Tears itself down when the channel empties or the queue stays idle
//!
//! ### [`manager`] - Session registry
//! - Creates sessions on demand and routes node events to them
//!
//! ### [`backend`] - Node contract
//! - What a session needs from the audio node, the notifier and the failure log
//!
//! ### Domain pieces
//! - [`queue`]: ordered pending tracks
//! - [`votes`]: vote ledger and quorum
//! - [`policy`]: privilege checks and DJ handover
//! - [`filters`]: audio filter presets
//! - [`events`]: typed node events

pub mod backend;
pub mod events;
pub mod filters;
pub mod manager;
pub mod policy;
pub mod queue;
pub mod session;
pub mod track;
pub mod votes;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::SessionManager;
