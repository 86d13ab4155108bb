//! Cooperative processes driven by the event kernel.
//!
//! A process is a body that runs until it waits on an event, is resumed
//! when that event fires, and eventually returns a value or fails. Its
//! completion is itself an event other processes can wait on.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`ProcessId`], [`ProcessRef`] |
//! | [`state`] | [`ProcessState`] and the kernel's per-process record |
//! | [`traits`] | [`Process`] trait, [`Resume`], [`Step`], [`WaitPoint`] |

pub mod id;
pub mod state;
pub mod traits;

pub use id::{ProcessId, ProcessRef};
pub(crate) use state::ProcessRecord;
pub use state::ProcessState;
pub use traits::{from_fn, Process, Resume, Step, WaitKind, WaitPoint};
