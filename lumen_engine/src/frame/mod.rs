//! Frames in flight
//!
//! The backend-agnostic half of the frame loop: the ring of N slots, the
//! per-slot state machine and the order of fence wait / acquire / pool reset /
//! fence reset / submit / present. Backends implement [`FrameBackend`].

mod per_frame;
mod frame_scheduler;

pub use per_frame::{PerFrame, MAX_FRAMES_IN_FLIGHT};
pub use frame_scheduler::{
    FrameScheduler, FrameBackend, FrameSlotState, ActiveFrame,
    AcquireOutcome, PresentStatus,
};
