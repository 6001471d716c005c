/// Frame scheduler: the per-slot state machine driving a [`FrameBackend`]
///
/// Per cycle, with `slot = frame_counter % MAX_FRAMES_IN_FLIGHT`:
///
/// 1. wait on the slot's fence (the slot's previous submission has retired)
/// 2. acquire a presentable image with the slot's image-ready semaphore
/// 3. reset the slot's command pool, begin a fresh command buffer
/// 4. caller records
/// 5. reset the slot's fence, then submit: wait image-ready, signal
///    render-finished and the slot's fence
/// 6. present gated on render-finished
/// 7. advance `frame_counter`
///
/// The fence is only reset right before the submission that signals it
/// again, so a frame skipped or failed before step 5 leaves it signaled. If
/// the submission itself fails the fence stays unsignaled with no work
/// pending, and the next cycle on that slot skips the wait of step 1. The
/// wait of step 1 always precedes the pool reset of step 3.

use crate::error::Result;
use crate::{engine_bail_warn, engine_debug, engine_warn};
use super::per_frame::{PerFrame, MAX_FRAMES_IN_FLIGHT};

/// Logical state of one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSlotState {
    /// Fence signaled (or about to be waited), nothing recorded
    Idle,
    /// Fence waited, acquiring an image
    Acquiring,
    /// Command buffer open for recording
    Recording,
    /// Submitted to the GPU, fence pending
    Submitted,
}

/// Result of an image acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: u32, suboptimal: bool },
    /// The surface changed; the swapchain must be recreated before rendering
    OutOfDate,
}

/// Result of a present request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    Suboptimal,
    OutOfDate,
}

impl PresentStatus {
    /// True when the application should recreate the swapchain
    pub fn is_stale(self) -> bool {
        !matches!(self, PresentStatus::Optimal)
    }
}

/// GPU operations the scheduler sequences
///
/// Each method acts on the resources of one frame slot.
pub trait FrameBackend {
    type CommandBuffer: Copy;

    /// Block until the slot's previous submission has completed
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;

    /// Acquire the next presentable image, signaling the slot's image-ready semaphore
    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome>;

    /// Return the slot's fence to the unsignaled state
    fn reset_slot_fence(&mut self, slot: usize) -> Result<()>;

    /// Reset the slot's command pool, allocate and begin a primary command buffer
    fn begin_commands(&mut self, slot: usize) -> Result<Self::CommandBuffer>;

    /// End recording and submit, signaling render-finished and the slot's fence
    fn submit(&mut self, slot: usize, command_buffer: Self::CommandBuffer) -> Result<()>;

    /// Present `image_index` once the slot's render-finished semaphore is signaled
    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentStatus>;
}

/// A frame between `begin_frame` and `end_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveFrame<C> {
    pub slot: usize,
    pub image_index: u32,
    pub command_buffer: C,
    /// Acquire reported a suboptimal surface
    pub suboptimal: bool,
}

pub struct FrameScheduler {
    frame_counter: u64,
    states: PerFrame<FrameSlotState>,
    /// False once a fence was reset and no submission will signal it
    fence_armed: PerFrame<bool>,
    open_slot: Option<usize>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            frame_counter: 0,
            states: PerFrame::splat(FrameSlotState::Idle),
            fence_armed: PerFrame::splat(true),
            open_slot: None,
        }
    }

    /// Number of frames submitted so far
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Slot used by the next (or currently open) frame
    pub fn current_slot(&self) -> usize {
        (self.frame_counter % MAX_FRAMES_IN_FLIGHT as u64) as usize
    }

    pub fn slot_state(&self, slot: usize) -> FrameSlotState {
        self.states[slot]
    }

    /// Steps 1 to 3. Returns `None` when the swapchain is out of date and
    /// the frame is skipped.
    pub fn begin_frame<B: FrameBackend>(
        &mut self,
        backend: &mut B,
    ) -> Result<Option<ActiveFrame<B::CommandBuffer>>> {
        if let Some(slot) = self.open_slot {
            engine_bail_warn!("lumen::frame",
                "begin_frame called while frame slot {} is still open", slot);
        }

        let slot = self.current_slot();

        if self.fence_armed[slot] {
            backend.wait_for_slot(slot)?;
        } else {
            engine_debug!("lumen::frame",
                "Slot {} has no pending submission, skipping fence wait", slot);
        }
        self.states[slot] = FrameSlotState::Acquiring;

        let (image_index, suboptimal) = match backend.acquire_image(slot) {
            Ok(AcquireOutcome::Acquired { image_index, suboptimal }) => (image_index, suboptimal),
            Ok(AcquireOutcome::OutOfDate) => {
                engine_warn!("lumen::frame",
                    "Swapchain out of date, skipping frame {}", self.frame_counter);
                self.states[slot] = FrameSlotState::Idle;
                return Ok(None);
            }
            Err(e) => {
                self.states[slot] = FrameSlotState::Idle;
                return Err(e);
            }
        };

        let command_buffer = match backend.begin_commands(slot) {
            Ok(command_buffer) => command_buffer,
            Err(e) => {
                self.states[slot] = FrameSlotState::Idle;
                return Err(e);
            }
        };

        self.states[slot] = FrameSlotState::Recording;
        self.open_slot = Some(slot);

        Ok(Some(ActiveFrame {
            slot,
            image_index,
            command_buffer,
            suboptimal,
        }))
    }

    /// Steps 5 to 7. A failed submission closes the frame and returns the
    /// slot to `Idle` without advancing `frame_counter`.
    pub fn end_frame<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        frame: ActiveFrame<B::CommandBuffer>,
    ) -> Result<PresentStatus> {
        if self.open_slot != Some(frame.slot) {
            engine_bail_warn!("lumen::frame",
                "end_frame called for slot {} without a matching begin_frame", frame.slot);
        }
        self.open_slot = None;

        // Disarmed before the call: a failed reset leaves the fence state unknown
        self.fence_armed[frame.slot] = false;
        let submitted = backend
            .reset_slot_fence(frame.slot)
            .and_then(|()| backend.submit(frame.slot, frame.command_buffer));
        if let Err(e) = submitted {
            self.states[frame.slot] = FrameSlotState::Idle;
            return Err(e);
        }
        self.fence_armed[frame.slot] = true;
        self.states[frame.slot] = FrameSlotState::Submitted;
        self.frame_counter += 1;

        let status = backend.present(frame.slot, frame.image_index)?;
        if status.is_stale() {
            engine_debug!("lumen::frame",
                "Present reported {:?} on frame {}", status, self.frame_counter - 1);
        }

        Ok(status)
    }

    /// Mark every slot idle after the caller waited for device idle
    pub fn reset_after_idle(&mut self) {
        for state in self.states.iter_mut() {
            *state = FrameSlotState::Idle;
        }
        self.open_slot = None;
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "frame_scheduler_tests.rs"]
mod tests;
