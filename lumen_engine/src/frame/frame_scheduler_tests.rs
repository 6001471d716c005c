//! Unit tests for frame_scheduler.rs
//!
//! Uses a mock backend that records every call and simulates fence state.

use super::*;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Wait(usize),
    Acquire(usize),
    ResetFence(usize),
    BeginCommands(usize),
    Submit(usize),
    Present(usize, u32),
}

/// Simulated backend: a submitted slot stays busy until it is waited on
struct MockBackend {
    calls: Vec<Call>,
    gpu_busy: [bool; MAX_FRAMES_IN_FLIGHT],
    fence_signaled: [bool; MAX_FRAMES_IN_FLIGHT],
    pool_reset_while_busy: usize,
    next_image: u32,
    image_count: u32,
    /// Acquire results to return before falling back to Acquired
    scripted_acquires: Vec<AcquireOutcome>,
    present_status: PresentStatus,
    /// Number of upcoming begin_commands / submit calls that fail
    failing_begins: usize,
    failing_submits: usize,
    /// Waits on an unsignaled fence that no pending submission will signal
    waits_that_never_return: usize,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            gpu_busy: [false; MAX_FRAMES_IN_FLIGHT],
            fence_signaled: [true; MAX_FRAMES_IN_FLIGHT],
            pool_reset_while_busy: 0,
            next_image: 0,
            image_count: 3,
            scripted_acquires: Vec::new(),
            present_status: PresentStatus::Optimal,
            failing_begins: 0,
            failing_submits: 0,
            waits_that_never_return: 0,
        }
    }
}

impl FrameBackend for MockBackend {
    type CommandBuffer = u64;

    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        self.calls.push(Call::Wait(slot));
        if !self.fence_signaled[slot] && !self.gpu_busy[slot] {
            self.waits_that_never_return += 1;
        }
        // The GPU catches up while we block
        self.gpu_busy[slot] = false;
        self.fence_signaled[slot] = true;
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        self.calls.push(Call::Acquire(slot));
        if !self.scripted_acquires.is_empty() {
            return Ok(self.scripted_acquires.remove(0));
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(AcquireOutcome::Acquired { image_index, suboptimal: false })
    }

    fn reset_slot_fence(&mut self, slot: usize) -> Result<()> {
        self.calls.push(Call::ResetFence(slot));
        self.fence_signaled[slot] = false;
        Ok(())
    }

    fn begin_commands(&mut self, slot: usize) -> Result<u64> {
        self.calls.push(Call::BeginCommands(slot));
        if self.gpu_busy[slot] {
            self.pool_reset_while_busy += 1;
        }
        if self.failing_begins > 0 {
            self.failing_begins -= 1;
            return Err(Error::BackendError("command pool reset failed".to_string()));
        }
        Ok(slot as u64 + 100)
    }

    fn submit(&mut self, slot: usize, _command_buffer: u64) -> Result<()> {
        self.calls.push(Call::Submit(slot));
        if self.failing_submits > 0 {
            self.failing_submits -= 1;
            return Err(Error::BackendError("queue submit failed".to_string()));
        }
        self.gpu_busy[slot] = true;
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentStatus> {
        self.calls.push(Call::Present(slot, image_index));
        Ok(self.present_status)
    }
}

fn run_frames(scheduler: &mut FrameScheduler, backend: &mut MockBackend, count: usize) {
    for _ in 0..count {
        let frame = scheduler.begin_frame(backend).unwrap().unwrap();
        scheduler.end_frame(backend, frame).unwrap();
    }
}

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn test_fence_wait_precedes_pool_reset_for_every_slot() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();
    let frames = MAX_FRAMES_IN_FLIGHT * 5 + 1;

    run_frames(&mut scheduler, &mut backend, frames);

    assert_eq!(backend.pool_reset_while_busy, 0);

    // Every BeginCommands(slot) has a Wait(slot) after the previous Submit(slot)
    let mut waited_since_submit = [true; MAX_FRAMES_IN_FLIGHT];
    for call in &backend.calls {
        match *call {
            Call::Wait(s) => waited_since_submit[s] = true,
            Call::Submit(s) => waited_since_submit[s] = false,
            Call::BeginCommands(s) => assert!(waited_since_submit[s], "pool reset before wait on slot {}", s),
            _ => {}
        }
    }
}

#[test]
fn test_cycle_call_order() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();

    run_frames(&mut scheduler, &mut backend, 1);

    assert_eq!(
        backend.calls,
        vec![
            Call::Wait(0),
            Call::Acquire(0),
            Call::BeginCommands(0),
            Call::ResetFence(0),
            Call::Submit(0),
            Call::Present(0, 0),
        ]
    );
}

#[test]
fn test_slots_rotate_modulo_frames_in_flight() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();

    run_frames(&mut scheduler, &mut backend, 7);

    let waited: Vec<usize> = backend
        .calls
        .iter()
        .filter_map(|c| if let Call::Wait(s) = c { Some(*s) } else { None })
        .collect();
    assert_eq!(waited, vec![0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(scheduler.frame_counter(), 7);
    assert_eq!(scheduler.current_slot(), 1);
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[test]
fn test_slot_states_through_a_frame() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();

    assert_eq!(scheduler.slot_state(0), FrameSlotState::Idle);

    let frame = scheduler.begin_frame(&mut backend).unwrap().unwrap();
    assert_eq!(frame.slot, 0);
    assert_eq!(frame.command_buffer, 100);
    assert_eq!(scheduler.slot_state(0), FrameSlotState::Recording);

    scheduler.end_frame(&mut backend, frame).unwrap();
    assert_eq!(scheduler.slot_state(0), FrameSlotState::Submitted);
    assert_eq!(scheduler.slot_state(1), FrameSlotState::Idle);

    scheduler.reset_after_idle();
    assert_eq!(scheduler.slot_state(0), FrameSlotState::Idle);
}

#[test]
fn test_begin_twice_is_rejected() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();

    let _frame = scheduler.begin_frame(&mut backend).unwrap().unwrap();
    let second = scheduler.begin_frame(&mut backend);
    assert!(matches!(second, Err(Error::InvalidResource(_))));
}

#[test]
fn test_end_without_begin_is_rejected() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();

    let bogus = ActiveFrame { slot: 0, image_index: 0, command_buffer: 0u64, suboptimal: false };
    assert!(matches!(
        scheduler.end_frame(&mut backend, bogus),
        Err(Error::InvalidResource(_))
    ));
    assert!(backend.calls.is_empty());
}

// ============================================================================
// STALENESS
// ============================================================================

#[test]
fn test_out_of_date_acquire_skips_frame_and_keeps_fence_signaled() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();
    backend.scripted_acquires.push(AcquireOutcome::OutOfDate);

    let skipped = scheduler.begin_frame(&mut backend).unwrap();
    assert!(skipped.is_none());
    assert!(backend.fence_signaled[0]);
    assert_eq!(scheduler.slot_state(0), FrameSlotState::Idle);
    assert_eq!(scheduler.frame_counter(), 0);
    assert!(!backend.calls.contains(&Call::ResetFence(0)));

    // Next attempt reuses the same slot and succeeds
    let frame = scheduler.begin_frame(&mut backend).unwrap().unwrap();
    assert_eq!(frame.slot, 0);
}

#[test]
fn test_suboptimal_acquire_is_reported() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();
    backend
        .scripted_acquires
        .push(AcquireOutcome::Acquired { image_index: 2, suboptimal: true });

    let frame = scheduler.begin_frame(&mut backend).unwrap().unwrap();
    assert!(frame.suboptimal);
    assert_eq!(frame.image_index, 2);
}

#[test]
fn test_stale_present_status_is_returned() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();
    backend.present_status = PresentStatus::OutOfDate;

    let frame = scheduler.begin_frame(&mut backend).unwrap().unwrap();
    let status = scheduler.end_frame(&mut backend, frame).unwrap();
    assert!(status.is_stale());
    assert_eq!(scheduler.frame_counter(), 1);
    assert!(!PresentStatus::Optimal.is_stale());
}

// ============================================================================
// BACKEND FAILURES
// ============================================================================

#[test]
fn test_failed_begin_commands_keeps_fence_signaled() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();
    backend.failing_begins = 1;

    let result = scheduler.begin_frame(&mut backend);
    assert!(matches!(result, Err(Error::BackendError(_))));
    assert_eq!(scheduler.slot_state(0), FrameSlotState::Idle);
    assert!(backend.fence_signaled[0]);
    assert!(!backend.calls.contains(&Call::ResetFence(0)));

    // The retry on the same slot neither deadlocks nor is rejected
    let frame = scheduler.begin_frame(&mut backend).unwrap().unwrap();
    assert_eq!(frame.slot, 0);
    scheduler.end_frame(&mut backend, frame).unwrap();

    run_frames(&mut scheduler, &mut backend, MAX_FRAMES_IN_FLIGHT * 2);
    assert_eq!(backend.waits_that_never_return, 0);
}

#[test]
fn test_failed_submit_closes_the_frame() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();
    backend.failing_submits = 1;

    let frame = scheduler.begin_frame(&mut backend).unwrap().unwrap();
    let result = scheduler.end_frame(&mut backend, frame);
    assert!(matches!(result, Err(Error::BackendError(_))));
    assert_eq!(scheduler.slot_state(0), FrameSlotState::Idle);
    assert_eq!(scheduler.frame_counter(), 0);
    assert!(!backend.fence_signaled[0]);

    // The slot is reused without waiting on the fence nothing will signal
    let calls_before = backend.calls.len();
    let frame = scheduler.begin_frame(&mut backend).unwrap().unwrap();
    assert_eq!(frame.slot, 0);
    assert_eq!(backend.calls[calls_before], Call::Acquire(0));
    scheduler.end_frame(&mut backend, frame).unwrap();
    assert_eq!(scheduler.frame_counter(), 1);

    run_frames(&mut scheduler, &mut backend, MAX_FRAMES_IN_FLIGHT * 2);
    assert_eq!(backend.waits_that_never_return, 0);
    assert_eq!(backend.pool_reset_while_busy, 0);
}

#[test]
fn test_slot_fence_is_waited_again_after_recovered_submit() {
    let mut scheduler = FrameScheduler::new();
    let mut backend = MockBackend::new();
    backend.failing_submits = 1;

    let frame = scheduler.begin_frame(&mut backend).unwrap().unwrap();
    assert!(scheduler.end_frame(&mut backend, frame).is_err());
    run_frames(&mut scheduler, &mut backend, MAX_FRAMES_IN_FLIGHT + 1);

    let waits_on_slot_0 = backend.calls.iter().filter(|c| **c == Call::Wait(0)).count();
    // Initial wait, none after the failure, one when slot 0 comes around again
    assert_eq!(waits_on_slot_0, 2);
}
