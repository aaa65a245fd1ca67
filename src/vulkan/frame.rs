//! Frame pacing with a fixed number of frames in flight.
//!
//! [`FramePacer`] owns the CPU-side state machine that sequences one frame:
//! wait for the slot's fence, acquire a swapchain image, record and submit,
//! present, then advance to the next slot. All GPU interaction goes through
//! the [`FrameBackend`] trait so the sequencing rules can be tested without
//! a device.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::error::RendererResult;

use super::context::Context;

pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Per-slot synchronization primitives. The fence starts signaled so the
/// first wait on a fresh slot returns immediately.
pub struct FrameSlot {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,

    context: Arc<Context>,
}

impl FrameSlot {
    pub fn new(context: Arc<Context>) -> RendererResult<Self> {
        let device = &context.device;

        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let image_available = unsafe { device.create_semaphore(&semaphore_info, None) }?;
        let render_finished = unsafe { device.create_semaphore(&semaphore_info, None) }?;
        let in_flight = unsafe { device.create_fence(&fence_info, None) }?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
            context,
        })
    }

    pub fn create_all(context: &Arc<Context>) -> RendererResult<Vec<FrameSlot>> {
        (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSlot::new(context.clone()))
            .collect()
    }
}

impl Drop for FrameSlot {
    fn drop(&mut self) {
        let device = &self.context.device;
        unsafe { device.destroy_semaphore(self.image_available, None) };
        unsafe { device.destroy_semaphore(self.render_finished, None) };
        unsafe { device.destroy_fence(self.in_flight, None) };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented { suboptimal: bool },
    OutOfDate,
}

/// What a single [`FramePacer::tick`] accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The frame was submitted and presented.
    Presented,
    /// The surface was out of date at acquire time. Nothing was submitted;
    /// the surface has been recreated and the next tick retries the same
    /// slot.
    SurfaceLost,
}

/// The operations a frame needs from the renderer, in the order the pacer
/// calls them.
pub trait FrameBackend {
    type Error;

    /// Blocks until the slot's previous submission has finished.
    fn wait_slot_reusable(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Acquires the next swapchain image, signaling the slot's
    /// `image_available` semaphore.
    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome, Self::Error>;

    /// Resets the slot's fence. Only called once an image is known to be
    /// coming, so an aborted frame never leaves the fence unsignaled.
    fn begin_slot(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Records the frame's commands and submits them, signaling the slot's
    /// `render_finished` semaphore and fence.
    fn record_and_submit(&mut self, slot: usize, image_index: u32) -> Result<(), Self::Error>;

    /// Queues the image for presentation, waiting on `render_finished`.
    fn present_image(
        &mut self,
        slot: usize,
        image_index: u32,
    ) -> Result<PresentOutcome, Self::Error>;

    /// Rebuilds the swapchain and everything sized to it.
    fn recreate_surface(&mut self) -> Result<(), Self::Error>;
}

/// Rotates through [`MAX_FRAMES_IN_FLIGHT`] slots and drives one frame per
/// [`tick`](Self::tick).
pub struct FramePacer {
    current_frame: usize,
    resize_requested: bool,
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePacer {
    pub fn new() -> Self {
        Self {
            current_frame: 0,
            resize_requested: false,
        }
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Marks the surface as stale, e.g. after a window resize. The
    /// recreation happens after the next successful present.
    pub fn request_resize(&mut self) {
        self.resize_requested = true;
    }

    /// Runs one frame through the backend.
    ///
    /// An `OutOfDate` result at acquire time aborts the frame before the
    /// fence is reset, recreates the surface and keeps the current slot, so
    /// the retry finds the slot still reusable. Suboptimal surfaces are
    /// still rendered to and recreated afterwards. Any backend error is
    /// fatal and propagates unchanged.
    pub fn tick<B: FrameBackend>(&mut self, backend: &mut B) -> Result<TickOutcome, B::Error> {
        let slot = self.current_frame;

        backend.wait_slot_reusable(slot)?;

        let (image_index, mut needs_recreate) = match backend.acquire_image(slot)? {
            AcquireOutcome::Image { index, suboptimal } => (index, suboptimal),
            AcquireOutcome::OutOfDate => {
                debug!("surface out of date at acquire, recreating");
                backend.recreate_surface()?;
                return Ok(TickOutcome::SurfaceLost);
            }
        };

        backend.begin_slot(slot)?;
        backend.record_and_submit(slot, image_index)?;

        match backend.present_image(slot, image_index)? {
            PresentOutcome::Presented { suboptimal } => needs_recreate |= suboptimal,
            PresentOutcome::OutOfDate => needs_recreate = true,
        }

        if std::mem::take(&mut self.resize_requested) {
            needs_recreate = true;
        }

        if needs_recreate {
            debug!("surface stale after present, recreating");
            backend.recreate_surface()?;
        }

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(TickOutcome::Presented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Begin(usize),
        Submit { slot: usize, image: u32 },
        Present { slot: usize, image: u32 },
        Recreate,
    }

    #[derive(Default)]
    struct MockBackend {
        acquire_script: VecDeque<AcquireOutcome>,
        present_script: VecDeque<PresentOutcome>,
        submit_error: Option<&'static str>,
        calls: Vec<Call>,
    }

    impl MockBackend {
        fn ok_frames(count: usize) -> Self {
            let mut backend = Self::default();
            for i in 0..count {
                backend.acquire_script.push_back(AcquireOutcome::Image {
                    index: i as u32,
                    suboptimal: false,
                });
                backend
                    .present_script
                    .push_back(PresentOutcome::Presented { suboptimal: false });
            }
            backend
        }

        fn recreate_count(&self) -> usize {
            self.calls.iter().filter(|&&c| c == Call::Recreate).count()
        }
    }

    impl FrameBackend for MockBackend {
        type Error = &'static str;

        fn wait_slot_reusable(&mut self, slot: usize) -> Result<(), Self::Error> {
            self.calls.push(Call::Wait(slot));
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome, Self::Error> {
            self.calls.push(Call::Acquire(slot));
            self.acquire_script.pop_front().ok_or("acquire script empty")
        }

        fn begin_slot(&mut self, slot: usize) -> Result<(), Self::Error> {
            self.calls.push(Call::Begin(slot));
            Ok(())
        }

        fn record_and_submit(&mut self, slot: usize, image: u32) -> Result<(), Self::Error> {
            self.calls.push(Call::Submit { slot, image });
            match self.submit_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn present_image(&mut self, slot: usize, image: u32) -> Result<PresentOutcome, Self::Error> {
            self.calls.push(Call::Present { slot, image });
            self.present_script.pop_front().ok_or("present script empty")
        }

        fn recreate_surface(&mut self) -> Result<(), Self::Error> {
            self.calls.push(Call::Recreate);
            Ok(())
        }
    }

    #[test]
    fn slots_rotate_modulo_frames_in_flight() {
        let mut backend = MockBackend::ok_frames(5);
        let mut pacer = FramePacer::new();

        let mut slots = Vec::new();
        for _ in 0..5 {
            slots.push(pacer.current_frame());
            assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::Presented));
        }

        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(backend.recreate_count(), 0);
    }

    #[test]
    fn successful_tick_runs_steps_in_order() {
        let mut backend = MockBackend::ok_frames(1);
        let mut pacer = FramePacer::new();

        assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::Presented));
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Begin(0),
                Call::Submit { slot: 0, image: 0 },
                Call::Present { slot: 0, image: 0 },
            ]
        );
    }

    #[test]
    fn out_of_date_acquire_aborts_without_fence_reset_or_advance() {
        let mut backend = MockBackend::default();
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        let mut pacer = FramePacer::new();

        assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::SurfaceLost));

        // Begin (the fence reset) must not run, so the slot stays reusable.
        assert_eq!(
            backend.calls,
            vec![Call::Wait(0), Call::Acquire(0), Call::Recreate]
        );
        assert_eq!(pacer.current_frame(), 0);

        // The retry reuses the same slot.
        backend.acquire_script.push_back(AcquireOutcome::Image {
            index: 0,
            suboptimal: false,
        });
        backend
            .present_script
            .push_back(PresentOutcome::Presented { suboptimal: false });
        assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::Presented));
        assert_eq!(pacer.current_frame(), 1);
    }

    #[test]
    fn invalidation_on_the_fifth_tick_recreates_once_and_skips_the_draw() {
        let mut backend = MockBackend::ok_frames(4);
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        let mut pacer = FramePacer::new();

        for _ in 0..4 {
            assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::Presented));
        }
        let calls_before = backend.calls.len();

        assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::SurfaceLost));
        assert_eq!(backend.recreate_count(), 1);

        let tick_five = &backend.calls[calls_before..];
        assert!(!tick_five
            .iter()
            .any(|c| matches!(c, Call::Submit { .. } | Call::Present { .. })));
    }

    #[test]
    fn suboptimal_acquire_still_renders_then_recreates() {
        let mut backend = MockBackend::default();
        backend.acquire_script.push_back(AcquireOutcome::Image {
            index: 2,
            suboptimal: true,
        });
        backend
            .present_script
            .push_back(PresentOutcome::Presented { suboptimal: false });
        let mut pacer = FramePacer::new();

        assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::Presented));
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Begin(0),
                Call::Submit { slot: 0, image: 2 },
                Call::Present { slot: 0, image: 2 },
                Call::Recreate,
            ]
        );
        assert_eq!(pacer.current_frame(), 1);
    }

    #[test]
    fn out_of_date_present_recreates_after_the_frame() {
        let mut backend = MockBackend::default();
        backend.acquire_script.push_back(AcquireOutcome::Image {
            index: 0,
            suboptimal: false,
        });
        backend.present_script.push_back(PresentOutcome::OutOfDate);
        let mut pacer = FramePacer::new();

        assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::Presented));
        assert_eq!(backend.recreate_count(), 1);
        assert_eq!(pacer.current_frame(), 1);
    }

    #[test]
    fn resize_request_is_consumed_by_one_recreate() {
        let mut backend = MockBackend::ok_frames(2);
        let mut pacer = FramePacer::new();
        pacer.request_resize();

        assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::Presented));
        assert_eq!(backend.recreate_count(), 1);

        // The flag does not stick around.
        assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::Presented));
        assert_eq!(backend.recreate_count(), 1);
    }

    #[test]
    fn submit_error_is_fatal_and_skips_present() {
        let mut backend = MockBackend::default();
        backend.acquire_script.push_back(AcquireOutcome::Image {
            index: 0,
            suboptimal: false,
        });
        backend.submit_error = Some("device lost");
        let mut pacer = FramePacer::new();

        assert_eq!(pacer.tick(&mut backend), Err("device lost"));
        assert!(!backend
            .calls
            .iter()
            .any(|c| matches!(c, Call::Present { .. })));
    }

    #[test]
    fn mid_frame_out_of_date_does_not_consume_resize_request() {
        let mut backend = MockBackend::default();
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        let mut pacer = FramePacer::new();
        pacer.request_resize();

        assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::SurfaceLost));
        assert_eq!(backend.recreate_count(), 1);

        // The flag is still set, so the next full frame recreates again.
        backend.acquire_script.push_back(AcquireOutcome::Image {
            index: 0,
            suboptimal: false,
        });
        backend
            .present_script
            .push_back(PresentOutcome::Presented { suboptimal: false });
        assert_eq!(pacer.tick(&mut backend), Ok(TickOutcome::Presented));
        assert_eq!(backend.recreate_count(), 2);
    }
}
