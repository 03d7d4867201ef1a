//! Frame scheduling
//!
//! The application never sleeps or spins on its own. It asks a
//! [`FrameScheduler`] for the next frame and expects the host to call
//! [`Application::tick`](crate::core::Application::tick) with a monotonically
//! increasing timestamp when that frame is due.

/// Token identifying a requested frame, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(u64);

impl FrameRequest {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Host animation-frame primitive.
pub trait FrameScheduler {
    /// Ask the host for one more frame callback.
    fn request_frame(&mut self) -> FrameRequest;

    /// Withdraw a request that has not fired yet.
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// Headless scheduler for tests and batch runs.
///
/// It only records requests; the caller decides when to tick.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    pending: Option<FrameRequest>,
    requested: u64,
    cancelled: u64,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent request that was neither fulfilled nor cancelled.
    #[must_use]
    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    /// Total number of requests made.
    #[must_use]
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Total number of cancellations.
    #[must_use]
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        self.requested += 1;
        let request = FrameRequest(self.next_id);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
        self.cancelled += 1;
    }
}
