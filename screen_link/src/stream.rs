use crate::{
    connect::{connect, CancellationToken, PortOpener, RetryPolicy},
    error::{Error, Result},
    frame::{decode, PixelGrid},
    link::ScreenLink,
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::{
    io::{self, Read, Write},
    panic,
    thread::{self, JoinHandle},
};

/// Connection state as seen by the consumer of frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Streaming,
    /// Streamer stopped, no more frames will arrive
    Closed,
}

/// Single slot handoff where a newer frame replaces the one consumer did not pick up yet
struct FrameSlot {
    tx: Sender<PixelGrid>,
    // Lets producer take back a stale frame. Also keeps channel connected while consumer is away.
    stale: Receiver<PixelGrid>,
}

impl FrameSlot {
    fn new() -> (Self, Receiver<PixelGrid>) {
        let (tx, rx) = bounded(1);
        (
            FrameSlot {
                tx,
                stale: rx.clone(),
            },
            rx,
        )
    }

    fn deliver(&self, mut grid: PixelGrid) {
        loop {
            match self.tx.try_send(grid) {
                Ok(()) => return,
                Err(TrySendError::Full(g)) => {
                    if self.stale.try_recv().is_ok() {
                        log::trace!("Consumer is behind, replacing pending frame");
                    }
                    grid = g;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Keeps a device streaming its screen on a background thread, reconnecting whenever the link
/// drops
pub struct Streamer<O: PortOpener> {
    opener: O,
    path: String,
    policy: RetryPolicy,
}

impl<O> Streamer<O>
where
    O: PortOpener + Send + 'static,
{
    pub fn new(opener: O, path: impl Into<String>) -> Self {
        Streamer {
            opener,
            path: path.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn spawn(self) -> io::Result<StreamHandle> {
        let cancel = CancellationToken::new();
        let (slot, frames) = FrameSlot::new();
        let (state_tx, states) = unbounded();

        let worker = thread::Builder::new().name("screen-link".into()).spawn({
            let cancel = cancel.clone();
            move || {
                let _ = state_tx.send(LinkState::Disconnected);
                let res = match self.run(&cancel, &slot, &state_tx) {
                    Err(Error::Cancelled) => Ok(()),
                    res => res,
                };
                if let Err(e) = &res {
                    log::error!("Streaming stopped: {}", e);
                }
                let _ = state_tx.send(LinkState::Closed);
                res
            }
        })?;

        Ok(StreamHandle {
            frames,
            states,
            cancel,
            worker: Some(worker),
        })
    }

    fn run(
        mut self,
        cancel: &CancellationToken,
        frames: &FrameSlot,
        states: &Sender<LinkState>,
    ) -> Result<()> {
        let report = |state: LinkState| {
            log::debug!("Link to {} is {:?}", self.path, state);
            let _ = states.send(state);
        };
        loop {
            report(LinkState::Connecting);
            let mut link = connect(&mut self.opener, &self.path, &self.policy, cancel)?;
            log::info!("Connected to {}", self.path);

            let err = match link.start_stream() {
                Ok(()) => {
                    report(LinkState::Streaming);
                    stream_frames(&mut link, frames, cancel)
                }
                Err(e) => e,
            };
            match err {
                Error::LinkClosed(e) => {
                    log::warn!("Lost connection to {}: {}", self.path, e);
                    report(LinkState::Disconnected);
                }
                e => return Err(e),
            }
            // Device which accepts connections and drops them right away should not be hammered
            if !cancel.sleep(self.policy.initial_delay) {
                return Err(Error::Cancelled);
            }
        }
    }
}

/// Reads and decodes frames until the link fails, returns the failure
fn stream_frames<IO: Read + Write>(
    link: &mut ScreenLink<IO>,
    frames: &FrameSlot,
    cancel: &CancellationToken,
) -> Error {
    let mut received: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            return Error::Cancelled;
        }
        let raw = match link.read_frame() {
            Ok(raw) => raw,
            Err(e) => return e,
        };
        received += 1;
        publish_frame(&raw, frames, received);
    }
}

/// Decodes a frame and hands it to the consumer. A malformed frame is logged and skipped, the
/// stream goes on. Returns whether a grid was delivered.
fn publish_frame(data: &[u8], frames: &FrameSlot, seq: u64) -> bool {
    match decode(data) {
        Ok(grid) => {
            log::trace!("Frame #{} with {} lit pixels", seq, grid.count_set());
            frames.deliver(grid);
            true
        }
        Err(e) => {
            log::warn!("Skipping frame #{}: {}", seq, e);
            false
        }
    }
}

/// Consumer side of a running streamer. Dropping it asks the streamer to stop.
pub struct StreamHandle {
    /// Latest decoded frame, older frames are replaced if not picked up in time
    pub frames: Receiver<PixelGrid>,
    /// Every connection state transition, in order
    pub states: Receiver<LinkState>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<Result<()>>>,
}

impl StreamHandle {
    /// Asks streamer to stop. Pending read returns after the port's read timeout at the latest.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the streamer to finish, a stop request is not issued
    pub fn join(mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker.join().unwrap_or_else(|e| panic::resume_unwind(e)),
            None => Ok(()),
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
