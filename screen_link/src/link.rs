use crate::{
    command::Command,
    connect::CancellationToken,
    error::{Error, Result},
    frame::{
        parser::{align_frame, delimiter_tail_len, frame_payload},
        RawFrame, DELIMITER, FRAME_SIZE,
    },
};
use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};

// Single read from the device, a frame usually arrives in several of these
const READ_CHUNK_SIZE: usize = 256;

/// Open connection to a device streaming its screen
pub struct ScreenLink<IO>
where
    IO: Read + Write,
{
    io: IO,
    // Read buffer
    buf: BytesMut,
    // Keeps track if the start of the buffer is right after a delimiter
    aligned: bool,
    cancel: CancellationToken,
}

impl<IO> ScreenLink<IO>
where
    IO: Read + Write,
{
    pub fn new(io: IO) -> Self {
        ScreenLink {
            io,
            buf: BytesMut::with_capacity(FRAME_SIZE * 2),
            aligned: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Makes blocked reads give up with `Error::Cancelled` once `cancel` is triggered
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn send_package(&mut self, cmd: Command) -> Result<()> {
        self.io
            .write_all(&cmd.encode())
            .and_then(|_| self.io.flush())
            .map_err(Error::LinkClosed)
    }

    fn fill_buffer(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.io.read(&mut chunk) {
                Ok(0) => {
                    return Err(Error::LinkClosed(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "Device stopped sending data",
                    )))
                }
                Ok(read_bytes) => {
                    self.buf.extend_from_slice(&chunk[..read_bytes]);
                    return Ok(());
                }
                // Port timeouts only give a chance to notice cancellation
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue
                }
                Err(e) => return Err(Error::LinkClosed(e)),
            }
        }
    }

    // Drops everything before and including the next delimiter. Without a delimiter in sight
    // only keeps bytes which may be a beginning of one.
    fn align_buffer(&mut self) {
        match align_frame(&self.buf) {
            Ok((tail, _)) => {
                let consumed = self.buf.len() - tail.len();
                log::trace!("Skipped {} bytes before frame", consumed - DELIMITER.len());
                self.buf.advance(consumed);
                self.aligned = true;
            }
            Err(_) => {
                let keep = delimiter_tail_len(&self.buf);
                self.buf.advance(self.buf.len() - keep);
            }
        }
    }

    /// Asks device to start streaming its screen, does not wait for any acknowledgement
    pub fn start_stream(&mut self) -> Result<()> {
        log::debug!("Requesting screen stream");
        self.send_package(Command::ScreenStream)
    }

    /// Blocks until next complete frame arrives.
    ///
    /// Any error leaves the link in an unusable state, partially received frame is lost.
    pub fn read_frame(&mut self) -> Result<RawFrame> {
        loop {
            if !self.aligned {
                self.align_buffer();
            }
            if self.aligned {
                if let Ok((tail, payload)) = frame_payload(&self.buf) {
                    let frame = RawFrame::try_from(payload)?;
                    let consumed = self.buf.len() - tail.len();
                    self.buf.advance(consumed);
                    self.aligned = false;
                    return Ok(frame);
                }
            }
            self.fill_buffer()?;
        }
    }

    /// Amount of received bytes not yet turned into a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> IO {
        self.io
    }
}
