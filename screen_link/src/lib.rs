pub mod command;
pub mod connect;
pub mod error;
pub mod frame;
pub mod link;
pub mod stream;

#[doc(hidden)]
pub mod hex_parser;

#[cfg(test)]
mod tests;

pub use connect::{connect, CancellationToken, PortOpener, RetryPolicy, SerialOpener};
pub use frame::{decode, PixelGrid, RawFrame, DELIMITER, FRAME_SIZE, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use link::ScreenLink;
pub use stream::{LinkState, StreamHandle, Streamer};
