pub mod parser;

use crate::error::{Error, Result};
use core::{fmt, ops::Deref};

/// Width of the mirrored screen in pixels
pub const SCREEN_WIDTH: usize = 128;
/// Height of the mirrored screen in pixels, must be a multiple of 8
pub const SCREEN_HEIGHT: usize = 64;
/// Size of a packed 1 bit per pixel frame
pub const FRAME_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT / 8;
/// Marker written by the device in front of every frame payload
pub const DELIMITER: [u8; 4] = [0xF0, 0xE1, 0xD2, 0xC3];

/// Frame payload exactly as it was received from the device.
///
/// Pixels are packed in bands of 8 rows: every byte holds a column of 8 pixels, least significant
/// bit on top. Bands follow each other, each one `SCREEN_WIDTH` bytes long.
#[derive(PartialEq, Eq, Clone)]
pub struct RawFrame(Vec<u8>);

impl RawFrame {
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl TryFrom<Vec<u8>> for RawFrame {
    type Error = Error;

    fn try_from(data: Vec<u8>) -> Result<Self> {
        check_len(&data)?;
        Ok(RawFrame(data))
    }
}

impl TryFrom<&[u8]> for RawFrame {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        check_len(data)?;
        Ok(RawFrame(data.to_vec()))
    }
}

impl Deref for RawFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawFrame").field(&self.0.len()).finish()
    }
}

fn check_len(data: &[u8]) -> Result<()> {
    if data.len() != FRAME_SIZE {
        return Err(Error::InvalidFrameLength {
            expected: FRAME_SIZE,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Decoded screen contents, `true` marks a lit pixel
#[derive(PartialEq, Eq, Clone)]
pub struct PixelGrid {
    // Row-major, SCREEN_WIDTH * SCREEN_HEIGHT entries
    pixels: Vec<bool>,
}

impl PixelGrid {
    pub fn width(&self) -> usize {
        SCREEN_WIDTH
    }

    pub fn height(&self) -> usize {
        SCREEN_HEIGHT
    }

    /// Returns state of a pixel, coordinates outside of the screen are never lit
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            return false;
        }
        self.pixels[y * SCREEN_WIDTH + x]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.pixels.chunks(SCREEN_WIDTH)
    }

    /// Amount of lit pixels
    pub fn count_set(&self) -> usize {
        self.pixels.iter().filter(|p| **p).count()
    }
}

impl fmt::Debug for PixelGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelGrid")
            .field("width", &SCREEN_WIDTH)
            .field("height", &SCREEN_HEIGHT)
            .field("set", &self.count_set())
            .finish()
    }
}

/// Unpacks a frame into a pixel grid.
///
/// Device uses inverted polarity, so a pixel is lit when its bit is cleared.
pub fn decode(data: &[u8]) -> Result<PixelGrid> {
    check_len(data)?;
    let mut pixels = Vec::with_capacity(SCREEN_WIDTH * SCREEN_HEIGHT);
    for y in 0..SCREEN_HEIGHT {
        let band = &data[(y / 8) * SCREEN_WIDTH..][..SCREEN_WIDTH];
        let mask = 1u8 << (y % 8);
        pixels.extend(band.iter().map(|b| b & mask == 0));
    }
    Ok(PixelGrid { pixels })
}
