use clap::Args;
use screen_link::{LinkState, PixelGrid};
use simple_eyre::Result;
use std::{
    fs::File,
    io::Write,
    path::PathBuf,
};
use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

/// Color of a lit pixel, matches the amber of the real screen
const LIT_COLOR: Color = Color::Rgb(0xFF, 0x8C, 0x29);
const BACKGROUND_COLOR: Color = Color::Rgb(0x11, 0x11, 0x11);

#[derive(Args)]
pub struct Output {
    /// Also save every shown frame into this file as a PBM image
    #[clap(long, value_parser, value_hint = clap::ValueHint::FilePath)]
    pub snapshot: Option<PathBuf>,
}

impl Output {
    pub fn write_frame(&self, grid: &PixelGrid) -> Result<()> {
        if let Some(path) = &self.snapshot {
            log::trace!("Saving frame to {:?}", path);
            let mut out = File::create(path)?;
            out.write_all(frame_to_pbm(grid).as_bytes())?;
        }
        Ok(())
    }
}

/// Plain PBM, lit pixels are stored as ink
fn frame_to_pbm(grid: &PixelGrid) -> String {
    let mut pbm = format!("P1\n{} {}\n", grid.width(), grid.height());
    for row in grid.rows() {
        let line = row
            .iter()
            .map(|lit| if *lit { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join(" ");
        pbm.push_str(&line);
        pbm.push('\n');
    }
    pbm
}

/// Draws two pixel rows per line of text using half block characters
fn frame_to_text(grid: &PixelGrid) -> String {
    let rows: Vec<_> = grid.rows().collect();
    rows.chunks(2)
        .map(|pair| {
            let (top, bottom) = (pair[0], pair.get(1).copied().unwrap_or(&[]));
            top.iter()
                .enumerate()
                .map(|(x, upper)| match (*upper, bottom.get(x).copied().unwrap_or(false)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Screen sized block of text with `label` in the middle
fn placeholder_text(label: &str, width: usize, lines: usize) -> String {
    (0..lines)
        .map(|line| {
            if line == lines / 2 {
                format!("{:^width$}", label, width = width)
            } else {
                " ".repeat(width)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Terminal rendering of the mirrored screen
pub struct Screen {
    stdout: StandardStream,
    // Redraw in place instead of scrolling
    interactive: bool,
}

impl Screen {
    pub fn new(stdout: StandardStream, interactive: bool) -> Result<Self> {
        let mut screen = Screen { stdout, interactive };
        if screen.interactive {
            // Clear terminal once, later frames overwrite each other
            write!(screen.stdout, "\x1b[2J")?;
        }
        Ok(screen)
    }

    fn draw(&mut self, text: &str) -> Result<()> {
        if self.interactive {
            write!(self.stdout, "\x1b[H")?;
        }
        self.stdout.set_color(
            ColorSpec::new()
                .set_fg(Some(LIT_COLOR))
                .set_bg(Some(BACKGROUND_COLOR)),
        )?;
        write!(self.stdout, "{}", text)?;
        self.stdout.reset()?;
        writeln!(self.stdout)?;
        if !self.interactive {
            writeln!(self.stdout)?;
        }
        self.stdout.flush()?;
        Ok(())
    }

    pub fn draw_frame(&mut self, grid: &PixelGrid) -> Result<()> {
        self.draw(&frame_to_text(grid))
    }

    /// Shown instead of a frame while there is no stream
    pub fn draw_placeholder(&mut self, state: LinkState) -> Result<()> {
        let label = match state {
            LinkState::Disconnected | LinkState::Connecting => "Connecting",
            LinkState::Streaming => "Waiting for frame",
            LinkState::Closed => "Disconnected",
        };
        let lines = (screen_link::SCREEN_HEIGHT + 1) / 2;
        self.draw(&placeholder_text(label, screen_link::SCREEN_WIDTH, lines))
    }
}
