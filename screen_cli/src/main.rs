mod cli;
mod output;
mod serial;

use clap::Parser;
use crossbeam_channel::{select, Receiver};
use simple_eyre::{eyre::eyre, Result};
use std::{io::Write, process};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use cli::Cli;
use output::Screen;
use screen_link::{LinkState, PixelGrid, Streamer};

/// Exit status used when the serial path was not given
const MISSING_SERIAL_EXIT_CODE: i32 = 255;
const MISSING_SERIAL_MSG: &str = "Path to serial is required";

fn main() -> Result<()> {
    simple_eyre::install()?;
    let cli = Cli::parse();
    env_logger::init();

    if cli.list {
        return print_ports();
    }
    match require_serial(&cli) {
        Ok(serial) => mirror_screen(serial, &cli),
        Err(code) => {
            eprintln!("{}", MISSING_SERIAL_MSG);
            process::exit(code);
        }
    }
}

/// Serial path to mirror, or the exit status to quit with when there is none
fn require_serial(cli: &Cli) -> core::result::Result<&str, i32> {
    cli.serial.as_deref().ok_or(MISSING_SERIAL_EXIT_CODE)
}

fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdout)
}

/// Colors only make it to a terminal, pipes and files get plain text
fn terminal_stdout() -> StandardStream {
    let choice = match is_interactive() {
        true => ColorChoice::Auto,
        false => ColorChoice::Never,
    };
    StandardStream::stdout(choice)
}

fn print_ports() -> Result<()> {
    let ports = serialport::available_ports()?;
    let mut stdout = terminal_stdout();
    let (header, color) = match ports.len() {
        0 => ("No serial ports found, is the device plugged in?", Color::Red),
        n => {
            log::debug!("Found {} serial port(s)", n);
            ("Serial ports:", Color::Green)
        }
    };
    stdout.set_color(ColorSpec::new().set_fg(Some(color)))?;
    writeln!(stdout, "{}", header)?;
    stdout.reset()?;
    for port in &ports {
        writeln!(stdout, "  {}", port.port_name)?;
    }
    Ok(())
}

/// Counts shown frames against the optional `--frames` limit
struct FrameBudget {
    limit: Option<u64>,
    shown: u64,
}

impl FrameBudget {
    fn new(limit: Option<u64>) -> Self {
        FrameBudget { limit, shown: 0 }
    }

    /// Claims a slot for the next frame, `false` once the limit is used up
    fn take(&mut self) -> bool {
        if self.exhausted() {
            return false;
        }
        self.shown += 1;
        true
    }

    fn exhausted(&self) -> bool {
        self.limit.map_or(false, |limit| self.shown >= limit)
    }
}

/// Frame decoded right before the streamer stopped, if the budget still allows one
fn pending_frame(frames: &Receiver<PixelGrid>, budget: &mut FrameBudget) -> Option<PixelGrid> {
    let grid = frames.try_recv().ok()?;
    budget.take().then(|| grid)
}

fn show_frame(screen: &mut Screen, cli: &Cli, grid: &PixelGrid) -> Result<()> {
    screen.draw_frame(grid)?;
    cli.output.write_frame(grid)
}

/// Shows device screen until the stream ends or enough frames were shown
fn mirror_screen(serial: &str, cli: &Cli) -> Result<()> {
    let handle = Streamer::new(cli.serial_conf.opener(), serial).spawn()?;
    let mut screen = Screen::new(terminal_stdout(), is_interactive())?;
    screen.draw_placeholder(LinkState::Connecting)?;

    let mut budget = FrameBudget::new(cli.frames);
    loop {
        let finished = select! {
            recv(handle.states) -> state => match state {
                // Placeholder stays until the first frame arrives
                Ok(LinkState::Streaming) => false,
                Ok(LinkState::Closed) | Err(_) => {
                    if let Some(grid) = pending_frame(&handle.frames, &mut budget) {
                        show_frame(&mut screen, cli, &grid)?;
                    }
                    true
                }
                Ok(state) => {
                    screen.draw_placeholder(state)?;
                    false
                }
            },
            recv(handle.frames) -> grid => match grid {
                Ok(grid) => {
                    if budget.take() {
                        show_frame(&mut screen, cli, &grid)?;
                    }
                    budget.exhausted()
                }
                Err(_) => true,
            },
        };
        if finished {
            break;
        }
    }

    if budget.exhausted() {
        log::debug!("Shown {} frames, stopping", budget.shown);
    }
    handle.stop();
    handle
        .join()
        .map_err(|e| eyre!("Could not stream screen from {}: {}", serial, e))
}
