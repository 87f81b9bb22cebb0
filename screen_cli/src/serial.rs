use clap::Args;
use screen_link::SerialOpener;
use std::time::Duration;

#[derive(Args)]
pub struct SerialConf {
    /// Baud rate of the serial port, ignored by USB CDC devices
    #[clap(long, value_parser, default_value = "9600")]
    pub baud_rate: u32,

    /// Longest time a single read may block, also bounds how long stopping takes
    #[clap(long, value_parser, default_value = "100")]
    pub read_timeout_ms: u64,
}

impl SerialConf {
    pub fn opener(&self) -> SerialOpener {
        SerialOpener::new(self.baud_rate, Duration::from_millis(self.read_timeout_ms))
    }
}
