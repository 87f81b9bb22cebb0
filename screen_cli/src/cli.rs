use clap::Parser;
use crate::{output::Output, serial::SerialConf};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Name of serial port the device is connected to
    #[clap(value_parser, value_hint = clap::ValueHint::FilePath)]
    pub serial: Option<String>,

    /// Lists connected serial devices
    #[clap(short, long)]
    pub list: bool,

    /// Stop after showing this many frames
    #[clap(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub frames: Option<u64>,

    #[clap(flatten)]
    pub serial_conf: SerialConf,

    #[clap(flatten)]
    pub output: Output,
}
