use std::path::PathBuf;

use clap::Parser;

use crate::control::DEFAULT_SAMPLE_RATE;

use super::DEFAULT_PATH;

#[derive(Debug, Clone, Parser)]
pub struct DeviceConfig {
    #[arg(short = 'd', long, default_value = DEFAULT_PATH, help = "LitePCIe device node")]
    pub(crate) path: PathBuf,

    #[arg(long, default_value_t = 2, help = "Channel planes per DMA slot")]
    pub(crate) planes: usize,

    #[arg(
        short,
        long,
        default_value_t = false,
        help = "Loop TX DMA back into RX DMA inside the FPGA"
    )]
    pub(crate) loopback: bool,

    #[arg(
        short,
        long,
        default_value = "internal",
        value_parser = ["internal", "external"],
        help = "Reference clock source"
    )]
    pub(crate) clock_source: String,

    #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE, help = "Sample rate (in S/s)")]
    pub(crate) sample_rate: f64,
}
