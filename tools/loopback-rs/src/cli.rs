use clap::Parser;
use m2sdr::DeviceConfig;

#[derive(Debug, Parser)]
pub struct Cli {
    #[command(flatten)]
    pub device_config: DeviceConfig,

    #[arg(
        short = 'p',
        long,
        default_value_t = 0,
        help = "Starting CPU core index for stream threads"
    )]
    pub cpu_start: usize,

    #[arg(
        short = 'e',
        long,
        default_value_t = 1,
        help = "Ending CPU core index for stream threads (inclusive)"
    )]
    pub cpu_end: usize,

    #[arg(
        short = 'n',
        long,
        default_value_t = 4096,
        help = "Samples per channel per read/write call"
    )]
    pub chunk: usize,

    #[arg(long, default_value_t = false, help = "Run against the simulated engine")]
    pub sim: bool,

    #[arg(long, default_value_t = 64, help = "Ring depth of the simulated engine")]
    pub sim_depth: usize,

    #[arg(long, default_value_t = 1024, help = "Samples per channel per simulated slot")]
    pub sim_mtu: usize,
}
