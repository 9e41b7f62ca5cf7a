mod cli;
mod stats;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use clap::Parser;
use core_affinity::CoreId;
use m2sdr::{
    Cs16, Device, Direction, Kwargs, M2sdrError, RingGeometry, SimEngine, StreamError,
    StreamFlags, StreamHandle,
};

use crate::{
    cli::Cli,
    stats::{Counters, Reporter},
};

const TIMEOUT: Duration = Duration::from_millis(100);
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Index encoded in a ramp sample by [`Cs16::ramp`], low 32 bits.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
#[inline]
fn ramp_index(channel: usize, sample: Cs16) -> u64 {
    let hi = u64::from(sample.q as u16 ^ channel as u16);
    (hi << 16) | u64::from(sample.i as u16)
}

fn tx_thread(
    device: &Device,
    channels: usize,
    chunk: usize,
    counters: &Counters,
    run: &AtomicBool,
) {
    let mut buffs = vec![vec![Cs16::default(); chunk]; channels];
    let mut index = 0;

    while run.load(Ordering::SeqCst) {
        for (channel, buf) in buffs.iter_mut().enumerate() {
            for (k, s) in buf.iter_mut().enumerate() {
                *s = Cs16::ramp(channel, index + k as u64);
            }
        }

        let mut sent = 0;
        while sent < chunk && run.load(Ordering::SeqCst) {
            let views = buffs.iter().map(|buf| &buf[sent..]).collect::<Vec<_>>();

            match device.write_stream(
                StreamHandle::Tx,
                &views,
                chunk - sent,
                StreamFlags::empty(),
                0,
                TIMEOUT,
            ) {
                Ok(transfer) => sent += transfer.samples,
                Err(StreamError::Timeout) => {}
                Err(_err) => {
                    counters.errors.fetch_add(1, Ordering::Relaxed);

                    #[cfg(feature = "tracing")]
                    tracing::error!("tx: {_err}");
                }
            }
        }

        index += sent as u64;
        counters.tx_samples.fetch_add(sent as u64, Ordering::Relaxed);
    }
}

fn rx_thread(
    device: &Device,
    channels: usize,
    chunk: usize,
    counters: &Counters,
    run: &AtomicBool,
) {
    let mut buffs = vec![vec![Cs16::default(); chunk]; channels];
    let mut expected: Option<u64> = None;

    while run.load(Ordering::SeqCst) {
        let mut views = buffs.iter_mut().map(Vec::as_mut_slice).collect::<Vec<_>>();

        let transfer = match device.read_stream(StreamHandle::Rx, &mut views, chunk, TIMEOUT) {
            Ok(transfer) => transfer,
            Err(StreamError::Timeout) => continue,
            Err(_err) => {
                counters.errors.fetch_add(1, Ordering::Relaxed);

                #[cfg(feature = "tracing")]
                tracing::error!("rx: {_err}");
                continue;
            }
        };

        if transfer.samples == 0 {
            continue;
        }

        // samples were lost; pick the ramp up again where it is now
        if transfer.flags.contains(StreamFlags::OVERFLOW) {
            expected = None;
        }

        let start = expected.unwrap_or_else(|| ramp_index(0, buffs[0][0]));
        let mut mismatches = 0;

        for (channel, buf) in buffs.iter().enumerate() {
            mismatches += buf[..transfer.samples]
                .iter()
                .enumerate()
                .filter(|&(k, &s)| s != Cs16::ramp(channel, start + k as u64))
                .count() as u64;
        }

        expected = Some(start + transfer.samples as u64);
        counters.mismatches.fetch_add(mismatches, Ordering::Relaxed);
        counters
            .rx_samples
            .fetch_add(transfer.samples as u64, Ordering::Relaxed);
    }
}

/// Plays the FPGA: reads the TX slots software has submitted, which the
/// engine loops back into RX.
fn sim_thread(sim: &SimEngine, run: &AtomicBool) {
    let mut read = 0;

    while run.load(Ordering::SeqCst) {
        #[allow(clippy::cast_possible_truncation)]
        let pending = sim.sw_count(Direction::Tx).saturating_sub(read) as usize;

        if pending == 0 {
            thread::sleep(Duration::from_micros(50));
            continue;
        }

        read += sim.consume_tx(pending) as u64;
    }
}

fn open(cli: &Cli) -> Result<(Arc<Device>, Option<Arc<SimEngine>>), M2sdrError> {
    let config = cli.device_config.clone().with_loopback(true);

    if !cli.sim {
        return Ok((Arc::new(m2sdr::open(&config)?), None));
    }

    let geometry = RingGeometry::new(
        cli.sim_depth,
        cli.sim_mtu * Cs16::BYTES * config.planes(),
        config.planes(),
    )?;
    let sim = Arc::new(SimEngine::new(geometry)?);
    let device = m2sdr::open_with(sim.clone(), &config)?;

    Ok((Arc::new(device), Some(sim)))
}

fn start(device: &Device, channels: &[usize]) -> Result<(), M2sdrError> {
    for dir in [Direction::Rx, Direction::Tx] {
        let handle = device.setup_stream(dir, m2sdr::FORMAT_CS16, channels, &Kwargs::new())?;
        device.activate_stream(handle, StreamFlags::empty(), 0, 0)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("{handle}: MTU {}", device.stream_mtu(handle)?);
    }

    Ok(())
}

fn stop(device: &Device) {
    for handle in [StreamHandle::Tx, StreamHandle::Rx] {
        if let Err(err) = device
            .deactivate_stream(handle, StreamFlags::empty(), 0)
            .and_then(|()| device.close_stream(handle))
        {
            eprintln!("error stopping {handle}: {err}");
        }
    }
}

fn main() {
    #[cfg(feature = "tracing")]
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let (device, sim) = match open(&cli) {
        Ok(opened) => opened,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    #[cfg(feature = "tracing")]
    tracing::debug!("Geometry: {:?}", device.geometry());

    let cores = core_affinity::get_core_ids()
        .unwrap_or_default()
        .into_iter()
        .filter(|core_id| core_id.id >= cli.cpu_start && core_id.id <= cli.cpu_end)
        .collect::<Vec<_>>();

    if cores.is_empty() {
        eprintln!("No cores found in range {}-{}", cli.cpu_start, cli.cpu_end);
        return;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("Cores: {:?}", cores);

    let channels = (0..device.num_channels()).collect::<Vec<_>>();
    if let Err(err) = start(&device, &channels) {
        eprintln!("{err}");
        return;
    }

    let run = Arc::new(AtomicBool::new(true));

    let r = run.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("error setting Ctrl-C handler: {err}");
        stop(&device);
        return;
    }

    let counters = Arc::new(Counters::default());
    let mut cores = cores.into_iter().cycle();
    let spawn = |core_id: Option<CoreId>, f: Box<dyn FnOnce() + Send>| {
        thread::spawn(move || {
            if let Some(core_id) = core_id {
                core_affinity::set_for_current(core_id);
            }
            f();
        })
    };

    let mut handles = Vec::new();

    let (d, c, r) = (device.clone(), counters.clone(), run.clone());
    let (n, chunk) = (channels.len(), cli.chunk);
    handles.push(spawn(
        cores.next(),
        Box::new(move || tx_thread(&d, n, chunk, &c, &r)),
    ));

    let (d, c, r) = (device.clone(), counters.clone(), run.clone());
    handles.push(spawn(
        cores.next(),
        Box::new(move || rx_thread(&d, n, chunk, &c, &r)),
    ));

    if let Some(sim) = sim {
        let r = run.clone();
        handles.push(spawn(None, Box::new(move || sim_thread(&sim, &r))));
    }

    let mut reporter = Reporter::new(device.clone(), counters);
    while run.load(Ordering::SeqCst) {
        thread::sleep(REPORT_INTERVAL);
        reporter.report();
    }

    for handle in handles {
        if let Some(err) = handle.join().err() {
            eprintln!("error in thread: {err:?}");
        }
    }

    stop(&device);
}
