mod common;

use std::time::Duration;

use m2sdr::{Cs16, Direction, StreamError, StreamFlags};

use common::{DEPTH, MTU, assert_counters, device, ramp, start};

const WAIT: Duration = Duration::from_millis(50);

#[test]
fn loopback_returns_written_samples_bit_exact() {
    let (sim, device) = device();
    device.set_loopback(true).unwrap();

    let rx = start(&device, Direction::Rx, &[0, 1]);
    let tx = start(&device, Direction::Tx, &[0, 1]);

    let a = ramp(0, 0, 3 * MTU);
    let b: Vec<_> = a.iter().map(|s| Cs16::new(s.q, s.i.wrapping_neg())).collect();

    // odd chunks so slots fill across calls
    let mut sent = 0;
    while sent < a.len() {
        let n = 100.min(a.len() - sent);
        let transfer = device
            .write_stream(
                tx,
                &[&a[sent..], &b[sent..]],
                n,
                StreamFlags::empty(),
                0,
                WAIT,
            )
            .unwrap();
        sent += transfer.samples;
    }
    assert_counters(&device.stream_info(tx));

    assert_eq!(sim.consume_tx(3), 3);

    let mut x = vec![Cs16::default(); 3 * MTU];
    let mut y = vec![Cs16::default(); 3 * MTU];
    let transfer = device
        .read_stream(rx, &mut [&mut x[..], &mut y[..]], 3 * MTU, WAIT)
        .unwrap();

    assert_eq!(transfer.samples, 3 * MTU);
    assert_eq!(x, a);
    assert_eq!(y, b);
}

#[test]
fn writer_blocks_on_a_full_ring() {
    let (sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);
    let data = ramp(0, 0, MTU);

    for _ in 0..DEPTH {
        device
            .write_stream(tx, &[&data[..]], MTU, StreamFlags::empty(), 0, Duration::ZERO)
            .unwrap();
    }

    let err = device
        .write_stream(tx, &[&data[..]], MTU, StreamFlags::empty(), 0, Duration::ZERO)
        .unwrap_err();
    assert!(matches!(err, StreamError::Timeout));

    sim.consume_tx(1);
    let transfer = device
        .write_stream(tx, &[&data[..]], MTU, StreamFlags::empty(), 0, Duration::ZERO)
        .unwrap();
    assert_eq!(transfer.samples, MTU);
    assert_counters(&device.stream_info(tx));
}

#[test]
fn partial_slot_waits_for_more_samples() {
    let (sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);
    let data = ramp(0, 0, MTU);

    device
        .write_stream(tx, &[&data[..100]], 100, StreamFlags::empty(), 0, WAIT)
        .unwrap();
    assert_eq!(sim.sw_count(Direction::Tx), 0);

    device
        .write_stream(tx, &[&data[100..]], MTU - 100, StreamFlags::empty(), 0, WAIT)
        .unwrap();
    assert_eq!(sim.sw_count(Direction::Tx), 1);
    assert_eq!(sim.tx_samples(0, 0).unwrap(), data);
}

#[test]
fn burst_end_pads_and_reports_its_size() {
    let (sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);
    let data = ramp(0, 0, MTU + 10);

    let transfer = device
        .write_stream(tx, &[&data[..]], MTU + 10, StreamFlags::END_BURST, 0, WAIT)
        .unwrap();
    assert_eq!(transfer.samples, MTU + 10);
    assert!(transfer.flags.contains(StreamFlags::END_BURST));

    let info = device.stream_info(tx);
    assert!(info.burst_end);
    assert_eq!(info.burst_samps, MTU + 10);
    assert_eq!(sim.sw_count(Direction::Tx), 2);

    let tail = sim.tx_samples(1, 0).unwrap();
    assert_eq!(tail[..10], data[MTU..]);
    assert!(tail[10..].iter().all(|s| *s == Cs16::default()));

    assert!(matches!(
        device.read_stream_status(tx, Duration::ZERO),
        Err(StreamError::Timeout)
    ));

    // the reader stops at the end of the burst
    assert_eq!(sim.consume_tx(DEPTH), 2);

    let status = device.read_stream_status(tx, Duration::ZERO).unwrap();
    assert_eq!(status.flags, StreamFlags::END_BURST);
    assert_eq!(status.samples, MTU + 10);

    // the reader idling after a burst is not an underflow
    assert!(device.read_stream_status(tx, Duration::ZERO).is_err());
    assert!(!device.stream_info(tx).underflow);
}

#[test]
fn burst_end_without_samples_closes_the_burst() {
    let (sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);
    let data = ramp(0, 0, MTU);

    let transfer = device
        .write_stream(tx, &[&data[..]], MTU, StreamFlags::empty(), 0, WAIT)
        .unwrap();
    assert!(!transfer.flags.contains(StreamFlags::END_BURST));

    let transfer = device
        .write_stream(tx, &[&data[..0]], 0, StreamFlags::END_BURST, 0, WAIT)
        .unwrap();
    assert_eq!(transfer.samples, 0);
    assert!(transfer.flags.contains(StreamFlags::END_BURST));
    assert_eq!(device.stream_info(tx).burst_samps, MTU);

    assert_eq!(sim.consume_tx(DEPTH), 1);
    assert_eq!(
        device.read_stream_status(tx, Duration::ZERO).unwrap().samples,
        MTU
    );
}

#[test]
fn reader_running_dry_mid_stream_is_an_underflow() {
    let (sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);
    let data = ramp(0, 0, MTU);

    device
        .write_stream(tx, &[&data[..]], MTU, StreamFlags::empty(), 0, WAIT)
        .unwrap();
    sim.consume_tx(3);

    let status = device.read_stream_status(tx, Duration::ZERO).unwrap();
    assert_eq!(status.flags, StreamFlags::UNDERFLOW);

    let info = device.stream_info(tx);
    assert!(info.underflow);
    assert_eq!(info.stats.underflows, 1);
    assert_counters(&info);

    // reported once
    assert!(device.read_stream_status(tx, Duration::ZERO).is_err());
}

#[test]
fn back_to_back_bursts_report_their_own_sizes() {
    let (sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);
    let data = ramp(0, 0, 2 * MTU);

    device
        .write_stream(tx, &[&data[..]], 2 * MTU, StreamFlags::END_BURST, 0, WAIT)
        .unwrap();
    device
        .write_stream(tx, &[&data[..30]], 30, StreamFlags::END_BURST, 0, WAIT)
        .unwrap();
    assert_eq!(device.stream_info(tx).stats.bursts, 2);

    assert_eq!(sim.consume_tx(DEPTH), 3);

    let first = device.read_stream_status(tx, Duration::ZERO).unwrap();
    assert_eq!(first.flags, StreamFlags::END_BURST);
    assert_eq!(first.samples, 2 * MTU);

    let second = device.read_stream_status(tx, Duration::ZERO).unwrap();
    assert_eq!(second.flags, StreamFlags::END_BURST);
    assert_eq!(second.samples, 30);

    assert!(device.read_stream_status(tx, Duration::ZERO).is_err());
    assert!(!device.stream_info(tx).underflow);
}

#[test]
fn burst_submitted_before_the_previous_one_is_sent() {
    let (sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);
    let data = ramp(0, 0, 2 * MTU);

    device
        .write_stream(tx, &[&data[..]], 2 * MTU, StreamFlags::END_BURST, 0, WAIT)
        .unwrap();
    device
        .write_stream(tx, &[&data[..MTU]], MTU, StreamFlags::empty(), 0, WAIT)
        .unwrap();
    assert_eq!(sim.consume_tx(2), 2);

    let status = device.read_stream_status(tx, Duration::ZERO).unwrap();
    assert_eq!(status.flags, StreamFlags::END_BURST);
    assert_eq!(status.samples, 2 * MTU);

    // the second burst is still on its way
    assert_eq!(sim.consume_tx(1), 1);
    assert!(device.read_stream_status(tx, Duration::ZERO).is_err());

    let info = device.stream_info(tx);
    assert!(!info.underflow);
    assert_counters(&info);
}

#[test]
fn reader_running_dry_in_a_later_burst_is_an_underflow() {
    let (sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);
    let data = ramp(0, 0, MTU);

    device
        .write_stream(tx, &[&data[..]], MTU, StreamFlags::END_BURST, 0, WAIT)
        .unwrap();
    device
        .write_stream(tx, &[&data[..]], MTU, StreamFlags::empty(), 0, WAIT)
        .unwrap();
    assert_eq!(sim.consume_tx(3), 3);

    let buf = device.acquire_write_buffer(tx, WAIT).unwrap();
    let flags = device
        .release_write_buffer(tx, buf.handle, MTU, StreamFlags::empty(), 0)
        .unwrap();
    assert_eq!(flags, StreamFlags::UNDERFLOW);

    let info = device.stream_info(tx);
    assert!(info.underflow);
    assert_eq!(info.stats.underflows, 1);
    assert_counters(&info);

    let status = device.read_stream_status(tx, Duration::ZERO).unwrap();
    assert_eq!(status.flags, StreamFlags::END_BURST);
    assert_eq!(status.samples, MTU);
}

#[test]
fn idle_reader_before_first_write_is_not_an_underflow() {
    let (sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);

    sim.consume_tx(2);
    assert!(matches!(
        device.read_stream_status(tx, Duration::ZERO),
        Err(StreamError::Timeout)
    ));
    assert!(!device.stream_info(tx).underflow);
}

#[test]
fn direct_access_submit() {
    let (sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);

    let mut buf = device.acquire_write_buffer(tx, WAIT).unwrap();
    assert_eq!(buf.samples, MTU);
    unsafe { buf.channel_mut(0) }.unwrap()[..4].copy_from_slice(&ramp(0, 0, 4));

    assert!(matches!(
        device.release_write_buffer(tx, buf.handle, 4, StreamFlags::HAS_TIME, 1),
        Err(StreamError::NotSupported(_))
    ));
    assert!(matches!(
        device.release_write_buffer(tx, buf.handle, MTU + 1, StreamFlags::empty(), 0),
        Err(StreamError::SlotOverflow { .. })
    ));

    let flags = device
        .release_write_buffer(tx, buf.handle, 4, StreamFlags::END_BURST, 0)
        .unwrap();
    assert!(flags.contains(StreamFlags::END_BURST));

    let slot = sim.tx_samples(buf.handle, 0).unwrap();
    assert_eq!(slot[..4], ramp(0, 0, 4));
    assert!(slot[4..].iter().all(|s| *s == Cs16::default()));
}

#[test]
fn timed_writes_are_refused() {
    let (_sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);
    let data = ramp(0, 0, 8);

    let err = device
        .write_stream(tx, &[&data[..]], 8, StreamFlags::HAS_TIME, 1_000, WAIT)
        .unwrap_err();
    assert!(matches!(err, StreamError::NotSupported(_)));
    assert_eq!(err.code(), -5);
}

#[test]
fn writes_are_not_timestamped() {
    let (_sim, device) = device();
    let tx = start(&device, Direction::Tx, &[0]);
    let data = ramp(0, 0, MTU + 8);

    let transfer = device
        .write_stream(tx, &[&data[..]], MTU + 8, StreamFlags::END_BURST, 0, WAIT)
        .unwrap();
    assert_eq!(transfer.flags, StreamFlags::END_BURST);
    assert_eq!(transfer.time_ns, 0);
}
