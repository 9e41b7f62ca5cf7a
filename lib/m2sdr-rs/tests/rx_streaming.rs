mod common;

use std::{sync::Arc, thread, time::{Duration, Instant}};

use m2sdr::{Cs16, Direction, StreamError, StreamFlags, StreamState};

use common::{DEPTH, MTU, assert_counters, device, ramp, start};

const LONG: Duration = Duration::from_secs(2);

#[test]
fn chunk_size_does_not_change_the_samples() {
    for chunk in [1, 7, 100, MTU, MTU + 3] {
        let (sim, device) = device();
        let rx = start(&device, Direction::Rx, &[0]);
        sim.produce_rx(DEPTH);

        let mut got = Vec::new();
        let mut buf = vec![Cs16::default(); chunk];

        while got.len() < DEPTH * MTU {
            let want = chunk.min(DEPTH * MTU - got.len());
            let transfer = device
                .read_stream(rx, &mut [&mut buf[..want]], want, Duration::ZERO)
                .unwrap();
            assert!(!transfer.flags.contains(StreamFlags::OVERFLOW));
            got.extend_from_slice(&buf[..transfer.samples]);
            assert_counters(&device.stream_info(rx));
        }

        assert_eq!(got, ramp(0, 0, DEPTH * MTU), "chunk {chunk}");
    }
}

#[test]
fn each_channel_gets_its_own_plane() {
    let (sim, device) = device();
    let rx = start(&device, Direction::Rx, &[1, 0]);
    sim.produce_rx(1);

    let mut a = vec![Cs16::default(); MTU];
    let mut b = vec![Cs16::default(); MTU];
    let transfer = device
        .read_stream(rx, &mut [&mut a[..], &mut b[..]], MTU, Duration::ZERO)
        .unwrap();

    assert_eq!(transfer.samples, MTU);
    assert_eq!(a, ramp(1, 0, MTU));
    assert_eq!(b, ramp(0, 0, MTU));
}

#[test]
fn timestamps_follow_the_sample_count() {
    let (sim, device) = device();
    device.set_sample_rate(Direction::Rx, 1e6).unwrap();
    let rx = start(&device, Direction::Rx, &[0]);
    sim.produce_rx(2);

    let mut buf = vec![Cs16::default(); MTU];
    let first = device
        .read_stream(rx, &mut [&mut buf[..100]], 100, Duration::ZERO)
        .unwrap();
    let second = device
        .read_stream(rx, &mut [&mut buf[..]], MTU, Duration::ZERO)
        .unwrap();

    assert!(first.flags.contains(StreamFlags::HAS_TIME));
    assert_eq!(first.time_ns, 0);
    assert_eq!(second.time_ns, 100_000);
}

#[test]
fn zero_timeout_never_blocks() {
    let (_sim, device) = device();
    let rx = start(&device, Direction::Rx, &[0]);
    let mut buf = vec![Cs16::default(); MTU];

    let started = Instant::now();
    let err = device
        .read_stream(rx, &mut [&mut buf[..]], MTU, Duration::ZERO)
        .unwrap_err();

    assert!(matches!(err, StreamError::Timeout));
    assert_eq!(err.code(), -1);
    assert!(started.elapsed() < Duration::from_millis(50));
    assert_eq!(device.stream_info(rx).stats.timeouts, 1);
}

#[test]
fn short_read_when_the_ring_runs_dry() {
    let (sim, device) = device();
    let rx = start(&device, Direction::Rx, &[0]);
    sim.produce_rx(1);

    let mut buf = vec![Cs16::default(); 3 * MTU];
    let transfer = device
        .read_stream(rx, &mut [&mut buf[..]], 3 * MTU, Duration::from_millis(10))
        .unwrap();

    assert_eq!(transfer.samples, MTU);
    assert_counters(&device.stream_info(rx));
}

#[test]
fn overflow_is_reported_only_when_slots_are_lost() {
    let (sim, device) = device();
    let rx = start(&device, Direction::Rx, &[0]);
    let mut buf = vec![Cs16::default(); MTU];

    sim.produce_rx(DEPTH);
    for _ in 0..DEPTH {
        let transfer = device
            .read_stream(rx, &mut [&mut buf[..]], MTU, Duration::ZERO)
            .unwrap();
        assert!(!transfer.flags.contains(StreamFlags::OVERFLOW));
    }
    assert!(!device.stream_info(rx).overflow);

    sim.produce_rx(DEPTH + 2);
    let transfer = device
        .read_stream(rx, &mut [&mut buf[..]], MTU, Duration::ZERO)
        .unwrap();
    assert!(transfer.flags.contains(StreamFlags::OVERFLOW));

    let info = device.stream_info(rx);
    assert!(info.overflow);
    assert_eq!(info.stats.overflows, 1);
    assert_counters(&info);

    // resumed half a ring behind the writer
    let resumed = (2 * DEPTH + 2 - DEPTH / 2) as u64;
    assert_eq!(buf, ramp(0, resumed * MTU as u64, MTU));
}

#[test]
fn reader_blocks_until_the_producer_catches_up() {
    const SLOTS: usize = 10;

    let (sim, device) = device();
    let rx = start(&device, Direction::Rx, &[0]);

    let producer = {
        let sim = Arc::clone(&sim);
        thread::spawn(move || {
            for _ in 0..SLOTS {
                thread::sleep(Duration::from_millis(5));
                sim.produce_rx(1);
            }
        })
    };

    let mut got = vec![Cs16::default(); SLOTS * MTU];
    let mut total = 0;

    while total < got.len() {
        let want = got.len() - total;
        let transfer = device
            .read_stream(rx, &mut [&mut got[total..]], want, LONG)
            .unwrap();
        assert!(!transfer.flags.contains(StreamFlags::OVERFLOW));
        total += transfer.samples;
    }

    producer.join().unwrap();

    assert_eq!(got, ramp(0, 0, SLOTS * MTU));
    assert!(device.stream_info(rx).stats.empty_waits > 0);
}

#[test]
fn io_error_leaves_the_stream_active() {
    let (sim, device) = device();
    let rx = start(&device, Direction::Rx, &[0]);
    sim.produce_rx(1);

    let mut buf = vec![Cs16::default(); MTU];
    sim.fail_next(1);

    let err = device
        .read_stream(rx, &mut [&mut buf[..]], MTU, Duration::ZERO)
        .unwrap_err();
    assert!(matches!(err, StreamError::Io(_)));
    assert_eq!(err.code(), -2);
    assert_eq!(device.stream_info(rx).state, StreamState::Active);

    let transfer = device
        .read_stream(rx, &mut [&mut buf[..]], MTU, Duration::ZERO)
        .unwrap();
    assert_eq!(transfer.samples, MTU);
    assert_eq!(buf, ramp(0, 0, MTU));
}

#[test]
fn configuration_is_not_blocked_by_a_waiting_reader() {
    let (sim, device) = device();
    let device = Arc::new(device);
    let rx = start(&device, Direction::Rx, &[0]);

    let reader = {
        let device = Arc::clone(&device);
        thread::spawn(move || {
            let mut buf = vec![Cs16::default(); MTU];
            device.read_stream(rx, &mut [&mut buf[..]], MTU, LONG)
        })
    };

    thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    device.set_gain(Direction::Rx, 0, 30.).unwrap();
    device.set_frequency(Direction::Rx, 0, 2.4e9).unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(!reader.is_finished());

    sim.produce_rx(1);
    let transfer = reader.join().unwrap().unwrap();
    assert_eq!(transfer.samples, MTU);
    assert_eq!(device.gain(Direction::Rx, 0).unwrap(), 30.);
}

#[test]
fn direct_access_round() {
    let (sim, device) = device();
    let rx = start(&device, Direction::Rx, &[0]);
    assert_eq!(device.num_direct_access_buffers(rx).unwrap(), DEPTH);
    sim.produce_rx(1);

    let buf = device.acquire_read_buffer(rx, Duration::ZERO).unwrap();
    assert_eq!(buf.samples, MTU);
    assert_eq!(
        buf.buffs[0],
        device.direct_access_buffer_addrs(rx, buf.handle).unwrap()[0]
    );
    assert_eq!(unsafe { buf.channel(0) }.unwrap(), ramp(0, 0, MTU).as_slice());

    assert!(matches!(
        device.release_read_buffer(rx, buf.handle + 1),
        Err(StreamError::NotHeld(_))
    ));
    device.release_read_buffer(rx, buf.handle).unwrap();
    assert_eq!(sim.sw_count(Direction::Rx), 1);
}

#[test]
fn fourth_acquire_waits_for_the_producer() {
    let (sim, device) = device();
    let device = Arc::new(device);
    let rx = start(&device, Direction::Rx, &[0]);
    sim.produce_rx(DEPTH - 1);

    for _ in 0..DEPTH - 1 {
        let buf = device.acquire_read_buffer(rx, Duration::ZERO).unwrap();
        device.release_read_buffer(rx, buf.handle).unwrap();
    }

    let started = Instant::now();
    assert!(matches!(
        device.acquire_read_buffer(rx, Duration::from_millis(30)),
        Err(StreamError::Timeout)
    ));
    assert!(started.elapsed() >= Duration::from_millis(20));

    let producer = {
        let sim = Arc::clone(&sim);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sim.produce_rx(1);
        })
    };

    let buf = device.acquire_read_buffer(rx, LONG).unwrap();
    assert_eq!(buf.handle, DEPTH - 1);
    producer.join().unwrap();

    device.release_read_buffer(rx, buf.handle).unwrap();
    assert_counters(&device.stream_info(rx));
}

#[test]
fn counters_stay_ordered_over_mixed_calls() {
    let (sim, device) = device();
    let rx = start(&device, Direction::Rx, &[0]);
    let mut buf = vec![Cs16::default(); 3 * MTU];

    for (produce, read) in [(1, 10), (2, MTU), (0, 5), (DEPTH + 3, 2 * MTU + 1), (1, 3 * MTU), (0, 1)] {
        sim.produce_rx(produce);
        let _ = device.read_stream(rx, &mut [&mut buf[..read]], read, Duration::ZERO);
        assert_counters(&device.stream_info(rx));

        if let Ok(held) = device.acquire_read_buffer(rx, Duration::ZERO) {
            assert_counters(&device.stream_info(rx));
            device.release_read_buffer(rx, held.handle).unwrap();
        }
        assert_counters(&device.stream_info(rx));
    }
}
