#![allow(dead_code)]

use std::sync::Arc;

use m2sdr::{
    Cs16, Device, Direction, Kwargs, RingGeometry, SimEngine, StreamFlags, StreamHandle,
    StreamInfo,
};

pub const DEPTH: usize = 4;
pub const MTU: usize = 256;
pub const PLANES: usize = 2;

pub fn sim() -> Arc<SimEngine> {
    let geometry = RingGeometry::new(DEPTH, MTU * Cs16::BYTES * PLANES, PLANES).unwrap();
    Arc::new(SimEngine::new(geometry).unwrap())
}

pub fn device() -> (Arc<SimEngine>, Device) {
    let sim = sim();
    let device = Device::new(sim.clone());
    (sim, device)
}

/// Opens and starts the stream of `dir` on `channels`.
pub fn start(device: &Device, dir: Direction, channels: &[usize]) -> StreamHandle {
    let handle = device
        .setup_stream(dir, "CS16", channels, &Kwargs::new())
        .unwrap();
    device
        .activate_stream(handle, StreamFlags::empty(), 0, 0)
        .unwrap();
    handle
}

pub fn assert_counters(info: &StreamInfo) {
    assert!(
        info.user_count <= info.sw_count && info.sw_count <= info.hw_count,
        "user {} sw {} hw {}",
        info.user_count,
        info.sw_count,
        info.hw_count
    );
}

pub fn ramp(channel: usize, from: u64, len: usize) -> Vec<Cs16> {
    (from..from + len as u64)
        .map(|index| Cs16::ramp(channel, index))
        .collect()
}
