#![no_main]

use cros_vpp::vebox::statistics::FrameStatistics;
use cros_vpp::vebox::HardwareGeneration;
use cros_vpp::Resolution;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let [gen, w0, w1, h0, h1, buffer @ ..] = data else {
        return;
    };

    let generation = match gen % 4 {
        0 => HardwareGeneration::Gen8,
        1 => HardwareGeneration::Gen9,
        2 => HardwareGeneration::Gen11,
        _ => HardwareGeneration::Gen12,
    };
    let resolution = Resolution::from((
        u16::from_le_bytes([*w0, *w1]) as u32 + 1,
        u16::from_le_bytes([*h0, *h1]) as u32 + 1,
    ));
    let layout = generation.caps().statistics;

    if let Ok(stats) = FrameStatistics::read_all(&layout, resolution, buffer) {
        let _ = stats.global_noise_estimate();
    }
});
