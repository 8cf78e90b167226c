#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(report) = serde_json::from_slice::<existbench_types::BenchReport>(data) {
        let _ = existbench_app::render_markdown(&report);
    }
});
