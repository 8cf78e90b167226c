#![no_main]

use existbench_app::{resolve_config, ConfigOverrides};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(file) = toml::from_str::<existbench_types::ConfigFile>(s) {
            // Invalid catalogs and configs must come back as errors.
            let _ = resolve_config(file, &ConfigOverrides::default());
        }
    }
});
