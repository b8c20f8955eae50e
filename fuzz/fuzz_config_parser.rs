//! Fuzz target for the settings and style configuration parsers.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use stylescope_config::{Settings, UserConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Settings::parse(s);
        if let Ok(config) = UserConfig::parse(s) {
            let _ = config.validate();
        }
    }
});
