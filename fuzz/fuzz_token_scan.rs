//! Fuzz target for the token scanner.
//!
//! Run with: cargo +nightly fuzz run fuzz_token_scan
//!
//! Every reported position must slice the input back to its token, in both
//! matching modes.

#![no_main]

use std::sync::LazyLock;

use libfuzzer_sys::fuzz_target;
use stylescope_config::UserConfig;
use stylescope_core::engine::RuleGenerator;
use stylescope_core::matcher::{Strictness, match_positions};

static GENERATOR: LazyLock<RuleGenerator> =
    LazyLock::new(|| RuleGenerator::new(&UserConfig::fallback()));

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for strictness in [Strictness::Default, Strictness::Strict] {
        for p in match_positions(text, strictness.patterns(), &*GENERATOR, &[]) {
            assert!(p.start < p.end && p.end <= text.len());
            assert_eq!(&text[p.start..p.end], p.token);
        }
    }
});
