#![no_main]
use packetnet_core::serialize::load_level;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes to the level decoder.
    // Must not panic -- returning Err is fine.
    let _ = load_level(data);
});
