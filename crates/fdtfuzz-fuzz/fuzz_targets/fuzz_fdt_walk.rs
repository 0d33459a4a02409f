#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Non-zero statuses are reserved; a defect panics and libFuzzer aborts.
    let _ = fdtfuzz_core::fuzz_one_input(data);
});
