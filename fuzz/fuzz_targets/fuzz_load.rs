#![no_main]

use libfuzzer_sys::fuzz_target;
use secure_session_state::session::{load, SessionContext};

fuzz_target!(|data: &[u8]| {
    // Untrusted blobs must never panic; failures leave no secrets behind
    let mut dest = SessionContext::default();
    if load(&mut dest, data).is_err() {
        assert!(dest.message_keys().is_none());
    }
});
