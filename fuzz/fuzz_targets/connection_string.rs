#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_transport::SessionConfig;

fuzz_target!(|data: &[u8]| {
    // Fuzz connection string parsing
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = SessionConfig::from_connection_string(s) {
            let _ = config.validate();
            let _ = config.effective_credentials();
        }
    }
});
