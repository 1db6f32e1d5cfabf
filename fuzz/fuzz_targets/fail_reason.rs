#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_transport::{ErrorKind, FailReason, RawFailure, TransportError, classify};

fuzz_target!(|code: &str| {
    let reason = FailReason::parse(code);

    // Parsing the canonical name yields the same reason.
    assert_eq!(FailReason::parse(reason.as_str()), reason);

    // The free function, the reason and the built error agree.
    let kind = classify(code);
    assert_eq!(reason.kind(), kind);
    let error = TransportError::from_failure(RawFailure::code(code));
    assert_eq!(error.kind(), kind);

    if matches!(reason, FailReason::Other(_)) {
        assert_eq!(kind, ErrorKind::MessageRejected);
        assert!(!kind.faults_connection());
    }
});
