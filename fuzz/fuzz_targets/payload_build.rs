#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use relay_dispatch::{EmailMessage, MimePayloadBuilder, PayloadBuilder};

/// Arbitrary message fields for fuzzing.
#[derive(Debug, Arbitrary)]
struct FuzzMessageInput {
    from: String,
    to: Vec<String>,
    bcc: Vec<String>,
    reply_to: Option<String>,
    subject: String,
    headers: Vec<(String, String)>,
    body: String,
    return_path: Option<String>,
}

fuzz_target!(|input: FuzzMessageInput| {
    let mut message = EmailMessage::new(input.from, input.subject, input.body);
    message.to = input.to;
    message.bcc = input.bcc;
    message.reply_to = input.reply_to;
    message.return_path = input.return_path;
    for (name, value) in input.headers {
        message.set_header(name, value);
    }

    if let Ok(payload) = MimePayloadBuilder.build(&message) {
        assert!(!payload.mail_from.trim().is_empty());
        assert!(!payload.recipients.is_empty());

        // Every header line is terminated by CRLF; no bare line feeds.
        let data = String::from_utf8_lossy(&payload.data);
        let header_block = data.split("\r\n\r\n").next().unwrap_or_default();
        assert!(!header_block.replace("\r\n", "").contains(['\r', '\n']));
    }
});
