#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use xml_guardian::{EventStream, ParserOptions};

fuzz_target!(|data: &[u8]| {
    // The parser must never panic; fatal errors are expected on garbage.
    let stream = EventStream::from_reader(Cursor::new(data.to_vec()), ParserOptions::default());
    for event in stream.take(10_000) {
        if event.is_err() {
            break;
        }
    }
});
