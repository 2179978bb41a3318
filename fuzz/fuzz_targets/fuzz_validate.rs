#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use xml_guardian::{
    EventStream, ParserOptions, ReplaySource, StreamingValidator, ValidatorConfig, ValidatorHooks,
};

fuzz_target!(|data: &[u8]| {
    let stream = EventStream::from_reader(Cursor::new(data.to_vec()), ParserOptions::default());
    let collected: Vec<_> = stream.take(10_000).collect();
    let mut source = ReplaySource::new(collected);
    let validator = StreamingValidator::new(ValidatorConfig::default());
    let fragment = validator.validate_source("fuzz.xml", &mut source, ValidatorHooks::none(), None);
    // Findings are data, not panics.
    let _ = fragment.is_valid();
});
