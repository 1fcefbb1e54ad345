#![no_main]

use libfuzzer_sys::fuzz_target;
use tickwire::{Frame, StreamBuffer};

fuzz_target!(|data: &[u8]| {
    let mut stream = StreamBuffer::from_slice(data);
    if stream.read::<Frame>().is_err() {
        assert_eq!(stream.tell_read(), 0);
    }
});
