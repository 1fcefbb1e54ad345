#![no_main]

use libfuzzer_sys::fuzz_target;
use tickwire::transport::datagram::Datagram;

fuzz_target!(|data: &[u8]| {
    // Anything that parses must survive its own serialization
    if let Ok(datagram) = Datagram::from_bytes(data) {
        let reparsed = Datagram::from_bytes(&datagram.to_bytes());
        assert_eq!(reparsed.ok(), Some(datagram));
    }
});
