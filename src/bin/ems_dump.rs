//! Offline telegram dump: feed a raw bus capture on stdin, get the framed
//! telegrams and the decoded readings on stdout.
//!
//!     ems_dump < capture.bin

use std::error::Error;
use std::io::{self, Read};

use ems_proto::{Decoder, FrameDecoder, Readings};

fn dump_main_loop() -> Result<(), Box<dyn Error>> {
    let mut framer = FrameDecoder::new();
    let mut decoder = Decoder::new();
    let mut readings = Readings::default();
    let mut telegrams = 0u32;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut buf = [0u8; 512];
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for &byte in &buf[..n] {
            if let Some(telegram) = framer.push_byte(byte) {
                telegrams += 1;
                if telegram.is_mac() {
                    println!("{}", telegram);
                } else if decoder.decode(&telegram, &mut readings) {
                    println!("{}", telegram);
                } else {
                    println!("{}  (undecoded)", telegram);
                }
            }
        }
    }

    println!();
    println!("{} telegrams", telegrams);
    println!("{:#?}", readings);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    dump_main_loop()
}
