//! Live bus monitor: attaches to an EMS bus on a serial port, answers
//! polls as client 0x0b and takes commands on stdin.
//!
//!     cargo run --example bus_monitor -- /dev/ttyAMA0

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

use ems_proto::{DecodeService, EmsPort, Engine, Telegram, DEFAULT_CLIENT_ID};

/// [`EmsPort`] over a system serial port.
struct TtyPort {
    tty: Box<dyn SerialPort>,
}

impl EmsPort for TtyPort {
    type Error = serialport::Error;

    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, Self::Error> {
        self.tty.set_timeout(timeout)?;
        let mut buf = [0u8; 1];
        match self.tty.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.tty.write_all(&[byte])?;
        self.tty.flush()?;
        Ok(())
    }

    fn set_break_parity(&mut self, enabled: bool) -> Result<(), Self::Error> {
        let parity = if enabled { Parity::Even } else { Parity::None };
        self.tty.set_parity(parity)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args();
    args.next(); // Skip program name
    let path = args.next().unwrap_or_else(|| "/dev/ttyAMA0".to_string());

    let tty = serialport::new(&path, 9600)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(Duration::from_millis(200))
        .open()
        .with_context(|| format!("failed to open {}", path))?;
    tty.clear(ClearBuffer::All)?;

    let mut engine = Engine::new(TtyPort { tty }, DEFAULT_CLIENT_ID);
    let outbound = engine.outbound();
    let stats = engine.stats();
    let engine_stop = engine.stop_token();

    let mut service = DecodeService::new(engine.inbound());
    let store = service.store();
    let service_stop = service.stop_token();

    let engine_thread = thread::spawn(move || engine.run());
    let service_thread = thread::spawn(move || service.run());

    println!("commands: r = readings, t = statistics, w <hex bytes> = queue telegram, q = quit");
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let mut words = line.split_whitespace();
        match words.next() {
            Some("r") => println!("{:#?}", store.snapshot()),
            Some("t") => println!("{:#?}", stats.snapshot()),
            Some("w") => match parse_telegram(words) {
                Ok(telegram) => {
                    if outbound.try_send(telegram).is_err() {
                        println!("outbound queue full");
                    }
                }
                Err(err) => println!("{:?}", err),
            },
            Some("q") => break,
            Some(cmd) => println!("unknown command {}", cmd),
            None => {}
        }
    }

    engine_stop.stop();
    service_stop.stop();
    let _ = engine_thread.join();
    let _ = service_thread.join();
    Ok(())
}

/// Parse "w 00 90 3d 00 0c 00" style hex bytes into a telegram. The source
/// and checksum bytes are rewritten by the engine before transmission.
fn parse_telegram(words: std::str::SplitWhitespace<'_>) -> Result<Telegram> {
    let mut bytes = Vec::new();
    for word in words {
        bytes.push(u8::from_str_radix(word, 16).context("hex byte expected")?);
    }
    Telegram::from_bytes(&bytes).context("telegram length out of range")
}
