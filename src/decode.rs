//! Decoding of known telegram types into [`Readings`].
//!
//! The boiler main controller broadcasts its state in the UBA monitor
//! telegrams; the wall thermostat broadcasts the clock and the heating
//! circuit programme. Each known (sender, destination, type) combination
//! has a decode routine; everything else is logged undecoded so new
//! telegram types show up in the journal.
//!
//! A telegram shorter than a field it would carry leaves that field
//! untouched; all reads are bounds-checked.

use core::fmt;

use log::{debug, error, info};

use crate::devices::{self, DeviceKind};
use crate::parser::{be_i16_at, be_u16_at, be_u24_at};
use crate::telegram::{Telegram, MIN_DATA_LEN};

const UBA_ERROR_MESSAGE: u8 = 0xbf;
const UBA_OUTDOOR_TEMP: u8 = 0xd1;
// Not documented; carries another boiler temperature snapshot.
const UBA_MONITOR_E3: u8 = 0xe3;
const UBA_MONITOR_FAST: u8 = 0xe4;
const UBA_MONITOR_SLOW: u8 = 0xe5;
const UBA_MONITOR_WATER: u8 = 0xe9;
const UBA_OP_TIME: u8 = 0x14;
const RC_TIME: u8 = 0x06;
const HC1_WORKING_MODE: u8 = 0x3d;
const EMS_PLUS: u8 = 0xff;

/// The thermostat clock as broadcast on the bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BusTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// 0 is Monday.
    pub day_of_week: u8,
    pub dst: bool,
}

impl fmt::Display for BusTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}, {:04}-{:02}-{:02}, day {}",
            self.hour, self.minute, self.second, self.year, self.month, self.day,
            self.day_of_week
        )?;
        if self.dst {
            f.write_str(", dst")?;
        }
        Ok(())
    }
}

/// Everything the decoder has learned from the bus so far. Every field is
/// `None` until the telegram carrying it has been seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings {
    /// Flow temperature the boiler currently aims for, in °C.
    pub set_temperature: Option<f32>,
    /// Boiler flow temperature in °C.
    pub boiler_temp: Option<f32>,
    /// Burner output in percent.
    pub power: Option<u8>,
    pub loading_pump: Option<bool>,
    /// Raw UBA status code byte.
    pub uba_code: Option<u8>,
    /// Flame supervision current in µA.
    pub flame_current: Option<f32>,
    /// Exhaust temperature in °C.
    pub exhaust_temp: Option<f32>,
    pub outdoor_temp: Option<f32>,
    pub indoor_temp: Option<f32>,
    /// Burner start counter.
    pub starts: Option<u32>,
    /// Burner operating time in minutes.
    pub op_time: Option<u32>,
    /// Raw status byte of the slow monitor telegram.
    pub status_bits: Option<u8>,
    pub burner: Option<bool>,
    pub blower: Option<bool>,
    pub circ_pump: Option<bool>,
    pub pump: Option<bool>,
    /// Warm water temperature in °C.
    pub water_temp: Option<f32>,
    pub set_water_temp: Option<f32>,
    pub circ_state1: Option<u8>,
    pub circ_state2: Option<u8>,
    /// Product code the boiler reports about itself.
    pub model: Option<u8>,
    pub error1: Option<u8>,
    pub error2: Option<u8>,
    pub error3: Option<u8>,
    pub error_code: Option<u16>,
    pub code1: Option<u8>,
    pub code2: Option<u8>,
    /// The thermostat clock.
    pub time: Option<BusTime>,
    /// Heating circuit 1 night setpoint in °C.
    pub night_temp: Option<f32>,
    /// Heating circuit 1 day setpoint in °C.
    pub day_temp: Option<f32>,
    pub holiday_temp: Option<f32>,
    /// Heating circuit 1 working mode byte.
    pub hc_mode: Option<u8>,
    /// Outdoor temperature below which heating runs, in °C.
    pub summer_threshold: Option<u8>,
}

enum Dst {
    Any,
    Is(u8),
}

enum Kind {
    /// Plain EMS message type byte.
    Ems(u8),
    /// EMS+ type `0xff` with a two-byte subtype at offset zero.
    Plus { group: u8, sub: u8 },
}

type DecodeFn = fn(&mut Decoder, &Telegram, &mut Readings);

struct Entry {
    src: u8,
    dst: Dst,
    kind: Kind,
    decode: DecodeFn,
}

impl Entry {
    fn matches(&self, telegram: &Telegram) -> bool {
        if telegram.source() != self.src {
            return false;
        }
        match self.dst {
            Dst::Any => {}
            Dst::Is(dst) => {
                if telegram.dest_raw() != Some(dst) {
                    return false;
                }
            }
        }
        match self.kind {
            Kind::Ems(msg_type) => telegram.msg_type() == Some(msg_type),
            Kind::Plus { group, sub } => {
                telegram.msg_type() == Some(EMS_PLUS)
                    && telegram.offset() == Some(0x00)
                    && telegram.data_at(4) == Some(group)
                    && telegram.data_at(5) == Some(sub)
            }
        }
    }
}

static DISPATCH: &[Entry] = &[
    Entry {
        src: 0x08,
        dst: Dst::Is(0x00),
        kind: Kind::Ems(UBA_ERROR_MESSAGE),
        decode: Decoder::error_message,
    },
    Entry {
        src: 0x08,
        dst: Dst::Is(0x00),
        kind: Kind::Ems(UBA_OUTDOOR_TEMP),
        decode: Decoder::outdoor_temp,
    },
    Entry {
        src: 0x08,
        dst: Dst::Is(0x00),
        kind: Kind::Ems(UBA_MONITOR_E3),
        decode: Decoder::boiler_snapshot,
    },
    Entry {
        src: 0x08,
        dst: Dst::Is(0x00),
        kind: Kind::Ems(UBA_MONITOR_FAST),
        decode: Decoder::monitor_fast,
    },
    Entry {
        src: 0x08,
        dst: Dst::Is(0x00),
        kind: Kind::Ems(UBA_MONITOR_SLOW),
        decode: Decoder::monitor_slow,
    },
    Entry {
        src: 0x08,
        dst: Dst::Is(0x00),
        kind: Kind::Ems(UBA_MONITOR_WATER),
        decode: Decoder::monitor_water,
    },
    Entry {
        src: 0x08,
        dst: Dst::Is(0x00),
        kind: Kind::Plus { group: 0x07, sub: 0xe4 },
        decode: Decoder::plus_status,
    },
    Entry {
        src: 0x08,
        dst: Dst::Is(0x10),
        kind: Kind::Ems(UBA_OP_TIME),
        decode: Decoder::op_time_reply,
    },
    Entry {
        src: 0x10,
        dst: Dst::Any,
        kind: Kind::Ems(RC_TIME),
        decode: Decoder::time_message,
    },
    Entry {
        src: 0x10,
        dst: Dst::Any,
        kind: Kind::Ems(HC1_WORKING_MODE),
        decode: Decoder::working_mode,
    },
    Entry {
        src: 0x10,
        dst: Dst::Any,
        kind: Kind::Plus { group: 0x01, sub: 0xa5 },
        decode: Decoder::indoor_temp,
    },
];

/// Turns telegrams into [`Readings`] updates. Holds the reference value
/// for the operating time plausibility filter, so one decoder should see
/// the whole telegram stream.
#[derive(Debug, Default)]
pub struct Decoder {
    op_time_ref: Option<u32>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one telegram into `readings`. Returns false if no decode
    /// routine matched.
    pub fn decode(&mut self, telegram: &Telegram, readings: &mut Readings) -> bool {
        if telegram.len() < MIN_DATA_LEN {
            return false;
        }
        for entry in DISPATCH {
            if entry.matches(telegram) {
                (entry.decode)(self, telegram, readings);
                return true;
            }
        }
        error!("undecoded telegram {}", telegram);
        false
    }

    fn error_message(&mut self, t: &Telegram, r: &mut Readings) {
        r.model = t.data_at(5).or(r.model);
        r.error1 = t.data_at(9).or(r.error1);
        r.error2 = t.data_at(10).or(r.error2);
        r.error3 = t.data_at(11).or(r.error3);
        r.error_code = be_u16_at(t.as_bytes(), 12).or(r.error_code);
        let name = r
            .model
            .and_then(|m| devices::lookup(m, DeviceKind::Boiler))
            .map_or("unknown boiler", |d| d.name);
        error!(
            "{} reports error {:02x} {:02x} {:02x}, code {}",
            name,
            r.error1.unwrap_or(0),
            r.error2.unwrap_or(0),
            r.error3.unwrap_or(0),
            r.error_code.unwrap_or(0)
        );
    }

    fn outdoor_temp(&mut self, t: &Telegram, r: &mut Readings) {
        if let Some(raw) = be_i16_at(t.as_bytes(), 4) {
            let temp = f32::from(raw) / 10.0;
            r.outdoor_temp = Some(temp);
            debug!("outdoor temperature {:.1} °C", temp);
        }
    }

    fn boiler_snapshot(&mut self, t: &Telegram, _r: &mut Readings) {
        let temp = be_u16_at(t.as_bytes(), 15).map(|v| f32::from(v) / 10.0);
        if let (Some(temp), Some(power)) = (temp, t.data_at(17)) {
            debug!("boiler {:.1} °C, power {} %", temp, power);
        }
    }

    fn monitor_fast(&mut self, t: &Telegram, r: &mut Readings) {
        let bytes = t.as_bytes();
        match t.offset() {
            Some(0x00) => {
                if let Some(set) = t.data_at(10) {
                    r.set_temperature = Some(f32::from(set));
                }
                if let Some(v) = be_u16_at(bytes, 11) {
                    r.boiler_temp = Some(f32::from(v) / 10.0);
                }
                if let Some(power) = t.data_at(14) {
                    r.power = Some(power);
                }
                if let Some(code) = t.data_at(15) {
                    r.uba_code = Some(code);
                    r.loading_pump = Some(code & 0x04 != 0);
                }
                if let Some(v) = be_u16_at(bytes, 23) {
                    r.flame_current = Some(f32::from(v) / 10.0);
                }
                if let (Some(temp), Some(power)) = (r.boiler_temp, r.power) {
                    debug!("boiler {:.1} °C, power {} %", temp, power);
                }
            }
            Some(0x1b) => {
                if let Some(v) = be_u16_at(bytes, 8) {
                    let exhaust = f32::from(v) / 10.0;
                    // Values of 200 °C and above are sensor glitches.
                    if exhaust < 200.0 {
                        r.exhaust_temp = Some(exhaust);
                    }
                    debug!("exhaust {:.1} °C", exhaust);
                }
                if let Some(v) = be_u16_at(bytes, 4) {
                    debug!("intake {:.1} °C", f32::from(v) / 10.0);
                }
            }
            _ => {}
        }
    }

    fn monitor_slow(&mut self, t: &Telegram, r: &mut Readings) {
        let bytes = t.as_bytes();
        if let Some(starts) = be_u24_at(bytes, 12) {
            if starts != 0 && starts <= 1_000_000 {
                r.starts = Some(starts);
            }
        }
        if let Some(minutes) = be_u24_at(bytes, 15) {
            if op_time_plausible(minutes) {
                r.op_time = Some(self.filter_op_time(minutes));
            }
        }
        if let Some(status) = t.data_at(4) {
            r.status_bits = Some(status);
            r.burner = Some(status & 0x04 != 0);
            r.blower = Some(status & 0x02 != 0);
            r.circ_pump = Some(status & 0x80 != 0);
            r.pump = Some(status & 0x20 != 0);
        }
        if let (Some(starts), Some(minutes)) = (r.starts, r.op_time) {
            debug!(
                "starts {}, operating time {} h {} min, status {:#04x}",
                starts,
                minutes / 60,
                minutes % 60,
                r.status_bits.unwrap_or(0)
            );
        }
    }

    /// The operating time counter sometimes jumps by years within one
    /// telegram and back in the next. Accept a new value only within 100
    /// minutes of the last accepted one; report the last good value
    /// otherwise.
    fn filter_op_time(&mut self, minutes: u32) -> u32 {
        match self.op_time_ref {
            None => {
                self.op_time_ref = Some(minutes);
                minutes
            }
            Some(anchor) => {
                if minutes > anchor + 100 || minutes + 100 < anchor {
                    anchor
                } else {
                    self.op_time_ref = Some(minutes);
                    minutes
                }
            }
        }
    }

    fn monitor_water(&mut self, t: &Telegram, r: &mut Readings) {
        if let Some(set) = t.data_at(4) {
            r.set_water_temp = Some(f32::from(set));
        }
        if let Some(v) = be_u16_at(t.as_bytes(), 5) {
            r.water_temp = Some(f32::from(v) / 10.0);
        }
        if let Some(state) = t.data_at(16) {
            r.circ_state1 = Some(state);
        }
        if let Some(state) = t.data_at(17) {
            r.circ_state2 = Some(state);
            r.circ_pump = Some(state & 0x04 != 0);
        }
        if let (Some(temp), Some(set)) = (r.water_temp, r.set_water_temp) {
            debug!("warm water {:.1} °C, set {:.0} °C", temp, set);
        }
    }

    fn plus_status(&mut self, t: &Telegram, r: &mut Readings) {
        r.code1 = t.data_at(9).or(r.code1);
        r.code2 = t.data_at(10).or(r.code2);
        if let Some(set) = t.data_at(13) {
            if set > 0 {
                r.set_temperature = Some(f32::from(set));
            }
        }
        if let Some(set) = t.data_at(15) {
            if set > 0 {
                r.set_temperature = Some(f32::from(set));
            }
        }
        debug!(
            "status codes {:02x} {:02x}",
            r.code1.unwrap_or(0),
            r.code2.unwrap_or(0)
        );
    }

    fn op_time_reply(&mut self, t: &Telegram, _r: &mut Readings) {
        if let (Some(hi), Some(lo)) = (t.data_at(5), be_u16_at(t.as_bytes(), 6)) {
            let minutes = u32::from(hi & 0x03) << 16 | u32::from(lo);
            info!("operating time reply: {} min", minutes);
        }
    }

    fn time_message(&mut self, t: &Telegram, r: &mut Readings) {
        if let Some(time) = read_time(t) {
            debug!("thermostat clock {}", time);
            r.time = Some(time);
        }
    }

    fn working_mode(&mut self, t: &Telegram, r: &mut Readings) {
        if let Some(v) = t.data_at(5) {
            r.night_temp = Some(f32::from(v) / 2.0);
        }
        if let Some(v) = t.data_at(6) {
            r.day_temp = Some(f32::from(v) / 2.0);
        }
        if let Some(v) = t.data_at(7) {
            r.holiday_temp = Some(f32::from(v) / 2.0);
        }
        r.hc_mode = t.data_at(11).or(r.hc_mode);
        r.summer_threshold = t.data_at(26).or(r.summer_threshold);
        if let (Some(night), Some(day), Some(holiday)) =
            (r.night_temp, r.day_temp, r.holiday_temp)
        {
            info!(
                "heating circuit 1: night {:.1} °C, day {:.1} °C, holiday {:.1} °C, mode {}, summer below {} °C",
                night,
                day,
                holiday,
                r.hc_mode.unwrap_or(0),
                r.summer_threshold.unwrap_or(0)
            );
        }
    }

    fn indoor_temp(&mut self, t: &Telegram, r: &mut Readings) {
        if let Some(raw) = be_i16_at(t.as_bytes(), 6) {
            let temp = f32::from(raw) / 10.0;
            r.indoor_temp = Some(temp);
            debug!("indoor temperature {:.1} °C", temp);
        }
    }
}

fn read_time(t: &Telegram) -> Option<BusTime> {
    Some(BusTime {
        year: 2000 + u16::from(t.data_at(4)?),
        month: t.data_at(5)?,
        hour: t.data_at(6)?,
        day: t.data_at(7)?,
        minute: t.data_at(8)?,
        second: t.data_at(9)?,
        day_of_week: t.data_at(10)?,
        dst: t.data_at(11)? != 0,
    })
}

fn op_time_plausible(minutes: u32) -> bool {
    // 15361 shows up whenever the boiler garbles this field.
    (10..=600_000).contains(&minutes) && minutes != 15_361
}
