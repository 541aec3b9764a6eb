//! Known EMS bus devices, keyed by the product code a device reports in
//! its version and error telegrams. Product codes are unique only within
//! a device kind.

/// What role a device plays on the bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    Boiler,
    Controller,
    Thermostat,
    Mixer,
    Solar,
    HeatPump,
    Gateway,
    Switch,
    Connect,
}

/// Capability flags: the low nibble holds a family variant, the high bits
/// mark restrictions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceFlags(u8);

impl DeviceFlags {
    /// The device ignores write commands.
    const NO_WRITE: u8 = 1 << 7;
    /// Older Junkers thermostats use a different set message layout.
    const JUNKERS_OLD: u8 = 1 << 6;

    /// The family variant, see [`variant`].
    pub const fn variant(self) -> u8 {
        self.0 & 0x0f
    }

    pub const fn write_capable(self) -> bool {
        self.0 & Self::NO_WRITE == 0
    }

    pub const fn old_junkers(self) -> bool {
        self.0 & Self::JUNKERS_OLD != 0
    }
}

/// Family variants carried in the low nibble of [`DeviceFlags`].
pub mod variant {
    pub mod boiler {
        pub const EMS: u8 = 1;
        pub const EMS_PLUS: u8 = 2;
        pub const HT3: u8 = 3;
        pub const HEAT_PUMP: u8 = 4;
    }

    pub mod thermostat {
        pub const EASY: u8 = 1;
        pub const RC10: u8 = 2;
        pub const RC20: u8 = 3;
        pub const RC20_N: u8 = 4;
        pub const RC30_N: u8 = 5;
        pub const RC30: u8 = 6;
        pub const RC35: u8 = 7;
        pub const RC300: u8 = 8;
        pub const RC100: u8 = 9;
        pub const JUNKERS: u8 = 10;
        pub const CRF: u8 = 11;
    }

    pub mod solar {
        pub const SM10: u8 = 1;
        pub const SM100: u8 = 2;
        pub const ISM: u8 = 3;
    }

    pub mod mixer {
        pub const MM_PLUS: u8 = 1;
        pub const MM10: u8 = 2;
        pub const IPM: u8 = 3;
    }
}

/// One row of the device table.
#[derive(Debug)]
pub struct DeviceInfo {
    pub product_id: u8,
    pub kind: DeviceKind,
    pub name: &'static str,
    pub flags: DeviceFlags,
}

const fn dev(product_id: u8, kind: DeviceKind, name: &'static str, flags: u8) -> DeviceInfo {
    DeviceInfo {
        product_id,
        kind,
        name,
        flags: DeviceFlags(flags),
    }
}

const NO_WRITE: u8 = DeviceFlags::NO_WRITE;
const JUNKERS_OLD: u8 = DeviceFlags::JUNKERS_OLD;

#[rustfmt::skip]
static DEVICES: &[DeviceInfo] = {
    use self::variant::{boiler, mixer, solar, thermostat};
    use DeviceKind::*;
    &[
        // Boilers, device id 0x08
        dev( 64, Boiler, "BK13/BK15/Smartline/GB1x2", 0),
        dev( 72, Boiler, "GB125/MC10", boiler::EMS),
        dev( 84, Boiler, "Logamax Plus GB022", 0),
        dev( 95, Boiler, "Condens 2500/Logamax/Logomatic/Cerapur Top/Greenstar/Generic HT3", boiler::HT3),
        dev(115, Boiler, "Topline/GB162", 0),
        dev(122, Boiler, "Proline", 0),
        dev(123, Boiler, "GBx72/Trendline/Cerapur/Greenstar Si/27i", 0),
        dev(131, Boiler, "GB212", 0),
        dev(133, Boiler, "Logano GB125/KB195i/Logamatic MC110", 0),
        dev(167, Boiler, "Cerapur Aero", 0),
        dev(170, Boiler, "Logano GB212", 0),
        dev(172, Boiler, "Enviline/Compress 6000AW/Hybrid 7000iAW/SupraEco", boiler::HEAT_PUMP),
        dev(195, Boiler, "Condens 5000i/Greenstar 8000", 0),
        dev(203, Boiler, "Logamax U122/Cerapur", 0),
        dev(206, Boiler, "Ecomline Excellent", 0),
        dev(208, Boiler, "Logamax Plus/GB192/Condens GC9000", 0),
        dev(210, Boiler, "Cascade MC400", 0),
        dev(211, Boiler, "EasyControl Adapter", 0),
        dev(234, Boiler, "Logamax Plus GB122", 0),

        // Controllers, device ids 0x09, 0x10 and 0x50
        dev( 68, Controller, "BC10/RFM20", 0),
        dev( 84, Controller, "GB022", 0),
        dev( 89, Controller, "BC10 GB142", 0),
        dev( 95, Controller, "HT3", 0),
        dev(114, Controller, "BC10", 0),
        dev(125, Controller, "BC25", 0),
        dev(152, Controller, "Controller", 0),
        dev(169, Controller, "BC40", 0),
        dev(190, Controller, "BC10", 0),
        dev(194, Controller, "BC10", 0),
        dev(206, Controller, "Ecomline", 0),
        dev(207, Controller, "Sense II/CS200", 0),
        dev(209, Controller, "ErP", 0),
        dev(218, Controller, "M200/RFM200", 0),
        dev(224, Controller, "9000i", 0),
        dev(230, Controller, "BC Base", 0),
        dev(241, Controller, "Condens 5000i", 0),

        // Thermostats without write support, device id 0x18
        dev(202, Thermostat, "Logamatic TC100/Moduline Easy", thermostat::EASY | NO_WRITE),
        dev(203, Thermostat, "EasyControl CT200", thermostat::EASY | NO_WRITE),

        // Buderus/Nefit/Bosch thermostats, device ids 0x10 and 0x17-0x19
        dev( 67, Thermostat, "RC30", thermostat::RC30_N),
        dev( 77, Thermostat, "RC20/Moduline 300", thermostat::RC20),
        dev( 78, Thermostat, "Moduline 400", thermostat::RC30),
        dev( 79, Thermostat, "RC10/Moduline 100", thermostat::RC10),
        dev( 80, Thermostat, "Moduline 200", thermostat::RC10),
        dev( 86, Thermostat, "RC35", thermostat::RC35),
        dev( 90, Thermostat, "RC10/Moduline 100", thermostat::RC20_N),
        dev( 93, Thermostat, "RC20RF", thermostat::RC20),
        dev( 94, Thermostat, "RFM20 Remote", 0),
        dev(157, Thermostat, "RC200/CW100", thermostat::RC100),
        dev(158, Thermostat, "RC300/RC310/Moduline 3000/1010H/CW400/Sense II", thermostat::RC300),
        dev(165, Thermostat, "RC100/Moduline 1000/1010", thermostat::RC100),
        dev(216, Thermostat, "CRF200S", thermostat::CRF | NO_WRITE),

        // Sieger thermostats
        dev( 66, Thermostat, "ES72/RC20", thermostat::RC20_N),
        dev( 76, Thermostat, "ES73", thermostat::RC35),
        dev(113, Thermostat, "ES72/RC20", thermostat::RC20_N),

        // Junkers thermostats
        dev(105, Thermostat, "FW100", thermostat::JUNKERS),
        dev(106, Thermostat, "FW200", thermostat::JUNKERS),
        dev(107, Thermostat, "FR100", thermostat::JUNKERS | JUNKERS_OLD),
        dev(108, Thermostat, "FR110", thermostat::JUNKERS | JUNKERS_OLD),
        dev(111, Thermostat, "FR10", thermostat::JUNKERS),
        dev(147, Thermostat, "FR50", thermostat::JUNKERS | JUNKERS_OLD),
        dev(191, Thermostat, "FR120", thermostat::JUNKERS | JUNKERS_OLD),
        dev(192, Thermostat, "FW120", thermostat::JUNKERS),

        // Solar modules, device ids 0x30 and 0x2a
        dev( 73, Solar, "SM10", solar::SM10),
        dev(101, Solar, "ISM1", solar::ISM),
        dev(162, Solar, "SM50", solar::SM100),
        dev(163, Solar, "SM100/MS100", solar::SM100),
        dev(164, Solar, "SM200/MS200", solar::SM100),

        // Mixer modules, device ids 0x20-0x29
        dev( 69, Mixer, "MM10", mixer::MM10),
        dev(102, Mixer, "IPM", mixer::IPM),
        dev(159, Mixer, "MM50", mixer::MM_PLUS),
        dev(160, Mixer, "MM100", mixer::MM_PLUS),
        dev(161, Mixer, "MM200", mixer::MM_PLUS),

        // Heat pumps, device id 0x38
        dev(200, HeatPump, "HP Module", 0),
        dev(252, HeatPump, "HP Module", 0),

        // Connect devices, device id 0x02
        dev(171, Connect, "OpenTherm Converter", 0),
        dev(205, Connect, "Moduline Easy Connect", 0),
        dev(206, Connect, "Easy Connect", 0),

        // Switches, device id 0x11
        dev( 71, Switch, "WM10", 0),

        // Gateways, device id 0x48
        dev(189, Gateway, "KM200/MB LAN 2", 0),
    ]
};

/// Look up a device by product code and kind.
pub fn lookup(product_id: u8, kind: DeviceKind) -> Option<&'static DeviceInfo> {
    DEVICES
        .iter()
        .find(|d| d.product_id == product_id && d.kind == kind)
}
