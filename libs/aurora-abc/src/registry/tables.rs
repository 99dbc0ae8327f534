//! Enumerations and bit assignments used by the ABC registers
//!
//! Bit tables are listed in ascending bit order; bitmask decoding relies on it.

pub type Table = &'static [(u16, &'static str)];

pub fn lookup(table: Table, value: u16) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == value).map(|(_, name)| *name)
}

/// Reverse lookup, used by encoders
pub fn code_for(table: Table, name: &str) -> Option<u16> {
    table.iter().find(|(_, n)| *n == name).map(|(k, _)| *k)
}

pub const FAULTS: Table = &[
    // ABC/AXB basic faults
    (1, "Input Error"),
    (2, "High Pressure"),
    (3, "Low Pressure"),
    (4, "Freeze Detect FP2"),
    (5, "Freeze Detect FP1"),
    (7, "Condensate Overflow"),
    (8, "Over/Under Voltage"),
    (9, "AirF/RPM"),
    (10, "Compressor Monitor"),
    (11, "FP1/2 Sensor Error"),
    (12, "RefPerfrm Error"),
    // Miscellaneous
    (13, "Non-Critical AXB Sensor Error"),
    (14, "Critical AXB Sensor Error"),
    (15, "Hot Water Limit"),
    (16, "VS Pump Error"),
    (17, "Communicating Thermostat Error"),
    (18, "Non-Critical Communications Error"),
    (19, "Critical Communications Error"),
    (21, "Low Loop Pressure"),
    (22, "Communicating ECM Error"),
    (23, "HA Alarm 1"),
    (24, "HA Alarm 2"),
    (25, "AxbEev Error"),
    // VS drive
    (41, "High Drive Temp"),
    (42, "High Discharge Temp"),
    (43, "Low Suction Pressure"),
    (44, "Low Condensing Pressure"),
    (45, "High Condensing Pressure"),
    (46, "Output Power Limit"),
    (47, "EEV ID Comm Error"),
    (48, "EEV OD Comm Error"),
    (49, "Cabinet Temperature Sensor"),
    (51, "Discharge Temp Sensor"),
    (52, "Suction Pressure Sensor"),
    (53, "Condensing Pressure Sensor"),
    (54, "Low Supply Voltage"),
    (55, "Out of Envelope"),
    (56, "Drive Over Current"),
    (57, "Drive Over/Under Voltage"),
    (58, "High Drive Temp"),
    (59, "Internal Drive Error"),
    (61, "Multiple Safe Mode"),
    // EEV2
    (71, "Loss of Charge"),
    (72, "Suction Temperature Sensor"),
    (73, "Leaving Air Temperature Sensor"),
    (74, "Maximum Operating Pressure"),
    (99, "System Reset"),
];

pub const SMARTGRID_ACTION: Table = &[
    (0, "none"),
    (1, "unoccupied_set_points"),
    (2, "load_shed"),
    (3, "capacity_limiting"),
    (4, "off_time"),
];

pub const HA_ALARM: Table = &[
    (0, "none"),
    (1, "general"),
    (2, "security"),
    (3, "sump"),
    (4, "carbon_monoxide"),
    (5, "dirty_filter"),
];

/// Anything else reads as "Water"
pub const BRINE_TYPE: Table = &[(485, "Antifreeze")];

pub const FLOW_METER_TYPE: Table = &[(0, "None"), (1, "3/4\""), (2, "1\"")];

pub const PUMP_TYPE: Table = &[
    (0, "Open Loop"),
    (1, "FC1"),
    (2, "FC2"),
    (3, "VS Pump"),
    (4, "VS Pump + 26-99"),
    (5, "VS Pump + UPS26-99"),
    (6, "FC1_GLNP"),
    (7, "FC2_GLNP"),
];

pub const PHASE_TYPE: Table = &[(0, "Single"), (1, "Three")];

pub const BLOWER_TYPE: Table = &[
    (0, "PSC"),
    (1, "ECM 208/230"),
    (2, "ECM 265/277"),
    (3, "5 Speed ECM 460"),
];

pub const ENERGY_MONITOR_TYPE: Table = &[
    (0, "None"),
    (1, "Compressor Monitor"),
    (2, "Energy Monitor"),
];

pub const ACCESSORY_RELAY_SETTINGS: Table = &[
    (0, "compressor"),
    (1, "slow_opening_water_valve"),
    (2, "humidifier"),
    (3, "blower"),
];

pub const COMPONENT_STATUS: Table = &[
    (1, "active"),
    (2, "added"),
    (3, "removed"),
    (0xffff, "missing"),
];

/// Bits 0x40 and 0x80 toggle during normal operation with unknown meaning
pub const SYSTEM_OUTPUTS: Table = &[
    (0x01, "cc"),
    (0x02, "cc2"),
    (0x04, "rv"),
    (0x08, "blower"),
    (0x10, "eh1"),
    (0x20, "eh2"),
    (0x200, "accessory"),
    (0x400, "lockout"),
    (0x800, "alarm"),
];

pub const SYSTEM_INPUTS: Table = &[
    (0x01, "y1"),
    (0x02, "y2"),
    (0x04, "w"),
    (0x08, "o"),
    (0x10, "g"),
    (0x20, "dh_rh"),
    (0x40, "emergency_shutdown"),
    (0x200, "load_shed"),
];

pub const VS_DRIVE_DERATE: Table = &[
    (0x01, "Drive Over Temp"),
    (0x04, "Low Suction Pressure"),
    (0x10, "Low Discharge Pressure"),
    (0x20, "High Discharge Pressure"),
    (0x40, "Output Power Limit"),
];

pub const VS_SAFE_MODE: Table = &[
    (0x01, "EEV Indoor Failed"),
    (0x02, "EEV Outdoor Failed"),
    (0x04, "Invalid Ambient Temp"),
];

pub const VS_ALARM1: Table = &[(0x8000, "Internal Error")];

pub const VS_ALARM2: Table = &[
    (0x0001, "Multi Safe Modes"),
    (0x0002, "Out of Envelope"),
    (0x0004, "Over Current"),
    (0x0008, "Over Voltage"),
    (0x0010, "Drive Over Temp"),
    (0x0020, "Under Voltage"),
    (0x0040, "High Discharge Temp"),
    (0x0080, "Invalid Discharge Temp"),
    (0x0100, "OEM Communications Timeout"),
    (0x0200, "MOC Safety"),
    (0x0400, "DC Under Voltage"),
    (0x0800, "Invalid Suction Pressure"),
    (0x1000, "Invalid Discharge Pressure"),
    (0x2000, "Low Discharge Pressure"),
];

pub const VS_EEV2: Table = &[
    (0x0010, "Invalid Suction Temperature"),
    (0x0020, "Invalid Leaving Air Temperature"),
    (0x0040, "Invalid Suction Pressure"),
];

pub const AXB_OUTPUTS: Table = &[
    (0x01, "dhw"),
    (0x02, "loop_pump"),
    (0x04, "diverting_valve"),
    (0x08, "dehumidifier_reheat"),
    (0x10, "accessory2"),
];

pub const HEATING_MODE: Table = &[
    (0, "off"),
    (1, "auto"),
    (2, "cool"),
    (3, "heat"),
    (4, "eheat"),
];

pub const FAN_MODE: Table = &[(0, "auto"), (1, "continuous"), (2, "intermittent")];

pub const HUMIDIFIER_SETTINGS: Table = &[
    (0x4000, "auto_dehumidification"),
    (0x8000, "auto_humidification"),
];

/// Zone size code to percentage
pub const ZONE_SIZES: &[(u16, i64)] = &[(0, 0), (1, 25), (2, 45), (3, 70)];

pub const CALLS: Table = &[
    (0x0, "standby"),
    (0x1, "unknown1"),
    (0x2, "h1"),
    (0x3, "h2"),
    (0x4, "h3"),
    (0x5, "c1"),
    (0x6, "c2"),
    (0x7, "unknown7"),
];

/// VS pump fault code bands
pub const VS_FAULTS: &[(u16, u16, &str)] = &[
    (71, 77, "Under-Voltage Warning"),
    (78, 82, "RPM Sensor Signal Fault"),
    (83, 87, "Under-Voltage Stop"),
    (88, 92, "Rotor Locked"),
    (93, u16::MAX, "Standby"),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn ascending(table: Table) -> bool {
        table.windows(2).all(|w| w[0].0 < w[1].0)
    }

    #[test]
    fn test_bit_tables_ascending() {
        for table in [
            SYSTEM_OUTPUTS,
            SYSTEM_INPUTS,
            VS_DRIVE_DERATE,
            VS_SAFE_MODE,
            VS_ALARM2,
            VS_EEV2,
            AXB_OUTPUTS,
            HUMIDIFIER_SETTINGS,
        ] {
            assert!(ascending(table));
        }
    }

    #[test]
    fn test_lookup_and_reverse() {
        assert_eq!(lookup(HEATING_MODE, 3), Some("heat"));
        assert_eq!(lookup(HEATING_MODE, 7), None);
        assert_eq!(code_for(FAN_MODE, "intermittent"), Some(2));
        assert_eq!(code_for(FAN_MODE, "sometimes"), None);
    }
}
