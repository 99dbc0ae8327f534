//! Register names
//!
//! Hidden addresses are documented but carry no value of their own (the tail
//! of a multi-register string, the low word of a 32-bit value, ...).

use std::ops::RangeInclusive;

use super::tables::{self, FAULTS};

pub(crate) const NAMES: &[(u16, &str)] = &[
    (0, "Test Mode Flag"),
    (1, "Random Start Delay"),
    (2, "ABC Program Version"),
    (3, "??? Version?"),
    (4, "DIP Switch Override"),
    (6, "Compressor Anti-Short Cycle Delay"),
    (8, "ABC Program Revision"),
    (9, "Compressor Minimum Run Time"),
    (15, "Blower Off Delay"),
    (16, "Line Voltage"),
    // seconds aux/eheat have been requested
    (17, "Aux/E Heat Staging Delay"),
    (19, "Cooling Liquid Line Temperature (FP1)"),
    (20, "Air Coil Temperature (FP2)"),
    // >= 270 normal
    (21, "Condensate"),
    // high bit set if locked out
    (25, "Last Fault Number"),
    (26, "Last Lockout"),
    (27, "System Outputs (At Last Lockout)"),
    (28, "System Inputs (At Last Lockout)"),
    (30, "System Outputs"),
    (31, "Status"),
    (32, "Thermostat Input Override"),
    (33, "DIP Switch Status"),
    (36, "ABC Board Rev"),
    (45, "Test Mode (write)"),
    // 0x5555 clears
    (47, "Clear Fault History"),
    (50, "ECM Speed Low (== 5)"),
    (51, "ECM Speed Med (== 5)"),
    (52, "ECM Speed High (== 5)"),
    (54, "ECM Speed Actual"),
    (84, "Slow Opening Water Valve Delay"),
    (85, "Test Mode Timer"),
    (88, "ABC Program"),
    (92, "Model Number"),
    (105, "Serial Number"),
    (110, "Reheat Delay"),
    (112, "Line Voltage Setting"),
    (201, "Discharge Pressure"),
    (203, "Suction Pressure"),
    (205, "Discharge Temperature"),
    (207, "Loop Entering Water Temperature"),
    (209, "Compressor Ambient Temperature"),
    (211, "VS Drive Details (General 1)"),
    (212, "VS Drive Details (General 2)"),
    (213, "VS Drive Details (Derate 1)"),
    (214, "VS Drive Details (Derate 2)"),
    (215, "VS Drive Details (Safemode 1)"),
    (216, "VS Drive Details (Safemode 2)"),
    (217, "VS Drive Details (Alarm 1)"),
    (218, "VS Drive Details (Alarm 2)"),
    (280, "EEV2 Ctl"),
    (281, "EEV Superheat"),
    (282, "EEV Open %"),
    (283, "Suction Temperature"),
    (284, "Saturated Suction Temperature"),
    (321, "VS Pump Min"),
    (322, "VS Pump Max"),
    (323, "VS Pump Speed Manual Control"),
    (325, "VS Pump Output"),
    (326, "VS Pump Fault"),
    (340, "Blower Only Speed"),
    (341, "Lo Compressor ECM Speed"),
    (342, "Hi Compressor ECM Speed"),
    (344, "ECM Speed"),
    (346, "Cooling Airflow Adjustment"),
    (347, "Aux Heat ECM Speed"),
    (362, "Active Dehumidify"),
    (400, "DHW Enabled"),
    (401, "DHW Setpoint"),
    (402, "Brine Type"),
    (403, "Flow Meter Type"),
    (404, "Blower Type"),
    (405, "SmartGrid Trigger"),
    (406, "SmartGrid Action"),
    (407, "Off Time Length"),
    (408, "HA Alarm 1 Trigger"),
    (409, "HA Alarm 1 Action"),
    (410, "HA Alarm 2 Trigger"),
    (411, "HA Alarm 2 Action"),
    (412, "Energy Monitor"),
    (413, "Pump Type"),
    (414, "On Peak/SmartGrid"),
    (416, "Energy Phase Type"),
    (417, "Power Adjustment Factor L"),
    (418, "Power Adjustment Factor H"),
    (419, "Loop Pressure Trip"),
    (460, "IZ2 Heartbeat?"),
    (461, "IZ2 Heartbeat?"),
    // 5 online, 1 setup mode
    (462, "IZ2 Status"),
    (483, "Number of IZ2 Zones"),
    (501, "Set Point"),
    (502, "Ambient Temperature"),
    (564, "IZ2 Compressor Speed Desired"),
    (565, "IZ2 Blower % Desired"),
    (567, "Entering Air"),
    (710, "Fault Description"),
    (740, "Entering Air"),
    (741, "Relative Humidity"),
    (742, "Outdoor Temperature"),
    (745, "Heating Set Point"),
    (746, "Cooling Set Point"),
    (747, "Ambient Temperature"),
    (800, "Thermostat Installed"),
    (801, "Thermostat Version"),
    (802, "Thermostat Revision"),
    (803, "??? Installed"),
    (804, "??? Version"),
    (805, "??? Revision"),
    (806, "AXB Installed"),
    (807, "AXB Version"),
    (808, "AXB Revision"),
    (809, "AHB Installed"),
    (810, "AHB Version"),
    (811, "AHB Revision"),
    (812, "IZ2 Installed"),
    (813, "IZ2 Version"),
    (814, "IZ2 Revision"),
    (815, "AOC Installed"),
    (816, "AOC Version"),
    (817, "AOC Revision"),
    (818, "MOC Installed"),
    (819, "MOC Version"),
    (820, "MOC Revision"),
    (824, "EEV2 Installed"),
    (825, "EEV2 Version"),
    (826, "EEV2 Revision"),
    (827, "AWL Installed"),
    (828, "AWL Version"),
    (829, "AWL Revision"),
    (900, "Leaving Air"),
    (901, "Suction Pressure"),
    (903, "SuperHeat Temperature"),
    (908, "EEV Open %"),
    (909, "SubCooling (Cooling)"),
    (1103, "AXB Inputs"),
    (1104, "AXB Outputs"),
    (1105, "Blower Amps"),
    (1106, "Aux Amps"),
    (1107, "Compressor 1 Amps"),
    (1108, "Compressor 2 Amps"),
    (1109, "Heating Liquid Line Temperature"),
    (1110, "Leaving Water"),
    (1111, "Entering Water"),
    (1112, "Leaving Air Temperature"),
    (1113, "Suction Temperature"),
    (1114, "DHW Temperature"),
    (1115, "Discharge Pressure"),
    (1116, "Suction Pressure"),
    (1117, "Waterflow"),
    // only valid below 1000 psi
    (1119, "Loop Pressure"),
    (1124, "Saturated Evaporator Temperature"),
    (1125, "SuperHeat"),
    (1126, "Vaport Injector Open %"),
    (1134, "Saturated Condensor Discharge Temperature"),
    (1135, "SubCooling (Heating)"),
    (1136, "SubCooling (Cooling)"),
    (1146, "Compressor Watts"),
    (1148, "Blower Watts"),
    (1150, "Aux Watts"),
    (1152, "Total Watts"),
    (1154, "Heat of Extraction"),
    (1156, "Heat of Rejection"),
    (1164, "Pump Watts"),
    // thermostat/IZ2 desired speed combined with the manual override
    (3000, "Compressor Speed Desired"),
    (3001, "Compressor Speed Actual"),
    (3002, "Manual Operation"),
    (3027, "Compressor Speed"),
    (3220, "VS Drive Details (General 1)"),
    (3221, "VS Drive Details (General 2)"),
    (3222, "VS Drive Details (Derate 1)"),
    (3223, "VS Drive Details (Derate 2)"),
    (3224, "VS Drive Details (Safemode 1)"),
    (3225, "VS Drive Details (Safemode 2)"),
    (3226, "VS Drive Details (Alarm 1)"),
    (3227, "VS Drive Details (Alarm 2)"),
    (3322, "VS Drive Discharge Pressure"),
    (3323, "VS Drive Suction Pressure"),
    (3325, "VS Drive Discharge Temperature"),
    (3326, "VS Drive Compressor Ambient Temperature"),
    (3327, "VS Drive Temperature"),
    (3330, "VS Drive Entering Water Temperature"),
    (3331, "VS Drive Line Voltage"),
    (3332, "VS Drive Thermo Power"),
    (3422, "VS Drive Compressor Power"),
    (3424, "VS Drive Supply Voltage"),
    (3522, "VS Drive Inverter Temperature"),
    (3523, "VS Drive UDC Voltage"),
    (3524, "VS Drive Fan Speed"),
    (3804, "VS Drive Details (EEV2 Ctl)"),
    (3808, "VS Drive EEV2 % Open"),
    (3903, "VS Drive Suction Temperature"),
    (3904, "VS Drive Leaving Air Temperature?"),
    (3905, "VS Drive Saturated Evaporator Discharge Temperature"),
    (3906, "VS Drive SuperHeat Temperature"),
    (12005, "Fan Configuration"),
    (12006, "Heating Mode"),
    (12309, "De/Humidifier Mode"),
    (12310, "De/Humidifier Setpoints"),
    (12606, "Heating Mode (write)"),
    (12619, "Heating Setpoint (write)"),
    (12620, "Cooling Setpoint (write)"),
    (12621, "Fan Mode (write)"),
    (12622, "Intermittent Fan On Time (write)"),
    (12623, "Intermittent Fan Off Time (write)"),
    (21114, "IZ2 De/Humidifier Mode (write)"),
    (21115, "IZ2 De/Humidifier Setpoints (write)"),
    (31003, "IZ2 Outdoor Temperature"),
    (31005, "IZ2 Demand"),
    (31109, "De/Humidifier Mode"),
    (31110, "Manual De/Humidification Setpoints"),
    (31400, "Dealer Name"),
    (31413, "Dealer Phone"),
    (31421, "Dealer Address 1"),
    (31434, "Dealer Address 2"),
    (31447, "Dealer Email"),
    (31460, "Dealer Website"),
];

pub(crate) const HIDDEN_RANGES: &[RangeInclusive<u16>] = &[
    89..=91,
    93..=104,
    106..=109,
    711..=717,
    31401..=31412,
    31414..=31420,
    31422..=31433,
    31435..=31446,
    31448..=31459,
    31461..=31472,
];

/// Low words of the 32-bit registers
pub(crate) const HIDDEN: &[u16] = &[1147, 1149, 1151, 1153, 1155, 1157, 1165, 3423, 3425];

pub(crate) const FAULT_HISTORY: RangeInclusive<u16> = 601..=699;

/// "E<code>" with the fault description when one is known
pub(crate) fn fault_name(address: u16) -> String {
    let code = address % 100;
    match tables::lookup(FAULTS, code) {
        Some(name) => format!("E{} ({})", code, name),
        None => format!("E{}", code),
    }
}

/// Names of the per-zone IZ2 registers, zones 1 to 6
pub(crate) fn zone_names() -> Vec<(u16, String)> {
    let mut names = Vec::with_capacity(60);
    for zone in 1..=6u16 {
        let base1 = 21202 + (zone - 1) * 9;
        let base2 = 31007 + (zone - 1) * 3;
        let base3 = 31200 + (zone - 1) * 3;
        names.extend([
            (base1, format!("Zone {} Heating Mode (write)", zone)),
            (base1 + 1, format!("Zone {} Heating Setpoint (write)", zone)),
            (base1 + 2, format!("Zone {} Cooling Setpoint (write)", zone)),
            (base1 + 3, format!("Zone {} Fan Mode (write)", zone)),
            (base1 + 4, format!("Zone {} Intermittent Fan On Time (write)", zone)),
            (base1 + 5, format!("Zone {} Intermittent Fan Off Time (write)", zone)),
            (base2, format!("Zone {} Ambient Temperature", zone)),
            (base2 + 1, format!("Zone {} Configuration 1", zone)),
            (base2 + 2, format!("Zone {} Configuration 2", zone)),
            (base3, format!("Zone {} Configuration 3", zone)),
        ]);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_names() {
        assert_eq!(fault_name(602), "E2 (High Pressure)");
        assert_eq!(fault_name(606), "E6");
        assert_eq!(fault_name(699), "E99 (System Reset)");
    }

    #[test]
    fn test_zone_names() {
        let names = zone_names();
        assert_eq!(names.len(), 60);
        assert!(names.contains(&(21211, "Zone 2 Heating Mode (write)".to_string())));
        assert!(names.contains(&(31215, "Zone 6 Configuration 3".to_string())));
    }

    #[test]
    fn test_hidden_ranges_do_not_cover_named_registers() {
        for (addr, _) in NAMES {
            assert!(!HIDDEN_RANGES.iter().any(|r| r.contains(addr)), "{}", addr);
            assert!(!HIDDEN.contains(addr));
        }
    }
}
