//! Address map of the ABC: readable ranges, breakpoints, converters and
//! display formats

use std::ops::RangeInclusive;

use super::tables;
use crate::convert::{self, ContextualRule, Converter, UnaryRule};

/// Ranges the ABC answers with some value. The `22x00` and `32x00` blocks
/// repeat once per IZ2 zone.
pub(crate) const VALID_RANGES: &[RangeInclusive<u16>] = &[
    0..=155,
    170..=253,
    260..=260,
    280..=288,
    300..=301,
    320..=326,
    340..=348,
    360..=368,
    400..=419,
    440..=516,
    550..=573,
    600..=749,
    800..=913,
    1090..=1165,
    1200..=1263,
    2000..=2026,
    2100..=2129,
    2800..=2849,
    2900..=2915,
    2950..=2959,
    3000..=3003,
    3020..=3030,
    3040..=3049,
    3060..=3063,
    3100..=3105,
    3108..=3115,
    3118..=3119,
    3200..=3253,
    3300..=3332,
    3400..=3431,
    3500..=3524,
    3600..=3609,
    3618..=3634,
    3700..=3714,
    3800..=3809,
    3818..=3834,
    3900..=3914,
    12000..=12019,
    12098..=12099,
    12100..=12119,
    12200..=12239,
    12300..=12319,
    12400..=12569,
    12600..=12639,
    12700..=12799,
    20000..=20099,
    21100..=21136,
    21200..=21265,
    21400..=21472,
    21500..=21589,
    22100..=22162,
    22200..=22262,
    22300..=22362,
    22400..=22462,
    22500..=22562,
    22600..=22662,
    30000..=30099,
    31000..=31034,
    31100..=31129,
    31200..=31229,
    31300..=31329,
    31400..=31472,
    32100..=32162,
    32200..=32262,
    32300..=32362,
    32400..=32462,
    32500..=32562,
    32600..=32662,
    60050..=60053,
    60100..=60109,
    60200..=60200,
    61000..=61009,
];

/// The ABC refuses reads whose contiguous run crosses these addresses
pub(crate) const BREAKPOINTS: &[u16] = &[12100, 12500];

/// Writable registers without a property encoder
pub(crate) const RAW_WRITABLE: &[u16] = &[112, 340, 341, 342, 346, 347];

const HUNDREDTHS: &[u16] = &[2, 3, 417, 418, 801, 804, 807, 813, 816, 817, 819, 820, 825, 828];

const TENTHS: &[u16] = &[
    401, 419, 745, 746, 901, 1105, 1106, 1107, 1108, 1115, 1116, 1117, 1119, 3322, 3323, 12619,
    12620, 21203, 21204, 21212, 21213, 21221, 21222, 21230, 21231, 21239, 21240, 21248, 21249,
];

const SIGNED_TENTHS: &[u16] = &[
    19, 20, 501, 502, 567, 740, 742, 747, 900, 903, 1109, 1110, 1111, 1112, 1113, 1114, 1124,
    1125, 1134, 1135, 1136, 3325, 3326, 3327, 3330, 3522, 3903, 3905, 3906, 31003, 31007, 31010,
    31013, 31016, 31019, 31022,
];

fn rule(converter: impl Into<Converter>, addresses: &'static [u16]) -> (Converter, &'static [u16]) {
    (converter.into(), addresses)
}

/// Converter assignments, one entry per rule
pub(crate) fn converters() -> Vec<(Converter, &'static [u16])> {
    use ContextualRule::*;
    use UnaryRule::*;

    let lookup = |table, fallback| Lookup { table, fallback };

    vec![
        rule(Hundredths, HUNDREDTHS),
        rule(Composite(convert::dipswitch_settings), &[4, 33]),
        rule(Tenths, TENTHS),
        rule(SignedTenths, SIGNED_TENTHS),
        rule(LastLockout, &[26]),
        rule(Bitmask(tables::SYSTEM_OUTPUTS), &[27, 30]),
        rule(Bitmask(tables::SYSTEM_INPUTS), &[28]),
        rule(Composite(convert::status), &[31]),
        rule(Composite(convert::thermostat_override), &[32]),
        rule(NonZero, &[45, 362, 400]),
        rule(Text(4), &[88]),
        rule(Text(12), &[92]),
        rule(Text(5), &[105]),
        rule(Bitmask(tables::VS_DRIVE_DERATE), &[214, 3223]),
        rule(Bitmask(tables::VS_SAFE_MODE), &[216, 3225]),
        rule(Bitmask(tables::VS_ALARM1), &[217, 3226]),
        rule(Bitmask(tables::VS_ALARM2), &[218, 3227]),
        rule(Bitmask(tables::VS_EEV2), &[280, 3804]),
        rule(Composite(convert::vs_manual_control), &[323]),
        rule(Composite(convert::vs_pump_fault), &[326]),
        rule(Negatable, &[346]),
        rule(lookup(tables::BRINE_TYPE, "Water"), &[402]),
        rule(lookup(tables::FLOW_METER_TYPE, "Other"), &[403]),
        rule(lookup(tables::BLOWER_TYPE, "Other"), &[404]),
        rule(OpenClosed, &[405, 408, 410]),
        rule(lookup(tables::SMARTGRID_ACTION, "unknown"), &[406]),
        rule(lookup(tables::HA_ALARM, "unknown"), &[409, 411]),
        rule(lookup(tables::ENERGY_MONITOR_TYPE, "Other"), &[412]),
        rule(lookup(tables::PUMP_TYPE, "Other"), &[413]),
        rule(lookup(tables::PHASE_TYPE, "Other"), &[416]),
        rule(Composite(convert::iz2_fan_desired), &[565]),
        rule(Text(8), &[710]),
        rule(lookup(tables::COMPONENT_STATUS, "unknown"), &[800, 803, 806, 812, 815, 818, 824, 827]),
        rule(Composite(convert::axb_inputs), &[1103]),
        rule(Bitmask(tables::AXB_OUTPUTS), &[1104]),
        rule(Uint32, &[1146, 1148, 1150, 1152, 1164, 3422, 3424]),
        rule(Int32, &[1154, 1156]),
        rule(Composite(convert::manual_operation), &[3002]),
        rule(Composite(convert::thermostat_configuration2), &[12006]),
        rule(lookup(tables::HEATING_MODE, "unknown"), &[12606, 21202, 21211, 21220, 21229, 21238, 21247]),
        rule(lookup(tables::FAN_MODE, "unknown"), &[12621, 21205, 21214, 21223, 21232, 21241, 21250]),
        rule(Bitmask(tables::HUMIDIFIER_SETTINGS), &[12309, 21114, 31109]),
        rule(Composite(convert::humidistat_targets), &[12310, 21115, 31110]),
        rule(Composite(convert::iz2_demand), &[31005]),
        rule(Composite(convert::zone_configuration1), &[12005, 31008, 31011, 31014, 31017, 31020, 31023]),
        rule(ZoneConfiguration2, &[31009, 31012, 31015, 31018, 31021, 31024]),
        rule(Composite(convert::zone_configuration3), &[31200, 31203, 31206, 31209, 31212, 31215]),
        rule(Text(13), &[31400, 31421, 31434, 31447, 31460]),
        rule(Text(8), &[31413]),
    ]
}

pub(crate) const FORMATS: &[(&str, &[u16])] = &[
    ("%ds", &[1, 6, 9, 15, 84, 85, 110]),
    ("%dV", &[16, 112, 3331, 3424, 3523]),
    (
        "%0.1f°F",
        &[
            19, 20, 401, 501, 502, 567, 740, 742, 745, 746, 747, 900, 903, 1109, 1110, 1111, 1112,
            1113, 1114, 1124, 1125, 1134, 1135, 1136, 3325, 3326, 3327, 3330, 3522, 3903, 3905,
            3906, 12619, 12620, 21203, 21204, 21212, 21213, 21221, 21222, 21230, 21231, 21239,
            21240, 21248, 21249, 31003, 31007, 31010, 31013, 31016, 31019, 31022,
        ],
    ),
    ("E%d", &[25, 26]),
    (
        "%d%%",
        &[282, 321, 322, 325, 346, 565, 741, 908, 1126, 3332, 3524, 3808],
    ),
    ("%0.1f psi", &[419, 901, 1115, 1116, 1119, 3322, 3323]),
    ("%0.1fA", &[1105, 1106, 1107, 1108]),
    ("%0.1fgpm", &[1117]),
    ("%dW", &[1146, 1148, 1150, 1152, 1164, 3422]),
    ("%dBtuh", &[1154, 1156]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_each_address_has_one_converter() {
        let mut seen = HashSet::new();
        for (_, addresses) in converters() {
            for addr in addresses {
                assert!(seen.insert(*addr), "duplicate converter for {}", addr);
            }
        }
    }

    #[test]
    fn test_valid_ranges_sorted_and_disjoint() {
        for pair in VALID_RANGES.windows(2) {
            assert!(pair[0].end() < pair[1].start());
        }
    }
}
