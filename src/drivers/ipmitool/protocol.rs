//! ipmitool command lines, output parsing and failure classification.

use crate::{
    config::{BOARD_GROUP, CPU_GROUP},
    error::FanControlError,
    sensors::SensorReading,
};

/// Unit column value of temperature rows in `sdr list` CSV output.
pub const TEMPERATURE_UNIT: &str = "degrees C";

/// Fan zones addressed by the OEM set-duty command.
const ZONES: [(&str, u8); 2] = [(CPU_GROUP, 0x00), (BOARD_GROUP, 0x01)];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    McInfo,
    SdrList,
    SetZoneDuty { zone: u8, duty: u8 },
}

impl Command {
    /// ipmitool arguments following the connection options.
    pub fn to_args(&self) -> Vec<String> {
        match *self {
            Command::McInfo => vec!["mc".into(), "info".into()],
            Command::SdrList => ["-c", "sdr", "list", "full"].map(String::from).to_vec(),
            Command::SetZoneDuty { zone, duty } => [0x30, 0x70, 0x66, 0x01, zone, duty]
                .iter()
                .fold(vec!["raw".to_string()], |mut args, byte| {
                    args.push(format!("0x{byte:02x}"));
                    args
                }),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Command::SetZoneDuty { .. })
    }
}

/// Zone byte for a fan group name.
pub fn zone_for_group(group: &str) -> Option<u8> {
    ZONES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(group))
        .map(|(_, zone)| *zone)
}

/// Parses `ipmitool -c sdr list full` output into temperature readings.
///
/// Rows look like `CPU Temp,45,degrees C,ok`. Non-temperature rows and rows
/// without a numeric value (absent sensors report `na`) are skipped.
pub fn parse_sdr_csv(csv: &str) -> Vec<SensorReading> {
    csv.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split(',').collect();
            if cols.len() < 3 || !cols[2].contains(TEMPERATURE_UNIT) {
                return None;
            }
            let value: f64 = cols[1].trim().parse().ok()?;
            value
                .is_finite()
                .then(|| SensorReading::new(cols[0].trim(), value))
        })
        .collect()
}

/// Maps a failed ipmitool invocation onto the error taxonomy.
pub fn classify_failure(command: &Command, stderr: &str) -> FanControlError {
    let detail = stderr.trim().to_string();
    let lower = detail.to_lowercase();

    const AUTH_MARKERS: [&str; 6] = [
        "rakp",
        "password",
        "authentication",
        "unauthorized",
        "invalid user name",
        "insufficient privilege",
    ];

    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        FanControlError::Auth(detail)
    } else if command.is_raw() && (lower.contains("rsp=") || lower.contains("invalid")) {
        FanControlError::RejectedCommand(detail)
    } else {
        FanControlError::Transport(detail)
    }
}
