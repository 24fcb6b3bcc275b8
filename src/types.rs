use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Columns a telemetry source may provide for a lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LapColumn {
    Driver,
    LapTime,
    Sector1Time,
    Sector2Time,
    Sector3Time,
    Compound,
    Position,
    TyreLife,
    PitOutTime,
    PitInTime,
}

impl LapColumn {
    pub const ALL: [LapColumn; 10] = [
        LapColumn::Driver,
        LapColumn::LapTime,
        LapColumn::Sector1Time,
        LapColumn::Sector2Time,
        LapColumn::Sector3Time,
        LapColumn::Compound,
        LapColumn::Position,
        LapColumn::TyreLife,
        LapColumn::PitOutTime,
        LapColumn::PitInTime,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LapColumn::Driver => "Driver",
            LapColumn::LapTime => "LapTime",
            LapColumn::Sector1Time => "Sector1Time",
            LapColumn::Sector2Time => "Sector2Time",
            LapColumn::Sector3Time => "Sector3Time",
            LapColumn::Compound => "Compound",
            LapColumn::Position => "Position",
            LapColumn::TyreLife => "TyreLife",
            LapColumn::PitOutTime => "PitOutTime",
            LapColumn::PitInTime => "PitInTime",
        }
    }

    pub fn is_duration(self) -> bool {
        matches!(
            self,
            LapColumn::LapTime
                | LapColumn::Sector1Time
                | LapColumn::Sector2Time
                | LapColumn::Sector3Time
                | LapColumn::PitOutTime
                | LapColumn::PitInTime
        )
    }
}

/// One row per (driver, lap) as delivered by the telemetry source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LapRecord {
    pub driver: String,
    pub lap_number: u32,
    pub lap_time: Option<Duration>,
    pub sector1_time: Option<Duration>,
    pub sector2_time: Option<Duration>,
    pub sector3_time: Option<Duration>,
    pub compound: Option<String>, // e.g. "SOFT", "MEDIUM", "HARD", "INTERMEDIATE", "WET"
    pub tyre_life: Option<u32>,   // laps on the current set, this lap included
    pub position: Option<u32>,
    pub pit_out_time: Option<Duration>, // session time when leaving the pits
    pub pit_in_time: Option<Duration>,  // session time when entering the pits
}

impl LapRecord {
    pub fn duration(&self, column: LapColumn) -> Option<Duration> {
        match column {
            LapColumn::LapTime => self.lap_time,
            LapColumn::Sector1Time => self.sector1_time,
            LapColumn::Sector2Time => self.sector2_time,
            LapColumn::Sector3Time => self.sector3_time,
            LapColumn::PitOutTime => self.pit_out_time,
            LapColumn::PitInTime => self.pit_in_time,
            _ => None,
        }
    }
}

/// Lap rows plus the set of columns the source actually provided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LapTable {
    pub columns: BTreeSet<LapColumn>,
    pub rows: Vec<LapRecord>,
}

impl LapTable {
    pub fn new(columns: impl IntoIterator<Item = LapColumn>, rows: Vec<LapRecord>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    pub fn has(&self, column: LapColumn) -> bool {
        self.columns.contains(&column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub year: i32,
    pub event_name: String,
    pub session_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub info: SessionInfo,
    pub laps: LapTable,
}

/// Session type codes accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionType {
    #[default]
    Race,
    Qualifying,
    Sprint,
    SprintQualifying,
    Practice1,
    Practice2,
    Practice3,
}

impl SessionType {
    pub fn code(self) -> &'static str {
        match self {
            SessionType::Race => "R",
            SessionType::Qualifying => "Q",
            SessionType::Sprint => "S",
            SessionType::SprintQualifying => "SQ",
            SessionType::Practice1 => "FP1",
            SessionType::Practice2 => "FP2",
            SessionType::Practice3 => "FP3",
        }
    }

    /// Session name as published by OpenF1.
    pub fn session_name(self) -> &'static str {
        match self {
            SessionType::Race => "Race",
            SessionType::Qualifying => "Qualifying",
            SessionType::Sprint => "Sprint",
            SessionType::SprintQualifying => "Sprint Qualifying",
            SessionType::Practice1 => "Practice 1",
            SessionType::Practice2 => "Practice 2",
            SessionType::Practice3 => "Practice 3",
        }
    }
}

impl FromStr for SessionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "R" | "RACE" => Ok(SessionType::Race),
            "Q" | "QUALIFYING" => Ok(SessionType::Qualifying),
            "S" | "SPRINT" => Ok(SessionType::Sprint),
            "SQ" | "SS" | "SPRINT QUALIFYING" | "SPRINT SHOOTOUT" => {
                Ok(SessionType::SprintQualifying)
            }
            "FP1" | "PRACTICE 1" => Ok(SessionType::Practice1),
            "FP2" | "PRACTICE 2" => Ok(SessionType::Practice2),
            "FP3" | "PRACTICE 3" => Ok(SessionType::Practice3),
            other => Err(Error::Schema(format!("unknown session type `{other}`"))),
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
