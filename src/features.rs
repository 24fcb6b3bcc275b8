use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{LapColumn, LapRecord, Session};

/// Output columns of the cleaned lap table. Duration columns carry a
/// `(s)` suffix because they hold seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    Driver,
    Compound,
    Position,
    TyreLife,
    LapTime,
    Sector1Time,
    Sector2Time,
    Sector3Time,
    PitOutTime,
    PitInTime,
    Year,
    Event,
    Session,
}

impl FeatureColumn {
    pub fn name(self) -> &'static str {
        match self {
            FeatureColumn::Driver => "Driver",
            FeatureColumn::Compound => "Compound",
            FeatureColumn::Position => "Position",
            FeatureColumn::TyreLife => "TyreLife",
            FeatureColumn::LapTime => "LapTime (s)",
            FeatureColumn::Sector1Time => "Sector1Time (s)",
            FeatureColumn::Sector2Time => "Sector2Time (s)",
            FeatureColumn::Sector3Time => "Sector3Time (s)",
            FeatureColumn::PitOutTime => "PitOutTime (s)",
            FeatureColumn::PitInTime => "PitInTime (s)",
            FeatureColumn::Year => "Year",
            FeatureColumn::Event => "Event",
            FeatureColumn::Session => "Session",
        }
    }

    fn from_lap(column: LapColumn) -> Self {
        match column {
            LapColumn::Driver => FeatureColumn::Driver,
            LapColumn::LapTime => FeatureColumn::LapTime,
            LapColumn::Sector1Time => FeatureColumn::Sector1Time,
            LapColumn::Sector2Time => FeatureColumn::Sector2Time,
            LapColumn::Sector3Time => FeatureColumn::Sector3Time,
            LapColumn::Compound => FeatureColumn::Compound,
            LapColumn::Position => FeatureColumn::Position,
            LapColumn::TyreLife => FeatureColumn::TyreLife,
            LapColumn::PitOutTime => FeatureColumn::PitOutTime,
            LapColumn::PitInTime => FeatureColumn::PitInTime,
        }
    }
}

/// One retained lap. A row only exists if its lap time was present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapFeatures {
    pub driver: String,
    pub compound: Option<String>,
    pub position: Option<u32>,
    pub tyre_life: Option<u32>,
    pub lap_time_s: f64,
    pub sector1_s: Option<f64>,
    pub sector2_s: Option<f64>,
    pub sector3_s: Option<f64>,
    pub pit_out_s: Option<f64>,
    pub pit_in_s: Option<f64>,
    pub year: i32,
    pub event: String,
    pub session: String,
}

impl LapFeatures {
    /// Numeric value of `column`, if it is numeric and set.
    pub fn numeric(&self, column: FeatureColumn) -> Option<f64> {
        match column {
            FeatureColumn::Position => self.position.map(f64::from),
            FeatureColumn::TyreLife => self.tyre_life.map(f64::from),
            FeatureColumn::LapTime => Some(self.lap_time_s),
            FeatureColumn::Sector1Time => self.sector1_s,
            FeatureColumn::Sector2Time => self.sector2_s,
            FeatureColumn::Sector3Time => self.sector3_s,
            FeatureColumn::PitOutTime => self.pit_out_s,
            FeatureColumn::PitInTime => self.pit_in_s,
            FeatureColumn::Year => Some(f64::from(self.year)),
            FeatureColumn::Driver
            | FeatureColumn::Compound
            | FeatureColumn::Event
            | FeatureColumn::Session => None,
        }
    }

    fn field(&self, column: FeatureColumn) -> String {
        let num = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        match column {
            FeatureColumn::Driver => self.driver.clone(),
            FeatureColumn::Compound => self.compound.clone().unwrap_or_default(),
            FeatureColumn::Position => self.position.map(|p| p.to_string()).unwrap_or_default(),
            FeatureColumn::TyreLife => self.tyre_life.map(|t| t.to_string()).unwrap_or_default(),
            FeatureColumn::Year => self.year.to_string(),
            FeatureColumn::Event => self.event.clone(),
            FeatureColumn::Session => self.session.clone(),
            other => num(self.numeric(other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub columns: Vec<FeatureColumn>,
    pub rows: Vec<LapFeatures>,
}

impl FeatureTable {
    pub fn has(&self, column: FeatureColumn) -> bool {
        self.columns.contains(&column)
    }

    pub fn require(&self, column: FeatureColumn) -> Result<()> {
        if self.has(column) {
            Ok(())
        } else {
            Err(Error::missing_column(column.name()))
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name()).collect()
    }
}

/// Per-driver mean sector times over historical laps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorAggregate {
    pub driver: String,
    pub sector1_s: Option<f64>,
    pub sector2_s: Option<f64>,
    pub sector3_s: Option<f64>,
}

pub fn duration_to_seconds(d: Duration) -> f64 {
    d.as_secs_f64()
}

/// Cleans a session's laps into a feature table.
///
/// Kept columns are the ones the source provided; duration columns are
/// converted to seconds and renamed with a `(s)` suffix, placed after the
/// remaining columns, followed by year, event and session. Laps without a
/// lap time are dropped. Input order is preserved.
pub fn process_lap_data(session: &Session) -> Result<FeatureTable> {
    let laps = &session.laps;
    if !laps.has(LapColumn::LapTime) {
        return Err(Error::missing_column(FeatureColumn::LapTime.name()));
    }

    let present: Vec<LapColumn> = LapColumn::ALL
        .iter()
        .copied()
        .filter(|c| laps.has(*c))
        .collect();
    let mut columns: Vec<FeatureColumn> = present
        .iter()
        .filter(|c| !c.is_duration())
        .map(|c| FeatureColumn::from_lap(*c))
        .collect();
    columns.extend(
        present
            .iter()
            .filter(|c| c.is_duration())
            .map(|c| FeatureColumn::from_lap(*c)),
    );
    columns.extend([FeatureColumn::Year, FeatureColumn::Event, FeatureColumn::Session]);

    let seconds = |column: LapColumn, lap: &LapRecord| {
        if laps.has(column) {
            lap.duration(column).map(duration_to_seconds)
        } else {
            None
        }
    };
    let info = &session.info;

    let rows: Vec<LapFeatures> = laps
        .rows
        .iter()
        .filter_map(|lap| {
            let lap_time_s = lap.lap_time.map(duration_to_seconds)?;
            Some(LapFeatures {
                driver: lap.driver.clone(),
                compound: lap.compound.clone().filter(|_| laps.has(LapColumn::Compound)),
                position: lap.position.filter(|_| laps.has(LapColumn::Position)),
                tyre_life: lap.tyre_life.filter(|_| laps.has(LapColumn::TyreLife)),
                lap_time_s,
                sector1_s: seconds(LapColumn::Sector1Time, lap),
                sector2_s: seconds(LapColumn::Sector2Time, lap),
                sector3_s: seconds(LapColumn::Sector3Time, lap),
                pit_out_s: seconds(LapColumn::PitOutTime, lap),
                pit_in_s: seconds(LapColumn::PitInTime, lap),
                year: info.year,
                event: info.event_name.clone(),
                session: info.session_name.clone(),
            })
        })
        .collect();

    let dropped = laps.len() - rows.len();
    tracing::info!(
        kept = rows.len(),
        dropped,
        event = %info.event_name,
        "processed lap data"
    );
    Ok(FeatureTable { columns, rows })
}

/// Full driver name to a three-letter uppercase code. Not guaranteed unique.
pub fn create_driver_mapping<S: AsRef<str>>(drivers: &[S]) -> BTreeMap<String, String> {
    drivers
        .iter()
        .map(|d| {
            let name = d.as_ref();
            let code: String = name.chars().take(3).collect::<String>().to_uppercase();
            (name.to_string(), code)
        })
        .collect()
}

/// Mean of each sector per driver, ordered by driver. Missing sector values
/// are skipped; a driver with no value for a sector gets `None` there.
pub fn sector_aggregates(table: &FeatureTable) -> Result<Vec<SectorAggregate>> {
    table.require(FeatureColumn::Driver)?;
    for column in [
        FeatureColumn::Sector1Time,
        FeatureColumn::Sector2Time,
        FeatureColumn::Sector3Time,
    ] {
        table.require(column)?;
    }

    let mut sums: BTreeMap<&str, [(f64, usize); 3]> = BTreeMap::new();
    for row in &table.rows {
        let acc = sums.entry(row.driver.as_str()).or_insert([(0.0, 0); 3]);
        for (slot, value) in acc.iter_mut().zip([row.sector1_s, row.sector2_s, row.sector3_s]) {
            if let Some(v) = value.filter(|v| !v.is_nan()) {
                slot.0 += v;
                slot.1 += 1;
            }
        }
    }

    let mean = |(sum, n): (f64, usize)| (n > 0).then(|| sum / n as f64);
    Ok(sums
        .into_iter()
        .map(|(driver, [s1, s2, s3])| SectorAggregate {
            driver: driver.to_string(),
            sector1_s: mean(s1),
            sector2_s: mean(s2),
            sector3_s: mean(s3),
        })
        .collect())
}

/// Writes the table as CSV (header row, no index) to
/// `<data_dir>/processed/<filename>`.
pub fn save_processed_data(table: &FeatureTable, filename: &str, data_dir: &Path) -> Result<PathBuf> {
    let path = data_dir.join("processed").join(filename);
    write_csv(table, &path)?;
    tracing::info!(path = %path.display(), rows = table.len(), "saved processed data");
    Ok(path)
}

pub fn write_csv(table: &FeatureTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::storage(parent, e))?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::from_csv(path, e))?;
    writer
        .write_record(table.header())
        .map_err(|e| Error::from_csv(path, e))?;
    for row in &table.rows {
        writer
            .write_record(table.columns.iter().map(|c| row.field(*c)))
            .map_err(|e| Error::from_csv(path, e))?;
    }
    writer.flush().map_err(|e| Error::storage(path, e))
}
