//! OpenF1 REST adapter (<https://openf1.org>).
//!
//! Resolves (year, race, session type) to a session key, then pulls laps,
//! stints, pit stops, positions and drivers and stitches them into a
//! [`LapTable`]. Every response goes through the [`TelemetryCache`] when one
//! is configured.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::cache::TelemetryCache;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::session::TelemetrySource;
use crate::types::{LapColumn, LapRecord, LapTable, Session, SessionInfo, SessionType};

// ---------- API payloads ----------

#[derive(Deserialize, Debug, Clone)]
pub struct Meeting {
    pub meeting_key: u32,
    #[serde(default)]
    pub meeting_name: String,
    #[serde(default)]
    pub country_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub circuit_short_name: String,
}

impl Meeting {
    fn matches(&self, race: &str) -> bool {
        let needle = race.trim().to_lowercase();
        !needle.is_empty()
            && [
                &self.meeting_name,
                &self.country_name,
                &self.location,
                &self.circuit_short_name,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiSession {
    pub session_key: u32,
    pub session_name: String,
    pub date_start: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiDriver {
    pub driver_number: u32,
    pub name_acronym: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ApiLap {
    pub driver_number: u32,
    pub lap_number: u32,
    pub lap_duration: Option<f64>,
    pub duration_sector_1: Option<f64>,
    pub duration_sector_2: Option<f64>,
    pub duration_sector_3: Option<f64>,
    pub is_pit_out_lap: Option<bool>,
    pub date_start: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiStint {
    pub driver_number: u32,
    pub lap_start: Option<u32>,
    pub lap_end: Option<u32>,
    pub compound: Option<String>,
    pub tyre_age_at_start: Option<u32>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiPit {
    pub driver_number: u32,
    pub lap_number: Option<u32>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiPosition {
    pub driver_number: u32,
    pub date: String,
    pub position: u32,
}

// ---------- Client ----------

pub struct OpenF1Client {
    http: Client,
    base_url: String,
    cache: Option<TelemetryCache>,
}

impl OpenF1Client {
    pub fn new(base_url: &str, timeout: Duration, cache: Option<TelemetryCache>) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::data_unavailable("failed to build HTTP client", e))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    /// Client with the on-disk cache rooted at `settings.cache_dir`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let cache = TelemetryCache::new(&settings.cache_dir)?;
        Self::new(
            &settings.openf1_base_url,
            Duration::from_secs(settings.http_timeout_secs),
            Some(cache),
        )
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let qs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let key = format!("{endpoint}?{}", qs.join("&"));
        let url = format!("{}/{key}", self.base_url);

        let body = match &self.cache {
            Some(cache) => cache.get_or_fetch(&key, || self.fetch_body(&url))?,
            None => self.fetch_body(&url)?,
        };
        serde_json::from_str(&body).map_err(|e| Error::data_unavailable(format!("decoding {key}"), e))
    }

    fn fetch_body(&self, url: &str) -> Result<String> {
        tracing::debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| Error::data_unavailable(format!("request to {url} failed"), e))?;

        let status = response.status();
        // OpenF1 answers 404 when a filter matches nothing
        if status == StatusCode::NOT_FOUND {
            return Ok("[]".to_string());
        }
        if !status.is_success() {
            return Err(Error::data_unavailable(
                format!("request to {url} failed"),
                format!("HTTP {status}"),
            ));
        }
        response
            .text()
            .map_err(|e| Error::data_unavailable(format!("reading {url}"), e))
    }
}

impl TelemetrySource for OpenF1Client {
    fn fetch_session(&self, year: i32, race: &str, session_type: SessionType) -> Result<Session> {
        let meetings: Vec<Meeting> = self.get("meetings", &[("year", year.to_string())])?;
        let candidates: Vec<Meeting> = meetings.into_iter().filter(|m| m.matches(race)).collect();
        if candidates.is_empty() {
            return Err(Error::data_unavailable(
                format!("{year} {race}"),
                "no meeting matches the race name",
            ));
        }

        // Testing meetings share country and circuit with the grand prix, so
        // the first match is not necessarily the one holding the session.
        let mut found = None;
        for meeting in candidates {
            let sessions: Vec<ApiSession> =
                self.get("sessions", &[("meeting_key", meeting.meeting_key.to_string())])?;
            if let Some(session) = sessions
                .into_iter()
                .find(|s| session_name_matches(&s.session_name, session_type))
            {
                found = Some((meeting, session));
                break;
            }
            tracing::debug!(
                meeting = %meeting.meeting_name,
                session = session_type.session_name(),
                "meeting has no such session, trying the next match"
            );
        }
        let (meeting, session) = found.ok_or_else(|| {
            Error::data_unavailable(
                format!("{year} {race}"),
                format!("no {} session", session_type.session_name()),
            )
        })?;

        let key = [("session_key", session.session_key.to_string())];
        let drivers: Vec<ApiDriver> = self.get("drivers", &key)?;
        let laps: Vec<ApiLap> = self.get("laps", &key)?;
        let stints: Vec<ApiStint> = self.get("stints", &key)?;
        let pits: Vec<ApiPit> = self.get("pit", &key)?;
        let positions: Vec<ApiPosition> = self.get("position", &key)?;

        if laps.is_empty() {
            return Err(Error::data_unavailable(
                format!("{year} {} {}", meeting.meeting_name, session.session_name),
                "session has no lap data",
            ));
        }

        let table = assemble_laps(
            session.date_start.as_deref(),
            &drivers,
            &laps,
            &stints,
            &pits,
            &positions,
        );
        Ok(Session {
            info: SessionInfo {
                year,
                event_name: meeting.meeting_name,
                session_name: session.session_name,
            },
            laps: table,
        })
    }
}

fn session_name_matches(name: &str, session_type: SessionType) -> bool {
    name.eq_ignore_ascii_case(session_type.session_name())
        || (session_type == SessionType::SprintQualifying
            && name.eq_ignore_ascii_case("Sprint Shootout"))
}

// ---------- Assembly ----------

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| Utc.from_utc_datetime(&n))
        })
}

fn secs(value: Option<f64>) -> Option<Duration> {
    value.and_then(|s| Duration::try_from_secs_f64(s).ok())
}

/// Builds lap rows from the raw OpenF1 payloads. Columns are only declared
/// when the payloads can fill them: compound/tyre life need stints, position
/// needs position updates, pit times need the session start.
pub fn assemble_laps(
    session_start: Option<&str>,
    drivers: &[ApiDriver],
    laps: &[ApiLap],
    stints: &[ApiStint],
    pits: &[ApiPit],
    positions: &[ApiPosition],
) -> LapTable {
    let start = session_start.and_then(parse_time);

    let acronyms: HashMap<u32, &str> = drivers
        .iter()
        .filter_map(|d| d.name_acronym.as_deref().map(|a| (d.driver_number, a)))
        .collect();
    let pit_in_laps: HashSet<(u32, u32)> = pits
        .iter()
        .filter_map(|p| p.lap_number.map(|lap| (p.driver_number, lap)))
        .collect();

    let mut timeline: HashMap<u32, Vec<(DateTime<Utc>, u32)>> = HashMap::new();
    for p in positions {
        if let Some(at) = parse_time(&p.date) {
            timeline.entry(p.driver_number).or_default().push((at, p.position));
        }
    }
    for updates in timeline.values_mut() {
        updates.sort_by_key(|(at, _)| *at);
    }

    let mut columns = vec![
        LapColumn::Driver,
        LapColumn::LapTime,
        LapColumn::Sector1Time,
        LapColumn::Sector2Time,
        LapColumn::Sector3Time,
    ];
    if !stints.is_empty() {
        columns.extend([LapColumn::Compound, LapColumn::TyreLife]);
    }
    if !timeline.is_empty() {
        columns.push(LapColumn::Position);
    }
    if start.is_some() {
        columns.extend([LapColumn::PitOutTime, LapColumn::PitInTime]);
    }

    let session_time = |at: DateTime<Utc>| start.and_then(|s0| (at - s0).to_std().ok());

    let mut ordered: Vec<&ApiLap> = laps.iter().collect();
    ordered.sort_by_key(|l| (l.driver_number, l.lap_number));

    let rows = ordered
        .into_iter()
        .map(|lap| {
            let lap_start = lap.date_start.as_deref().and_then(parse_time);
            let lap_time = secs(lap.lap_duration);

            let stint = stints.iter().find(|s| {
                s.driver_number == lap.driver_number
                    && s.lap_start.map_or(false, |first| first <= lap.lap_number)
                    && s.lap_end.map_or(true, |last| lap.lap_number <= last)
            });
            let tyre_life = stint.and_then(|s| {
                Some(s.tyre_age_at_start? + (lap.lap_number - s.lap_start?) + 1)
            });

            let position = lap_start.and_then(|at| {
                let updates = timeline.get(&lap.driver_number)?;
                let idx = updates.partition_point(|(t, _)| *t <= at);
                idx.checked_sub(1).map(|i| updates[i].1)
            });

            let pit_out_time = match lap.is_pit_out_lap {
                Some(true) => lap_start.and_then(session_time),
                _ => None,
            };
            let pit_in_time = if pit_in_laps.contains(&(lap.driver_number, lap.lap_number)) {
                match (lap_start, lap_time) {
                    (Some(at), Some(dur)) => chrono::Duration::from_std(dur)
                        .ok()
                        .and_then(|d| session_time(at + d)),
                    _ => None,
                }
            } else {
                None
            };

            LapRecord {
                driver: acronyms
                    .get(&lap.driver_number)
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| lap.driver_number.to_string()),
                lap_number: lap.lap_number,
                lap_time,
                sector1_time: secs(lap.duration_sector_1),
                sector2_time: secs(lap.duration_sector_2),
                sector3_time: secs(lap.duration_sector_3),
                compound: stint.and_then(|s| s.compound.clone()),
                tyre_life,
                position,
                pit_out_time,
                pit_in_time,
            }
        })
        .collect();

    LapTable::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionLoader;

    fn lap(driver: u32, n: u32, start: &str, dur: Option<f64>) -> ApiLap {
        ApiLap {
            driver_number: driver,
            lap_number: n,
            lap_duration: dur,
            duration_sector_1: dur.map(|d| d * 0.3),
            duration_sector_2: dur.map(|d| d * 0.4),
            duration_sector_3: dur.map(|d| d * 0.3),
            is_pit_out_lap: Some(false),
            date_start: Some(start.to_string()),
        }
    }

    const BAHRAIN_MEETINGS: &str = r#"[
        {"meeting_key": 1228, "meeting_name": "Pre-Season Testing", "country_name": "Bahrain",
         "location": "Sakhir", "circuit_short_name": "Sakhir"},
        {"meeting_key": 1229, "meeting_name": "Bahrain Grand Prix", "country_name": "Bahrain",
         "location": "Sakhir", "circuit_short_name": "Sakhir"}
    ]"#;

    const BAHRAIN_LAPS: &str = r#"[
        {"driver_number": 1, "lap_number": 1, "lap_duration": null,
         "date_start": "2024-03-02T15:03:00+00:00"},
        {"driver_number": 1, "lap_number": 2, "lap_duration": 97.284,
         "duration_sector_1": 31.2, "duration_sector_2": 42.1, "duration_sector_3": 23.984,
         "is_pit_out_lap": false, "date_start": "2024-03-02T15:05:00+00:00"}
    ]"#;

    /// Nothing listens on the discard port, so only cached keys can resolve.
    fn offline_client(cache: &TelemetryCache) -> OpenF1Client {
        OpenF1Client::new("http://127.0.0.1:9", Duration::from_secs(2), Some(cache.clone())).unwrap()
    }

    fn seeded_cache(dir: &std::path::Path, laps: &str) -> TelemetryCache {
        let cache = TelemetryCache::new(dir).unwrap();
        cache.put("meetings?year=2024", BAHRAIN_MEETINGS).unwrap();
        cache
            .put(
                "sessions?meeting_key=1228",
                r#"[{"session_key": 9465, "session_name": "Day 1", "date_start": null}]"#,
            )
            .unwrap();
        cache
            .put(
                "sessions?meeting_key=1229",
                r#"[{"session_key": 9472, "session_name": "Race",
                    "date_start": "2024-03-02T15:00:00+00:00"}]"#,
            )
            .unwrap();
        cache
            .put(
                "drivers?session_key=9472",
                r#"[{"driver_number": 1, "name_acronym": "VER"}]"#,
            )
            .unwrap();
        cache.put("laps?session_key=9472", laps).unwrap();
        for endpoint in ["stints", "pit", "position"] {
            cache.put(&format!("{endpoint}?session_key=9472"), "[]").unwrap();
        }
        cache
    }

    fn unavailable_reason(err: Error) -> String {
        match err {
            Error::DataUnavailable { source, .. } => source.to_string(),
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn skips_testing_meeting_without_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let cache = seeded_cache(dir.path(), BAHRAIN_LAPS);
        let loader = SessionLoader::new(offline_client(&cache));

        let session = loader.load_race(2024, "Bahrain").unwrap();
        assert_eq!(session.info.event_name, "Bahrain Grand Prix");
        assert_eq!(session.info.session_name, "Race");
        assert_eq!(session.laps.len(), 2);
        assert!(session.laps.rows.iter().all(|r| r.driver == "VER"));
        assert_eq!(session.laps.rows[1].lap_time, Some(Duration::from_millis(97_284)));
        assert!(!session.laps.has(LapColumn::Compound));
    }

    #[test]
    fn missing_session_in_every_match_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = seeded_cache(dir.path(), BAHRAIN_LAPS);
        let err = offline_client(&cache)
            .fetch_session(2024, "Bahrain", SessionType::Sprint)
            .unwrap_err();
        assert_eq!(unavailable_reason(err), "no Sprint session");
    }

    #[test]
    fn unknown_race_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = seeded_cache(dir.path(), BAHRAIN_LAPS);
        let err = offline_client(&cache)
            .fetch_session(2024, "Monaco", SessionType::Race)
            .unwrap_err();
        assert_eq!(unavailable_reason(err), "no meeting matches the race name");
    }

    #[test]
    fn session_without_laps_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = seeded_cache(dir.path(), "[]");
        let err = offline_client(&cache)
            .fetch_session(2024, "Bahrain", SessionType::Race)
            .unwrap_err();
        assert_eq!(unavailable_reason(err), "session has no lap data");
    }

    #[test]
    fn uncached_request_needs_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TelemetryCache::new(dir.path()).unwrap();
        let err = offline_client(&cache)
            .fetch_session(2024, "Bahrain", SessionType::Race)
            .unwrap_err();
        assert!(matches!(err, Error::DataUnavailable { .. }));
        assert_eq!(cache.get("meetings?year=2024").unwrap(), None);
    }

    #[test]
    fn meeting_matches_any_name_field() {
        let m = Meeting {
            meeting_key: 1,
            meeting_name: "Chinese Grand Prix".into(),
            country_name: "China".into(),
            location: "Shanghai".into(),
            circuit_short_name: "Shanghai".into(),
        };
        assert!(m.matches("China"));
        assert!(m.matches("shanghai"));
        assert!(m.matches("Chinese Grand Prix"));
        assert!(!m.matches("Monaco"));
        assert!(!m.matches("  "));
    }

    #[test]
    fn sprint_shootout_counts_as_sprint_qualifying() {
        assert!(session_name_matches("Sprint Shootout", SessionType::SprintQualifying));
        assert!(session_name_matches("race", SessionType::Race));
        assert!(!session_name_matches("Sprint", SessionType::Race));
    }

    #[test]
    fn assembles_tyres_pits_and_positions() {
        let drivers = vec![ApiDriver {
            driver_number: 1,
            name_acronym: Some("VER".into()),
        }];
        let mut out_lap = lap(1, 3, "2024-04-21T07:05:00+00:00", Some(95.0));
        out_lap.is_pit_out_lap = Some(true);
        let laps = vec![
            out_lap,
            lap(1, 1, "2024-04-21T07:02:00+00:00", None),
            lap(1, 2, "2024-04-21T07:03:30+00:00", Some(90.5)),
        ];
        let stints = vec![
            ApiStint {
                driver_number: 1,
                lap_start: Some(1),
                lap_end: Some(2),
                compound: Some("MEDIUM".into()),
                tyre_age_at_start: Some(0),
            },
            ApiStint {
                driver_number: 1,
                lap_start: Some(3),
                lap_end: Some(20),
                compound: Some("HARD".into()),
                tyre_age_at_start: Some(2),
            },
        ];
        let pits = vec![ApiPit {
            driver_number: 1,
            lap_number: Some(2),
        }];
        let positions = vec![
            ApiPosition {
                driver_number: 1,
                date: "2024-04-21T07:04:00+00:00".into(),
                position: 3,
            },
            ApiPosition {
                driver_number: 1,
                date: "2024-04-21T06:59:00+00:00".into(),
                position: 1,
            },
        ];

        let table = assemble_laps(
            Some("2024-04-21T07:00:00+00:00"),
            &drivers,
            &laps,
            &stints,
            &pits,
            &positions,
        );

        assert_eq!(table.columns.len(), LapColumn::ALL.len());
        let rows = &table.rows;
        assert_eq!(rows.iter().map(|r| r.lap_number).collect::<Vec<_>>(), [1, 2, 3]);
        assert!(rows.iter().all(|r| r.driver == "VER"));

        assert_eq!(rows[0].lap_time, None);
        assert_eq!(rows[1].lap_time, Some(Duration::from_millis(90_500)));

        assert_eq!(rows[0].tyre_life, Some(1));
        assert_eq!(rows[1].tyre_life, Some(2));
        assert_eq!(rows[2].tyre_life, Some(3));
        assert_eq!(rows[2].compound.as_deref(), Some("HARD"));

        assert_eq!(rows[0].position, Some(1));
        assert_eq!(rows[2].position, Some(3));

        // pit in at end of lap 2: 07:03:30 + 90.5s = 300.5s into the session
        assert_eq!(rows[1].pit_in_time, Some(Duration::from_millis(300_500)));
        assert_eq!(rows[2].pit_out_time, Some(Duration::from_secs(300)));
        assert_eq!(rows[0].pit_out_time, None);
    }

    #[test]
    fn optional_columns_absent_without_their_sources() {
        let laps = vec![lap(44, 1, "2024-04-21T07:02:00+00:00", Some(92.0))];
        let table = assemble_laps(None, &[], &laps, &[], &[], &[]);
        assert!(!table.has(LapColumn::Compound));
        assert!(!table.has(LapColumn::TyreLife));
        assert!(!table.has(LapColumn::Position));
        assert!(!table.has(LapColumn::PitInTime));
        assert_eq!(table.rows[0].driver, "44");
    }

    #[test]
    fn parses_naive_timestamps_as_utc() {
        let a = parse_time("2024-04-21T07:00:00.250").unwrap();
        let b = parse_time("2024-04-21T07:00:00.250+00:00").unwrap();
        assert_eq!(a, b);
    }
}
