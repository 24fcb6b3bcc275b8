use crate::error::{Error, Result};
use crate::types::{Session, SessionType};

/// Something that can resolve (year, race, session type) to lap data.
pub trait TelemetrySource {
    fn fetch_session(&self, year: i32, race: &str, session_type: SessionType) -> Result<Session>;
}

/// Front door for session data. Failures surface to the caller as-is;
/// nothing is retried here.
pub struct SessionLoader<S> {
    source: S,
}

impl<S: TelemetrySource> SessionLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn load_session_data(
        &self,
        year: i32,
        race: &str,
        session_type: SessionType,
    ) -> Result<Session> {
        tracing::info!(year, race, session = %session_type, "loading session data");
        match self.source.fetch_session(year, race, session_type) {
            Ok(session) => {
                tracing::info!(
                    event = %session.info.event_name,
                    session = %session.info.session_name,
                    laps = session.laps.len(),
                    "session loaded"
                );
                Ok(session)
            }
            Err(e) => {
                tracing::error!(year, race, error = %e, "error loading session data");
                Err(e)
            }
        }
    }

    /// Race session, the common case.
    pub fn load_race(&self, year: i32, race: &str) -> Result<Session> {
        self.load_session_data(year, race, SessionType::default())
    }
}

impl<S: TelemetrySource + ?Sized> TelemetrySource for &S {
    fn fetch_session(&self, year: i32, race: &str, session_type: SessionType) -> Result<Session> {
        (**self).fetch_session(year, race, session_type)
    }
}

impl<S: TelemetrySource + ?Sized> TelemetrySource for Box<S> {
    fn fetch_session(&self, year: i32, race: &str, session_type: SessionType) -> Result<Session> {
        (**self).fetch_session(year, race, session_type)
    }
}

/// Fixed in-memory sessions; handy for offline runs and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    sessions: Vec<(i32, String, SessionType, Session)>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(
        mut self,
        year: i32,
        race: &str,
        session_type: SessionType,
        session: Session,
    ) -> Self {
        self.sessions.push((year, race.to_string(), session_type, session));
        self
    }
}

impl TelemetrySource for StaticSource {
    fn fetch_session(&self, year: i32, race: &str, session_type: SessionType) -> Result<Session> {
        self.sessions
            .iter()
            .find(|(y, r, st, _)| *y == year && r.eq_ignore_ascii_case(race) && *st == session_type)
            .map(|(_, _, _, s)| s.clone())
            .ok_or_else(|| {
                Error::data_unavailable(
                    format!("{year} {race} {session_type}"),
                    "no such session in static source",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LapTable, SessionInfo};

    fn session() -> Session {
        Session {
            info: SessionInfo {
                year: 2024,
                event_name: "Chinese Grand Prix".into(),
                session_name: "Race".into(),
            },
            laps: LapTable::default(),
        }
    }

    #[test]
    fn loads_matching_session() {
        let src = StaticSource::new().with_session(2024, "China", SessionType::Race, session());
        let loader = SessionLoader::new(src);
        let s = loader.load_race(2024, "china").unwrap();
        assert_eq!(s.info.event_name, "Chinese Grand Prix");
    }

    #[test]
    fn unknown_session_is_data_unavailable() {
        let loader = SessionLoader::new(StaticSource::new());
        let err = loader
            .load_session_data(2024, "Monaco", SessionType::Qualifying)
            .unwrap_err();
        assert!(matches!(err, Error::DataUnavailable { .. }));
    }
}
