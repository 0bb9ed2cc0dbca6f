// src/storage/store.rs — SQLite operations

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{SessionFilter, SessionQuery};
use crate::session::types::{
    NewProfile, NewSession, Profile, ProfileSummary, ResourceDrift, Session, SessionView,
};

const SESSION_COLUMNS: &str = "s.id, s.problem, s.difficulty, s.call_id, s.host_id,
     s.participant_id, s.status, s.realtime_drift, s.created_at, s.updated_at";

const VIEW_SELECT: &str = "SELECT s.id, s.problem, s.difficulty, s.call_id, s.host_id,
     s.participant_id, s.status, s.realtime_drift, s.created_at, s.updated_at,
     h.id, h.provider_id, h.name, h.email, h.image_url,
     p.id, p.provider_id, p.name, p.email, p.image_url
     FROM sessions s
     LEFT JOIN profiles h ON h.id = s.host_id
     LEFT JOIN profiles p ON p.id = s.participant_id";

/// Fixed-width UTC timestamp, so text ordering matches time ordering.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Low-level SQLite operations for sessions and profiles.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    // -- Profiles --

    /// Insert or update the profile with this provider id.
    pub fn upsert_profile(&self, profile: &NewProfile) -> anyhow::Result<Profile> {
        let now = timestamp(Utc::now());
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO profiles (id, provider_id, name, email, image_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(provider_id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                image_url = excluded.image_url,
                updated_at = excluded.updated_at",
            params![
                id,
                profile.provider_id,
                profile.name,
                profile.email,
                profile.image_url,
                now
            ],
        )?;

        self.find_profile_by_provider_id(&profile.provider_id)?
            .ok_or_else(|| anyhow::anyhow!("profile '{}' vanished after upsert", profile.provider_id))
    }

    pub fn find_profile_by_provider_id(&self, provider_id: &str) -> anyhow::Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, provider_id, name, email, image_url, created_at, updated_at
                 FROM profiles WHERE provider_id = ?1",
                params![provider_id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    pub fn list_profiles(&self, limit: u32) -> anyhow::Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, provider_id, name, email, image_url, created_at, updated_at
             FROM profiles ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], profile_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Sessions --

    pub fn insert_session(&self, fields: &NewSession) -> anyhow::Result<Session> {
        let id = Uuid::now_v7().to_string();
        let now = timestamp(Utc::now());
        self.conn.execute(
            "INSERT INTO sessions (id, problem, difficulty, call_id, host_id, status,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?6)",
            params![
                id,
                fields.problem,
                fields.difficulty.as_str(),
                fields.call_id,
                fields.host_id,
                now
            ],
        )?;

        // Re-read so the returned timestamps carry stored precision.
        self.find_session(&id)?
            .ok_or_else(|| anyhow::anyhow!("session '{id}' vanished after insert"))
    }

    pub fn find_session(&self, id: &str) -> anyhow::Result<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.id = ?1");
        let session = self
            .conn
            .query_row(&sql, params![id], |row| session_from_row(row, 0))
            .optional()?;
        Ok(session)
    }

    pub fn find_session_view(&self, id: &str) -> anyhow::Result<Option<SessionView>> {
        let sql = format!("{VIEW_SELECT} WHERE s.id = ?1");
        let view = self
            .conn
            .query_row(&sql, params![id], view_from_row)
            .optional()?;
        Ok(view)
    }

    /// Newest first; ties broken by id descending.
    pub fn query_sessions(&self, query: &SessionQuery) -> anyhow::Result<Vec<SessionView>> {
        let order = "ORDER BY s.created_at DESC, s.id DESC";
        let mut result = Vec::new();

        match query.filter {
            SessionFilter::Active => {
                let sql = format!("{VIEW_SELECT} WHERE s.status = 'active' {order} LIMIT ?1");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![query.limit], view_from_row)?;
                for row in rows {
                    result.push(row?);
                }
            }
            SessionFilter::CompletedWith { ref profile_id } => {
                let sql = format!(
                    "{VIEW_SELECT} WHERE s.status = 'completed'
                     AND (s.host_id = ?1 OR s.participant_id = ?1) {order} LIMIT ?2"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![profile_id, query.limit], view_from_row)?;
                for row in rows {
                    result.push(row?);
                }
            }
        }

        Ok(result)
    }

    /// Set the participant only if none is set, the session is active and the
    /// joiner is not the host. Returns whether a row changed.
    pub fn set_participant_if_unset(&self, id: &str, participant_id: &str) -> anyhow::Result<bool> {
        let now = timestamp(Utc::now());
        let changed = self.conn.execute(
            "UPDATE sessions SET participant_id = ?1, updated_at = ?2
             WHERE id = ?3 AND participant_id IS NULL AND status = 'active'
             AND host_id <> ?1",
            params![participant_id, now, id],
        )?;
        Ok(changed == 1)
    }

    /// Move an active session to completed. Returns whether a row changed.
    pub fn complete_session(&self, id: &str) -> anyhow::Result<bool> {
        let now = timestamp(Utc::now());
        let changed = self.conn.execute(
            "UPDATE sessions SET status = 'completed', updated_at = ?1
             WHERE id = ?2 AND status = 'active'",
            params![now, id],
        )?;
        Ok(changed == 1)
    }

    pub fn set_drift(&self, id: &str, drift: Option<ResourceDrift>) -> anyhow::Result<()> {
        self.conn.execute(
            "UPDATE sessions SET realtime_drift = ?1 WHERE id = ?2",
            params![drift.map(|d| d.as_str()), id],
        )?;
        Ok(())
    }

    /// Replace the drift marker only if it still equals `expected` and the
    /// participant is still `participant_id`. Returns whether a row changed.
    pub fn replace_drift_if(
        &self,
        id: &str,
        expected: Option<ResourceDrift>,
        next: Option<ResourceDrift>,
        participant_id: Option<&str>,
    ) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE sessions SET realtime_drift = ?1
             WHERE id = ?2 AND realtime_drift IS ?3 AND participant_id IS ?4",
            params![
                next.map(|d| d.as_str()),
                id,
                expected.map(|d| d.as_str()),
                participant_id
            ],
        )?;
        Ok(changed == 1)
    }

    /// Sessions waiting for realtime repair, oldest update first.
    pub fn query_drifted(&self, limit: u32) -> anyhow::Result<Vec<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions s
             WHERE s.realtime_drift IS NOT NULL
             ORDER BY s.updated_at ASC, s.id ASC LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], |row| session_from_row(row, 0))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

// -- Row mapping --

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{raw}': {e}")))
}

fn parse_text<T: std::str::FromStr<Err = String>>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

/// Map the ten session columns starting at `base`.
fn session_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Session> {
    let drift: Option<String> = row.get(base + 7)?;
    let drift = match drift {
        Some(raw) => Some(
            raw.parse::<ResourceDrift>()
                .map_err(|e| conversion_error(base + 7, e))?,
        ),
        None => None,
    };

    Ok(Session {
        id: row.get(base)?,
        problem: row.get(base + 1)?,
        difficulty: parse_text(row, base + 2)?,
        call_id: row.get(base + 3)?,
        host_id: row.get(base + 4)?,
        participant_id: row.get(base + 5)?,
        status: parse_text(row, base + 6)?,
        drift,
        created_at: parse_timestamp(row, base + 8)?,
        updated_at: parse_timestamp(row, base + 9)?,
    })
}

/// Map the five profile summary columns starting at `base`; all NULL means no profile.
fn summary_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Option<ProfileSummary>> {
    let id: Option<String> = row.get(base)?;
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(Some(ProfileSummary {
        id,
        provider_id: row.get(base + 1)?,
        name: row.get(base + 2)?,
        email: row.get(base + 3)?,
        image_url: row.get(base + 4)?,
    }))
}

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<SessionView> {
    Ok(SessionView {
        session: session_from_row(row, 0)?,
        host: summary_from_row(row, 10)?,
        participant: summary_from_row(row, 15)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        image_url: row.get(4)?,
        created_at: parse_timestamp(row, 5)?,
        updated_at: parse_timestamp(row, 6)?,
    })
}
