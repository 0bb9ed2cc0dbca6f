// src/session/types.rs — Session domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a session. Moves `Active -> Completed` once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!(
                "difficulty must be one of easy, medium, hard (got '{other}')"
            )),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which realtime repair a session is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceDrift {
    /// Call or channel missing after create.
    Provisioning,
    /// Participant not yet a channel member after join.
    Membership,
    /// Call or channel still present after end.
    Teardown,
}

impl ResourceDrift {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceDrift::Provisioning => "provisioning",
            ResourceDrift::Membership => "membership",
            ResourceDrift::Teardown => "teardown",
        }
    }
}

impl FromStr for ResourceDrift {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(ResourceDrift::Provisioning),
            "membership" => Ok(ResourceDrift::Membership),
            "teardown" => Ok(ResourceDrift::Teardown),
            other => Err(format!("unknown drift '{other}'")),
        }
    }
}

/// Durable session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub problem: String,
    pub difficulty: Difficulty,
    /// Shared key of the realtime call and the chat channel.
    pub call_id: String,
    pub host_id: String,
    pub participant_id: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub drift: Option<ResourceDrift>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn is_host(&self, profile_id: &str) -> bool {
        self.host_id == profile_id
    }

    pub fn has_participant(&self) -> bool {
        self.participant_id.is_some()
    }
}

/// Fields the orchestrator supplies when persisting a new session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub problem: String,
    pub difficulty: Difficulty,
    pub call_id: String,
    pub host_id: String,
}

/// A user profile, owned by the profile store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    /// User id in the messaging provider's namespace.
    pub provider_id: String,
    pub name: String,
    pub email: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields written on upsert, keyed by `provider_id`.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub provider_id: String,
    pub name: String,
    pub email: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: String,
    pub provider_id: String,
    pub name: String,
    pub email: String,
    pub image_url: Option<String>,
}

/// A session with host and participant summaries attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub host: Option<ProfileSummary>,
    pub participant: Option<ProfileSummary>,
}

/// Verified identity of whoever invokes an orchestrator operation.
///
/// Built by the access guard from a resolved profile; the orchestrator never
/// looks at raw request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub profile_id: String,
    pub provider_id: String,
    pub name: String,
}

impl Caller {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            profile_id: profile.id.clone(),
            provider_id: profile.provider_id.clone(),
            name: profile.name.clone(),
        }
    }
}

/// Custom data attached to a realtime call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    pub problem: String,
    pub difficulty: Difficulty,
    pub session_id: String,
}

impl CallMetadata {
    pub fn for_session(session: &Session) -> Self {
        Self {
            problem: session.problem.clone(),
            difficulty: session.difficulty,
            session_id: session.id.clone(),
        }
    }
}

/// Display name of the chat channel for a session.
pub fn channel_name(problem: &str) -> String {
    format!("{problem} Session")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_parse_is_lenient_about_case() {
        assert_eq!(" Easy ".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("".parse::<Difficulty>().is_err());
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [SessionStatus::Active, SessionStatus::Completed] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_view_serializes_flat_and_hides_drift() {
        let now = Utc::now();
        let view = SessionView {
            session: Session {
                id: "s1".into(),
                problem: "Two Sum".into(),
                difficulty: Difficulty::Easy,
                call_id: "session_1_abc".into(),
                host_id: "h1".into(),
                participant_id: None,
                status: SessionStatus::Active,
                created_at: now,
                updated_at: now,
                drift: Some(ResourceDrift::Provisioning),
            },
            host: None,
            participant: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "s1");
        assert_eq!(json["status"], "active");
        assert_eq!(json["difficulty"], "easy");
        assert!(json.get("drift").is_none());
        assert!(json["participant"].is_null());
    }

    #[test]
    fn test_channel_name() {
        assert_eq!(channel_name("Two Sum"), "Two Sum Session");
    }
}
