use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    Technical,
    NonTechnical,
    Special,
    Workshop,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Technical => "technical",
            EventCategory::NonTechnical => "non-technical",
            EventCategory::Special => "special",
            EventCategory::Workshop => "workshop",
        }
    }

    /// Aceita as variações encontradas em documentos antigos
    /// ("Technical", "non_technical", "Non Technical", "workshops").
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        match normalized.as_str() {
            "technical" | "tech" => Some(EventCategory::Technical),
            "nontechnical" | "nontech" => Some(EventCategory::NonTechnical),
            "special" => Some(EventCategory::Special),
            "workshop" | "workshops" => Some(EventCategory::Workshop),
            _ => None,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TeamSize {
    pub min: u32,
    pub max: u32,
}

impl Default for TeamSize {
    fn default() -> Self {
        TeamSize { min: 1, max: 1 }
    }
}

impl TeamSize {
    pub fn admits(&self, members: usize) -> bool {
        let members = members as u64;
        members >= u64::from(self.min) && members <= u64::from(self.max)
    }
}

/// Evento do catálogo (collection `events`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub category: EventCategory,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub date: Option<BsonDateTime>,
    #[serde(default)]
    pub team_size: TeamSize,
    #[serde(default)]
    pub coordinators: Vec<ObjectId>,
    #[serde(default)]
    pub fee: f64,
}

fn default_is_active() -> bool {
    true
}

impl Event {
    pub fn is_coordinated_by(&self, user_id: &ObjectId) -> bool {
        self.coordinators.contains(user_id)
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub name: String,
    pub category: EventCategory,
    pub description: Option<String>,
    pub is_active: bool,
    /// Unix timestamp em milissegundos
    pub date: Option<i64>,
    pub team_size: TeamSize,
    pub coordinators: Vec<String>,
    pub fee: f64,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        EventResponse {
            id: event.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: event.name,
            category: event.category,
            description: event.description,
            is_active: event.is_active,
            date: event.date.map(|d| d.timestamp_millis()),
            team_size: event.team_size,
            coordinators: event.coordinators.iter().map(|c| c.to_hex()).collect(),
            fee: event.fee,
        }
    }
}

/// Name and category of an event, attached to enrollment listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: String,
    pub name: String,
    pub category: EventCategory,
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        EventSummary {
            id: event.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: event.name.clone(),
            category: event.category,
        }
    }
}
