use mongodb::bson::{oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::event::{EventCategory, EventSummary};
use crate::utils::AppError;

/// Discriminante que unifica `registrations` e `eventregistrations`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentKind {
    Workshop,
    Event,
}

impl EnrollmentKind {
    pub fn for_category(category: EventCategory) -> Self {
        match category {
            EventCategory::Workshop => EnrollmentKind::Workshop,
            _ => EnrollmentKind::Event,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentKind::Workshop => "workshop",
            EnrollmentKind::Event => "event",
        }
    }

    pub fn registration_prefix(&self) -> &'static str {
        match self {
            EnrollmentKind::Workshop => "WS",
            EnrollmentKind::Event => "EV",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Verified,
    Rejected,
}

/// Resultado de aplicar uma decisão de pagamento
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied(PaymentStatus),
    Unchanged,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Verified => "verified",
            PaymentStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Lenient parsing for legacy documents. Unknown values stay pending.
    pub fn parse_loose(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "verified" | "approved" | "paid" | "completed" => PaymentStatus::Verified,
            "rejected" | "declined" | "failed" => PaymentStatus::Rejected,
            _ => PaymentStatus::Pending,
        }
    }

    /// `pending -> verified | rejected`. Re-applying the current terminal
    /// state is a no-op; every other move is refused.
    pub fn transition(self, target: PaymentStatus) -> Result<Transition, AppError> {
        match (self, target) {
            (current, target) if current == target && current.is_terminal() => Ok(Transition::Unchanged),
            (PaymentStatus::Pending, PaymentStatus::Verified | PaymentStatus::Rejected) => {
                Ok(Transition::Applied(target))
            }
            (current, target) => Err(AppError::Conflict(format!(
                "payment status cannot change from {} to {}",
                current, target
            ))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inscrição canônica (collection `enrollments`, única por `(user, event)`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    pub event: ObjectId,
    pub kind: EnrollmentKind,
    pub registration_number: String,
    pub payment_status: PaymentStatus,
    pub transaction_id: String,
    #[serde(default)]
    pub payment_screenshot: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub team_members: Vec<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub reviewed_by: Option<ObjectId>,
    #[serde(default)]
    pub reviewed_at: Option<BsonDateTime>,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

/// Outcome of writing an enrollment keyed by `(user, event)`.
#[derive(Debug, Clone)]
pub enum EnrollOutcome {
    Created(Enrollment),
    AlreadyEnrolled(Enrollment),
}

impl EnrollOutcome {
    pub fn enrollment(&self) -> &Enrollment {
        match self {
            EnrollOutcome::Created(e) | EnrollOutcome::AlreadyEnrolled(e) => e,
        }
    }

    pub fn into_enrollment(self) -> Enrollment {
        match self {
            EnrollOutcome::Created(e) | EnrollOutcome::AlreadyEnrolled(e) => e,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, EnrollOutcome::Created(_))
    }
}

/// Campos gravados numa transição de pagamento (compare-and-set em `pending`)
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub reviewed_by: Option<ObjectId>,
    pub rejection_reason: Option<String>,
    pub at: BsonDateTime,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    /// ObjectId do evento (hex)
    pub event_id: String,
    pub kind: Option<EnrollmentKind>,
    pub transaction_id: String,
    pub payment_screenshot: Option<String>,
    #[serde(default)]
    pub team_members: Vec<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct RejectPaymentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub id: String,
    pub participant_id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    pub id: String,
    pub user: String,
    pub event: String,
    pub kind: EnrollmentKind,
    pub registration_number: String,
    pub payment_status: PaymentStatus,
    pub transaction_id: String,
    pub payment_screenshot: Option<String>,
    pub amount: f64,
    pub team_members: Vec<String>,
    pub rejection_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Join com o catálogo; `None` se o evento sumiu
    pub event_details: Option<EventSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<ParticipantSummary>,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(enrollment: Enrollment) -> Self {
        EnrollmentResponse {
            id: enrollment.id.map(|id| id.to_hex()).unwrap_or_default(),
            user: enrollment.user.to_hex(),
            event: enrollment.event.to_hex(),
            kind: enrollment.kind,
            registration_number: enrollment.registration_number,
            payment_status: enrollment.payment_status,
            transaction_id: enrollment.transaction_id,
            payment_screenshot: enrollment.payment_screenshot,
            amount: enrollment.amount,
            team_members: enrollment.team_members,
            rejection_reason: enrollment.rejection_reason,
            created_at: enrollment.created_at.timestamp_millis(),
            updated_at: enrollment.updated_at.timestamp_millis(),
            event_details: None,
            participant: None,
        }
    }
}

/// Aggregated payment counters. `total_payments` is always the sum of the
/// three status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStats {
    pub total_payments: u64,
    pub pending_payments: u64,
    pub verified_payments: u64,
    pub rejected_payments: u64,
    pub total_revenue: f64,
}

impl PaymentStats {
    pub fn from_counts(pending: u64, verified: u64, rejected: u64, verified_revenue: f64) -> Self {
        PaymentStats {
            total_payments: pending + verified + rejected,
            pending_payments: pending,
            verified_payments: verified,
            rejected_payments: rejected,
            total_revenue: verified_revenue,
        }
    }

    pub fn tally<'a, I>(enrollments: I) -> Self
    where
        I: IntoIterator<Item = &'a Enrollment>,
    {
        let (mut pending, mut verified, mut rejected, mut revenue) = (0, 0, 0, 0.0);
        for enrollment in enrollments {
            match enrollment.payment_status {
                PaymentStatus::Pending => pending += 1,
                PaymentStatus::Verified => {
                    verified += 1;
                    revenue += enrollment.amount;
                }
                PaymentStatus::Rejected => rejected += 1,
            }
        }
        Self::from_counts(pending, verified, rejected, revenue)
    }
}

pub fn format_registration_number(kind: EnrollmentKind, seq: u64) -> String {
    format!("{}{:05}", kind.registration_prefix(), seq)
}

/// Counter value behind a registration number (`WS00042` -> 42).
/// Numbers that do not follow the prefix + digits shape yield `None`.
pub fn registration_seq(number: &str) -> Option<u64> {
    let digits = number.trim().trim_start_matches(|c: char| c.is_ascii_alphabetic());
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// The two collections written by the old registration paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacySource {
    Registrations,
    EventRegistrations,
}

impl LegacySource {
    pub const ALL: [LegacySource; 2] = [LegacySource::Registrations, LegacySource::EventRegistrations];

    pub fn collection(&self) -> &'static str {
        match self {
            LegacySource::Registrations => "registrations",
            LegacySource::EventRegistrations => "eventregistrations",
        }
    }
}

/// Registro antigo lido de forma tolerante
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyEnrollment {
    pub source: LegacySource,
    pub legacy_id: Option<ObjectId>,
    pub user: Option<ObjectId>,
    pub event: Option<ObjectId>,
    pub registration_number: Option<String>,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_screenshot: Option<String>,
    pub amount: Option<f64>,
    pub team_members: Vec<String>,
}

impl LegacyEnrollment {
    pub fn from_document(source: LegacySource, document: &Document) -> Self {
        LegacyEnrollment {
            source,
            legacy_id: document.get_object_id("_id").ok(),
            user: first_object_id(document, &["user", "userId", "user_id"]),
            event: first_object_id(document, &["event", "eventId", "event_id"]),
            registration_number: first_string(document, &["registrationNumber", "registration_number"]),
            payment_status: first_string(document, &["paymentStatus", "payment_status", "status"])
                .map(|s| PaymentStatus::parse_loose(&s))
                .unwrap_or(PaymentStatus::Pending),
            transaction_id: first_string(document, &["transactionId", "transactionID", "transaction_id"]),
            payment_screenshot: first_string(document, &["paymentScreenshot", "payment_screenshot", "screenshot"]),
            amount: first_number(document, &["amount", "fee"]),
            team_members: match document.get("teamMembers") {
                Some(Bson::Array(items)) => items
                    .iter()
                    .filter_map(|b| b.as_str().map(String::from))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}

fn first_object_id(document: &Document, keys: &[&str]) -> Option<ObjectId> {
    keys.iter().find_map(|key| match document.get(*key) {
        Some(Bson::ObjectId(id)) => Some(*id),
        Some(Bson::String(hex)) => ObjectId::parse_str(hex).ok(),
        Some(Bson::Document(inner)) => inner.get_object_id("_id").ok(),
        _ => None,
    })
}

fn first_string(document: &Document, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match document.get(*key) {
        Some(Bson::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn first_number(document: &Document, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match document.get(*key) {
        Some(Bson::Int32(v)) => Some(f64::from(*v)),
        Some(Bson::Int64(v)) => Some(*v as f64),
        Some(Bson::Double(v)) => Some(*v),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_registration_seq_reads_counter_value() {
        assert_eq!(registration_seq("WS00042"), Some(42));
        assert_eq!(registration_seq(&format_registration_number(EnrollmentKind::Event, 7)), Some(7));
        assert_eq!(registration_seq("REG-2024-7"), None);
        assert_eq!(registration_seq("WS"), None);
    }

    #[test]
    fn test_pending_moves_to_terminal_states() {
        assert_eq!(
            PaymentStatus::Pending.transition(PaymentStatus::Verified).unwrap(),
            Transition::Applied(PaymentStatus::Verified)
        );
        assert_eq!(
            PaymentStatus::Pending.transition(PaymentStatus::Rejected).unwrap(),
            Transition::Applied(PaymentStatus::Rejected)
        );
    }

    #[test]
    fn test_reapplying_terminal_state_is_noop() {
        assert_eq!(
            PaymentStatus::Verified.transition(PaymentStatus::Verified).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(
            PaymentStatus::Rejected.transition(PaymentStatus::Rejected).unwrap(),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_no_path_back_to_pending() {
        for status in [PaymentStatus::Pending, PaymentStatus::Verified, PaymentStatus::Rejected] {
            assert!(status.transition(PaymentStatus::Pending).is_err(), "{} -> pending", status);
        }
        assert!(PaymentStatus::Verified.transition(PaymentStatus::Rejected).is_err());
        assert!(PaymentStatus::Rejected.transition(PaymentStatus::Verified).is_err());
    }

    #[test]
    fn test_stats_total_is_sum_of_statuses() {
        let stats = PaymentStats::from_counts(3, 2, 1, 400.0);
        assert_eq!(stats.total_payments, 6);
        assert_eq!(
            stats.total_payments,
            stats.pending_payments + stats.verified_payments + stats.rejected_payments
        );

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["totalRevenue"], 400.0);
        assert_eq!(json["rejectedPayments"], 1);
    }

    #[test]
    fn test_registration_number_format() {
        assert_eq!(format_registration_number(EnrollmentKind::Workshop, 7), "WS00007");
        assert_eq!(format_registration_number(EnrollmentKind::Event, 12345), "EV12345");
    }

    #[test]
    fn test_legacy_document_parsing_is_lenient() {
        let user = ObjectId::new();
        let event = ObjectId::new();
        let document = doc! {
            "_id": ObjectId::new(),
            "userId": user.to_hex(),
            "event": { "_id": event, "name": "Robotics" },
            "status": "Approved",
            "transactionID": " UTR123 ",
            "amount": 250,
        };

        let legacy = LegacyEnrollment::from_document(LegacySource::EventRegistrations, &document);

        assert_eq!(legacy.user, Some(user));
        assert_eq!(legacy.event, Some(event));
        assert_eq!(legacy.payment_status, PaymentStatus::Verified);
        assert_eq!(legacy.transaction_id.as_deref(), Some("UTR123"));
        assert_eq!(legacy.amount, Some(250.0));
        assert!(legacy.registration_number.is_none());
    }

    #[test]
    fn test_legacy_document_without_references() {
        let legacy = LegacyEnrollment::from_document(LegacySource::Registrations, &doc! { "user": "not-an-id" });
        assert!(legacy.user.is_none());
        assert!(legacy.event.is_none());
        assert_eq!(legacy.payment_status, PaymentStatus::Pending);
    }
}
