use chrono::{DateTime, NaiveDate};
use mongodb::bson::{self, doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use serde::Serialize;

use crate::models::{
    registration_seq, Enrollment, EnrollmentKind, Event, EventCategory, LegacyEnrollment, LegacySource,
    PaymentStatus, PaymentUpdate, Transition,
};
use crate::services::enrollment_service::{allocate_registration_number, REGISTRATION_SEQUENCE};
use crate::services::store::Store;
use crate::utils::AppError;

#[derive(Debug, Default, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub scanned: u64,
    pub created: u64,
    pub already_present: u64,
    pub status_advanced: u64,
    pub skipped: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    pub scanned: u64,
    pub updated: u64,
    pub unparseable: u64,
}

/// Changes needed to bring one event document to the canonical shape.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventSchemaPatch {
    pub set: Document,
    pub unset: Vec<String>,
}

/// Copies both legacy registration collections into `enrollments`.
/// Safe to run repeatedly: existing `(user, event)` pairs are never
/// duplicated and legacy data is left in place.
pub async fn reconcile_enrollments(store: &dyn Store) -> Result<ReconcileReport, AppError> {
    let mut report = ReconcileReport::default();

    let mut records = Vec::new();
    for source in LegacySource::ALL {
        let documents = store.legacy_documents(source).await?;
        log::info!("🔄 Reconciling {} legacy records from {}", documents.len(), source.collection());
        records.extend(documents.iter().map(|document| LegacyEnrollment::from_document(source, document)));
    }

    // Números antigos são mantidos; a sequência precisa ficar acima deles
    let highest = records
        .iter()
        .filter_map(|legacy| legacy.registration_number.as_deref().and_then(registration_seq))
        .max();
    if let Some(highest) = highest {
        store.raise_sequence(REGISTRATION_SEQUENCE, highest).await?;
    }

    for legacy in &records {
        report.scanned += 1;
        reconcile_one(store, legacy, &mut report).await?;
    }

    log::info!(
        "✅ Reconcile done: {} scanned, {} created, {} advanced, {} present, {} skipped",
        report.scanned,
        report.created,
        report.status_advanced,
        report.already_present,
        report.skipped
    );
    Ok(report)
}

async fn reconcile_one(
    store: &dyn Store,
    legacy: &LegacyEnrollment,
    report: &mut ReconcileReport,
) -> Result<(), AppError> {
    let (user_id, event_id) = match (legacy.user, legacy.event) {
        (Some(user), Some(event)) => (user, event),
        _ => {
            log::warn!(
                "⚠️  {} record {:?} has no user/event reference",
                legacy.source.collection(),
                legacy.legacy_id
            );
            report.skipped += 1;
            return Ok(());
        }
    };

    if store.find_user_by_id(&user_id).await?.is_none() {
        log::warn!("⚠️  {} record {:?}: user {} not found", legacy.source.collection(), legacy.legacy_id, user_id);
        report.skipped += 1;
        return Ok(());
    }
    let event = match store.find_event(&event_id).await? {
        Some(event) => event,
        None => {
            log::warn!(
                "⚠️  {} record {:?}: event {} not found",
                legacy.source.collection(),
                legacy.legacy_id,
                event_id
            );
            report.skipped += 1;
            return Ok(());
        }
    };

    if let Some(existing) = store.find_enrollment_for(&user_id, &event_id).await? {
        if advance_status(store, &existing, legacy.payment_status).await? {
            report.status_advanced += 1;
        } else {
            report.already_present += 1;
        }
        return Ok(());
    }

    let kind = EnrollmentKind::for_category(event.category);
    let now = BsonDateTime::now();
    let mut enrollment = Enrollment {
        id: None,
        user: user_id,
        event: event_id,
        kind,
        registration_number: match &legacy.registration_number {
            Some(number) => number.clone(),
            None => allocate_registration_number(store, kind).await?,
        },
        payment_status: legacy.payment_status,
        transaction_id: legacy.transaction_id.clone().unwrap_or_else(|| {
            format!("legacy-{}", legacy.legacy_id.map(|id| id.to_hex()).unwrap_or_default())
        }),
        payment_screenshot: legacy.payment_screenshot.clone(),
        amount: legacy.amount.unwrap_or(event.fee),
        team_members: legacy.team_members.clone(),
        rejection_reason: None,
        reviewed_by: None,
        reviewed_at: legacy.payment_status.is_terminal().then_some(now),
        created_at: legacy_created_at(legacy.legacy_id).unwrap_or(now),
        updated_at: now,
    };

    let outcome = match store.insert_enrollment(enrollment.clone()).await {
        Ok(outcome) => outcome,
        // Número antigo já usado por outra inscrição: gera um novo
        Err(AppError::Conflict(_)) if legacy.registration_number.is_some() => {
            enrollment.registration_number = allocate_registration_number(store, kind).await?;
            store.insert_enrollment(enrollment).await?
        }
        Err(e) => return Err(e),
    };

    if outcome.is_created() {
        report.created += 1;
    } else {
        report.already_present += 1;
    }
    Ok(())
}

fn legacy_created_at(legacy_id: Option<ObjectId>) -> Option<BsonDateTime> {
    legacy_id.map(|id| id.timestamp())
}

// Só avança pending -> terminal; nunca desfaz uma decisão já tomada
async fn advance_status(
    store: &dyn Store,
    existing: &Enrollment,
    legacy_status: PaymentStatus,
) -> Result<bool, AppError> {
    if !legacy_status.is_terminal() || existing.payment_status.is_terminal() {
        return Ok(false);
    }
    let id = match existing.id {
        Some(id) => id,
        None => return Ok(false),
    };

    match existing.payment_status.transition(legacy_status)? {
        Transition::Applied(status) => {
            let update = PaymentUpdate {
                status,
                reviewed_by: None,
                rejection_reason: None,
                at: BsonDateTime::now(),
            };
            store.transition_payment(&id, &update).await
        }
        Transition::Unchanged => Ok(false),
    }
}

/// Computes the rewrite for one raw event document. `Ok(None)` means the
/// document is already canonical; `Err` means it cannot be turned into an
/// event without guessing.
pub fn normalize_event_document(document: &Document) -> Result<Option<EventSchemaPatch>, String> {
    let mut patch = EventSchemaPatch::default();

    let raw_category = match (document.get("category"), document.get("type")) {
        (Some(Bson::String(category)), _) => category.clone(),
        (_, Some(Bson::String(legacy_type))) => legacy_type.clone(),
        _ => return Err("missing category".to_string()),
    };
    let category = EventCategory::parse_loose(&raw_category)
        .ok_or_else(|| format!("unknown category {:?}", raw_category))?;
    if document.get_str("category").ok() != Some(category.as_str()) {
        patch.set.insert("category", category.as_str());
    }
    if document.contains_key("type") {
        patch.unset.push("type".to_string());
    }

    if !matches!(document.get("isActive"), Some(Bson::Boolean(_))) {
        let active = document.get_bool("active").unwrap_or(true);
        patch.set.insert("isActive", active);
    }
    if document.contains_key("active") {
        patch.unset.push("active".to_string());
    }

    match document.get("teamSize") {
        Some(Bson::Document(team)) => {
            let integral = |key: &str| matches!(team.get(key), Some(Bson::Int32(_)) | Some(Bson::Int64(_)));
            match (team.get("min").and_then(as_count), team.get("max").and_then(as_count)) {
                (Some(_), Some(_)) if integral("min") && integral("max") => {}
                (Some(min), Some(max)) => {
                    patch.set.insert("teamSize", doc! { "min": min, "max": max.max(min) });
                }
                (None, Some(max)) if !team.contains_key("min") => {
                    patch.set.insert("teamSize", doc! { "min": 1, "max": max.max(1) });
                }
                _ if !team.contains_key("max") => {
                    patch.set.insert("teamSize", doc! { "min": 1, "max": 1 });
                }
                _ => return Err(format!("unusable teamSize {:?}", team)),
            }
        }
        Some(value) => match as_count(value) {
            Some(max) => {
                patch.set.insert("teamSize", doc! { "min": 1, "max": max.max(1) });
            }
            None => {
                patch.set.insert("teamSize", doc! { "min": 1, "max": 1 });
            }
        },
        None => {
            patch.set.insert("teamSize", doc! { "min": 1, "max": 1 });
        }
    }

    if !matches!(document.get("coordinators"), Some(Bson::Array(_))) {
        patch.set.insert("coordinators", Bson::Array(Vec::new()));
    }

    match document.get("date") {
        None | Some(Bson::Null) | Some(Bson::DateTime(_)) => {}
        Some(Bson::String(raw)) => {
            let date = parse_legacy_date(raw).ok_or_else(|| format!("unparseable date {:?}", raw))?;
            patch.set.insert("date", date);
        }
        Some(Bson::Int64(millis)) => {
            patch.set.insert("date", BsonDateTime::from_millis(*millis));
        }
        Some(other) => return Err(format!("unsupported date {:?}", other)),
    }

    match document.get("fee") {
        None | Some(Bson::Double(_)) | Some(Bson::Int32(_)) | Some(Bson::Int64(_)) => {}
        Some(Bson::Null) => {
            patch.set.insert("fee", 0.0);
        }
        Some(Bson::String(raw)) => {
            let fee = parse_legacy_fee(raw).ok_or_else(|| format!("unparseable fee {:?}", raw))?;
            patch.set.insert("fee", fee);
        }
        Some(other) => return Err(format!("unsupported fee {:?}", other)),
    }

    // O resultado precisa decodificar como Event, senão continua invisível
    let mut patched = document.clone();
    for (key, value) in patch.set.iter() {
        patched.insert(key.clone(), value.clone());
    }
    for key in &patch.unset {
        patched.remove(key);
    }
    bson::from_document::<Event>(patched).map_err(|e| format!("does not decode as an event: {}", e))?;

    if patch.set.is_empty() && patch.unset.is_empty() {
        Ok(None)
    } else {
        Ok(Some(patch))
    }
}

fn as_count(value: &Bson) -> Option<i32> {
    let count = match value {
        Bson::Int32(v) => i64::from(*v),
        Bson::Int64(v) => *v,
        Bson::Double(v) if v.is_finite() && v.fract() == 0.0 => *v as i64,
        Bson::String(v) => v.trim().parse().ok()?,
        _ => return None,
    };
    i32::try_from(count).ok().filter(|c| *c >= 0)
}

// Formatos vistos nos documentos antigos: RFC 3339 ou só a data
fn parse_legacy_date(raw: &str) -> Option<BsonDateTime> {
    let raw = raw.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(BsonDateTime::from_millis(datetime.timestamp_millis()));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
    Some(BsonDateTime::from_millis(midnight.timestamp_millis()))
}

fn parse_legacy_fee(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok().filter(|fee| fee.is_finite())
}

pub async fn normalize_event_schema(store: &dyn Store) -> Result<NormalizeReport, AppError> {
    let mut report = NormalizeReport::default();

    for document in store.raw_event_documents().await? {
        report.scanned += 1;
        let id = match document.get_object_id("_id") {
            Ok(id) => id,
            Err(_) => {
                report.unparseable += 1;
                continue;
            }
        };

        match normalize_event_document(&document) {
            Ok(Some(patch)) => {
                store.patch_event_document(&id, patch.set, patch.unset).await?;
                report.updated += 1;
            }
            Ok(None) => {}
            Err(reason) => {
                log::warn!("⚠️  Event {} left untouched: {}", id, reason);
                report.unparseable += 1;
            }
        }
    }

    log::info!(
        "✅ Event schema: {} scanned, {} updated, {} unparseable",
        report.scanned,
        report.updated,
        report.unparseable
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnrollRequest, Role};
    use crate::services::enrollment_service::{enroll, fixtures, list_user_enrollments};
    use crate::services::memory_store::MemoryStore;
    use crate::services::store::{EnrollmentStore, EventCatalog};

    #[test]
    fn test_normalize_legacy_event_shape() {
        let document = doc! {
            "_id": ObjectId::new(),
            "name": "Paper Presentation",
            "type": "Non_Technical",
            "active": false,
            "teamSize": 3,
        };

        let patch = normalize_event_document(&document).unwrap().unwrap();

        assert_eq!(patch.set.get_str("category").unwrap(), "non-technical");
        assert_eq!(patch.set.get_bool("isActive").unwrap(), false);
        assert_eq!(patch.set.get_document("teamSize").unwrap(), &doc! { "min": 1, "max": 3 });
        assert!(patch.set.get_array("coordinators").unwrap().is_empty());
        assert_eq!(patch.unset, vec!["type".to_string(), "active".to_string()]);
    }

    #[test]
    fn test_normalize_leaves_canonical_document_alone() {
        let event = fixtures::new_event("Hackathon", EventCategory::Technical, 0.0);
        let mut document = mongodb::bson::to_document(&event).unwrap();
        document.insert("_id", ObjectId::new());

        assert_eq!(normalize_event_document(&document), Ok(None));
    }

    #[test]
    fn test_normalize_rejects_unknown_category() {
        let document = doc! { "_id": ObjectId::new(), "name": "Mystery", "category": "karaoke" };
        assert!(normalize_event_document(&document).is_err());
        assert!(normalize_event_document(&doc! { "name": "No category" }).is_err());
    }

    #[tokio::test]
    async fn test_normalize_repairs_field_types_that_hide_events() {
        let store = MemoryStore::new();
        let dated = ObjectId::new();
        store.add_raw_event(doc! {
            "_id": dated,
            "name": "Paper Presentation",
            "category": "technical",
            "isActive": true,
            "teamSize": { "min": 1.0, "max": 2.0 },
            "coordinators": [],
            "date": "2024-03-15",
            "fee": "₹150",
        });
        let hopeless = ObjectId::new();
        store.add_raw_event(doc! {
            "_id": hopeless,
            "name": "Treasure Hunt",
            "category": "special",
            "isActive": true,
            "teamSize": { "min": 1, "max": 4 },
            "coordinators": [],
            "date": "next friday",
        });
        assert!(store.find_event(&dated).await.unwrap().is_none());

        let report = normalize_event_schema(&store).await.unwrap();
        assert_eq!(report, NormalizeReport { scanned: 2, updated: 1, unparseable: 1 });

        let event = store.find_event(&dated).await.unwrap().unwrap();
        assert_eq!(event.fee, 150.0);
        assert_eq!(event.team_size, crate::models::TeamSize { min: 1, max: 2 });
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert_eq!(event.date.unwrap().timestamp_millis(), expected);
        assert!(store.find_event(&hopeless).await.unwrap().is_none());

        assert_eq!(normalize_event_schema(&store).await.unwrap().updated, 0);
    }

    #[tokio::test]
    async fn test_normalize_event_schema_is_idempotent() {
        let store = MemoryStore::new();
        let legacy_id = ObjectId::new();
        store.add_raw_event(doc! { "_id": legacy_id, "name": "IoT Workshop", "type": "Workshops", "fee": 300 });
        store.add_raw_event(doc! { "_id": ObjectId::new(), "name": "Broken", "category": "???" });
        fixtures::event(&store, "Quiz", EventCategory::NonTechnical, 50.0);

        let first = normalize_event_schema(&store).await.unwrap();
        assert_eq!(first, NormalizeReport { scanned: 3, updated: 1, unparseable: 1 });

        let normalized = store.find_event(&legacy_id).await.unwrap().unwrap();
        assert_eq!(normalized.category, EventCategory::Workshop);
        assert!(normalized.is_active);
        assert!(!store.raw_event(&legacy_id).unwrap().contains_key("type"));

        let second = normalize_event_schema(&store).await.unwrap();
        assert_eq!(second.updated, 0);
    }

    #[tokio::test]
    async fn test_reconcile_brings_both_legacy_paths_into_my_registrations() {
        let store = MemoryStore::new();
        let user = fixtures::user(&store, "SHWK001", Role::User);
        let user_id = user.id.unwrap();
        let workshop = fixtures::event(&store, "Robotics", EventCategory::Workshop, 200.0);
        let quiz = fixtures::event(&store, "Quiz", EventCategory::NonTechnical, 50.0);

        store.add_legacy(
            LegacySource::Registrations,
            doc! {
                "_id": ObjectId::new(),
                "user": user_id,
                "event": workshop.id.unwrap(),
                "registrationNumber": "WS00042",
                "paymentStatus": "verified",
                "transactionId": "UTR-1",
            },
        );
        store.add_legacy(
            LegacySource::EventRegistrations,
            doc! {
                "_id": ObjectId::new(),
                "userId": user_id.to_hex(),
                "eventId": quiz.id.unwrap().to_hex(),
                "status": "pending",
            },
        );
        store.add_legacy(LegacySource::EventRegistrations, doc! { "_id": ObjectId::new(), "status": "paid" });

        let report = reconcile_enrollments(&store).await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.created, 2);
        assert_eq!(report.skipped, 1);

        let mine = list_user_enrollments(&store, &user_id).await.unwrap();
        assert_eq!(mine.len(), 2);
        let robotics = mine.iter().find(|e| e.registration_number == "WS00042").unwrap();
        assert_eq!(robotics.kind, EnrollmentKind::Workshop);
        assert_eq!(robotics.payment_status, PaymentStatus::Verified);
        assert_eq!(robotics.amount, 200.0);
        let quiz_entry = mine.iter().find(|e| e.kind == EnrollmentKind::Event).unwrap();
        assert!(quiz_entry.registration_number.starts_with("EV"));
        assert!(quiz_entry.transaction_id.starts_with("legacy-"));
        assert_eq!(quiz_entry.event_details.as_ref().unwrap().name, "Quiz");

        let again = reconcile_enrollments(&store).await.unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.already_present, 2);
        assert_eq!(store.enrollment_count(), 2);
    }

    #[tokio::test]
    async fn test_enrollment_after_reconcile_gets_unused_number() {
        let store = MemoryStore::new();
        let legacy_user = fixtures::user(&store, "SHWK001", Role::User);
        let new_user = fixtures::user(&store, "SHWK002", Role::User);
        let iot = fixtures::event(&store, "IoT Workshop", EventCategory::Workshop, 300.0);
        let ml = fixtures::event(&store, "ML Workshop", EventCategory::Workshop, 300.0);

        store.add_legacy(
            LegacySource::Registrations,
            doc! {
                "_id": ObjectId::new(),
                "user": legacy_user.id.unwrap(),
                "event": iot.id.unwrap(),
                "registrationNumber": "WS00001",
                "paymentStatus": "verified",
                "transactionId": "UTR-OLD",
            },
        );
        assert_eq!(reconcile_enrollments(&store).await.unwrap().created, 1);

        let outcome = enroll(
            &store,
            &new_user.id.unwrap(),
            &EnrollRequest {
                event_id: ml.id.unwrap().to_hex(),
                kind: None,
                transaction_id: "UTR-NEW".into(),
                payment_screenshot: None,
                team_members: Vec::new(),
            },
        )
        .await
        .unwrap();

        assert!(outcome.is_created());
        assert_eq!(outcome.enrollment().registration_number, "WS00002");
    }

    #[tokio::test]
    async fn test_reconcile_advances_pending_but_never_reverts() {
        let store = MemoryStore::new();
        let user = fixtures::user(&store, "SHWK002", Role::User);
        let user_id = user.id.unwrap();
        let hackathon = fixtures::event(&store, "Hackathon", EventCategory::Technical, 100.0);
        let debate = fixtures::event(&store, "Debate", EventCategory::NonTechnical, 20.0);

        for event in [&hackathon, &debate] {
            enroll(
                &store,
                &user_id,
                &EnrollRequest {
                    event_id: event.id.unwrap().to_hex(),
                    kind: None,
                    transaction_id: "UTR-9".into(),
                    payment_screenshot: None,
                    team_members: Vec::new(),
                },
            )
            .await
            .unwrap();
        }
        let debate_enrollment = store
            .find_enrollment_for(&user_id, &debate.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        store
            .transition_payment(
                &debate_enrollment.id.unwrap(),
                &PaymentUpdate {
                    status: PaymentStatus::Rejected,
                    reviewed_by: None,
                    rejection_reason: None,
                    at: BsonDateTime::now(),
                },
            )
            .await
            .unwrap();

        store.add_legacy(
            LegacySource::EventRegistrations,
            doc! { "user": user_id, "event": hackathon.id.unwrap(), "paymentStatus": "approved" },
        );
        store.add_legacy(
            LegacySource::EventRegistrations,
            doc! { "user": user_id, "event": debate.id.unwrap(), "paymentStatus": "verified" },
        );

        let report = reconcile_enrollments(&store).await.unwrap();
        assert_eq!(report.status_advanced, 1);
        assert_eq!(report.already_present, 1);

        let hackathon_enrollment = store
            .find_enrollment_for(&user_id, &hackathon.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hackathon_enrollment.payment_status, PaymentStatus::Verified);
        let debate_enrollment = store.find_enrollment(&debate_enrollment.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(debate_enrollment.payment_status, PaymentStatus::Rejected);
    }
}
