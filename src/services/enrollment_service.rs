use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use std::collections::{HashMap, HashSet};

use crate::models::{
    format_registration_number, Enrollment, EnrollmentKind, EnrollmentResponse, EnrollOutcome,
    EnrollRequest, EventSummary, ParticipantSummary, PaymentStatus, Role,
};
use crate::services::auth_service::Claims;
use crate::services::store::Store;
use crate::utils::AppError;

pub(crate) const REGISTRATION_SEQUENCE: &str = "registration";
// Números importados podem ocupar valores da sequência
const REGISTRATION_ATTEMPTS: u32 = 5;

pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::InvalidRequest(format!("Invalid {} ID", what)))
}

/// Single write path for every kind of enrollment, keyed by `(user, event)`.
pub async fn enroll(store: &dyn Store, user_id: &ObjectId, request: &EnrollRequest) -> Result<EnrollOutcome, AppError> {
    let event_id = parse_object_id(&request.event_id, "event")?;

    let user = store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    if !user.is_active {
        return Err(AppError::Forbidden("Account is inactive".to_string()));
    }

    let event = store
        .find_event(&event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if !event.is_active {
        return Err(AppError::InvalidRequest(format!("{} is not open for registration", event.name)));
    }

    // O tipo vem do catálogo; o cliente só pode confirmar
    let kind = EnrollmentKind::for_category(event.category);
    if let Some(requested) = request.kind {
        if requested != kind {
            return Err(AppError::InvalidRequest(format!(
                "{} is a {} registration, not {}",
                event.name,
                kind.as_str(),
                requested.as_str()
            )));
        }
    }

    let transaction_id = request.transaction_id.trim();
    if transaction_id.is_empty() {
        return Err(AppError::InvalidRequest("transactionId is required".to_string()));
    }

    let team_members: Vec<String> = request
        .team_members
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    if !event.team_size.admits(team_members.len() + 1) {
        return Err(AppError::InvalidRequest(format!(
            "{} requires a team of {} to {} participants",
            event.name, event.team_size.min, event.team_size.max
        )));
    }

    if let Some(existing) = store.find_enrollment_for(user_id, &event_id).await? {
        log::info!(
            "ℹ️  {} already enrolled in {} ({})",
            user.participant_id,
            event.name,
            existing.registration_number
        );
        return Ok(EnrollOutcome::AlreadyEnrolled(existing));
    }

    let now = BsonDateTime::now();
    let mut enrollment = Enrollment {
        id: None,
        user: *user_id,
        event: event_id,
        kind,
        registration_number: String::new(),
        payment_status: PaymentStatus::Pending,
        transaction_id: transaction_id.to_string(),
        payment_screenshot: request.payment_screenshot.clone(),
        amount: event.fee,
        team_members,
        rejection_reason: None,
        reviewed_by: None,
        reviewed_at: None,
        created_at: now,
        updated_at: now,
    };

    let mut attempt = 0;
    let outcome = loop {
        attempt += 1;
        enrollment.registration_number = allocate_registration_number(store, kind).await?;
        match store.insert_enrollment(enrollment.clone()).await {
            Ok(outcome) => break outcome,
            Err(AppError::Conflict(reason)) if attempt < REGISTRATION_ATTEMPTS => {
                log::warn!("⚠️  {}, allocating another", reason);
            }
            Err(e) => return Err(e),
        }
    };

    if outcome.is_created() {
        log::info!(
            "✅ {} enrolled in {} ({}, {})",
            user.participant_id,
            event.name,
            kind.as_str(),
            outcome.enrollment().registration_number
        );
    }
    Ok(outcome)
}

pub(crate) async fn allocate_registration_number(store: &dyn Store, kind: EnrollmentKind) -> Result<String, AppError> {
    let seq = store.next_sequence(REGISTRATION_SEQUENCE).await?;
    Ok(format_registration_number(kind, seq))
}

/// Attaches event name/category and, optionally, the participant to each
/// enrollment. Dangling references are left as `None`.
pub async fn hydrate(
    store: &dyn Store,
    enrollments: Vec<Enrollment>,
    with_participants: bool,
) -> Result<Vec<EnrollmentResponse>, AppError> {
    let event_ids: Vec<ObjectId> = enrollments
        .iter()
        .map(|e| e.event)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let events: HashMap<ObjectId, EventSummary> = store
        .find_events(&event_ids)
        .await?
        .iter()
        .filter_map(|event| event.id.map(|id| (id, EventSummary::from(event))))
        .collect();

    let participants: HashMap<ObjectId, ParticipantSummary> = if with_participants {
        let user_ids: Vec<ObjectId> = enrollments
            .iter()
            .map(|e| e.user)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        store
            .find_users(&user_ids)
            .await?
            .into_iter()
            .filter_map(|user| {
                user.id.map(|id| {
                    (
                        id,
                        ParticipantSummary {
                            id: id.to_hex(),
                            participant_id: user.participant_id,
                            name: user.name,
                            email: user.email,
                        },
                    )
                })
            })
            .collect()
    } else {
        HashMap::new()
    };

    Ok(enrollments
        .into_iter()
        .map(|enrollment| {
            let event_details = events.get(&enrollment.event).cloned();
            let participant = participants.get(&enrollment.user).cloned();
            let mut response = EnrollmentResponse::from(enrollment);
            response.event_details = event_details;
            response.participant = participant;
            response
        })
        .collect())
}

/// Every enrollment of the user, workshops and timed events alike, newest first.
pub async fn list_user_enrollments(store: &dyn Store, user_id: &ObjectId) -> Result<Vec<EnrollmentResponse>, AppError> {
    let mut enrollments = store.enrollments_for_user(user_id).await?;
    enrollments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    hydrate(store, enrollments, false).await
}

/// Enrollments of one event, visible to admins and to the event's coordinators.
pub async fn list_event_enrollments(
    store: &dyn Store,
    claims: &Claims,
    event_id: &str,
) -> Result<Vec<EnrollmentResponse>, AppError> {
    let event_id = parse_object_id(event_id, "event")?;
    let event = store
        .find_event(&event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let allowed = match claims.role {
        Role::Admin => true,
        Role::Coordinator => event.is_coordinated_by(&claims.user_object_id()?),
        Role::User => false,
    };
    if !allowed {
        return Err(AppError::Forbidden(format!("Not a coordinator of {}", event.name)));
    }

    let mut enrollments = store.enrollments_for_event(&event_id).await?;
    enrollments.sort_by(|a, b| a.registration_number.cmp(&b.registration_number));
    hydrate(store, enrollments, true).await
}
