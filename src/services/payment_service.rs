use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use std::sync::Arc;

use crate::models::{Enrollment, EnrollmentResponse, PaymentStats, PaymentStatus, PaymentUpdate, Transition};
use crate::services::enrollment_service::{hydrate, parse_object_id};
use crate::services::notification_service::{notify_in_background, payment_verified_email, Notifier};
use crate::services::store::Store;
use crate::utils::AppError;

/// Result of an admin payment decision.
#[derive(Debug)]
pub struct PaymentDecision {
    pub enrollment: Enrollment,
    pub changed: bool,
}

async fn decide(
    store: &dyn Store,
    enrollment_id: &str,
    target: PaymentStatus,
    admin_id: Option<ObjectId>,
    reason: Option<String>,
) -> Result<PaymentDecision, AppError> {
    let id = parse_object_id(enrollment_id, "registration")?;
    let enrollment = store
        .find_enrollment(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))?;

    match enrollment.payment_status.transition(target)? {
        Transition::Unchanged => {
            log::info!("ℹ️  {} already {}", enrollment.registration_number, target);
            Ok(PaymentDecision { enrollment, changed: false })
        }
        Transition::Applied(status) => {
            let update = PaymentUpdate {
                status,
                reviewed_by: admin_id,
                rejection_reason: reason,
                at: BsonDateTime::now(),
            };

            if store.transition_payment(&id, &update).await? {
                log::info!("✅ Payment {} -> {}", enrollment.registration_number, status);
                let enrollment = store
                    .find_enrollment(&id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))?;
                return Ok(PaymentDecision { enrollment, changed: true });
            }

            // Outro admin decidiu primeiro: reavalia contra o estado atual
            let current = store
                .find_enrollment(&id)
                .await?
                .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))?;
            current.payment_status.transition(target)?;
            Ok(PaymentDecision { enrollment: current, changed: false })
        }
    }
}

/// `pending -> verified`, idempotent. A confirmation email is sent in the
/// background when the state actually changes.
pub async fn verify_payment(
    store: &dyn Store,
    notifier: Arc<dyn Notifier>,
    enrollment_id: &str,
    admin_id: Option<ObjectId>,
) -> Result<PaymentDecision, AppError> {
    let decision = decide(store, enrollment_id, PaymentStatus::Verified, admin_id, None).await?;

    if decision.changed {
        queue_confirmation(store, notifier, &decision.enrollment).await;
    }
    Ok(decision)
}

pub async fn reject_payment(
    store: &dyn Store,
    enrollment_id: &str,
    admin_id: Option<ObjectId>,
    reason: Option<String>,
) -> Result<PaymentDecision, AppError> {
    let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    decide(store, enrollment_id, PaymentStatus::Rejected, admin_id, reason).await
}

// Falhas de lookup aqui não derrubam a verificação
async fn queue_confirmation(store: &dyn Store, notifier: Arc<dyn Notifier>, enrollment: &Enrollment) {
    let user = match store.find_user_by_id(&enrollment.user).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            log::warn!("⚠️  No user for {}, skipping confirmation email", enrollment.registration_number);
            return;
        }
        Err(e) => {
            log::warn!("⚠️  Could not load user for confirmation email: {}", e);
            return;
        }
    };

    let event_name = match store.find_event(&enrollment.event).await {
        Ok(Some(event)) => event.name,
        Ok(None) => "your registration".to_string(),
        Err(e) => {
            log::warn!("⚠️  Could not load event for confirmation email: {}", e);
            "your registration".to_string()
        }
    };

    notify_in_background(
        notifier,
        payment_verified_email(
            &user.email,
            &user.name,
            &user.participant_id,
            &event_name,
            &enrollment.registration_number,
        ),
    );
}

pub async fn pending_payments(store: &dyn Store) -> Result<Vec<EnrollmentResponse>, AppError> {
    let pending = store.enrollments_by_status(PaymentStatus::Pending).await?;
    hydrate(store, pending, true).await
}

pub async fn payment_stats(store: &dyn Store) -> Result<PaymentStats, AppError> {
    store.payment_stats().await
}
