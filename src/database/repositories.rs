use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use serde::de::DeserializeOwned;

use super::{MongoDB, COUNTERS, ENROLLMENTS, EVENTS, USERS};
use crate::models::{
    Enrollment, EnrollOutcome, Event, EventCategory, LegacySource, PaymentStats, PaymentStatus,
    PaymentUpdate, User, UserPatch,
};
use crate::services::store::{EnrollmentStore, EventCatalog, SequenceAllocator, UserDirectory};
use crate::utils::AppError;

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Decodes documents one by one so a single malformed legacy record does not
/// hide the rest of the collection.
fn decode_lenient<T: DeserializeOwned>(collection: &str, documents: Vec<Document>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|document| {
            let id = document.get("_id").cloned();
            match bson::from_document::<T>(document) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("⚠️  Skipping malformed {} document {:?}: {}", collection, id, e);
                    None
                }
            }
        })
        .collect()
}

fn escape_regex(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if !c.is_ascii_alphanumeric() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn as_f64(value: Option<&Bson>) -> f64 {
    match value {
        Some(Bson::Int32(v)) => f64::from(*v),
        Some(Bson::Int64(v)) => *v as f64,
        Some(Bson::Double(v)) => *v,
        _ => 0.0,
    }
}

impl MongoDB {
    async fn find_documents(&self, collection: &str, filter: Document) -> Result<Vec<Document>, AppError> {
        let cursor = self.collection::<Document>(collection).find(filter).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl UserDirectory for MongoDB {
    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>, AppError> {
        Ok(self.collection::<User>(USERS).find_one(doc! { "_id": *id }).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.collection::<User>(USERS).find_one(doc! { "email": email }).await?)
    }

    async fn find_user_by_participant_id(&self, participant_id: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .collection::<User>(USERS)
            .find_one(doc! { "participantId": participant_id })
            .await?)
    }

    async fn find_users(&self, ids: &[ObjectId]) -> Result<Vec<User>, AppError> {
        let documents = self
            .find_documents(USERS, doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        Ok(decode_lenient(USERS, documents))
    }

    async fn participant_ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let documents = self
            .find_documents(USERS, doc! { "participantId": { "$regex": format!("^{}", escape_regex(prefix)) } })
            .await?;
        Ok(documents
            .iter()
            .filter_map(|d| d.get_str("participantId").ok().map(str::to_string))
            .collect())
    }

    async fn insert_user(&self, mut user: User) -> Result<User, AppError> {
        match self.collection::<User>(USERS).insert_one(&user).await {
            Ok(result) => {
                user.id = result.inserted_id.as_object_id();
                Ok(user)
            }
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict("User already exists".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_user(&self, participant_id: &str, patch: &UserPatch) -> Result<Option<User>, AppError> {
        let mut set = doc! { "updatedAt": BsonDateTime::now() };
        if let Some(name) = &patch.name {
            set.insert("name", name.as_str());
        }
        if let Some(phone) = &patch.phone {
            set.insert("phone", phone.as_str());
        }
        if let Some(role) = patch.role {
            set.insert("role", role.as_str());
        }
        if let Some(is_active) = patch.is_active {
            set.insert("isActive", is_active);
        }

        // Última escrita vence: não há detecção de conflito em edições de perfil
        Ok(self
            .collection::<User>(USERS)
            .find_one_and_update(doc! { "participantId": participant_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?)
    }
}

#[async_trait]
impl EventCatalog for MongoDB {
    async fn list_events(&self, category: Option<EventCategory>, active_only: bool) -> Result<Vec<Event>, AppError> {
        let mut filter = Document::new();
        if let Some(category) = category {
            filter.insert("category", category.as_str());
        }
        if active_only {
            filter.insert("isActive", true);
        }

        let cursor = self
            .collection::<Document>(EVENTS)
            .find(filter)
            .sort(doc! { "date": 1, "name": 1 })
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(decode_lenient(EVENTS, documents))
    }

    async fn find_event(&self, id: &ObjectId) -> Result<Option<Event>, AppError> {
        let document = self
            .collection::<Document>(EVENTS)
            .find_one(doc! { "_id": *id })
            .await?;
        Ok(document.and_then(|d| decode_lenient(EVENTS, vec![d]).pop()))
    }

    async fn find_events(&self, ids: &[ObjectId]) -> Result<Vec<Event>, AppError> {
        let documents = self
            .find_documents(EVENTS, doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        Ok(decode_lenient(EVENTS, documents))
    }

    async fn count_events(&self) -> Result<u64, AppError> {
        Ok(self.collection::<Document>(EVENTS).count_documents(doc! {}).await?)
    }

    async fn insert_events(&self, events: Vec<Event>) -> Result<usize, AppError> {
        if events.is_empty() {
            return Ok(0);
        }
        let result = self.collection::<Event>(EVENTS).insert_many(&events).await?;
        Ok(result.inserted_ids.len())
    }

    async fn raw_event_documents(&self) -> Result<Vec<Document>, AppError> {
        self.find_documents(EVENTS, doc! {}).await
    }

    async fn patch_event_document(&self, id: &ObjectId, set: Document, unset: Vec<String>) -> Result<(), AppError> {
        let mut update = Document::new();
        if !set.is_empty() {
            update.insert("$set", set);
        }
        if !unset.is_empty() {
            let fields: Document = unset.into_iter().map(|key| (key, Bson::String(String::new()))).collect();
            update.insert("$unset", fields);
        }
        if update.is_empty() {
            return Ok(());
        }

        self.collection::<Document>(EVENTS)
            .update_one(doc! { "_id": *id }, update)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for MongoDB {
    async fn insert_enrollment(&self, mut enrollment: Enrollment) -> Result<EnrollOutcome, AppError> {
        if let Some(existing) = self.find_enrollment_for(&enrollment.user, &enrollment.event).await? {
            return Ok(EnrollOutcome::AlreadyEnrolled(existing));
        }

        match self.collection::<Enrollment>(ENROLLMENTS).insert_one(&enrollment).await {
            Ok(result) => {
                enrollment.id = result.inserted_id.as_object_id();
                Ok(EnrollOutcome::Created(enrollment))
            }
            // Corrida entre duas requisições: o índice único decide quem ganha
            Err(e) if is_duplicate_key(&e) => {
                match self.find_enrollment_for(&enrollment.user, &enrollment.event).await? {
                    Some(existing) => Ok(EnrollOutcome::AlreadyEnrolled(existing)),
                    None => Err(AppError::Conflict(format!(
                        "registration number {} already in use",
                        enrollment.registration_number
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_enrollment(&self, id: &ObjectId) -> Result<Option<Enrollment>, AppError> {
        Ok(self
            .collection::<Enrollment>(ENROLLMENTS)
            .find_one(doc! { "_id": *id })
            .await?)
    }

    async fn find_enrollment_for(&self, user: &ObjectId, event: &ObjectId) -> Result<Option<Enrollment>, AppError> {
        Ok(self
            .collection::<Enrollment>(ENROLLMENTS)
            .find_one(doc! { "user": *user, "event": *event })
            .await?)
    }

    async fn enrollments_for_user(&self, user: &ObjectId) -> Result<Vec<Enrollment>, AppError> {
        let documents = self.find_documents(ENROLLMENTS, doc! { "user": *user }).await?;
        Ok(decode_lenient(ENROLLMENTS, documents))
    }

    async fn enrollments_for_event(&self, event: &ObjectId) -> Result<Vec<Enrollment>, AppError> {
        let documents = self.find_documents(ENROLLMENTS, doc! { "event": *event }).await?;
        Ok(decode_lenient(ENROLLMENTS, documents))
    }

    async fn enrollments_by_status(&self, status: PaymentStatus) -> Result<Vec<Enrollment>, AppError> {
        let cursor = self
            .collection::<Document>(ENROLLMENTS)
            .find(doc! { "paymentStatus": status.as_str() })
            .sort(doc! { "createdAt": 1 })
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(decode_lenient(ENROLLMENTS, documents))
    }

    async fn transition_payment(&self, id: &ObjectId, update: &PaymentUpdate) -> Result<bool, AppError> {
        let result = self
            .collection::<Document>(ENROLLMENTS)
            .update_one(
                doc! { "_id": *id, "paymentStatus": PaymentStatus::Pending.as_str() },
                doc! {
                    "$set": {
                        "paymentStatus": update.status.as_str(),
                        "reviewedBy": update.reviewed_by,
                        "rejectionReason": update.rejection_reason.clone(),
                        "reviewedAt": update.at,
                        "updatedAt": update.at,
                    }
                },
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn payment_stats(&self) -> Result<PaymentStats, AppError> {
        let pipeline = vec![doc! {
            "$group": {
                "_id": "$paymentStatus",
                "count": { "$sum": 1 },
                "revenue": { "$sum": "$amount" },
            }
        }];

        let cursor = self.collection::<Document>(ENROLLMENTS).aggregate(pipeline).await?;
        let buckets: Vec<Document> = cursor.try_collect().await?;

        let (mut pending, mut verified, mut rejected, mut revenue) = (0u64, 0u64, 0u64, 0.0);
        for bucket in &buckets {
            let count = as_f64(bucket.get("count")) as u64;
            match bucket.get_str("_id").map(PaymentStatus::parse_loose) {
                Ok(PaymentStatus::Verified) => {
                    verified += count;
                    revenue += as_f64(bucket.get("revenue"));
                }
                Ok(PaymentStatus::Rejected) => rejected += count,
                Ok(PaymentStatus::Pending) => pending += count,
                Err(_) => log::warn!("⚠️  Enrollments without paymentStatus: {}", count),
            }
        }

        Ok(PaymentStats::from_counts(pending, verified, rejected, revenue))
    }

    async fn legacy_documents(&self, source: LegacySource) -> Result<Vec<Document>, AppError> {
        self.find_documents(source.collection(), doc! {}).await
    }
}

#[async_trait]
impl SequenceAllocator for MongoDB {
    async fn next_sequence(&self, name: &str) -> Result<u64, AppError> {
        let counter = self
            .collection::<Document>(COUNTERS)
            .find_one_and_update(doc! { "_id": name }, doc! { "$inc": { "seq": 1_i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| AppError::DatabaseError(format!("counter {} not returned", name)))?;

        let seq = match counter.get("seq") {
            Some(Bson::Int64(v)) => *v,
            Some(Bson::Int32(v)) => i64::from(*v),
            _ => return Err(AppError::DatabaseError(format!("counter {} has no numeric seq", name))),
        };
        Ok(seq.max(0) as u64)
    }

    async fn raise_sequence(&self, name: &str, floor: u64) -> Result<(), AppError> {
        let floor = i64::try_from(floor)
            .map_err(|_| AppError::InvalidRequest(format!("counter {} floor out of range", name)))?;
        self.collection::<Document>(COUNTERS)
            .update_one(doc! { "_id": name }, doc! { "$max": { "seq": floor } })
            .upsert(true)
            .await?;
        Ok(())
    }
}
