use async_trait::async_trait;
use mongodb::bson::{self, oid::ObjectId, Document};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::models::{
    Enrollment, EnrollOutcome, Event, EventCategory, LegacySource, PaymentStats, PaymentStatus,
    PaymentUpdate, User, UserPatch,
};
use crate::services::store::{EnrollmentStore, EventCatalog, SequenceAllocator, UserDirectory};
use crate::utils::AppError;

/// Store em memória com a mesma semântica do MongoDB, usado nos testes.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    // Eventos ficam como documentos crus, igual à collection
    events: Vec<Document>,
    enrollments: Vec<Enrollment>,
    legacy: HashMap<&'static str, Vec<Document>>,
    counters: HashMap<String, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn add_event(&self, mut event: Event) -> Event {
        event.id.get_or_insert_with(ObjectId::new);
        self.lock().events.push(bson::to_document(&event).unwrap());
        event
    }

    pub fn add_raw_event(&self, document: Document) {
        self.lock().events.push(document);
    }

    pub fn raw_event(&self, id: &ObjectId) -> Option<Document> {
        self.lock()
            .events
            .iter()
            .find(|d| d.get_object_id("_id").ok().as_ref() == Some(id))
            .cloned()
    }

    pub fn add_user(&self, mut user: User) -> User {
        user.id.get_or_insert_with(ObjectId::new);
        self.lock().users.push(user.clone());
        user
    }

    pub fn add_legacy(&self, source: LegacySource, document: Document) {
        self.lock().legacy.entry(source.collection()).or_default().push(document);
    }

    pub fn enrollment_count(&self) -> usize {
        self.lock().enrollments.len()
    }
}

fn decode_events(documents: &[Document]) -> Vec<Event> {
    documents
        .iter()
        .filter_map(|d| bson::from_document::<Event>(d.clone()).ok())
        .collect()
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>, AppError> {
        Ok(self.lock().users.iter().find(|u| u.id.as_ref() == Some(id)).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_participant_id(&self, participant_id: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.participant_id == participant_id)
            .cloned())
    }

    async fn find_users(&self, ids: &[ObjectId]) -> Result<Vec<User>, AppError> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| u.id.map_or(false, |id| ids.contains(&id)))
            .cloned()
            .collect())
    }

    async fn participant_ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| u.participant_id.starts_with(prefix))
            .map(|u| u.participant_id.clone())
            .collect())
    }

    async fn insert_user(&self, mut user: User) -> Result<User, AppError> {
        let mut inner = self.lock();
        if inner
            .users
            .iter()
            .any(|u| u.email == user.email || u.participant_id == user.participant_id)
        {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        user.id.get_or_insert_with(ObjectId::new);
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, participant_id: &str, patch: &UserPatch) -> Result<Option<User>, AppError> {
        let mut inner = self.lock();
        Ok(inner
            .users
            .iter_mut()
            .find(|u| u.participant_id == participant_id)
            .map(|user| {
                patch.apply(user);
                user.clone()
            }))
    }
}

#[async_trait]
impl EventCatalog for MemoryStore {
    async fn list_events(&self, category: Option<EventCategory>, active_only: bool) -> Result<Vec<Event>, AppError> {
        Ok(decode_events(&self.lock().events)
            .into_iter()
            .filter(|e| category.map_or(true, |c| e.category == c))
            .filter(|e| !active_only || e.is_active)
            .collect())
    }

    async fn find_event(&self, id: &ObjectId) -> Result<Option<Event>, AppError> {
        Ok(decode_events(&self.lock().events)
            .into_iter()
            .find(|e| e.id.as_ref() == Some(id)))
    }

    async fn find_events(&self, ids: &[ObjectId]) -> Result<Vec<Event>, AppError> {
        Ok(decode_events(&self.lock().events)
            .into_iter()
            .filter(|e| e.id.map_or(false, |id| ids.contains(&id)))
            .collect())
    }

    async fn count_events(&self) -> Result<u64, AppError> {
        Ok(self.lock().events.len() as u64)
    }

    async fn insert_events(&self, events: Vec<Event>) -> Result<usize, AppError> {
        let count = events.len();
        for event in events {
            self.add_event(event);
        }
        Ok(count)
    }

    async fn raw_event_documents(&self) -> Result<Vec<Document>, AppError> {
        Ok(self.lock().events.clone())
    }

    async fn patch_event_document(&self, id: &ObjectId, set: Document, unset: Vec<String>) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(document) = inner
            .events
            .iter_mut()
            .find(|d| d.get_object_id("_id").ok().as_ref() == Some(id))
        {
            for (key, value) in set {
                document.insert(key, value);
            }
            for key in unset {
                document.remove(&key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn insert_enrollment(&self, mut enrollment: Enrollment) -> Result<EnrollOutcome, AppError> {
        let mut inner = self.lock();
        if let Some(existing) = inner
            .enrollments
            .iter()
            .find(|e| e.user == enrollment.user && e.event == enrollment.event)
        {
            return Ok(EnrollOutcome::AlreadyEnrolled(existing.clone()));
        }
        // Mesmo índice único do MongoDB
        if inner
            .enrollments
            .iter()
            .any(|e| e.registration_number == enrollment.registration_number)
        {
            return Err(AppError::Conflict(format!(
                "registration number {} already in use",
                enrollment.registration_number
            )));
        }
        enrollment.id.get_or_insert_with(ObjectId::new);
        inner.enrollments.push(enrollment.clone());
        Ok(EnrollOutcome::Created(enrollment))
    }

    async fn find_enrollment(&self, id: &ObjectId) -> Result<Option<Enrollment>, AppError> {
        Ok(self.lock().enrollments.iter().find(|e| e.id.as_ref() == Some(id)).cloned())
    }

    async fn find_enrollment_for(&self, user: &ObjectId, event: &ObjectId) -> Result<Option<Enrollment>, AppError> {
        Ok(self
            .lock()
            .enrollments
            .iter()
            .find(|e| &e.user == user && &e.event == event)
            .cloned())
    }

    async fn enrollments_for_user(&self, user: &ObjectId) -> Result<Vec<Enrollment>, AppError> {
        Ok(self.lock().enrollments.iter().filter(|e| &e.user == user).cloned().collect())
    }

    async fn enrollments_for_event(&self, event: &ObjectId) -> Result<Vec<Enrollment>, AppError> {
        Ok(self.lock().enrollments.iter().filter(|e| &e.event == event).cloned().collect())
    }

    async fn enrollments_by_status(&self, status: PaymentStatus) -> Result<Vec<Enrollment>, AppError> {
        Ok(self
            .lock()
            .enrollments
            .iter()
            .filter(|e| e.payment_status == status)
            .cloned()
            .collect())
    }

    async fn transition_payment(&self, id: &ObjectId, update: &PaymentUpdate) -> Result<bool, AppError> {
        let mut inner = self.lock();
        match inner
            .enrollments
            .iter_mut()
            .find(|e| e.id.as_ref() == Some(id) && e.payment_status == PaymentStatus::Pending)
        {
            Some(enrollment) => {
                enrollment.payment_status = update.status;
                enrollment.reviewed_by = update.reviewed_by;
                enrollment.rejection_reason = update.rejection_reason.clone();
                enrollment.reviewed_at = Some(update.at);
                enrollment.updated_at = update.at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn payment_stats(&self) -> Result<PaymentStats, AppError> {
        Ok(PaymentStats::tally(self.lock().enrollments.iter()))
    }

    async fn legacy_documents(&self, source: LegacySource) -> Result<Vec<Document>, AppError> {
        Ok(self
            .lock()
            .legacy
            .get(source.collection())
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl SequenceAllocator for MemoryStore {
    async fn next_sequence(&self, name: &str) -> Result<u64, AppError> {
        let mut inner = self.lock();
        let seq = inner.counters.entry(name.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn raise_sequence(&self, name: &str, floor: u64) -> Result<(), AppError> {
        let mut inner = self.lock();
        let seq = inner.counters.entry(name.to_string()).or_insert(0);
        *seq = (*seq).max(floor);
        Ok(())
    }
}
