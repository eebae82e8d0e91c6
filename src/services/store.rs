//! Persistence seams. `MongoDB` implements all of them in production; the
//! in-memory store backs the unit tests.

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Document};

use crate::models::{
    Enrollment, EnrollOutcome, Event, EventCategory, LegacySource, PaymentStats, PaymentStatus,
    PaymentUpdate, User, UserPatch,
};
use crate::utils::AppError;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_participant_id(&self, participant_id: &str) -> Result<Option<User>, AppError>;
    async fn find_users(&self, ids: &[ObjectId]) -> Result<Vec<User>, AppError>;
    /// Participant IDs starting with `prefix`, in no particular order.
    async fn participant_ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError>;
    /// Inserts and returns the user with its `_id` filled. Fails with
    /// `Conflict` when the email or participant ID is taken.
    async fn insert_user(&self, user: User) -> Result<User, AppError>;
    async fn update_user(&self, participant_id: &str, patch: &UserPatch) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait EventCatalog: Send + Sync {
    async fn list_events(&self, category: Option<EventCategory>, active_only: bool) -> Result<Vec<Event>, AppError>;
    async fn find_event(&self, id: &ObjectId) -> Result<Option<Event>, AppError>;
    async fn find_events(&self, ids: &[ObjectId]) -> Result<Vec<Event>, AppError>;
    async fn count_events(&self) -> Result<u64, AppError>;
    async fn insert_events(&self, events: Vec<Event>) -> Result<usize, AppError>;
    /// Raw documents, including ones that no longer match the `Event` shape.
    async fn raw_event_documents(&self) -> Result<Vec<Document>, AppError>;
    async fn patch_event_document(&self, id: &ObjectId, set: Document, unset: Vec<String>) -> Result<(), AppError>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Writes one enrollment per `(user, event)`. An existing record is
    /// returned untouched as `AlreadyEnrolled`.
    async fn insert_enrollment(&self, enrollment: Enrollment) -> Result<EnrollOutcome, AppError>;
    async fn find_enrollment(&self, id: &ObjectId) -> Result<Option<Enrollment>, AppError>;
    async fn find_enrollment_for(&self, user: &ObjectId, event: &ObjectId) -> Result<Option<Enrollment>, AppError>;
    async fn enrollments_for_user(&self, user: &ObjectId) -> Result<Vec<Enrollment>, AppError>;
    async fn enrollments_for_event(&self, event: &ObjectId) -> Result<Vec<Enrollment>, AppError>;
    async fn enrollments_by_status(&self, status: PaymentStatus) -> Result<Vec<Enrollment>, AppError>;
    /// Applies `update` only while the record is still `pending`. Returns
    /// whether the write happened.
    async fn transition_payment(&self, id: &ObjectId, update: &PaymentUpdate) -> Result<bool, AppError>;
    async fn payment_stats(&self) -> Result<PaymentStats, AppError>;
    async fn legacy_documents(&self, source: LegacySource) -> Result<Vec<Document>, AppError>;
}

#[async_trait]
pub trait SequenceAllocator: Send + Sync {
    /// Atomically increments and returns the named counter, starting at 1.
    async fn next_sequence(&self, name: &str) -> Result<u64, AppError>;
    /// Moves the named counter up to `floor` if it is below it. Never lowers it.
    async fn raise_sequence(&self, name: &str, floor: u64) -> Result<(), AppError>;
}

/// Everything the handlers need, as one injectable object.
pub trait Store: UserDirectory + EventCatalog + EnrollmentStore + SequenceAllocator {}

impl<T> Store for T where T: UserDirectory + EventCatalog + EnrollmentStore + SequenceAllocator {}
