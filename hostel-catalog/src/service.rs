use std::sync::Arc;

use hostel_core::listing::{Hostel, HostelListing, Page, RatingSummary, Review, Room, VerificationStatus};
use hostel_core::repository::{HostelRepository, ReviewInsert, ReviewRepository, RoomRepository};
use hostel_core::user::{Actor, Role};
use hostel_core::{CoreError, CoreResult};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{summarize, HostelInput, HostelSearch, HostelUpdate, ReviewInput, RoomInput, RoomUpdate};

/// `GET /api/hostels/:id` payload.
#[derive(Debug, Clone, Serialize)]
pub struct HostelDetails {
    #[serde(flatten)]
    pub hostel: Hostel,
    pub rooms: Vec<Room>,
    #[serde(flatten)]
    pub rating: RatingSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostelReviews {
    pub reviews: Vec<Review>,
    #[serde(flatten)]
    pub summary: RatingSummary,
}

fn hostel_not_found() -> CoreError {
    CoreError::NotFound("Hostel not found".to_string())
}

/// Hostel, room and review management with ownership checks.
pub struct CatalogService {
    hostels: Arc<dyn HostelRepository>,
    rooms: Arc<dyn RoomRepository>,
    reviews: Arc<dyn ReviewRepository>,
}

impl CatalogService {
    pub fn new(
        hostels: Arc<dyn HostelRepository>,
        rooms: Arc<dyn RoomRepository>,
        reviews: Arc<dyn ReviewRepository>,
    ) -> Self {
        Self { hostels, rooms, reviews }
    }

    pub async fn search(&self, query: HostelSearch) -> CoreResult<Page<HostelListing>> {
        let filter = query.into_filter()?;
        Ok(self.hostels.search(&filter).await?)
    }

    /// Unapproved hostels are only visible to their landlord and admins.
    pub async fn details(&self, actor: Option<&Actor>, id: Uuid) -> CoreResult<HostelDetails> {
        let hostel = self.hostels.get(id).await?.ok_or_else(hostel_not_found)?;
        let privileged = actor.is_some_and(|a| a.is_admin() || a.id == hostel.landlord_id);
        if hostel.verification_status != VerificationStatus::Approved && !privileged {
            return Err(hostel_not_found());
        }

        let rooms = self.rooms.list_for_hostel(id).await?;
        let reviews = self.reviews.list_for_hostel(id).await?;
        Ok(HostelDetails {
            hostel,
            rooms,
            rating: summarize(&reviews),
        })
    }

    pub async fn create_hostel(&self, actor: &Actor, input: HostelInput) -> CoreResult<Hostel> {
        actor.require(Role::Landlord)?;
        let hostel = self.hostels.create(input.validate(actor.id)?).await?;
        info!(hostel_id = %hostel.id, landlord_id = %actor.id, "Hostel created");
        Ok(hostel)
    }

    pub async fn update_hostel(&self, actor: &Actor, id: Uuid, update: HostelUpdate) -> CoreResult<Hostel> {
        self.owned_hostel(actor, id).await?;
        let changes = update.validate()?;
        self.hostels.update(id, changes).await?.ok_or_else(hostel_not_found)
    }

    pub async fn delete_hostel(&self, actor: &Actor, id: Uuid) -> CoreResult<()> {
        let hostel = self.hostels.get(id).await?.ok_or_else(hostel_not_found)?;
        if !actor.is_admin() && hostel.landlord_id != actor.id {
            return Err(CoreError::Forbidden("You can only delete your own hostels".to_string()));
        }
        if !self.hostels.delete(id).await? {
            return Err(hostel_not_found());
        }
        info!(hostel_id = %id, by = %actor.id, "Hostel deleted");
        Ok(())
    }

    pub async fn rooms(&self, hostel_id: Uuid) -> CoreResult<Vec<Room>> {
        self.hostels.get(hostel_id).await?.ok_or_else(hostel_not_found)?;
        Ok(self.rooms.list_for_hostel(hostel_id).await?)
    }

    pub async fn add_room(&self, actor: &Actor, hostel_id: Uuid, input: RoomInput) -> CoreResult<Room> {
        self.owned_hostel(actor, hostel_id).await?;
        let room = input.validate(hostel_id)?;
        self.ensure_room_number_free(hostel_id, &room.room_number, None).await?;
        Ok(self.rooms.create(room).await?)
    }

    pub async fn update_room(&self, actor: &Actor, room_id: Uuid, update: RoomUpdate) -> CoreResult<Room> {
        let room = self.owned_room(actor, room_id).await?;
        let changes = update.validate()?;
        if let Some(number) = &changes.room_number {
            self.ensure_room_number_free(room.hostel_id, number, Some(room_id)).await?;
        }
        self.rooms
            .update(room_id, changes)
            .await?
            .ok_or_else(|| CoreError::NotFound("Room not found".to_string()))
    }

    pub async fn delete_room(&self, actor: &Actor, room_id: Uuid) -> CoreResult<()> {
        self.owned_room(actor, room_id).await?;
        if !self.rooms.delete(room_id).await? {
            return Err(CoreError::NotFound("Room not found".to_string()));
        }
        Ok(())
    }

    /// One review per student per hostel.
    pub async fn submit_review(&self, actor: &Actor, hostel_id: Uuid, input: ReviewInput) -> CoreResult<Review> {
        actor.require(Role::Student)?;
        self.hostels.get(hostel_id).await?.ok_or_else(hostel_not_found)?;

        match self.reviews.create(input.validate(hostel_id, actor.id)?).await? {
            ReviewInsert::Created(review) => Ok(review),
            ReviewInsert::Duplicate => Err(CoreError::Conflict("You have already reviewed this hostel".to_string())),
        }
    }

    pub async fn reviews(&self, hostel_id: Uuid) -> CoreResult<HostelReviews> {
        let reviews = self.reviews.list_for_hostel(hostel_id).await?;
        let summary = summarize(&reviews);
        Ok(HostelReviews { reviews, summary })
    }

    async fn owned_hostel(&self, actor: &Actor, id: Uuid) -> CoreResult<Hostel> {
        actor.require(Role::Landlord)?;
        let hostel = self.hostels.get(id).await?.ok_or_else(hostel_not_found)?;
        if hostel.landlord_id != actor.id {
            return Err(CoreError::Forbidden("You do not manage this hostel".to_string()));
        }
        Ok(hostel)
    }

    async fn owned_room(&self, actor: &Actor, room_id: Uuid) -> CoreResult<Room> {
        let room = self
            .rooms
            .get(room_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Room not found".to_string()))?;
        self.owned_hostel(actor, room.hostel_id).await?;
        Ok(room)
    }

    async fn ensure_room_number_free(&self, hostel_id: Uuid, number: &str, excluding: Option<Uuid>) -> CoreResult<()> {
        let taken = self
            .rooms
            .list_for_hostel(hostel_id)
            .await?
            .iter()
            .any(|r| r.room_number == number && Some(r.id) != excluding);
        if taken {
            return Err(CoreError::Conflict(format!("Room {} already exists in this hostel", number)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostel_store::memory::MemoryStore;
    use rust_decimal::Decimal;

    fn actor(role: Role) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", role),
            name: role.to_string(),
            role,
        }
    }

    fn service(store: &MemoryStore) -> CatalogService {
        CatalogService::new(Arc::new(store.clone()), Arc::new(store.clone()), Arc::new(store.clone()))
    }

    fn hostel_input() -> HostelInput {
        HostelInput {
            name: Some("Unity Hall Annex".to_string()),
            location: Some("Ayeduase".to_string()),
            ..Default::default()
        }
    }

    fn room_input(number: &str) -> RoomInput {
        RoomInput {
            room_number: Some(number.to_string()),
            room_type: Some("2-in-1".to_string()),
            capacity: Some(2),
            price: Some(Decimal::from(3000)),
            status: None,
        }
    }

    #[tokio::test]
    async fn test_pending_hostel_hidden_from_public() {
        let store = MemoryStore::new();
        let catalog = service(&store);
        let landlord = actor(Role::Landlord);

        let hostel = catalog.create_hostel(&landlord, hostel_input()).await.unwrap();
        assert_eq!(hostel.verification_status, VerificationStatus::Pending);

        assert!(matches!(catalog.details(None, hostel.id).await, Err(CoreError::NotFound(_))));
        assert!(catalog.details(Some(&landlord), hostel.id).await.is_ok());

        let page = catalog.search(HostelSearch::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_only_owner_manages_rooms() {
        let store = MemoryStore::new();
        let catalog = service(&store);
        let owner = actor(Role::Landlord);
        let other = actor(Role::Landlord);

        let hostel = catalog.create_hostel(&owner, hostel_input()).await.unwrap();
        let room = catalog.add_room(&owner, hostel.id, room_input("A1")).await.unwrap();

        let denied = catalog.add_room(&other, hostel.id, room_input("A2")).await;
        assert!(matches!(denied, Err(CoreError::Forbidden(_))));
        let denied = catalog.delete_room(&other, room.id).await;
        assert!(matches!(denied, Err(CoreError::Forbidden(_))));

        let duplicate = catalog.add_room(&owner, hostel.id, room_input("A1")).await;
        assert!(matches!(duplicate, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_student_reviews_once() {
        let store = MemoryStore::new();
        let catalog = service(&store);
        let landlord = actor(Role::Landlord);
        let student = actor(Role::Student);
        let hostel = catalog.create_hostel(&landlord, hostel_input()).await.unwrap();

        let input = ReviewInput {
            rating: Some(4),
            comment: Some("Quiet and clean".to_string()),
        };
        catalog.submit_review(&student, hostel.id, input.clone()).await.unwrap();
        let again = catalog.submit_review(&student, hostel.id, input).await;
        assert!(matches!(again, Err(CoreError::Conflict(_))));

        let reviews = catalog.reviews(hostel.id).await.unwrap();
        assert_eq!(reviews.summary.review_count, 1);
        assert_eq!(reviews.summary.average_rating, 4.0);
    }

    #[tokio::test]
    async fn test_landlord_cannot_review() {
        let store = MemoryStore::new();
        let catalog = service(&store);
        let landlord = actor(Role::Landlord);
        let hostel = catalog.create_hostel(&landlord, hostel_input()).await.unwrap();

        let result = catalog
            .submit_review(
                &landlord,
                hostel.id,
                ReviewInput {
                    rating: Some(5),
                    comment: None,
                },
            )
            .await;
        assert!(matches!(result, Err(CoreError::Forbidden(_))));
    }
}
