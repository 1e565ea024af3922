use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum!(
    /// Onboarding approval state of a hostel, driven by document review.
    VerificationStatus, "verification status", {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

text_enum!(
    RoomStatus, "room status", {
        Available => "available",
        Occupied => "occupied",
        Maintenance => "maintenance",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hostel {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Search row: a hostel plus room aggregates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostelListing {
    #[serde(flatten)]
    pub hostel: Hostel,
    pub min_price: Option<Decimal>,
    pub available_rooms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHostel {
    pub landlord_id: Uuid,
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
}

impl NewHostel {
    pub fn into_hostel(self, id: Uuid) -> Hostel {
        let now = Utc::now();
        Hostel {
            id,
            landlord_id: self.landlord_id,
            name: self.name,
            location: self.location,
            description: self.description,
            amenities: self.amenities,
            images: self.images,
            verification_status: VerificationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostelChanges {
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub amenities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

impl HostelChanges {
    pub fn apply(self, hostel: &mut Hostel) {
        if let Some(name) = self.name {
            hostel.name = name;
        }
        if let Some(location) = self.location {
            hostel.location = location;
        }
        if let Some(description) = self.description {
            hostel.description = Some(description);
        }
        if let Some(amenities) = self.amenities {
            hostel.amenities = amenities;
        }
        if let Some(images) = self.images {
            hostel.images = images;
        }
        hostel.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: Uuid,
    pub hostel_id: Uuid,
    pub room_number: String,
    pub room_type: String,
    pub capacity: i32,
    pub price: Decimal,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn is_bookable(&self) -> bool {
        self.status != RoomStatus::Maintenance
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRoom {
    pub hostel_id: Uuid,
    pub room_number: String,
    pub room_type: String,
    pub capacity: i32,
    pub price: Decimal,
    pub status: RoomStatus,
}

impl NewRoom {
    pub fn into_room(self, id: Uuid) -> Room {
        let now = Utc::now();
        Room {
            id,
            hostel_id: self.hostel_id,
            room_number: self.room_number,
            room_type: self.room_type,
            capacity: self.capacity,
            price: self.price,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomChanges {
    pub room_number: Option<String>,
    pub room_type: Option<String>,
    pub capacity: Option<i32>,
    pub price: Option<Decimal>,
    pub status: Option<RoomStatus>,
}

impl RoomChanges {
    pub fn apply(self, room: &mut Room) {
        if let Some(room_number) = self.room_number {
            room.room_number = room_number;
        }
        if let Some(room_type) = self.room_type {
            room.room_type = room_type;
        }
        if let Some(capacity) = self.capacity {
            room.capacity = capacity;
        }
        if let Some(price) = self.price {
            room.price = price;
        }
        if let Some(status) = self.status {
            room.status = status;
        }
        room.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub hostel_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub hostel_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
}

impl NewReview {
    pub fn into_review(self, id: Uuid) -> Review {
        Review {
            id,
            hostel_id: self.hostel_id,
            user_id: self.user_id,
            rating: self.rating,
            comment: self.comment,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub review_count: i64,
}

/// Normalised hostel search. Built by the catalog layer from raw query
/// parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct HostelFilter {
    pub search: Option<String>,
    pub location: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub approved_only: bool,
    pub page: u32,
    pub limit: u32,
}

impl HostelFilter {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, limit: u32, total: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        Self {
            items,
            page,
            limit,
            total,
            total_pages: (total + limit_i - 1) / limit_i,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count_rounds_up() {
        let page: Page<u8> = Page::new(vec![], 1, 10, 21);
        assert_eq!(page.total_pages, 3);

        let empty: Page<u8> = Page::new(vec![], 1, 10, 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_filter_offset() {
        let filter = HostelFilter {
            search: None,
            location: None,
            min_price: None,
            max_price: None,
            approved_only: true,
            page: 3,
            limit: 20,
        };
        assert_eq!(filter.offset(), 40);
    }

    #[test]
    fn test_room_under_maintenance_not_bookable() {
        let mut room = NewRoom {
            hostel_id: Uuid::new_v4(),
            room_number: "A1".to_string(),
            room_type: "2-in-1".to_string(),
            capacity: 2,
            price: Decimal::from(300),
            status: RoomStatus::Available,
        }
        .into_room(Uuid::new_v4());
        assert!(room.is_bookable());

        RoomChanges {
            status: Some(RoomStatus::Maintenance),
            ..Default::default()
        }
        .apply(&mut room);
        assert!(!room.is_bookable());
    }
}
