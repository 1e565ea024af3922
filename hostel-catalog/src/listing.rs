use hostel_core::listing::{HostelChanges, NewHostel, NewRoom, RoomChanges, RoomStatus};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{required, InputError};

const MAX_IMAGES: usize = 20;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostelInput {
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl HostelInput {
    pub fn validate(self, landlord_id: Uuid) -> Result<NewHostel, InputError> {
        let images = clean_list(self.images);
        if images.len() > MAX_IMAGES {
            return Err(InputError(format!("at most {} images are allowed", MAX_IMAGES)));
        }

        Ok(NewHostel {
            landlord_id,
            name: required("name", self.name)?,
            location: required("location", self.location)?,
            description: self.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            amenities: clean_list(self.amenities),
            images,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostelUpdate {
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub amenities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

impl HostelUpdate {
    pub fn validate(self) -> Result<HostelChanges, InputError> {
        let name = self.name.map(|n| required("name", Some(n))).transpose()?;
        let location = self.location.map(|l| required("location", Some(l))).transpose()?;
        let images = self.images.map(clean_list);
        if images.as_ref().is_some_and(|i| i.len() > MAX_IMAGES) {
            return Err(InputError(format!("at most {} images are allowed", MAX_IMAGES)));
        }

        Ok(HostelChanges {
            name,
            location,
            description: self.description.map(|d| d.trim().to_string()),
            amenities: self.amenities.map(clean_list),
            images,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomInput {
    pub room_number: Option<String>,
    pub room_type: Option<String>,
    pub capacity: Option<i32>,
    pub price: Option<Decimal>,
    pub status: Option<RoomStatus>,
}

impl RoomInput {
    pub fn validate(self, hostel_id: Uuid) -> Result<NewRoom, InputError> {
        let capacity = self.capacity.ok_or_else(|| InputError("capacity is required".to_string()))?;
        let price = self.price.ok_or_else(|| InputError("price is required".to_string()))?;

        Ok(NewRoom {
            hostel_id,
            room_number: required("room_number", self.room_number)?,
            room_type: required("room_type", self.room_type)?,
            capacity: check_capacity(capacity)?,
            price: check_price(price)?,
            status: self.status.unwrap_or(RoomStatus::Available),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomUpdate {
    pub room_number: Option<String>,
    pub room_type: Option<String>,
    pub capacity: Option<i32>,
    pub price: Option<Decimal>,
    pub status: Option<RoomStatus>,
}

impl RoomUpdate {
    pub fn validate(self) -> Result<RoomChanges, InputError> {
        Ok(RoomChanges {
            room_number: self.room_number.map(|n| required("room_number", Some(n))).transpose()?,
            room_type: self.room_type.map(|t| required("room_type", Some(t))).transpose()?,
            capacity: self.capacity.map(check_capacity).transpose()?,
            price: self.price.map(check_price).transpose()?,
            status: self.status,
        })
    }
}

fn check_capacity(capacity: i32) -> Result<i32, InputError> {
    if capacity < 1 {
        return Err(InputError("capacity must be at least 1".to_string()));
    }
    Ok(capacity)
}

fn check_price(price: Decimal) -> Result<Decimal, InputError> {
    if price <= Decimal::ZERO {
        return Err(InputError("price must be greater than zero".to_string()));
    }
    if price.normalize().scale() > 2 {
        return Err(InputError("price cannot have more than two decimal places".to_string()));
    }
    Ok(price)
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
