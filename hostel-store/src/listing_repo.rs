use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostel_core::listing::{
    Hostel, HostelChanges, HostelFilter, HostelListing, NewHostel, NewReview, NewRoom, Page, Review, Room,
    RoomChanges,
};
use hostel_core::repository::{HostelRepository, RepoResult, ReviewInsert, ReviewRepository, RoomRepository};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{guard_payments, PgError, PgResult};

pub(crate) const HOSTEL_COLUMNS: &str =
    "h.id, h.landlord_id, h.name, h.location, h.description, h.amenities, h.images, h.verification_status, h.created_at, h.updated_at";
const ROOM_COLUMNS: &str = "id, hostel_id, room_number, room_type, capacity, price, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct HostelRow {
    id: Uuid,
    landlord_id: Uuid,
    name: String,
    location: String,
    description: Option<String>,
    amenities: Vec<String>,
    images: Vec<String>,
    verification_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl HostelRow {
    pub(crate) fn into_hostel(self) -> PgResult<Hostel> {
        Ok(Hostel {
            id: self.id,
            landlord_id: self.landlord_id,
            name: self.name,
            location: self.location,
            description: self.description,
            amenities: self.amenities,
            images: self.images,
            verification_status: self.verification_status.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    #[sqlx(flatten)]
    hostel: HostelRow,
    min_price: Option<Decimal>,
    available_rooms: i64,
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: Uuid,
    hostel_id: Uuid,
    room_number: String,
    room_type: String,
    capacity: i32,
    price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoomRow {
    fn into_room(self) -> PgResult<Room> {
        Ok(Room {
            id: self.id,
            hostel_id: self.hostel_id,
            room_number: self.room_number,
            room_type: self.room_type,
            capacity: self.capacity,
            price: self.price,
            status: self.status.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    hostel_id: Uuid,
    user_id: Uuid,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            hostel_id: row.hostel_id,
            user_id: row.user_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

/// Appends the WHERE clause shared by the search page and its count.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &HostelFilter) {
    qb.push(" WHERE TRUE");
    if filter.approved_only {
        qb.push(" AND h.verification_status = 'approved'");
    }
    if let Some(term) = &filter.search {
        let pattern = format!("%{}%", term);
        qb.push(" AND (h.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR h.location ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR COALESCE(h.description, '') ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(location) = &filter.location {
        qb.push(" AND h.location ILIKE ").push_bind(format!("%{}%", location));
    }
    if filter.min_price.is_some() || filter.max_price.is_some() {
        qb.push(" AND EXISTS (SELECT 1 FROM rooms pr WHERE pr.hostel_id = h.id");
        if let Some(min) = filter.min_price {
            qb.push(" AND pr.price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND pr.price <= ").push_bind(max);
        }
        qb.push(")");
    }
}

pub struct StoreHostelRepository {
    pool: PgPool,
}

impl StoreHostelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: Uuid) -> PgResult<Option<Hostel>> {
        let sql = format!("SELECT {} FROM hostels h WHERE h.id = $1", HOSTEL_COLUMNS);
        let row: Option<HostelRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(HostelRow::into_hostel).transpose()
    }

    async fn do_search(&self, filter: &HostelFilter) -> PgResult<Page<HostelListing>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM hostels h");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut page = QueryBuilder::new(format!(
            "SELECT {}, \
             (SELECT MIN(r.price) FROM rooms r WHERE r.hostel_id = h.id) AS min_price, \
             (SELECT COUNT(*) FROM rooms r WHERE r.hostel_id = h.id AND r.status = 'available') AS available_rooms \
             FROM hostels h",
            HOSTEL_COLUMNS
        ));
        push_filters(&mut page, filter);
        page.push(" ORDER BY h.created_at DESC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset());

        let rows: Vec<ListingRow> = page.build_query_as().fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(|r| {
                Ok(HostelListing {
                    hostel: r.hostel.into_hostel()?,
                    min_price: r.min_price,
                    available_rooms: r.available_rooms,
                })
            })
            .collect::<PgResult<Vec<_>>>()?;

        Ok(Page::new(items, filter.page, filter.limit, total))
    }

    async fn do_update(&self, id: Uuid, changes: HostelChanges) -> PgResult<Option<Hostel>> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("SELECT {} FROM hostels h WHERE h.id = $1 FOR UPDATE", HOSTEL_COLUMNS);
        let row: Option<HostelRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&mut *tx).await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut hostel = row.into_hostel()?;
        changes.apply(&mut hostel);
        sqlx::query(
            r#"
            UPDATE hostels
            SET name = $2, location = $3, description = $4, amenities = $5, images = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(hostel.id)
        .bind(&hostel.name)
        .bind(&hostel.location)
        .bind(&hostel.description)
        .bind(&hostel.amenities)
        .bind(&hostel.images)
        .bind(hostel.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(hostel))
    }
}

#[async_trait]
impl HostelRepository for StoreHostelRepository {
    async fn create(&self, hostel: NewHostel) -> RepoResult<Hostel> {
        let hostel = hostel.into_hostel(Uuid::new_v4());
        sqlx::query(
            r#"
            INSERT INTO hostels (id, landlord_id, name, location, description, amenities, images, verification_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(hostel.id)
        .bind(hostel.landlord_id)
        .bind(&hostel.name)
        .bind(&hostel.location)
        .bind(&hostel.description)
        .bind(&hostel.amenities)
        .bind(&hostel.images)
        .bind(hostel.verification_status.as_str())
        .bind(hostel.created_at)
        .bind(hostel.updated_at)
        .execute(&self.pool)
        .await
        .map_err(PgError::from)?;
        Ok(hostel)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Hostel>> {
        Ok(self.fetch(id).await?)
    }

    async fn update(&self, id: Uuid, changes: HostelChanges) -> RepoResult<Option<Hostel>> {
        Ok(self.do_update(id, changes).await?)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM hostels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| guard_payments(e, "Hostel"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn search(&self, filter: &HostelFilter) -> RepoResult<Page<HostelListing>> {
        Ok(self.do_search(filter).await?)
    }

    async fn list_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Vec<Hostel>> {
        let sql = format!(
            "SELECT {} FROM hostels h WHERE h.landlord_id = $1 ORDER BY h.created_at DESC",
            HOSTEL_COLUMNS
        );
        let rows: Vec<HostelRow> = sqlx::query_as(&sql)
            .bind(landlord_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(rows.into_iter().map(HostelRow::into_hostel).collect::<PgResult<Vec<_>>>()?)
    }
}

pub struct StoreRoomRepository {
    pool: PgPool,
}

impl StoreRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: Uuid) -> PgResult<Option<Room>> {
        let sql = format!("SELECT {} FROM rooms WHERE id = $1", ROOM_COLUMNS);
        let row: Option<RoomRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(RoomRow::into_room).transpose()
    }

    async fn do_update(&self, id: Uuid, changes: RoomChanges) -> PgResult<Option<Room>> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("SELECT {} FROM rooms WHERE id = $1 FOR UPDATE", ROOM_COLUMNS);
        let row: Option<RoomRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&mut *tx).await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut room = row.into_room()?;
        changes.apply(&mut room);
        sqlx::query(
            r#"
            UPDATE rooms
            SET room_number = $2, room_type = $3, capacity = $4, price = $5, status = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(room.id)
        .bind(&room.room_number)
        .bind(&room.room_type)
        .bind(room.capacity)
        .bind(room.price)
        .bind(room.status.as_str())
        .bind(room.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(room))
    }
}

#[async_trait]
impl RoomRepository for StoreRoomRepository {
    async fn create(&self, room: NewRoom) -> RepoResult<Room> {
        let room = room.into_room(Uuid::new_v4());
        sqlx::query(
            r#"
            INSERT INTO rooms (id, hostel_id, room_number, room_type, capacity, price, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(room.id)
        .bind(room.hostel_id)
        .bind(&room.room_number)
        .bind(&room.room_type)
        .bind(room.capacity)
        .bind(room.price)
        .bind(room.status.as_str())
        .bind(room.created_at)
        .bind(room.updated_at)
        .execute(&self.pool)
        .await
        .map_err(PgError::from)?;
        Ok(room)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Room>> {
        Ok(self.fetch(id).await?)
    }

    async fn update(&self, id: Uuid, changes: RoomChanges) -> RepoResult<Option<Room>> {
        Ok(self.do_update(id, changes).await?)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| guard_payments(e, "Room"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_hostel(&self, hostel_id: Uuid) -> RepoResult<Vec<Room>> {
        let sql = format!("SELECT {} FROM rooms WHERE hostel_id = $1 ORDER BY room_number", ROOM_COLUMNS);
        let rows: Vec<RoomRow> = sqlx::query_as(&sql)
            .bind(hostel_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(rows.into_iter().map(RoomRow::into_room).collect::<PgResult<Vec<_>>>()?)
    }
}

pub struct StoreReviewRepository {
    pool: PgPool,
}

impl StoreReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for StoreReviewRepository {
    async fn create(&self, review: NewReview) -> RepoResult<ReviewInsert> {
        let review = review.into_review(Uuid::new_v4());
        let row: Option<ReviewRow> = sqlx::query_as(
            r#"
            INSERT INTO reviews (id, hostel_id, user_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (hostel_id, user_id) DO NOTHING
            RETURNING id, hostel_id, user_id, rating, comment, created_at
            "#,
        )
        .bind(review.id)
        .bind(review.hostel_id)
        .bind(review.user_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(PgError::from)?;

        Ok(match row {
            Some(row) => ReviewInsert::Created(row.into()),
            None => ReviewInsert::Duplicate,
        })
    }

    async fn list_for_hostel(&self, hostel_id: Uuid) -> RepoResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            "SELECT id, hostel_id, user_id, rating, comment, created_at FROM reviews WHERE hostel_id = $1 ORDER BY created_at DESC",
        )
        .bind(hostel_id)
        .fetch_all(&self.pool)
        .await
        .map_err(PgError::from)?;
        Ok(rows.into_iter().map(Review::from).collect())
    }
}
