use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostel_core::document::{BankDetails, DocumentStatus, LandlordDocument, NewDocument, ReviewDecision};
use hostel_core::repository::{
    DocumentEffects, DocumentRepository, DocumentReview, DocumentSubmission, PayoutRepository, RepoResult,
    UserDirectory,
};
use hostel_core::user::{PayoutAccount, UserContact};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{PgError, PgResult};
use crate::listing_repo::{HostelRow, HOSTEL_COLUMNS};
use crate::notification_repo::write_side_effects;

const DOCUMENT_COLUMNS: &str = "id, landlord_id, hostel_id, id_document_url, property_proof_url, bank_name, bank_code, \
     account_number, account_name, status, rejection_reason, reviewed_by, reviewed_at, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
}

impl UserRow {
    fn into_contact(self) -> PgResult<UserContact> {
        Ok(UserContact {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role.parse()?,
        })
    }
}

async fn contact(conn: &mut PgConnection, user_id: Uuid) -> PgResult<Option<UserContact>> {
    let row: Option<UserRow> = sqlx::query_as("SELECT id, name, email, role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    row.map(UserRow::into_contact).transpose()
}

#[derive(sqlx::FromRow)]
struct PayoutRow {
    landlord_id: Uuid,
    subaccount_code: String,
    bank_code: String,
    account_number: String,
    created_at: DateTime<Utc>,
}

impl From<PayoutRow> for PayoutAccount {
    fn from(row: PayoutRow) -> Self {
        PayoutAccount {
            landlord_id: row.landlord_id,
            subaccount_code: row.subaccount_code,
            bank_code: row.bank_code,
            account_number: row.account_number,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    landlord_id: Uuid,
    hostel_id: Uuid,
    id_document_url: String,
    property_proof_url: String,
    bank_name: String,
    bank_code: String,
    account_number: String,
    account_name: String,
    status: String,
    rejection_reason: Option<String>,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_document(self) -> PgResult<LandlordDocument> {
        Ok(LandlordDocument {
            id: self.id,
            landlord_id: self.landlord_id,
            hostel_id: self.hostel_id,
            id_document_url: self.id_document_url,
            property_proof_url: self.property_proof_url,
            bank: BankDetails {
                bank_name: self.bank_name,
                bank_code: self.bank_code,
                account_number: self.account_number,
                account_name: self.account_name,
            },
            status: self.status.parse()?,
            rejection_reason: self.rejection_reason,
            reviewed_by: self.reviewed_by,
            reviewed_at: self.reviewed_at,
            created_at: self.created_at,
        })
    }
}

fn into_documents(rows: Vec<DocumentRow>) -> PgResult<Vec<LandlordDocument>> {
    rows.into_iter().map(DocumentRow::into_document).collect()
}

pub struct StoreAccountRepository {
    pool: PgPool,
}

impl StoreAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn do_submit(&self, new: NewDocument) -> PgResult<DocumentSubmission> {
        let mut tx = self.pool.begin().await?;

        // Serialises submissions for one hostel.
        let hostel: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM hostels WHERE id = $1 FOR UPDATE")
            .bind(new.hostel_id)
            .fetch_optional(&mut *tx)
            .await?;
        if hostel.is_none() {
            return Err(PgError::NotFound("Hostel"));
        }

        let sql = format!(
            "SELECT {} FROM landlord_documents WHERE hostel_id = $1 ORDER BY created_at DESC LIMIT 1",
            DOCUMENT_COLUMNS
        );
        let latest: Option<DocumentRow> = sqlx::query_as(&sql).bind(new.hostel_id).fetch_optional(&mut *tx).await?;
        let latest = latest.map(DocumentRow::into_document).transpose()?;
        if !LandlordDocument::allows_resubmission(latest.as_ref()) {
            if let Some(existing) = latest {
                tx.rollback().await?;
                return Ok(DocumentSubmission::Blocked(existing));
            }
        }

        let document = new.into_document(Uuid::new_v4());
        sqlx::query(
            r#"
            INSERT INTO landlord_documents (id, landlord_id, hostel_id, id_document_url, property_proof_url, bank_name,
                                            bank_code, account_number, account_name, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(document.id)
        .bind(document.landlord_id)
        .bind(document.hostel_id)
        .bind(&document.id_document_url)
        .bind(&document.property_proof_url)
        .bind(&document.bank.bank_name)
        .bind(&document.bank.bank_code)
        .bind(&document.bank.account_number)
        .bind(&document.bank.account_name)
        .bind(document.status.as_str())
        .bind(document.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE hostels SET verification_status = 'pending', updated_at = NOW() WHERE id = $1")
            .bind(document.hostel_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DocumentSubmission::Submitted(document))
    }

    async fn do_review(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
        admin_id: Uuid,
        effects: DocumentEffects,
    ) -> PgResult<DocumentReview> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM landlord_documents WHERE id = $1 FOR UPDATE", DOCUMENT_COLUMNS);
        let row: Option<DocumentRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&mut *tx).await?;
        let mut document = row.ok_or(PgError::NotFound("Document"))?.into_document()?;

        document.apply_review(decision, admin_id)?;
        sqlx::query(
            "UPDATE landlord_documents SET status = $2, rejection_reason = $3, reviewed_by = $4, reviewed_at = $5 WHERE id = $1",
        )
        .bind(document.id)
        .bind(document.status.as_str())
        .bind(&document.rejection_reason)
        .bind(document.reviewed_by)
        .bind(document.reviewed_at)
        .execute(&mut *tx)
        .await?;

        let hostel_sql = format!(
            "UPDATE hostels h SET verification_status = $2, updated_at = NOW() WHERE h.id = $1 RETURNING {}",
            HOSTEL_COLUMNS
        );
        let hostel: Option<HostelRow> = sqlx::query_as(&hostel_sql)
            .bind(document.hostel_id)
            .bind(document.status.as_verification().as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let hostel = hostel.ok_or(PgError::NotFound("Hostel"))?.into_hostel()?;

        let landlord = contact(&mut tx, document.landlord_id)
            .await?
            .ok_or(PgError::NotFound("Landlord"))?;

        let review = DocumentReview {
            document,
            hostel,
            landlord,
        };
        write_side_effects(&mut tx, effects(&review)).await?;

        tx.commit().await?;
        Ok(review)
    }
}

#[async_trait]
impl UserDirectory for StoreAccountRepository {
    async fn contact(&self, user_id: Uuid) -> RepoResult<Option<UserContact>> {
        let mut conn = self.pool.acquire().await.map_err(PgError::from)?;
        Ok(contact(&mut conn, user_id).await?)
    }
}

#[async_trait]
impl PayoutRepository for StoreAccountRepository {
    async fn payout_account(&self, landlord_id: Uuid) -> RepoResult<Option<PayoutAccount>> {
        let row: Option<PayoutRow> = sqlx::query_as(
            "SELECT landlord_id, subaccount_code, bank_code, account_number, created_at FROM landlord_payout_accounts WHERE landlord_id = $1",
        )
        .bind(landlord_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(PgError::from)?;
        Ok(row.map(PayoutAccount::from))
    }

    async fn save_payout_account(&self, account: PayoutAccount) -> RepoResult<PayoutAccount> {
        let row: PayoutRow = sqlx::query_as(
            r#"
            WITH inserted AS (
                INSERT INTO landlord_payout_accounts (landlord_id, subaccount_code, bank_code, account_number, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (landlord_id) DO NOTHING
                RETURNING landlord_id, subaccount_code, bank_code, account_number, created_at
            )
            SELECT * FROM inserted
            UNION ALL
            SELECT landlord_id, subaccount_code, bank_code, account_number, created_at
            FROM landlord_payout_accounts WHERE landlord_id = $1
            LIMIT 1
            "#,
        )
        .bind(account.landlord_id)
        .bind(&account.subaccount_code)
        .bind(&account.bank_code)
        .bind(&account.account_number)
        .bind(account.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(PgError::from)?;
        Ok(row.into())
    }
}

#[async_trait]
impl DocumentRepository for StoreAccountRepository {
    async fn submit(&self, document: NewDocument) -> RepoResult<DocumentSubmission> {
        Ok(self.do_submit(document).await?)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<LandlordDocument>> {
        let sql = format!("SELECT {} FROM landlord_documents WHERE id = $1", DOCUMENT_COLUMNS);
        let row: Option<DocumentRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(row.map(DocumentRow::into_document).transpose()?)
    }

    async fn list_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Vec<LandlordDocument>> {
        let sql = format!(
            "SELECT {} FROM landlord_documents WHERE landlord_id = $1 ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        );
        let rows: Vec<DocumentRow> = sqlx::query_as(&sql)
            .bind(landlord_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(into_documents(rows)?)
    }

    async fn list_by_status(&self, status: Option<DocumentStatus>) -> RepoResult<Vec<LandlordDocument>> {
        let sql = format!(
            "SELECT {} FROM landlord_documents WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at ASC",
            DOCUMENT_COLUMNS
        );
        let rows: Vec<DocumentRow> = sqlx::query_as(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(into_documents(rows)?)
    }

    async fn latest_approved_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Option<LandlordDocument>> {
        let sql = format!(
            "SELECT {} FROM landlord_documents WHERE landlord_id = $1 AND status = 'approved' ORDER BY reviewed_at DESC NULLS LAST LIMIT 1",
            DOCUMENT_COLUMNS
        );
        let row: Option<DocumentRow> = sqlx::query_as(&sql)
            .bind(landlord_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(row.map(DocumentRow::into_document).transpose()?)
    }

    async fn review(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
        admin_id: Uuid,
        effects: DocumentEffects,
    ) -> RepoResult<DocumentReview> {
        Ok(self.do_review(id, decision, admin_id, effects).await?)
    }
}
