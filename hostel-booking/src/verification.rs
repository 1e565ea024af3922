use std::sync::Arc;

use hostel_core::document::{BankDetails, DocumentStatus, LandlordDocument, NewDocument, ReviewDecision};
use hostel_core::repository::{DocumentRepository, DocumentSubmission, HostelRepository};
use hostel_core::user::{Actor, Role};
use hostel_core::{CoreError, CoreResult};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::effects;

/// Body of `POST /api/documents`. File upload happens elsewhere; only the
/// resulting URLs arrive here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentInput {
    pub hostel_id: Option<Uuid>,
    pub id_document_url: Option<String>,
    pub property_proof_url: Option<String>,
    pub bank_name: Option<String>,
    pub bank_code: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
}

/// Body of `POST /api/admin/verify-document`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewRequest {
    pub document_id: Option<Uuid>,
    pub status: Option<DocumentStatus>,
    pub rejection_reason: Option<String>,
}

impl ReviewRequest {
    fn decision(&self) -> CoreResult<ReviewDecision> {
        match self.status {
            Some(DocumentStatus::Approved) => Ok(ReviewDecision::Approve),
            Some(DocumentStatus::Rejected) => {
                let reason = text("rejection_reason", self.rejection_reason.clone())?;
                Ok(ReviewDecision::Reject { reason })
            }
            Some(DocumentStatus::Pending) | None => Err(CoreError::ValidationError(
                "status must be approved or rejected".to_string(),
            )),
        }
    }
}

fn text(field: &str, value: Option<String>) -> CoreResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::ValidationError(format!("{} is required", field)))
}

fn url(field: &str, value: Option<String>) -> CoreResult<String> {
    let value = text(field, value)?;
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(CoreError::ValidationError(format!("{} must be a URL", field)));
    }
    Ok(value)
}

/// Landlord onboarding: document submission and the admin review gate that
/// drives a hostel's verification status.
pub struct DocumentVerifier {
    documents: Arc<dyn DocumentRepository>,
    hostels: Arc<dyn HostelRepository>,
}

impl DocumentVerifier {
    pub fn new(documents: Arc<dyn DocumentRepository>, hostels: Arc<dyn HostelRepository>) -> Self {
        Self { documents, hostels }
    }

    pub async fn submit(&self, actor: &Actor, input: DocumentInput) -> CoreResult<LandlordDocument> {
        actor.require(Role::Landlord)?;

        let hostel_id = input
            .hostel_id
            .ok_or_else(|| CoreError::ValidationError("hostel_id is required".to_string()))?;
        let account_number = text("account_number", input.account_number)?;
        if !account_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::ValidationError("account_number must be numeric".to_string()));
        }

        let document = NewDocument {
            landlord_id: actor.id,
            hostel_id,
            id_document_url: url("id_document_url", input.id_document_url)?,
            property_proof_url: url("property_proof_url", input.property_proof_url)?,
            bank: BankDetails {
                bank_name: text("bank_name", input.bank_name)?,
                bank_code: text("bank_code", input.bank_code)?,
                account_number,
                account_name: text("account_name", input.account_name)?,
            },
        };

        let hostel = self
            .hostels
            .get(hostel_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Hostel not found".to_string()))?;
        if hostel.landlord_id != actor.id {
            return Err(CoreError::Forbidden("You can only verify your own hostels".to_string()));
        }

        match self.documents.submit(document).await? {
            DocumentSubmission::Submitted(document) => {
                info!(document_id = %document.id, hostel_id = %hostel_id, "Verification documents submitted");
                Ok(document)
            }
            DocumentSubmission::Blocked(existing) => Err(CoreError::Conflict(format!(
                "Documents for this hostel are already {}",
                existing.status
            ))),
        }
    }

    pub async fn list_own(&self, actor: &Actor) -> CoreResult<Vec<LandlordDocument>> {
        actor.require(Role::Landlord)?;
        Ok(self.documents.list_for_landlord(actor.id).await?)
    }

    pub async fn review_queue(&self, actor: &Actor, status: Option<DocumentStatus>) -> CoreResult<Vec<LandlordDocument>> {
        actor.require(Role::Admin)?;
        Ok(self.documents.list_by_status(status).await?)
    }

    /// `pending → approved|rejected`; any other starting state is a conflict.
    pub async fn review(&self, actor: &Actor, request: ReviewRequest) -> CoreResult<LandlordDocument> {
        actor.require(Role::Admin)?;
        let document_id = request
            .document_id
            .ok_or_else(|| CoreError::ValidationError("document_id is required".to_string()))?;
        let decision = request.decision()?;

        let review = self
            .documents
            .review(document_id, &decision, actor.id, effects::document_reviewed)
            .await?;
        info!(
            document_id = %document_id,
            hostel_id = %review.hostel.id,
            status = %review.document.status,
            admin = %actor.id,
            "Document reviewed"
        );
        Ok(review.document)
    }
}
