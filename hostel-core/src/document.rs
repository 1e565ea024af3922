use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::TransitionError;
use crate::listing::VerificationStatus;

text_enum!(
    DocumentStatus, "document status", {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

/// Admin verdict on a landlord's submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
}

impl ReviewDecision {
    pub fn target(&self) -> DocumentStatus {
        match self {
            ReviewDecision::Approve => DocumentStatus::Approved,
            ReviewDecision::Reject { .. } => DocumentStatus::Rejected,
        }
    }
}

impl DocumentStatus {
    /// Only `pending` documents can be reviewed; both outcomes are final.
    pub fn review(self, decision: &ReviewDecision) -> Result<DocumentStatus, TransitionError> {
        match self {
            DocumentStatus::Pending => Ok(decision.target()),
            DocumentStatus::Approved | DocumentStatus::Rejected => {
                Err(TransitionError::AlreadyReviewed(self.to_string()))
            }
        }
    }

    pub fn as_verification(self) -> VerificationStatus {
        match self {
            DocumentStatus::Pending => VerificationStatus::Pending,
            DocumentStatus::Approved => VerificationStatus::Approved,
            DocumentStatus::Rejected => VerificationStatus::Rejected,
        }
    }
}

/// Bank account the landlord is paid out to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankDetails {
    pub bank_name: String,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

/// Verification artifacts a landlord submits for a hostel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LandlordDocument {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub hostel_id: Uuid,
    pub id_document_url: String,
    pub property_proof_url: String,
    #[serde(flatten)]
    pub bank: BankDetails,
    pub status: DocumentStatus,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LandlordDocument {
    pub fn apply_review(&mut self, decision: &ReviewDecision, admin_id: Uuid) -> Result<(), TransitionError> {
        self.status = self.status.review(decision)?;
        self.rejection_reason = match decision {
            ReviewDecision::Approve => None,
            ReviewDecision::Reject { reason } => Some(reason.clone()),
        };
        self.reviewed_by = Some(admin_id);
        self.reviewed_at = Some(Utc::now());
        Ok(())
    }

    /// A landlord may submit again only when nothing is on file for the
    /// hostel or the latest submission was rejected.
    pub fn allows_resubmission(latest: Option<&LandlordDocument>) -> bool {
        match latest {
            None => true,
            Some(doc) => doc.status == DocumentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub landlord_id: Uuid,
    pub hostel_id: Uuid,
    pub id_document_url: String,
    pub property_proof_url: String,
    pub bank: BankDetails,
}

impl NewDocument {
    pub fn into_document(self, id: Uuid) -> LandlordDocument {
        LandlordDocument {
            id,
            landlord_id: self.landlord_id,
            hostel_id: self.hostel_id,
            id_document_url: self.id_document_url,
            property_proof_url: self.property_proof_url,
            bank: self.bank,
            status: DocumentStatus::Pending,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> LandlordDocument {
        NewDocument {
            landlord_id: Uuid::new_v4(),
            hostel_id: Uuid::new_v4(),
            id_document_url: "https://img.example.com/id.png".to_string(),
            property_proof_url: "https://img.example.com/deed.pdf".to_string(),
            bank: BankDetails {
                bank_name: "GCB Bank".to_string(),
                bank_code: "040".to_string(),
                account_number: "1234567890".to_string(),
                account_name: "Kofi Mensah".to_string(),
            },
        }
        .into_document(Uuid::new_v4())
    }

    #[test]
    fn test_pending_can_be_approved_or_rejected() {
        assert_eq!(
            DocumentStatus::Pending.review(&ReviewDecision::Approve).unwrap(),
            DocumentStatus::Approved
        );
        let reject = ReviewDecision::Reject {
            reason: "blurry".to_string(),
        };
        assert_eq!(DocumentStatus::Pending.review(&reject).unwrap(), DocumentStatus::Rejected);
    }

    #[test]
    fn test_reviewed_documents_are_final() {
        let reject = ReviewDecision::Reject {
            reason: "expired id".to_string(),
        };
        assert!(DocumentStatus::Approved.review(&ReviewDecision::Approve).is_err());
        assert!(DocumentStatus::Approved.review(&reject).is_err());
        assert!(DocumentStatus::Rejected.review(&ReviewDecision::Approve).is_err());
    }

    #[test]
    fn test_apply_review_records_reviewer() {
        let mut doc = document();
        let admin = Uuid::new_v4();
        doc.apply_review(
            &ReviewDecision::Reject {
                reason: "expired id".to_string(),
            },
            admin,
        )
        .unwrap();

        assert_eq!(doc.status, DocumentStatus::Rejected);
        assert_eq!(doc.rejection_reason.as_deref(), Some("expired id"));
        assert_eq!(doc.reviewed_by, Some(admin));

        let before = doc.clone();
        assert!(doc.apply_review(&ReviewDecision::Approve, admin).is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_resubmission_only_after_rejection() {
        let mut doc = document();
        assert!(LandlordDocument::allows_resubmission(None));
        assert!(!LandlordDocument::allows_resubmission(Some(&doc)));

        doc.status = DocumentStatus::Rejected;
        assert!(LandlordDocument::allows_resubmission(Some(&doc)));

        doc.status = DocumentStatus::Approved;
        assert!(!LandlordDocument::allows_resubmission(Some(&doc)));
    }
}
