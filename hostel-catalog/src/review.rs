use hostel_core::listing::{NewReview, RatingSummary, Review};
use serde::Deserialize;
use uuid::Uuid;

use crate::InputError;

pub const MAX_COMMENT_CHARS: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewInput {
    pub rating: Option<i16>,
    pub comment: Option<String>,
}

impl ReviewInput {
    pub fn validate(self, hostel_id: Uuid, user_id: Uuid) -> Result<NewReview, InputError> {
        let rating = self.rating.ok_or_else(|| InputError("rating is required".to_string()))?;
        if !(1..=5).contains(&rating) {
            return Err(InputError("rating must be between 1 and 5".to_string()));
        }

        let comment = self.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        if comment.as_ref().is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS) {
            return Err(InputError(format!(
                "comment cannot exceed {} characters",
                MAX_COMMENT_CHARS
            )));
        }

        Ok(NewReview {
            hostel_id,
            user_id,
            rating,
            comment,
        })
    }
}

/// Average rounded to one decimal place; zero when there are no reviews.
pub fn summarize(reviews: &[Review]) -> RatingSummary {
    if reviews.is_empty() {
        return RatingSummary {
            average_rating: 0.0,
            review_count: 0,
        };
    }

    let total: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
    let average = total as f64 / reviews.len() as f64;

    RatingSummary {
        average_rating: (average * 10.0).round() / 10.0,
        review_count: reviews.len() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: i16) -> Review {
        NewReview {
            hostel_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            rating,
            comment: None,
        }
        .into_review(Uuid::new_v4())
    }

    #[test]
    fn test_rating_bounds() {
        let hostel = Uuid::new_v4();
        let user = Uuid::new_v4();
        for bad in [0, 6, -1] {
            let input = ReviewInput {
                rating: Some(bad),
                comment: None,
            };
            assert!(input.validate(hostel, user).is_err());
        }
        let ok = ReviewInput {
            rating: Some(5),
            comment: Some("  Clean and quiet  ".to_string()),
        }
        .validate(hostel, user)
        .unwrap();
        assert_eq!(ok.comment.as_deref(), Some("Clean and quiet"));
    }

    #[test]
    fn test_long_comment_rejected() {
        let input = ReviewInput {
            rating: Some(4),
            comment: Some("a".repeat(MAX_COMMENT_CHARS + 1)),
        };
        assert!(input.validate(Uuid::new_v4(), Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_summary_rounds_to_one_place() {
        let summary = summarize(&[review(5), review(4), review(4)]);
        assert_eq!(summary.review_count, 3);
        assert_eq!(summary.average_rating, 4.3);

        let empty = summarize(&[]);
        assert_eq!(empty.review_count, 0);
        assert_eq!(empty.average_rating, 0.0);
    }
}
