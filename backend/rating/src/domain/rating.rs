use common::audit::Audit;
use common::error::UsecaseError;
use common::events::UserType;
use serde::Serialize;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    pub id: i64,
    pub ride_id: i64,
    pub user_id: i64,
    pub user_type: UserType,
    pub rating: i16,
    pub comment: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRating {
    pub ride_id: i64,
    pub user_id: i64,
    pub user_type: UserType,
    pub rating: i16,
    pub comment: Option<String>,
}

pub fn validate_rating(rating: i16) -> Result<(), UsecaseError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(UsecaseError::Validation(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(())
}

/// Arithmetic mean of the given ratings, `0.0` when there are none.
pub fn average(ratings: &[RatingRecord]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(r.rating)).sum();
    sum as f64 / ratings.len() as f64
}

#[cfg(test)]
pub(crate) fn sample_rating(id: i64, user_id: i64, user_type: UserType, rating: i16) -> RatingRecord {
    RatingRecord {
        id,
        ride_id: 1000 + id,
        user_id,
        user_type,
        rating,
        comment: None,
        audit: Audit::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings(values: &[i16]) -> Vec<RatingRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| sample_rating(i as i64, 7, UserType::Driver, *v))
            .collect()
    }

    #[test]
    fn test_average_of_nothing_is_zero() {
        assert_eq!(average(&[]), 0.0);
    }

    #[test]
    fn test_average_is_arithmetic_mean() {
        assert_eq!(average(&ratings(&[4, 2])), 3.0);
        assert_eq!(average(&ratings(&[5])), 5.0);
        assert!((average(&ratings(&[5, 4, 4])) - 13.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_stays_within_rating_bounds() {
        let mut values = Vec::new();
        for step in 0..200i16 {
            values.push(MIN_RATING + (step * 7 + step / 3) % MAX_RATING);
            let avg = average(&ratings(&values));
            assert!(
                (f64::from(MIN_RATING)..=f64::from(MAX_RATING)).contains(&avg),
                "average {avg} out of bounds for {values:?}"
            );
        }
    }

    #[test]
    fn test_validate_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(matches!(validate_rating(0), Err(UsecaseError::Validation(_))));
        assert!(matches!(validate_rating(6), Err(UsecaseError::Validation(_))));
        assert!(matches!(validate_rating(-3), Err(UsecaseError::Validation(_))));
    }
}
