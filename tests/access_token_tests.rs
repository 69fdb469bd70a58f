use chrono::{DateTime, Duration, TimeZone, Utc};
use meeting_rooms::access_token::{
    access_grace, classify_window, AccessToken, AccessTokenValidator, TokenValidationResult,
    ACCESS_GRACE_MINUTES,
};
use meeting_rooms::booking::{MeetingId, TimeRange};
use meeting_rooms::repository::InMemoryTokenRepository;

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, minute, 0).unwrap()
    }

    fn sample_token() -> AccessToken {
        AccessToken::new(
            "abc123",
            MeetingId(42),
            "Quarterly Planning",
            TimeRange::new(at(10, 0), at(11, 0)),
        )
    }

    fn validator() -> AccessTokenValidator<InMemoryTokenRepository> {
        AccessTokenValidator::new(InMemoryTokenRepository::new(vec![sample_token()]))
    }

    #[test]
    fn test_grace_margin_is_fifteen_minutes() {
        assert_eq!(ACCESS_GRACE_MINUTES, 15);
        assert_eq!(access_grace(), Duration::minutes(15));

        let window = sample_token().grace_window();
        assert_eq!(window.start, at(9, 45));
        assert_eq!(window.end, at(11, 15));
    }

    #[test]
    fn test_window_classification() {
        assert_eq!(classify_window(sample_token(), at(9, 44)), TokenValidationResult::NotYetOpen);
        assert!(classify_window(sample_token(), at(9, 46)).is_valid());
        assert!(classify_window(sample_token(), at(10, 30)).is_valid());
        assert!(classify_window(sample_token(), at(11, 14)).is_valid());
        assert_eq!(classify_window(sample_token(), at(11, 16)), TokenValidationResult::Expired);
    }

    #[test]
    fn test_grace_bounds_are_inclusive() {
        assert!(classify_window(sample_token(), at(9, 45)).is_valid());
        assert!(classify_window(sample_token(), at(11, 15)).is_valid());
        assert_eq!(
            classify_window(sample_token(), at(9, 45) - Duration::seconds(1)),
            TokenValidationResult::NotYetOpen
        );
        assert_eq!(
            classify_window(sample_token(), at(11, 15) + Duration::seconds(1)),
            TokenValidationResult::Expired
        );
    }

    #[tokio::test]
    async fn test_valid_token_carries_meeting() {
        let result = validator().validate_token("abc123", at(10, 5)).await.unwrap();

        match result {
            TokenValidationResult::Valid { meeting } => {
                assert_eq!(meeting.meeting_id, MeetingId(42));
                assert_eq!(meeting.meeting_title, "Quarterly Planning");
            }
            other => panic!("expected valid token, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found_regardless_of_time() {
        let validator = validator();

        for now in [at(0, 0), at(9, 50), at(10, 30), at(23, 59)] {
            let result = validator.validate_token("missing", now).await.unwrap();
            assert_eq!(result, TokenValidationResult::NotFound);
        }
    }

    #[tokio::test]
    async fn test_empty_token_is_not_found_without_lookup() {
        let validator = AccessTokenValidator::new(InMemoryTokenRepository::failing("timeout"));

        let result = validator.validate_token("", at(10, 0)).await.unwrap();
        assert_eq!(result, TokenValidationResult::NotFound);
    }

    #[tokio::test]
    async fn test_token_is_looked_up_verbatim() {
        let validator = validator();

        let padded = validator.validate_token(" abc123 ", at(10, 0)).await.unwrap();
        assert_eq!(padded, TokenValidationResult::NotFound);

        let whitespace = validator.validate_token("   ", at(10, 0)).await.unwrap();
        assert_eq!(whitespace, TokenValidationResult::NotFound);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_not_found() {
        let validator = AccessTokenValidator::new(InMemoryTokenRepository::failing("timeout"));

        let result = validator.validate_token("abc123", at(10, 0)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_validation_is_idempotent() {
        let validator = validator();

        let first = validator.validate_token("abc123", at(11, 16)).await.unwrap();
        let second = validator.validate_token("abc123", at(11, 16)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, TokenValidationResult::Expired);
    }

    #[test]
    fn test_validate_token_blocking() {
        let result = tokio_test::block_on(validator().validate_token("abc123", at(9, 44))).unwrap();
        assert_eq!(result, TokenValidationResult::NotYetOpen);
    }

    #[test]
    fn test_result_serializes_with_status_tag() {
        let json = serde_json::to_value(TokenValidationResult::NotYetOpen).unwrap();
        assert_eq!(json["status"], "notYetOpen");

        let json = serde_json::to_value(TokenValidationResult::Valid { meeting: sample_token() }).unwrap();
        assert_eq!(json["status"], "valid");
        assert_eq!(json["meeting"]["meetingId"], 42);
    }
}
