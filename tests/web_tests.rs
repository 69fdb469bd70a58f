use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use meeting_rooms::access_token::AccessToken;
use meeting_rooms::booking::{MeetingBooking, MeetingId, RoomId, TimeRange};
use futures::{SinkExt, StreamExt};
use meeting_rooms::error::RepositoryResult;
use meeting_rooms::repository::{
    InMemoryMeetingRepository, InMemoryTokenRepository, MeetingRepository,
};
use meeting_rooms::web::{router, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> Router {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 14, 0, 0).unwrap();
        let review = MeetingBooking::new(
            "Budget Review".to_string(),
            RoomId(3),
            TimeRange::new(start, start + Duration::hours(1)),
        )
        .with_id(MeetingId(7));

        let now = Utc::now();
        let tokens = vec![
            AccessToken::new("open", MeetingId(1), "Live Session", TimeRange::new(now - Duration::minutes(10), now + Duration::minutes(50))),
            AccessToken::new("early", MeetingId(2), "Tomorrow", TimeRange::new(now + Duration::days(1), now + Duration::days(1) + Duration::hours(1))),
            AccessToken::new("late", MeetingId(3), "Yesterday", TimeRange::new(now - Duration::days(1), now - Duration::days(1) + Duration::hours(1))),
        ];

        router(AppState::new(
            Arc::new(InMemoryMeetingRepository::new(vec![review])),
            Arc::new(InMemoryTokenRepository::new(tokens)),
        ))
    }

    fn failing_app() -> Router {
        router(AppState::new(
            Arc::new(InMemoryMeetingRepository::failing("connection reset")),
            Arc::new(InMemoryTokenRepository::failing("connection reset")),
        ))
    }

    async fn parse_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validate_range_endpoint() {
        let response = app()
            .oneshot(post_json(
                "/api/ranges/validate",
                json!({"kind": "time", "start": "10:00", "end": "09:00"}),
            ))
            .await
            .unwrap();
        let body = parse_body(response).await;
        assert_eq!(body["valid"], false);
        assert_eq!(body["message"], "The end time must be after the start time");

        let response = app()
            .oneshot(post_json("/api/ranges/validate", json!({"kind": "dateTime"})))
            .await
            .unwrap();
        let body = parse_body(response).await;
        assert_eq!(body["valid"], true);
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn test_availability_endpoint_reports_conflicts() {
        let response = app()
            .oneshot(post_json(
                "/api/rooms/availability",
                json!({
                    "roomId": 3,
                    "start": "2024-02-01T14:30:00Z",
                    "end": "2024-02-01T15:30:00Z"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_body(response).await;
        assert_eq!(body["available"], false);
        assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);
        assert_eq!(body["conflicts"][0]["title"], "Budget Review");
        assert_eq!(body["summary"][0], "Budget Review (2024-02-01 14:00 - 15:00)");
    }

    #[tokio::test]
    async fn test_availability_endpoint_back_to_back() {
        let response = app()
            .oneshot(post_json(
                "/api/rooms/availability",
                json!({
                    "roomId": 3,
                    "start": "2024-02-01T15:00:00Z",
                    "end": "2024-02-01T16:00:00Z"
                }),
            ))
            .await
            .unwrap();

        let body = parse_body(response).await;
        assert_eq!(body["available"], true);
    }

    #[tokio::test]
    async fn test_availability_endpoint_backend_failure() {
        let response = failing_app()
            .oneshot(post_json(
                "/api/rooms/availability",
                json!({
                    "roomId": 3,
                    "start": "2024-02-01T15:00:00Z",
                    "end": "2024-02-01T16:00:00Z"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = parse_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("connection reset"));
        assert!(body.get("available").is_none());
    }

    #[tokio::test]
    async fn test_booking_check_outcomes() {
        let response = app()
            .oneshot(post_json(
                "/api/bookings/check",
                json!({
                    "roomId": 3,
                    "start": "2024-02-01T14:30:00Z",
                    "end": "2024-02-01T15:30:00Z",
                    "title": "Design Sync"
                }),
            ))
            .await
            .unwrap();
        let body = parse_body(response).await;
        assert_eq!(body["outcome"], "conflicts");

        let response = app()
            .oneshot(post_json(
                "/api/bookings/check",
                json!({
                    "roomId": 3,
                    "start": "2024-02-01T16:00:00Z",
                    "end": "2024-02-01T16:00:00Z"
                }),
            ))
            .await
            .unwrap();
        let body = parse_body(response).await;
        assert_eq!(body["outcome"], "rangeInvalid");

        let response = app()
            .oneshot(post_json(
                "/api/bookings/check",
                json!({
                    "roomId": 3,
                    "start": "2024-02-01T16:00:00Z",
                    "end": "2024-02-01T17:00:00Z",
                    "title": "Design Sync"
                }),
            ))
            .await
            .unwrap();
        let body = parse_body(response).await;
        assert_eq!(body["outcome"], "ready");
        assert_eq!(body["booking"]["roomId"], 3);

        let response = app()
            .oneshot(post_json("/api/bookings/check", json!({"title": "Draft"})))
            .await
            .unwrap();
        let body = parse_body(response).await;
        assert_eq!(body["outcome"], "incomplete");
        assert_eq!(body["missing"], json!(["roomId", "start", "end"]));
    }

    #[tokio::test]
    async fn test_meetings_endpoint_lists_range() {
        let response = app()
            .oneshot(get("/api/meetings?start=2024-02-01T00:00:00Z&end=2024-02-02T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_body(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["title"], "Budget Review");
    }

    #[tokio::test]
    async fn test_meetings_endpoint_rejects_reversed_range() {
        let response = app()
            .oneshot(get("/api/meetings?start=2024-02-02T00:00:00Z&end=2024-02-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_access_endpoint_states() {
        for (token, status) in [
            ("open", "valid"),
            ("early", "notYetOpen"),
            ("late", "expired"),
            ("missing", "notFound"),
        ] {
            let response = app().oneshot(get(&format!("/api/access/{}", token))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = parse_body(response).await;
            assert_eq!(body["status"], status, "token {}", token);
        }
    }

    #[tokio::test]
    async fn test_access_endpoint_backend_failure_is_not_not_found() {
        let response = failing_app().oneshot(get("/api/access/open")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = parse_body(response).await;
        assert!(body.get("status").is_none());
    }

    /// Answers every room as busy after a delay, counting finished lookups.
    struct SlowRooms {
        delay: std::time::Duration,
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MeetingRepository for SlowRooms {
        async fn find_conflicts(
            &self,
            room_id: RoomId,
            range: TimeRange,
        ) -> RepositoryResult<Vec<MeetingBooking>> {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(vec![MeetingBooking::new("Busy".to_string(), room_id, range)])
        }

        async fn list_meetings(&self, _range: TimeRange) -> RepositoryResult<Vec<MeetingBooking>> {
            Ok(Vec::new())
        }
    }

    async fn spawn_socket_server(finished: Arc<AtomicUsize>) -> String {
        let rooms = SlowRooms {
            delay: std::time::Duration::from_millis(200),
            finished,
        };
        let app = router(AppState::new(
            Arc::new(rooms),
            Arc::new(InMemoryTokenRepository::new(Vec::new())),
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("ws://{}/ws/availability", address)
    }

    fn socket_request(seq: u64) -> Message {
        Message::Text(
            json!({
                "seq": seq,
                "roomId": 3,
                "start": "2024-02-01T14:00:00Z",
                "end": "2024-02-01T15:00:00Z"
            })
            .to_string(),
        )
    }

    #[tokio::test]
    async fn test_socket_replies_only_to_latest_request() {
        let finished = Arc::new(AtomicUsize::new(0));
        let url = spawn_socket_server(finished.clone()).await;
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        socket.send(socket_request(1)).await.unwrap();
        socket.send(socket_request(2)).await.unwrap();

        let reply = tokio::time::timeout(std::time::Duration::from_secs(2), socket.next())
            .await
            .expect("reply should arrive")
            .unwrap()
            .unwrap();
        let reply: Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        assert_eq!(reply["seq"], 2);
        assert_eq!(reply["available"], false);

        // The first check was aborted rather than left to finish.
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        let extra =
            tokio::time::timeout(std::time::Duration::from_millis(400), socket.next()).await;
        assert!(extra.is_err(), "superseded request must not get a reply");
    }

    #[tokio::test]
    async fn test_socket_close_cancels_in_flight_check() {
        let finished = Arc::new(AtomicUsize::new(0));
        let url = spawn_socket_server(finished.clone()).await;
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        socket.send(socket_request(1)).await.unwrap();
        socket.close(None).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
