#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use async_trait::async_trait;
    use redis::RedisError;
    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{json, Value};
    use shared::models::StorageMode;
    use shared::Poll;
    use crate::build_rocket;
    use crate::cache::{run_reconnect_task, CacheError, CacheResult, ConnectionState, VoteCache};
    use crate::cors::CORS;
    use crate::processor::VoteProcessor;
    use crate::routes::AppState;

    const KEY: &str = "votes";

    /// In-process stand-in for Redis. Starts disconnected.
    #[derive(Default)]
    struct FakeCache {
        state: ConnectionState,
        fields: Mutex<HashMap<String, String>>,
        failing: AtomicBool,
        reachable: AtomicBool,
        writes: AtomicUsize,
    }

    impl FakeCache {
        fn disconnected() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn connected() -> Arc<Self> {
            let cache = Self::default();
            cache.reachable.store(true, Ordering::SeqCst);
            cache.state.set(true);
            Arc::new(cache)
        }

        fn seed(&self, pairs: &[(&str, &str)]) {
            let mut fields = self.fields.lock().unwrap();
            for (k, v) in pairs {
                fields.insert(k.to_string(), v.to_string());
            }
        }

        fn field(&self, name: &str) -> Option<String> {
            self.fields.lock().unwrap().get(name).cloned()
        }

        fn check(&self) -> CacheResult<()> {
            if !self.state.is_connected() {
                return Err(CacheError::Disconnected);
            }
            if self.failing.load(Ordering::SeqCst) {
                let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
                return Err(CacheError::Redis(RedisError::from(refused)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl VoteCache for FakeCache {
        fn connection(&self) -> &ConnectionState {
            &self.state
        }

        async fn connect(&self) -> bool {
            let ok = self.reachable.load(Ordering::SeqCst);
            self.state.set(ok);
            ok
        }

        async fn ping(&self) -> CacheResult<()> {
            if !self.state.is_connected() {
                return Err(CacheError::Disconnected);
            }
            if !self.reachable.load(Ordering::SeqCst) {
                self.state.set(false);
                let dropped = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
                return Err(CacheError::Redis(RedisError::from(dropped)));
            }
            Ok(())
        }

        async fn read_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
            self.check()?;
            assert_eq!(key, KEY);
            Ok(self.fields.lock().unwrap().clone())
        }

        async fn write_field(&self, key: &str, field: &str, delta: i64) -> CacheResult<i64> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            assert_eq!(key, KEY);
            let mut fields = self.fields.lock().unwrap();
            let current: i64 = fields.get(field).and_then(|v| v.parse().ok()).unwrap_or(0);
            fields.insert(field.to_string(), (current + delta).to_string());
            Ok(current + delta)
        }

        async fn set_fields(&self, key: &str, values: &[(String, u64)]) -> CacheResult<()> {
            self.check()?;
            assert_eq!(key, KEY);
            let mut fields = self.fields.lock().unwrap();
            for (field, value) in values {
                fields.insert(field.clone(), value.to_string());
            }
            Ok(())
        }
    }

    fn processor(cache: &Arc<FakeCache>) -> Arc<VoteProcessor> {
        Arc::new(VoteProcessor::new(Poll::default(), KEY, cache.clone()))
    }

    fn count(processor: &VoteProcessor, option: &str) -> u64 {
        processor.results().votes_for(option).unwrap()
    }

    async fn eventually(check: impl Fn() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check()
    }

    async fn client(cache: &Arc<FakeCache>) -> Client {
        let state = AppState::new(processor(cache));
        let rocket = build_rocket(rocket::build(), state, CORS::new(vec![]));
        Client::tracked(rocket).await.unwrap()
    }

    #[tokio::test]
    async fn test_vote_is_mirrored_to_cache() {
        let cache = FakeCache::connected();
        let processor = processor(&cache);

        let results = processor.record_vote("Design").unwrap();
        assert_eq!(results.total_votes, 1);
        assert_eq!(results.votes_for("Design"), Some(1));
        assert_eq!(results.storage, StorageMode::Redis);

        assert!(eventually(|| cache.field("Design").as_deref() == Some("1")).await);
    }

    #[tokio::test]
    async fn test_disconnected_vote_stays_in_memory() {
        let cache = FakeCache::disconnected();
        let processor = processor(&cache);

        let results = processor.record_vote("Product").unwrap();
        assert_eq!(results.storage, StorageMode::Memory);
        assert_eq!(count(&processor, "Product"), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_cache_write_keeps_vote() {
        let cache = FakeCache::connected();
        cache.failing.store(true, Ordering::SeqCst);
        let processor = processor(&cache);

        processor.record_vote("Engineering").unwrap();
        assert!(eventually(|| cache.writes.load(Ordering::SeqCst) == 1).await);
        assert_eq!(count(&processor, "Engineering"), 1);
        assert_eq!(cache.field("Engineering"), None);
    }

    #[tokio::test]
    async fn test_hydrate_keeps_options_missing_from_cache() {
        let cache = FakeCache::disconnected();
        let processor = processor(&cache);
        processor.record_vote("Design").unwrap();
        processor.record_vote("Design").unwrap();

        cache.seed(&[("Engineering", "3"), ("Product", "1")]);
        cache.state.set(true);
        processor.hydrate().await;

        assert_eq!(count(&processor, "Engineering"), 3);
        assert_eq!(count(&processor, "Product"), 1);
        assert_eq!(count(&processor, "Design"), 2);
        assert_eq!(processor.results().total_votes, 6);
    }

    #[tokio::test]
    async fn test_hydrate_non_numeric_is_zero() {
        let cache = FakeCache::connected();
        cache.seed(&[("Engineering", "abc"), ("Product", "4")]);
        let processor = processor(&cache);

        processor.hydrate().await;
        assert_eq!(count(&processor, "Engineering"), 0);
        assert_eq!(count(&processor, "Product"), 4);
    }

    #[tokio::test]
    async fn test_hydrate_huge_count_still_serves_results() {
        let cache = FakeCache::connected();
        cache.seed(&[("Engineering", "18446744073709551615"), ("Product", "1")]);
        let processor = processor(&cache);

        processor.hydrate().await;
        let results = processor.record_vote("Engineering").unwrap();
        assert_eq!(results.votes_for("Engineering"), Some(u64::MAX));
        assert_eq!(results.total_votes, u64::MAX);
    }

    #[tokio::test]
    async fn test_hydrate_skipped_or_failed_leaves_store() {
        let cache = FakeCache::disconnected();
        cache.seed(&[("Engineering", "9")]);
        let processor = processor(&cache);
        processor.record_vote("Product").unwrap();

        processor.hydrate().await;
        assert_eq!(count(&processor, "Engineering"), 0);

        cache.state.set(true);
        cache.failing.store(true, Ordering::SeqCst);
        processor.hydrate().await;
        assert_eq!(count(&processor, "Engineering"), 0);
        assert_eq!(count(&processor, "Product"), 1);
    }

    #[tokio::test]
    async fn test_reset_zeroes_store_and_cache() {
        let cache = FakeCache::connected();
        cache.seed(&[("Engineering", "5"), ("Product", "2"), ("Design", "1")]);
        let processor = processor(&cache);
        processor.hydrate().await;
        assert_eq!(processor.results().total_votes, 8);

        processor.reset().await;
        let results = processor.results();
        assert_eq!(results.total_votes, 0);
        assert!(results.results.iter().all(|r| r.votes == 0));
        for option in ["Engineering", "Product", "Design"] {
            assert_eq!(cache.field(option).as_deref(), Some("0"));
        }
    }

    #[tokio::test]
    async fn test_reset_survives_cache_failure() {
        let cache = FakeCache::connected();
        let processor = processor(&cache);
        processor.record_vote("Design").unwrap();
        cache.failing.store(true, Ordering::SeqCst);

        processor.reset().await;
        assert_eq!(processor.results().total_votes, 0);
    }

    #[tokio::test]
    async fn test_listener_hydrates_on_every_connect() {
        let cache = FakeCache::disconnected();
        cache.seed(&[("Engineering", "2")]);
        let processor = processor(&cache);
        let listener = processor.spawn_hydration_listener();

        cache.reachable.store(true, Ordering::SeqCst);
        assert!(cache.connect().await);
        assert!(eventually(|| count(&processor, "Engineering") == 2).await);

        cache.state.set(false);
        cache.seed(&[("Engineering", "7"), ("Design", "1")]);
        cache.state.set(true);
        assert!(eventually(|| count(&processor, "Engineering") == 7).await);
        assert_eq!(count(&processor, "Design"), 1);

        listener.abort();
    }

    #[tokio::test]
    async fn test_listener_hydrates_when_already_connected() {
        let cache = FakeCache::connected();
        cache.seed(&[("Product", "4")]);
        let processor = processor(&cache);
        let listener = processor.spawn_hydration_listener();

        assert!(eventually(|| count(&processor, "Product") == 4).await);
        listener.abort();
    }

    #[tokio::test]
    async fn test_supervisor_reconnects_and_hydrates() {
        let cache = FakeCache::disconnected();
        cache.seed(&[("Design", "5")]);
        let processor = processor(&cache);
        let listener = processor.spawn_hydration_listener();
        let supervisor = tokio::spawn(run_reconnect_task(cache.clone(), Duration::from_millis(10)));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!cache.is_connected());
        assert_eq!(count(&processor, "Design"), 0);

        cache.reachable.store(true, Ordering::SeqCst);
        assert!(eventually(|| count(&processor, "Design") == 5).await);
        assert_eq!(processor.storage_mode(), StorageMode::Redis);

        supervisor.abort();
        listener.abort();
    }

    #[tokio::test]
    async fn test_supervisor_detects_idle_outage() {
        let cache = FakeCache::connected();
        cache.seed(&[("Engineering", "1")]);
        let processor = processor(&cache);
        let listener = processor.spawn_hydration_listener();
        let supervisor = tokio::spawn(run_reconnect_task(cache.clone(), Duration::from_millis(10)));
        assert!(eventually(|| count(&processor, "Engineering") == 1).await);

        // Redis restarts with different data while no votes come in.
        cache.reachable.store(false, Ordering::SeqCst);
        assert!(eventually(|| processor.storage_mode() == StorageMode::Memory).await);
        cache.seed(&[("Engineering", "4")]);
        cache.reachable.store(true, Ordering::SeqCst);

        assert!(eventually(|| count(&processor, "Engineering") == 4).await);
        assert_eq!(processor.storage_mode(), StorageMode::Redis);

        supervisor.abort();
        listener.abort();
    }

    #[rocket::async_test]
    async fn test_health() {
        let client = client(&FakeCache::disconnected()).await;
        let response = client.get("/api/health").dispatch().await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "backend");
        assert_eq!(body["storage"], "memory");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[rocket::async_test]
    async fn test_poll_metadata() {
        let client = client(&FakeCache::disconnected()).await;
        let response = client.get("/api/poll").dispatch().await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["question"], "Which team should host the next townhall?");
        assert_eq!(body["options"], json!(["Engineering", "Product", "Design"]));
    }

    #[rocket::async_test]
    async fn test_vote_scenario() {
        let client = client(&FakeCache::disconnected()).await;

        let response = client.post("/api/vote").json(&json!({ "option": "Design" })).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["message"], "Vote accepted");
        assert_eq!(body["selectedOption"], "Design");
        assert_eq!(body["question"], "Which team should host the next townhall?");
        assert_eq!(body["totalVotes"], 1);
        assert_eq!(body["storage"], "memory");
        assert!(body["results"].as_array().unwrap().contains(&json!({ "option": "Design", "votes": 1 })));

        let response = client.post("/api/vote").json(&json!({ "option": "Engineering" })).dispatch().await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["totalVotes"], 2);

        let response = client.get("/api/results").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["totalVotes"], 2);
        assert_eq!(body["results"], json!([
            { "option": "Engineering", "votes": 1 },
            { "option": "Product", "votes": 0 },
            { "option": "Design", "votes": 1 },
        ]));
    }

    #[rocket::async_test]
    async fn test_vote_reports_redis_storage() {
        let cache = FakeCache::connected();
        let client = client(&cache).await;

        let response = client.post("/api/vote").json(&json!({ "option": "Product" })).dispatch().await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["storage"], "redis");
        assert!(eventually(|| cache.field("Product").as_deref() == Some("1")).await);
    }

    #[rocket::async_test]
    async fn test_invalid_votes_rejected() {
        let client = client(&FakeCache::disconnected()).await;
        let bodies = [
            r#"{"option":"Unknown Team"}"#,
            r#"{}"#,
            r#"{"option":null}"#,
            r#"not json"#,
        ];

        for raw in bodies {
            let response = client.post("/api/vote")
                .header(ContentType::JSON)
                .body(raw)
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::BadRequest, "body: {raw}");
            let body: Value = response.into_json().await.unwrap();
            assert_eq!(body["error"], "Invalid option");
            assert_eq!(body["options"], json!(["Engineering", "Product", "Design"]));
        }

        let body: Value = client.get("/api/results").dispatch().await.into_json().await.unwrap();
        assert_eq!(body["totalVotes"], 0);
    }

    #[rocket::async_test]
    async fn test_fail_and_not_found() {
        let client = client(&FakeCache::disconnected()).await;

        let response = client.get("/api/fail").dispatch().await;
        assert_eq!(response.status(), Status::InternalServerError);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "Forced failure for alert testing");

        let response = client.get("/api/does-not-exist").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "Not found");
    }

    #[rocket::async_test]
    async fn test_cors_headers() {
        let client = client(&FakeCache::disconnected()).await;

        let response = client.options("/api/vote")
            .header(Header::new("Origin", "http://localhost:8080"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            response.headers().get_one("Access-Control-Allow-Origin"),
            Some("http://localhost:8080")
        );

        for origin in ["https://elsewhere.example", "http://localhost.attacker.example"] {
            let response = client.get("/api/poll")
                .header(Header::new("Origin", origin))
                .dispatch()
                .await;
            assert_eq!(response.headers().get_one("Access-Control-Allow-Origin"), None, "origin: {origin}");
        }
    }
}
