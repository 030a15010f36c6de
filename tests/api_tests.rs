// tests/api_tests.rs

use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;
use trivia_backend::{
    config::Config,
    models::question::{Question, load_question_bank},
    routes,
    state::AppState,
    store::{local::JsonFileStore, memory::MemoryRemoteStore},
};

struct TestApp {
    address: String,
    remote: Arc<MemoryRemoteStore>,
    questions: Vec<Question>,
    _local_dir: TempDir,
}

/// Helper function to spawn the app on a random port for testing.
/// Remote data lives in memory and local data in a temp directory.
async fn spawn_app() -> TestApp {
    let local_dir = TempDir::new().expect("Failed to create temp dir");
    let questions =
        load_question_bank(Path::new("data/questions.json")).expect("Failed to load questions");

    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        questions_path: "data/questions.json".into(),
        local_data_dir: local_dir.path().to_path_buf(),
        wrong_penalty: 0,
    };

    let local = JsonFileStore::open(local_dir.path()).expect("Failed to open local store");
    let remote = Arc::new(MemoryRemoteStore::new());
    let state = AppState::new(config, questions.clone(), Arc::new(local), remote.clone());

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        remote,
        questions,
        _local_dir: local_dir,
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn start_game(&self, client: &reqwest::Client, level_id: u32, difficulty: &str) -> Value {
        let response = client
            .post(self.url("/api/games"))
            .json(&json!({ "levelId": level_id, "difficulty": difficulty, "playerName": "Tester" }))
            .send()
            .await
            .expect("Failed to start game");
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    /// Plays a whole level, answering the first `correct` questions right.
    /// Returns the completion response.
    async fn play_level(
        &self,
        client: &reqwest::Client,
        level_id: u32,
        difficulty: &str,
        correct: usize,
    ) -> Value {
        let started = self.start_game(client, level_id, difficulty).await;
        let session_id = started["sessionId"].as_str().unwrap().to_string();
        let count = started["questions"].as_array().unwrap().len();
        let offset = (level_id as usize - 1) * 20;

        for i in 0..count {
            let answer = self.questions[offset + i].correct_answer;
            let selected = if i < correct { answer } else { (answer + 1) % 4 };

            let outcome: Value = client
                .post(self.url(&format!("/api/games/{}/answer", session_id)))
                .json(&json!({ "selectedIndex": selected, "timeRemaining": 10 }))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(outcome["isCorrect"], i < correct);

            if i + 1 < count {
                let next = client
                    .post(self.url(&format!("/api/games/{}/next", session_id)))
                    .send()
                    .await
                    .unwrap();
                assert_eq!(next.status().as_u16(), 200);
            }
        }

        let response = client
            .post(self.url(&format!("/api/games/{}/complete", session_id)))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.unwrap()
    }
}

#[tokio::test]
async fn unknown_route_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn level_menu_starts_with_first_level_open() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let menu: Vec<Value> = client
        .get(app.url("/api/levels"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // 25 questions: a full level and a level of 5
    assert_eq!(menu.len(), 2);
    assert_eq!(menu[0]["isLocked"], false);
    assert_eq!(menu[1]["isLocked"], true);
    assert_eq!(menu[1]["level"]["questionCount"], 5);

    let stats: Value = client
        .get(app.url("/api/levels/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalLevels"], 2);
    assert_eq!(stats["levelsUnlocked"], 1);
    assert_eq!(stats["completionPercentage"], 0);
}

#[tokio::test]
async fn level_questions_hide_answers() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let questions: Vec<Value> = client
        .get(app.url("/api/levels/2/questions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(questions.len(), 5);
    assert!(questions[0].get("correctAnswer").is_none());

    let missing = client.get(app.url("/api/levels/9/questions")).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn start_game_rejects_locked_and_invalid_requests() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let cases = [
        (json!({ "levelId": 2, "difficulty": "casual" }), 403),
        (json!({ "levelId": 7, "difficulty": "casual" }), 404),
        (json!({ "levelId": 1, "difficulty": "impossible" }), 400),
        (json!({ "levelId": 0, "difficulty": "casual" }), 400),
    ];

    for (body, expected) in cases {
        let response = client
            .post(app.url("/api/games"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), expected, "body: {}", body);
    }
}

#[tokio::test]
async fn game_guards_out_of_order_calls() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let started = app.start_game(&client, 1, "casual").await;
    let session_id = started["sessionId"].as_str().unwrap();
    assert!(started["timeLimit"].is_null());

    let out_of_range = client
        .post(app.url(&format!("/api/games/{}/answer", session_id)))
        .json(&json!({ "selectedIndex": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(out_of_range.status().as_u16(), 400);

    let early_complete = client
        .post(app.url(&format!("/api/games/{}/complete", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(early_complete.status().as_u16(), 400);

    let timeout: Value = client
        .post(app.url(&format!("/api/games/{}/timeout", session_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(timeout["timedOut"], true);
    assert_eq!(timeout["pointsAwarded"], 0);

    let abandon = client
        .delete(app.url(&format!("/api/games/{}", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(abandon.status().as_u16(), 204);

    let gone = client
        .post(app.url(&format!("/api/games/{}/next", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status().as_u16(), 404);
}

#[tokio::test]
async fn perfect_blitz_run_unlocks_next_level() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let result = app.play_level(&client, 1, "blitz", 20).await;

    assert_eq!(result["passed"], true);
    assert_eq!(result["stars"], 5);
    assert_eq!(result["nextLevelUnlocked"], true);
    assert_eq!(result["accuracy"]["percentage"], 100.0);
    assert_eq!(result["accuracy"]["grade"], "A+");
    assert_eq!(result["stats"]["perfectBonus"], 500);
    assert_eq!(result["stats"]["longestStreak"], 20);
    assert_eq!(result["ledger"]["success"], true);
    assert_eq!(result["updatedProgress"]["completed"], true);

    let menu: Vec<Value> = client
        .get(app.url("/api/levels"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(menu[1]["isLocked"], false);

    // Level 2 is now playable.
    app.start_game(&client, 2, "challenge").await;
}

#[tokio::test]
async fn completion_is_recorded_once() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let started = app.start_game(&client, 1, "casual").await;
    let session_id = started["sessionId"].as_str().unwrap().to_string();
    for i in 0..20 {
        client
            .post(app.url(&format!("/api/games/{}/answer", session_id)))
            .json(&json!({ "selectedIndex": app.questions[i].correct_answer }))
            .send()
            .await
            .unwrap();
        if i < 19 {
            client
                .post(app.url(&format!("/api/games/{}/next", session_id)))
                .send()
                .await
                .unwrap();
        }
    }

    let complete_url = app.url(&format!("/api/games/{}/complete", session_id));
    let first: Value = client.post(&complete_url).send().await.unwrap().json().await.unwrap();
    let second: Value = client.post(&complete_url).send().await.unwrap().json().await.unwrap();

    assert_eq!(first["stats"]["finalScore"], second["stats"]["finalScore"]);
    assert_eq!(second["updatedProgress"]["attempts"], 1);

    let scores: Vec<Value> = client
        .get(app.url("/api/scores"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0]["playerName"], "Tester");
    assert!(scores[0]["userId"].is_null());
}

#[tokio::test]
async fn failing_run_keeps_next_level_locked() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let result = app.play_level(&client, 1, "casual", 11).await;

    assert_eq!(result["passed"], false);
    assert_eq!(result["stars"], 0);
    assert_eq!(result["nextLevelUnlocked"], false);

    let progress: Value = client
        .get(app.url("/api/progress"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(progress["1"]["attempts"], 1);
    assert_eq!(progress["2"]["isUnlocked"], false);
}

#[tokio::test]
async fn leaderboard_falls_back_to_local_cache() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.play_level(&client, 1, "casual", 15).await;

    let remote: Value = client
        .get(app.url("/api/scores/leaderboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(remote["source"], "remote");
    assert_eq!(remote["entries"].as_array().unwrap().len(), 1);

    app.remote.set_offline(true);

    // Offline games still land in the local cache.
    let offline = app.play_level(&client, 2, "casual", 5).await;
    assert_eq!(offline["ledger"]["success"], false);

    let fallback: Value = client
        .get(app.url("/api/scores/leaderboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fallback["source"], "local");
    assert_eq!(fallback["entries"].as_array().unwrap().len(), 2);

    let all = client.get(app.url("/api/scores")).send().await.unwrap();
    assert_eq!(all.status().as_u16(), 503);
}

#[tokio::test]
async fn level_scores_respect_limit() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    for correct in [12, 16, 20] {
        app.play_level(&client, 1, "casual", correct).await;
    }

    let top: Vec<Value> = client
        .get(app.url("/api/scores/level/1?limit=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(top.len(), 2);
    assert!(top[0]["score"].as_i64() >= top[1]["score"].as_i64());
    assert_eq!(top[0]["percentage"], 100.0);

    let recent: Vec<Value> = client
        .get(app.url("/api/scores/recent"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(recent.len(), 3);

    let local: Vec<Value> = client
        .get(app.url("/api/scores/local"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(local.len(), 3);
}
