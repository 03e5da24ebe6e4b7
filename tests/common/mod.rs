// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use edupaper::{
    config::Config,
    models::{
        paper::{Paper, PaperSettings, Question, QuestionKind},
        user::{Role, UserSummary},
    },
    routes,
    services::scoring::GradingPolicy,
    state::AppState,
    store::memory::MemoryStore,
    utils::jwt::sign_jwt,
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

pub fn test_config() -> Config {
    Config {
        database_url: "memory".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        app_env: "test".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        cors_origins: vec!["http://localhost:3000".to_string()],
        grading: GradingPolicy::default(),
    }
}

pub fn app_state(store: Arc<MemoryStore>, config: Config) -> AppState {
    AppState {
        store: store.clone(),
        notifier: store,
        config,
    }
}

pub fn token(id: Uuid, role: Role) -> String {
    sign_jwt(id, role, JWT_SECRET, 600).expect("Failed to sign test token")
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }
}

/// Spawns the app on a random port, backed by a fresh in-memory store.
pub async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let app = routes::create_router(app_state(store.clone(), test_config()));

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

pub fn user(role: &str) -> UserSummary {
    let id = Uuid::new_v4();
    UserSummary {
        id,
        name: format!("{role} {}", &id.to_string()[..8]),
        email: format!("{}@school.test", &id.to_string()[..8]),
    }
}

fn paper(
    created_by: Uuid,
    assigned_to: Vec<Uuid>,
    question: Question,
    passing_marks: Option<f64>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Paper {
    Paper {
        id: Uuid::new_v4(),
        title: "Unit Test".to_string(),
        subject: "Science".to_string(),
        created_by,
        settings: PaperSettings {
            time_limit: 60,
            total_marks: question.marks,
            passing_marks,
            max_attempts: 1,
            start_time,
            end_time,
            is_published: true,
        },
        questions: vec![question],
        assigned_to,
    }
}

/// One objective-choice question worth 10 marks, key "B", passing marks 5.
pub fn mcq_paper(
    created_by: Uuid,
    assigned_to: Vec<Uuid>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Paper {
    let question = Question {
        id: Uuid::new_v4(),
        question: "Which planet is known as the red planet?".to_string(),
        kind: QuestionKind::Mcq {
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: "B".to_string(),
        },
        marks: 10.0,
        order: 1,
        explanation: None,
    };
    paper(created_by, assigned_to, question, Some(5.0), start_time, end_time)
}

/// One essay question worth 20 marks.
pub fn essay_paper(
    created_by: Uuid,
    assigned_to: Vec<Uuid>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Paper {
    let question = Question {
        id: Uuid::new_v4(),
        question: "Explain photosynthesis.".to_string(),
        kind: QuestionKind::Essay,
        marks: 20.0,
        order: 1,
        explanation: None,
    };
    paper(created_by, assigned_to, question, None, start_time, end_time)
}

/// A window that is open for the duration of a test run.
pub fn open_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    (now - Duration::hours(1), now + Duration::hours(1))
}
