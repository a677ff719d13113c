use axum::Router;
use mongodb::bson::doc;
use std::sync::Arc;
use std::time::Duration;

use examhall_api::middlewares::auth::{JwtClaims, JwtService};
use examhall_api::{config::Config, create_router, services::AppState};

/// Builds the full router against the test Mongo/Redis instances. Returns
/// None when those services are unreachable so the suite skips cleanly on
/// machines without the docker stack.
pub async fn try_create_test_app() -> Option<(Router, Config)> {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    let config = Config::load().expect("Failed to load test configuration");

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to build test MongoDB client");

    let ping = tokio::time::timeout(
        Duration::from_secs(2),
        mongo_client
            .database(&config.mongo_database)
            .run_command(doc! { "ping": 1 }),
    )
    .await;
    if !matches!(ping, Ok(Ok(_))) {
        eprintln!("skipping: test MongoDB is not reachable at {}", config.mongo_uri);
        return None;
    }

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to build test Redis client");

    let app_state = match tokio::time::timeout(
        Duration::from_secs(5),
        AppState::new(config.clone(), mongo_client.clone(), redis_client),
    )
    .await
    {
        Ok(Ok(state)) => Arc::new(state),
        _ => {
            eprintln!("skipping: test Redis is not reachable at {}", config.redis_uri);
            return None;
        }
    };

    seed_test_tasks(&mongo_client, &config.mongo_database).await;
    flush_task_pools(&config.redis_uri).await;

    Some((create_router(app_state), config))
}

/// Mints a bearer token the way the external identity provider would.
pub fn auth_token(config: &Config, user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp() as usize;
    JwtService::new(&config.jwt_secret)
        .generate_token(JwtClaims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + 3600,
        })
        .expect("Failed to mint test token")
}

/// Seeds writing tasks for the academic exam only; the general pool stays
/// empty on purpose so the no-tasks-available path is testable.
async fn seed_test_tasks(mongo_client: &mongodb::Client, db_name: &str) {
    let db = mongo_client.database(db_name);
    let tasks = db.collection::<mongodb::bson::Document>("writing_tasks");

    let fixtures = vec![
        doc! {
            "_id": "t1-academic-001",
            "slot": "task1",
            "exam_type": "academic",
            "question_text": "The chart below shows average commute times in four cities.",
            "image_url": "images/writing/commute-chart.png",
            "source": "fixtures"
        },
        doc! {
            "_id": "t1-academic-002",
            "slot": "task1",
            "exam_type": "academic",
            "question_text": "The diagram below shows the life cycle of a honey bee.",
            "image_url": "images/writing/bee-cycle.png",
            "source": "fixtures"
        },
        doc! {
            "_id": "t2-academic-001",
            "slot": "task2",
            "exam_type": "academic",
            "question_text": "Some people believe museums should be free of charge. Discuss both views and give your opinion."
        },
        doc! {
            "_id": "t2-academic-002",
            "slot": "task2",
            "exam_type": "academic",
            "question_text": "Remote work benefits employees more than employers. To what extent do you agree?"
        },
    ];

    for fixture in fixtures {
        let id = fixture.get_str("_id").unwrap().to_string();
        tasks
            .replace_one(doc! { "_id": &id }, &fixture)
            .with_options(
                mongodb::options::ReplaceOptions::builder()
                    .upsert(true)
                    .build(),
            )
            .await
            .expect("Failed to seed writing task");
    }
}

/// Drops cached pool snapshots so freshly seeded tasks are always visible.
async fn flush_task_pools(redis_uri: &str) {
    let client = redis::Client::open(redis_uri.to_string()).expect("Failed to open Redis");
    let mut conn = client
        .get_connection_manager()
        .await
        .expect("Failed to get Redis connection");

    let keys: Vec<String> = redis::cmd("KEYS")
        .arg("taskpool:*")
        .query_async(&mut conn)
        .await
        .unwrap_or_default();

    if !keys.is_empty() {
        let _: () = redis::cmd("DEL")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .expect("Failed to flush task pool keys");
    }
}
