// tests/api_tests.rs

//! End-to-end flows. Need a running Postgres:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

mod common;

use std::collections::HashMap;

use common::{spawn_app, unique_name};
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn register_works() {
    let app = spawn_app().await;

    let response = app.register(&unique_name("u")).await;

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["access_type"], "free");
    assert!(body.get("password").is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_username_conflicts() {
    let app = spawn_app().await;
    let username = unique_name("u");

    assert_eq!(app.register(&username).await.status().as_u16(), 201);
    assert_eq!(app.register(&username).await.status().as_u16(), 409);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn pending_account_is_blocked_until_approved() {
    let app = spawn_app().await;
    let username = unique_name("u");
    app.register(&username).await;

    let login = app.login(&username).await;
    assert_eq!(login["account_state"], "pending");
    let token = format!("Bearer {}", login["token"].as_str().unwrap());

    let blocked = app
        .client
        .get(app.url("/api/practice/questions"))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(blocked.status().as_u16(), 403);

    sqlx::query("UPDATE users SET status = 'active' WHERE username = $1")
        .bind(&username)
        .execute(&app.pool)
        .await
        .unwrap();

    let allowed = app
        .client
        .get(app.url("/api/practice/questions?limit=500"))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status().as_u16(), 200);
    let questions: Vec<Value> = allowed.json().await.unwrap();
    assert!(questions.len() <= 20, "free accounts are capped");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn kill_mistake_flow() {
    let app = spawn_app().await;
    let (_, token) = app.user_with("user", "premium").await;
    let (_, ids) = app.seed_exam(1).await;
    let question_id = ids[0];

    // Wrong answer creates the record
    let feedback: Value = app
        .client
        .post(app.url("/api/practice/answers"))
        .header("Authorization", &token)
        .json(&json!({ "question_id": question_id, "selected": ["B"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feedback["correct"], false);
    assert_eq!(feedback["correct_option_ids"], json!(["A"]));

    let stats: Value = app
        .client
        .get(app.url("/api/mistakes/stats"))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["wrong"], 1);

    let review: Vec<Value> = app
        .client
        .get(app.url("/api/mistakes/review"))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(review.iter().any(|q| q["id"] == question_id));
    assert!(review.iter().all(|q| q.get("correct_option_ids").is_none()));

    // Correct review answer flips it
    let feedback: Value = app
        .client
        .post(app.url("/api/mistakes/review"))
        .header("Authorization", &token)
        .json(&json!({ "question_id": question_id, "selected": ["a"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feedback["correct"], true);

    let stats: Value = app
        .client
        .get(app.url("/api/mistakes/stats"))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["wrong"], 0);
    assert_eq!(stats["corrected"], 1);

    let cleared: Value = app
        .client
        .delete(app.url("/api/mistakes/corrected"))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["deleted"], 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn free_account_cannot_start_a_simulation() {
    let app = spawn_app().await;
    let (_, token) = app.user_with("user", "free").await;
    let (exam_id, _) = app.seed_exam(2).await;

    let response = app
        .client
        .post(app.url(&format!("/api/exams/{exam_id}/runs")))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn simulation_run_flow() {
    let app = spawn_app().await;
    let (_, token) = app.user_with("user", "premium").await;
    let (exam_id, _) = app.seed_exam(4).await;

    let started = app
        .client
        .post(app.url(&format!("/api/exams/{exam_id}/runs")))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(started.status().as_u16(), 201);
    let started: Value = started.json().await.unwrap();
    let run_id = started["run_id"].as_i64().unwrap();
    let questions = started["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 4);
    assert_eq!(started["clock"]["remaining_seconds"], 230 * 60);

    // A four-question exam never reaches the first checkpoint
    let early_break = app
        .client
        .post(app.url(&format!("/api/exams/runs/{run_id}/breaks")))
        .header("Authorization", &token)
        .json(&json!({ "answered_count": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(early_break.status().as_u16(), 400);

    // Three right, one left blank
    let mut answers: HashMap<i64, Vec<&str>> = HashMap::new();
    for q in questions.iter().take(3) {
        answers.insert(q["id"].as_i64().unwrap(), vec!["A"]);
    }

    let submitted = app
        .client
        .post(app.url(&format!("/api/exams/runs/{run_id}/submit")))
        .header("Authorization", &token)
        .json(&json!({ "answers": answers }))
        .send()
        .await
        .unwrap();
    assert_eq!(submitted.status().as_u16(), 200);
    let result: Value = submitted.json().await.unwrap();
    assert_eq!(result["score"], 3);
    assert_eq!(result["total_questions"], 4);
    assert_eq!(result["percentage"], 75.0);
    assert_eq!(result["passed"], true);

    let again = app
        .client
        .post(app.url(&format!("/api/exams/runs/{run_id}/submit")))
        .header("Authorization", &token)
        .json(&json!({ "answers": answers }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);

    let me: Value = app
        .client
        .get(app.url("/api/auth/me"))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["simulation_count"], 1);
    assert_eq!(me["average_score"], 75.0);

    let analytics: Value = app
        .client
        .get(app.url("/api/analytics/me"))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(analytics["simulations"]["attempts"], 1);
    assert_eq!(analytics["simulations"]["passed"], 1);

    // The blank answer is wrong but not a mistake record
    let stats: Value = app
        .client
        .get(app.url("/api/mistakes/stats"))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total"], 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn results_are_private_to_their_owner() {
    let app = spawn_app().await;
    let (_, owner) = app.user_with("user", "premium").await;
    let (_, other) = app.user_with("user", "premium").await;
    let (_, ids) = app.seed_exam(2).await;

    let answers: HashMap<i64, Vec<&str>> = HashMap::from([(ids[0], vec!["A"]), (ids[1], vec!["B"])]);

    let logged: Value = app
        .client
        .post(app.url("/api/practice/results"))
        .header("Authorization", &owner)
        .json(&json!({ "answers": answers, "time_spent_seconds": 90 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(logged["percentage"], 50.0);
    let result_id = logged["result_id"].as_i64().unwrap();

    let own = app
        .client
        .get(app.url(&format!("/api/analytics/results/{result_id}")))
        .header("Authorization", &owner)
        .send()
        .await
        .unwrap();
    assert_eq!(own.status().as_u16(), 200);

    let foreign = app
        .client
        .get(app.url(&format!("/api/analytics/results/{result_id}")))
        .header("Authorization", &other)
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status().as_u16(), 404);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn admin_cannot_grant_admin_but_super_admin_can() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with("admin", "premium").await;
    let (_, super_admin) = app.user_with("super_admin", "premium").await;
    let (target, _) = app.user_with("user", "free").await;

    let denied = app
        .client
        .put(app.url(&format!("/api/admin/users/{target}")))
        .header("Authorization", &admin)
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status().as_u16(), 403);

    let allowed = app
        .client
        .put(app.url(&format!("/api/admin/users/{target}")))
        .header("Authorization", &super_admin)
        .json(&json!({ "role": "admin", "access_type": "coaching" }))
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status().as_u16(), 200);

    // The target is an admin now, so plain admins can no longer touch it
    let locked = app
        .client
        .put(app.url(&format!("/api/admin/users/{target}")))
        .header("Authorization", &admin)
        .json(&json!({ "access_type": "premium" }))
        .send()
        .await
        .unwrap();
    assert_eq!(locked.status().as_u16(), 403);

    // Regular account changes stay open to admins
    let (regular, _) = app.user_with("user", "free").await;
    let access = app
        .client
        .put(app.url(&format!("/api/admin/users/{regular}")))
        .header("Authorization", &admin)
        .json(&json!({ "access_type": "premium" }))
        .send()
        .await
        .unwrap();
    assert_eq!(access.status().as_u16(), 200);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn admin_cannot_reset_a_super_admin_password() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with("admin", "premium").await;
    let (super_id, _) = app.user_with("super_admin", "premium").await;
    let username: String = sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
        .bind(super_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();

    let reset = app
        .client
        .put(app.url(&format!("/api/admin/users/{super_id}")))
        .header("Authorization", &admin)
        .json(&json!({ "password": "hijacked123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status().as_u16(), 403);

    // The old password still works and the new one does not
    let login = app.login(&username).await;
    assert!(login["token"].is_string());

    let hijacked = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "username": username, "password": "hijacked123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(hijacked.status().as_u16(), 401);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn import_reports_bad_rows() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with("admin", "premium").await;

    let report: Value = app
        .client
        .post(app.url("/api/admin/questions/import"))
        .header("Authorization", &admin)
        .json(&json!({
            "rows": [
                {
                    "Question": "Which document authorizes the project?",
                    "Option A": "Project charter",
                    "Option B": "Scope statement",
                    "Correct Answer": "A",
                    "Domain": "Process"
                },
                {
                    "Question": "Broken row",
                    "Option A": "Only one option",
                    "Correct Answer": "C"
                }
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(report["imported"], 1);
    assert_eq!(report["failed"][0]["row"], 2);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn late_submission_is_accepted_with_capped_time() {
    let app = spawn_app().await;
    let (user_id, token) = app.user_with("user", "premium").await;
    let (exam_id, ids) = app.seed_exam(2).await;

    let started: Value = app
        .client
        .post(app.url(&format!("/api/exams/{exam_id}/runs")))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let run_id = started["run_id"].as_i64().unwrap();

    // Pretend the run started an hour past its full duration
    let duration: i64 = sqlx::query_scalar(
        "UPDATE exam_runs SET started_at = NOW() - make_interval(secs => (duration_seconds + 3600)::double precision) \
         WHERE id = $1 RETURNING duration_seconds",
    )
    .bind(run_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();

    let answers: HashMap<i64, Vec<&str>> = HashMap::from([(ids[0], vec!["A"]), (ids[1], vec!["A"])]);
    let submitted = app
        .client
        .post(app.url(&format!("/api/exams/runs/{run_id}/submit")))
        .header("Authorization", &token)
        .json(&json!({ "answers": answers }))
        .send()
        .await
        .unwrap();
    assert_eq!(submitted.status().as_u16(), 200);
    let result: Value = submitted.json().await.unwrap();
    assert_eq!(result["time_spent_seconds"], duration);
    assert_eq!(result["score"], 2);

    let (mode, logged_time): (String, i64) = sqlx::query_as(
        "SELECT mode, time_spent_seconds FROM exam_results WHERE id = $1",
    )
    .bind(result["result_id"].as_i64().unwrap())
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(mode, "simulation");
    assert_eq!(logged_time, duration);

    let (count, total_time): (i32, i64) =
        sqlx::query_as("SELECT simulation_count, total_time_seconds FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
    assert_eq!(total_time, duration);
}
