// tests/api_tests.rs

mod common;

use common::{essay_paper, mcq_paper, open_window, spawn_app, token, user};
use edupaper::models::{notification::NotificationKind, user::Role};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
async fn ping_and_health_need_no_token() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let ping = app.client.get(app.url("/ping")).send().await.unwrap();
    let health = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(ping.status(), StatusCode::OK);
    let body: Value = ping.json().await.unwrap();
    assert_eq!(body["message"], "pong");
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn correct_mcq_answer_is_auto_graded_and_published() {
    // Arrange
    let app = spawn_app().await;
    let teacher = user("teacher");
    let student = user("student");
    let (start, end) = open_window();
    let paper = mcq_paper(teacher.id, vec![student.id], start, end);
    let question_id = paper.questions[0].id;
    let paper_id = paper.id;
    app.store.insert_paper(paper).await;
    app.store.insert_user(student.clone()).await;
    let student_token = token(student.id, Role::Student);

    // Act
    let started = app
        .client
        .get(app.url(&format!("/papers/{paper_id}/attempt")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(started.status(), StatusCode::CREATED);
    let started: Value = started.json().await.unwrap();
    assert_eq!(started["attempt"]["attemptNumber"], 1);
    assert_eq!(started["attempt"]["status"], "in_progress");

    let submitted = app
        .client
        .post(app.url(&format!("/papers/{paper_id}/submit")))
        .bearer_auth(&student_token)
        .json(&json!({ "answers": [{ "questionId": question_id, "answer": "B" }] }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(submitted.status(), StatusCode::OK);
    let body: Value = submitted.json().await.unwrap();
    let attempt = &body["attempt"];
    assert_eq!(attempt["status"], "auto_graded");
    assert_eq!(attempt["scoring"]["obtainedMarks"], 10.0);
    assert_eq!(attempt["scoring"]["percentage"], 100.0);
    assert_eq!(attempt["scoring"]["isPassed"], true);
    assert_eq!(attempt["answers"][0]["isCorrect"], true);

    let result = &body["result"];
    assert_eq!(result["isPublished"], true);
    assert_eq!(result["obtainedMarks"], 10.0);

    // The student can read the published result.
    let result_id = result["id"].as_str().unwrap();
    let fetched = app
        .client
        .get(app.url(&format!("/results/{result_id}")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    let fetched: Value = fetched.json().await.unwrap();
    assert_eq!(fetched["result"]["student"]["name"], student.name);

    let notifications = app.store.notifications().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::ResultPublished);
    assert_eq!(notifications[0].user_id, student.id);
}

#[tokio::test]
async fn wrong_mcq_answer_scores_zero() {
    // Arrange
    let app = spawn_app().await;
    let teacher = user("teacher");
    let student = user("student");
    let (start, end) = open_window();
    let paper = mcq_paper(teacher.id, vec![student.id], start, end);
    let question_id = paper.questions[0].id;
    let paper_id = paper.id;
    app.store.insert_paper(paper).await;
    let student_token = token(student.id, Role::Student);

    app.client
        .get(app.url(&format!("/papers/{paper_id}/attempt")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();

    // Act
    let body: Value = app
        .client
        .post(app.url(&format!("/papers/{paper_id}/submit")))
        .bearer_auth(&student_token)
        .json(&json!({ "answers": [{ "questionId": question_id, "answer": "A" }] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    let attempt = &body["attempt"];
    assert_eq!(attempt["status"], "auto_graded");
    assert_eq!(attempt["scoring"]["obtainedMarks"], 0.0);
    assert_eq!(attempt["scoring"]["percentage"], 0.0);
    assert_eq!(attempt["scoring"]["isPassed"], false);
    assert_eq!(attempt["answers"][0]["isCorrect"], false);
}

#[tokio::test]
async fn essay_is_graded_by_teacher_then_published() {
    // Arrange
    let app = spawn_app().await;
    let teacher = user("teacher");
    let student = user("student");
    let (start, end) = open_window();
    let paper = essay_paper(teacher.id, vec![student.id], start, end);
    let question_id = paper.questions[0].id;
    let paper_id = paper.id;
    app.store.insert_paper(paper).await;
    let student_token = token(student.id, Role::Student);
    let teacher_token = token(teacher.id, Role::Teacher);

    app.client
        .get(app.url(&format!("/papers/{paper_id}/attempt")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();

    let submitted: Value = app
        .client
        .post(app.url(&format!("/papers/{paper_id}/submit")))
        .bearer_auth(&student_token)
        .json(&json!({ "answers": [{ "questionId": question_id, "answer": "  Plants turn light into sugar.  " }] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(submitted["attempt"]["status"], "submitted");
    assert_eq!(submitted["attempt"]["answers"][0]["answer"], "Plants turn light into sugar.");
    assert!(submitted["result"].is_null());
    assert_eq!(app.store.result_count().await, 0);
    let attempt_id = submitted["attempt"]["id"].as_str().unwrap().to_string();

    // Act
    let graded = app
        .client
        .put(app.url(&format!("/attempts/{attempt_id}/grade")))
        .bearer_auth(&teacher_token)
        .json(&json!({
            "gradedAnswers": [{
                "questionId": question_id,
                "marksObtained": 15,
                "feedback": "Good structure <script>alert(1)</script>"
            }]
        }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(graded.status(), StatusCode::OK);
    let graded: Value = graded.json().await.unwrap();
    let attempt = &graded["attempt"];
    assert_eq!(attempt["status"], "manually_graded");
    assert_eq!(attempt["scoring"]["obtainedMarks"], 15.0);
    assert_eq!(attempt["scoring"]["percentage"], 75.0);
    assert_eq!(attempt["scoring"]["isPassed"], true);
    assert_eq!(attempt["grading"]["gradedBy"], teacher.id.to_string());

    let result = &graded["result"];
    assert_eq!(result["feedback"], "Good structure");
    assert_eq!(result["isPublished"], false);
    let result_id = result["id"].as_str().unwrap().to_string();

    // Unpublished results stay hidden from the student.
    let listed: Value = app
        .client
        .get(app.url(&format!("/results/student/{}", student.id)))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["count"], 0);

    let hidden = app
        .client
        .get(app.url(&format!("/results/{result_id}")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(hidden.status(), StatusCode::FORBIDDEN);

    // Publishing completes the attempt and notifies the student.
    let published = app
        .client
        .post(app.url(&format!("/results/{result_id}/publish")))
        .bearer_auth(&teacher_token)
        .json(&json!({ "isPublished": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(published.status(), StatusCode::OK);
    let published: Value = published.json().await.unwrap();
    assert_eq!(published["result"]["isPublished"], true);
    assert!(published["result"]["publishedAt"].is_string());

    let attempt: Value = app
        .client
        .get(app.url(&format!("/attempts/{attempt_id}")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["attempt"]["status"], "completed");

    let listed: Value = app
        .client
        .get(app.url(&format!("/results/student/{}", student.id)))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["count"], 1);

    let kinds: Vec<NotificationKind> = app
        .store
        .notifications()
        .await
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![NotificationKind::GradingPending, NotificationKind::ResultPublished]
    );
}

/// Starts and submits an essay attempt, returning (attempt id, question id, teacher token).
async fn submitted_essay(app: &common::TestApp) -> (String, Uuid, String) {
    let teacher = user("teacher");
    let student = user("student");
    let (start, end) = open_window();
    let paper = essay_paper(teacher.id, vec![student.id], start, end);
    let question_id = paper.questions[0].id;
    let paper_id = paper.id;
    app.store.insert_paper(paper).await;
    let student_token = token(student.id, Role::Student);

    app.client
        .get(app.url(&format!("/papers/{paper_id}/attempt")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    let submitted: Value = app
        .client
        .post(app.url(&format!("/papers/{paper_id}/submit")))
        .bearer_auth(&student_token)
        .json(&json!({ "answers": [{ "questionId": question_id, "answer": "Essay text" }] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    (
        submitted["attempt"]["id"].as_str().unwrap().to_string(),
        question_id,
        token(teacher.id, Role::Teacher),
    )
}

#[tokio::test]
async fn regrading_keeps_a_single_result() {
    // Arrange
    let app = spawn_app().await;
    let (attempt_id, question_id, teacher_token) = submitted_essay(&app).await;

    // Act
    for (marks, feedback) in [(12, "Needs detail"), (18, "Much better")] {
        let response = app
            .client
            .put(app.url(&format!("/attempts/{attempt_id}/grade")))
            .bearer_auth(&teacher_token)
            .json(&json!({
                "gradedAnswers": [{ "questionId": question_id, "marksObtained": marks, "feedback": feedback }]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Assert
    assert_eq!(app.store.result_count().await, 1);
    let attempt: Value = app
        .client
        .get(app.url(&format!("/attempts/{attempt_id}")))
        .bearer_auth(&teacher_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["attempt"]["scoring"]["obtainedMarks"], 18.0);
    assert_eq!(attempt["attempt"]["answers"][0]["feedback"], "Much better");
}

#[tokio::test]
async fn marks_given_as_numeric_string_are_accepted() {
    // Arrange
    let app = spawn_app().await;
    let (attempt_id, question_id, teacher_token) = submitted_essay(&app).await;

    // Act
    let response = app
        .client
        .put(app.url(&format!("/attempts/{attempt_id}/grade")))
        .bearer_auth(&teacher_token)
        .json(&json!({ "gradedAnswers": [{ "questionId": question_id, "marksObtained": "7.5" }] }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["attempt"]["scoring"]["obtainedMarks"], 7.5);
    assert_eq!(body["attempt"]["scoring"]["percentage"], 37.5);
    assert_eq!(body["attempt"]["scoring"]["isPassed"], false);
}

#[tokio::test]
async fn out_of_range_marks_are_rejected() {
    // Arrange
    let app = spawn_app().await;
    let (attempt_id, question_id, teacher_token) = submitted_essay(&app).await;

    // Act
    let too_many = app
        .client
        .put(app.url(&format!("/attempts/{attempt_id}/grade")))
        .bearer_auth(&teacher_token)
        .json(&json!({ "gradedAnswers": [{ "questionId": question_id, "marksObtained": 25 }] }))
        .send()
        .await
        .unwrap();
    let not_a_number = app
        .client
        .put(app.url(&format!("/attempts/{attempt_id}/grade")))
        .bearer_auth(&teacher_token)
        .json(&json!({ "gradedAnswers": [{ "questionId": question_id, "marksObtained": "lots" }] }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(too_many.status(), StatusCode::BAD_REQUEST);
    let body: Value = too_many.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(not_a_number.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.store.result_count().await, 0);
}

#[tokio::test]
async fn starting_twice_resumes_the_open_attempt() {
    // Arrange
    let app = spawn_app().await;
    let student = user("student");
    let (start, end) = open_window();
    let paper = mcq_paper(Uuid::new_v4(), vec![student.id], start, end);
    let paper_id = paper.id;
    app.store.insert_paper(paper).await;
    let student_token = token(student.id, Role::Student);

    // Act
    let first = app
        .client
        .get(app.url(&format!("/papers/{paper_id}/attempt")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    let second = app
        .client
        .get(app.url(&format!("/papers/{paper_id}/attempt")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(second.status(), StatusCode::OK);
    let first: Value = first.json().await.unwrap();
    let second: Value = second.json().await.unwrap();
    assert_eq!(first["attempt"]["id"], second["attempt"]["id"]);
}

#[tokio::test]
async fn attempt_limit_is_enforced() {
    // Arrange
    let app = spawn_app().await;
    let student = user("student");
    let (start, end) = open_window();
    let paper = mcq_paper(Uuid::new_v4(), vec![student.id], start, end);
    let question_id = paper.questions[0].id;
    let paper_id = paper.id;
    app.store.insert_paper(paper).await;
    let student_token = token(student.id, Role::Student);

    app.client
        .get(app.url(&format!("/papers/{paper_id}/attempt")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    app.client
        .post(app.url(&format!("/papers/{paper_id}/submit")))
        .bearer_auth(&student_token)
        .json(&json!({ "answers": [{ "questionId": question_id, "answer": "B" }] }))
        .send()
        .await
        .unwrap();

    // Act
    let response = app
        .client
        .get(app.url(&format!("/papers/{paper_id}/attempt")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "You have reached the maximum number of attempts for this paper"
    );
}

#[tokio::test]
async fn unassigned_student_is_forbidden() {
    // Arrange
    let app = spawn_app().await;
    let (start, end) = open_window();
    let paper = mcq_paper(Uuid::new_v4(), vec![Uuid::new_v4()], start, end);
    let paper_id = paper.id;
    app.store.insert_paper(paper).await;

    // Act
    let response = app
        .client
        .get(app.url(&format!("/papers/{paper_id}/attempt")))
        .bearer_auth(token(Uuid::new_v4(), Role::Student))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_paper_is_not_found() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(app.url(&format!("/papers/{}/attempt", Uuid::new_v4())))
        .bearer_auth(token(Uuid::new_v4(), Role::Student))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn grading_an_unsubmitted_attempt_is_rejected() {
    // Arrange
    let app = spawn_app().await;
    let student = user("student");
    let (start, end) = open_window();
    let paper = essay_paper(Uuid::new_v4(), vec![student.id], start, end);
    let question_id = paper.questions[0].id;
    let paper_id = paper.id;
    app.store.insert_paper(paper).await;

    let started: Value = app
        .client
        .get(app.url(&format!("/papers/{paper_id}/attempt")))
        .bearer_auth(token(student.id, Role::Student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = started["attempt"]["id"].as_str().unwrap();

    // Act
    let response = app
        .client
        .put(app.url(&format!("/attempts/{attempt_id}/grade")))
        .bearer_auth(token(Uuid::new_v4(), Role::Teacher))
        .json(&json!({ "gradedAnswers": [{ "questionId": question_id, "marksObtained": 10 }] }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn students_cannot_read_other_students_attempts() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(app.url(&format!("/students/{}/attempts", Uuid::new_v4())))
        .bearer_auth(token(Uuid::new_v4(), Role::Student))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn class_results_are_ranked_by_marks() {
    // Arrange
    let app = spawn_app().await;
    let teacher = user("teacher");
    let students = [user("student"), user("student"), user("student")];
    let (start, end) = open_window();
    let paper = mcq_paper(
        teacher.id,
        students.iter().map(|s| s.id).collect(),
        start,
        end,
    );
    let question_id = paper.questions[0].id;
    let paper_id = paper.id;
    app.store.insert_paper(paper).await;

    for (student, answer) in students.iter().zip(["A", "B", "C"]) {
        app.store.insert_user(student.clone()).await;
        let student_token = token(student.id, Role::Student);
        app.client
            .get(app.url(&format!("/papers/{paper_id}/attempt")))
            .bearer_auth(&student_token)
            .send()
            .await
            .unwrap();
        app.client
            .post(app.url(&format!("/papers/{paper_id}/submit")))
            .bearer_auth(&student_token)
            .json(&json!({ "answers": [{ "questionId": question_id, "answer": answer }] }))
            .send()
            .await
            .unwrap();
    }

    // Act
    let body: Value = app
        .client
        .get(app.url(&format!("/results/class/{paper_id}")))
        .bearer_auth(token(teacher.id, Role::Teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"][0]["obtainedMarks"], 10.0);
    assert_eq!(body["results"][0]["student"]["id"], students[1].id.to_string());

    let attempts: Value = app
        .client
        .get(app.url(&format!("/papers/{paper_id}/attempts?limit=2")))
        .bearer_auth(token(teacher.id, Role::Teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempts["count"], 2);
}

#[tokio::test]
async fn student_result_pages_skip_unpublished_results() {
    // Arrange
    let app = spawn_app().await;
    let teacher = user("teacher");
    let student = user("student");
    let (start, end) = open_window();
    let mcq = mcq_paper(teacher.id, vec![student.id], start, end);
    let essay = essay_paper(teacher.id, vec![student.id], start, end);
    let (mcq_id, mcq_question) = (mcq.id, mcq.questions[0].id);
    let (essay_id, essay_question) = (essay.id, essay.questions[0].id);
    app.store.insert_paper(mcq).await;
    app.store.insert_paper(essay).await;
    let student_token = token(student.id, Role::Student);
    let teacher_token = token(teacher.id, Role::Teacher);

    // The mcq result is published at submit time; the newer essay result stays unpublished.
    for (paper_id, question_id, text) in [(mcq_id, mcq_question, "B"), (essay_id, essay_question, "Essay text")] {
        app.client
            .get(app.url(&format!("/papers/{paper_id}/attempt")))
            .bearer_auth(&student_token)
            .send()
            .await
            .unwrap();
        let submitted: Value = app
            .client
            .post(app.url(&format!("/papers/{paper_id}/submit")))
            .bearer_auth(&student_token)
            .json(&json!({ "answers": [{ "questionId": question_id, "answer": text }] }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        if paper_id == essay_id {
            let attempt_id = submitted["attempt"]["id"].as_str().unwrap();
            let graded = app
                .client
                .put(app.url(&format!("/attempts/{attempt_id}/grade")))
                .bearer_auth(&teacher_token)
                .json(&json!({ "gradedAnswers": [{ "questionId": question_id, "marksObtained": 12 }] }))
                .send()
                .await
                .unwrap();
            assert_eq!(graded.status(), StatusCode::OK);
        }
    }
    assert_eq!(app.store.result_count().await, 2);

    // Act
    let as_student: Value = app
        .client
        .get(app.url(&format!("/results/student/{}?limit=1", student.id)))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let as_teacher: Value = app
        .client
        .get(app.url(&format!("/results/student/{}?limit=1", student.id)))
        .bearer_auth(&teacher_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(as_student["count"], 1);
    assert_eq!(as_student["results"][0]["isPublished"], true);
    assert_eq!(as_teacher["count"], 1);
    assert_eq!(as_teacher["results"][0]["isPublished"], false);
}
