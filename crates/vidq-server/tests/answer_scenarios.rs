//! End-to-end answers: rule translator + DuckDB executor + normalizer

use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use vidq_duck::{ensure_schema, seed_from_json, DuckStore, QueryExecutor};
use vidq_nl::{RuleTranslator, TranslationError};
use vidq_schema::SchemaDescriptor;
use vidq_server::http::{self, AnswerRequest, AnswerResponse};
use vidq_server::pipeline::{EMPTY_QUESTION, NOT_UNDERSTOOD};
use vidq_server::{Analyst, AnswerError};

const DATASET: &str = include_str!("../../../data/sample_videos.json");

fn analyst_over(store: DuckStore) -> Analyst {
    let translator = RuleTranslator::new(Arc::new(SchemaDescriptor::builtin()));
    Analyst::new(Arc::new(translator), QueryExecutor::new(Arc::new(store)))
}

fn seeded() -> Analyst {
    let store = DuckStore::open_in_memory().unwrap();
    seed_from_json(&store.connect().unwrap(), DATASET).unwrap();
    analyst_over(store)
}

fn empty() -> Analyst {
    let store = DuckStore::open_in_memory().unwrap();
    ensure_schema(&store.connect().unwrap()).unwrap();
    analyst_over(store)
}

#[tokio::test]
async fn test_total_videos() {
    let analyst = seeded();
    assert_eq!(analyst.answer("Сколько всего видео есть в системе?").await, "5");
}

#[tokio::test]
async fn test_creator_videos_in_date_range() {
    let analyst = seeded();
    // Renders as DATE(video_created_at) BETWEEN ... so a2, published late on
    // November 5th, is still counted
    let answer = analyst
        .answer("Сколько видео у креатора с id 123 вышло с 1 по 5 ноября 2025?")
        .await;
    assert_eq!(answer, "2");
}

#[tokio::test]
async fn test_creator_narrows_metric_questions() {
    let analyst = seeded();

    let answer = analyst
        .answer("Какова сумма просмотров видео у креатора с id 123?")
        .await;
    assert_eq!(answer, "200 000");

    let answer = analyst
        .answer("Какое среднее количество просмотров у креатора с id 456?")
        .await;
    assert_eq!(answer, "100 500.0");

    let answer = analyst
        .answer("Какой прирост просмотров у креатора с id 123 был 28 ноября 2025?")
        .await;
    assert_eq!(answer, "3 000");

    let answer = analyst
        .answer("На сколько просмотров выросли видео у креатора с id 456?")
        .await;
    assert_eq!(answer, "800");
}

#[tokio::test]
async fn test_views_threshold() {
    let analyst = seeded();
    let answer = analyst
        .answer("Сколько видео набрало больше 100000 просмотров за всё время?")
        .await;
    assert_eq!(answer, "2");
}

#[tokio::test]
async fn test_growth_on_day_is_grouped() {
    let analyst = seeded();
    let answer = analyst
        .answer("На сколько просмотров в сумме выросли все видео 28 ноября 2025?")
        .await;
    assert_eq!(answer, "3 000");
}

#[tokio::test]
async fn test_distinct_videos_with_new_views() {
    let analyst = seeded();
    let answer = analyst
        .answer("Сколько разных видео получали новые просмотры 27 ноября 2025?")
        .await;
    assert_eq!(answer, "2");
}

#[tokio::test]
async fn test_growth_without_snapshots_is_zero() {
    let analyst = empty();
    let answer = analyst
        .try_answer("На сколько просмотров в сумме выросли все видео 28 ноября 2025?")
        .await
        .unwrap();
    assert_eq!(answer, "0");
}

#[tokio::test]
async fn test_unparseable_question_gets_apology() {
    let analyst = seeded();

    let err = analyst.try_answer("?!? 42 ...").await.unwrap_err();
    assert!(matches!(
        err,
        AnswerError::Translation(TranslationError::Unrecognized)
    ));
    assert_eq!(analyst.answer("?!? 42 ...").await, NOT_UNDERSTOOD);
}

#[tokio::test]
async fn test_creator_question_without_id_gets_apology() {
    let analyst = seeded();
    let err = analyst
        .try_answer("Сколько видео у креатора вышло в ноябре?")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AnswerError::Translation(TranslationError::MissingEntity(_))
    ));
}

#[tokio::test]
async fn test_concurrent_questions_are_independent() {
    let analyst = Arc::new(seeded());

    let questions = [
        ("Сколько всего видео есть в системе?", "5"),
        ("Сколько видео набрало больше 100000 просмотров за всё время?", "2"),
        ("На сколько просмотров в сумме выросли все видео 28 ноября 2025?", "3 000"),
    ];

    let handles: Vec<_> = questions
        .iter()
        .map(|(question, _)| {
            let analyst = analyst.clone();
            let question = question.to_string();
            tokio::spawn(async move { analyst.answer(&question).await })
        })
        .collect();

    for (handle, (_, expected)) in handles.into_iter().zip(questions.iter()) {
        assert_eq!(handle.await.unwrap(), *expected);
    }
}

#[tokio::test]
async fn test_http_handler() {
    let analyst = Arc::new(seeded());

    let Json(response) = http::answer(
        State(analyst.clone()),
        Json(AnswerRequest {
            question: "Сколько всего видео есть в системе?".to_string(),
        }),
    )
    .await;
    assert_eq!(
        response,
        AnswerResponse {
            answer: "5".to_string()
        }
    );

    let Json(response) = http::answer(
        State(analyst),
        Json(AnswerRequest {
            question: "  ".to_string(),
        }),
    )
    .await;
    assert_eq!(response.answer, EMPTY_QUESTION);

    assert_eq!(http::health().await, "ok");
}
