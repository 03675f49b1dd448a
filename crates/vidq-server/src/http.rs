//! HTTP surface: one endpoint per question

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::pipeline::Analyst;

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AnswerResponse {
    pub answer: String,
}

pub fn router(analyst: Arc<Analyst>) -> Router {
    Router::new()
        .route("/answer", post(answer))
        .route("/health", get(health))
        .with_state(analyst)
}

pub async fn answer(
    State(analyst): State<Arc<Analyst>>,
    Json(request): Json<AnswerRequest>,
) -> Json<AnswerResponse> {
    info!(question = %request.question, "question received");
    let answer = analyst.answer(&request.question).await;
    Json(AnswerResponse { answer })
}

pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let request: AnswerRequest =
            serde_json::from_str(r#"{"question": "Сколько всего видео?"}"#).unwrap();
        assert_eq!(request.question, "Сколько всего видео?");

        let body = serde_json::to_value(AnswerResponse {
            answer: "1 234".to_string(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "answer": "1 234" }));
    }
}
