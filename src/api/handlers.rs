//! Query endpoints. Every response carries a JSON body, failures included.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::AppState;
use crate::query::answerer::{self, QueryAnswerer, QueryOutcome, NO_DATA_MESSAGE};
use crate::query::search::{SearchOutcome, SearchService};

pub const WELCOME_MESSAGE: &str = "Welcome to VideoQueryAI!";
pub const MISSING_QUESTION_MESSAGE: &str = "Please provide a question.";
pub const MISSING_QUERY_MESSAGE: &str = "Please provide a search term.";

#[derive(Debug, Deserialize)]
pub struct AskParams {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Message { message: String },
    Error { error: String },
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Maps an answer attempt to the status and body the client sees.
pub fn ask_reply(answerer: &QueryAnswerer, video_id: &str, question: &str) -> (StatusCode, AskResponse) {
    match answerer.answer(video_id, question) {
        Ok(QueryOutcome::Answered(answer)) => (StatusCode::OK, AskResponse { answer: answer.text }),
        Ok(QueryOutcome::NoContext) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            AskResponse {
                answer: NO_DATA_MESSAGE.to_string(),
            },
        ),
        Err(e) => {
            error!("Answering failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                AskResponse {
                    answer: answerer::failure_message(&e).to_string(),
                },
            )
        }
    }
}

pub fn search_reply(search: &SearchService, video_id: &str, keyword: &str) -> (StatusCode, SearchResponse) {
    let outcome = search.search(video_id, keyword);
    let message = outcome.message(keyword);
    match outcome {
        SearchOutcome::Found | SearchOutcome::NotFound => (StatusCode::OK, SearchResponse::Message { message }),
        SearchOutcome::StoreUnavailable => (
            StatusCode::INTERNAL_SERVER_ERROR,
            SearchResponse::Error { error: message },
        ),
    }
}

pub async fn home() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}

pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "ok".to_string(),
    })
}

pub async fn ask(State(state): State<AppState>, Query(params): Query<AskParams>) -> (StatusCode, Json<AskResponse>) {
    let Some(question) = params.question.filter(|q| !q.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(AskResponse {
                answer: MISSING_QUESTION_MESSAGE.to_string(),
            }),
        );
    };
    info!("User question: {}", question);

    // Store and model calls block; keep them off the async workers.
    let reply = tokio::task::spawn_blocking(move || ask_reply(&state.answerer, &state.video_id, &question)).await;
    match reply {
        Ok((status, body)) => (status, Json(body)),
        Err(e) => {
            error!("Ask task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AskResponse {
                    answer: answerer::ANSWER_FAILED_MESSAGE.to_string(),
                }),
            )
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> (StatusCode, Json<SearchResponse>) {
    let Some(keyword) = params.query.filter(|q| !q.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(SearchResponse::Error {
                error: MISSING_QUERY_MESSAGE.to_string(),
            }),
        );
    };
    info!("Searching for: {}", keyword);

    let reply = tokio::task::spawn_blocking(move || search_reply(&state.search, &state.video_id, &keyword)).await;
    match reply {
        Ok((status, body)) => (status, Json(body)),
        Err(e) => {
            error!("Search task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SearchResponse::Error {
                    error: crate::query::search::STORE_DOWN_MESSAGE.to_string(),
                }),
            )
        }
    }
}
