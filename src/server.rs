//! Small JSON API over the broker catalog and removal requests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::Repository;
use crate::db::models::{Broker, RemovalRequest};
use crate::error::{AppError, AppResult};
use crate::removal::orchestrator::validate_email;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub email: String,
}

/// A broker annotated with its match result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerMatch {
    #[serde(flatten)]
    pub broker: Broker,
    pub match_score: u8,
    pub has_user_data: bool,
}

async fn search_brokers(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> AppResult<Json<Vec<BrokerMatch>>> {
    let email = validate_email(&body.email)?;
    let matches = state
        .repo
        .find_brokers_for_email(email)?
        .into_iter()
        .map(|m| BrokerMatch {
            broker: m.broker,
            match_score: m.score,
            has_user_data: m.has_user_data,
        })
        .collect();
    Ok(Json(matches))
}

async fn list_brokers(State(state): State<AppState>) -> AppResult<Json<Vec<Broker>>> {
    Ok(Json(state.repo.get_brokers()?))
}

async fn list_requests(State(state): State<AppState>) -> AppResult<Json<Vec<RemovalRequest>>> {
    Ok(Json(state.repo.get_requests()?))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/brokers", get(list_brokers))
        .route("/brokers/search", post(search_brokers))
        .route("/requests", get(list_requests))
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");
    println!("Serving on http://{addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::catalog;
    use crate::db::Database;
    use crate::db::models::NewRequest;

    fn state() -> AppState {
        let db = Database::open_in_memory().unwrap();
        catalog::seed(&db).unwrap();
        db.create_request(NewRequest::pending("Spokeo", "jane@gmail.com"))
            .unwrap();
        AppState {
            repo: Arc::new(db),
        }
    }

    #[tokio::test]
    async fn test_search_returns_annotated_brokers() {
        let Json(matches) = search_brokers(
            State(state()),
            Json(SearchBody {
                email: "jane@gmail.com".into(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(matches.len(), 15);
        assert!(matches.windows(2).all(|w| w[0].match_score >= w[1].match_score));

        let first = serde_json::to_value(&matches[0]).unwrap();
        assert!(first["name"].is_string());
        assert!(first["matchScore"].is_u64());
        assert!(first["hasUserData"].is_boolean());
    }

    #[tokio::test]
    async fn test_search_rejects_invalid_email() {
        let err = search_brokers(
            State(state()),
            Json(SearchBody {
                email: "nope".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_endpoints() {
        let state = state();
        let Json(brokers) = list_brokers(State(state.clone())).await.unwrap();
        assert_eq!(brokers.len(), 40);
        let Json(requests) = list_requests(State(state)).await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            AppError::request_not_found("x").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Registry("down".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
