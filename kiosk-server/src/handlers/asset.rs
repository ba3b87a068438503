use axum::{
    Json,
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use kiosk_config::is_override_key;
use kiosk_core::{HistoryLedger, ViewRequest, cache::CanonicalQuery};
use kiosk_model::RenderedView;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use uuid::Uuid;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// Screen handed to a display together with the history it should send back
/// on its next request.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssetResponse {
    pub device: String,
    pub view: RenderedView,
    pub history: Vec<String>,
}

/// Query string split into the keys the server consumes and the display
/// overrides.
#[derive(Debug, Default)]
struct RequestParams {
    device: Option<String>,
    history: Vec<String>,
    overrides: Vec<(String, String)>,
}

impl RequestParams {
    fn parse(raw: Option<&str>) -> AppResult<Self> {
        let mut params = Self::default();
        let Some(raw) = raw else {
            return Ok(params);
        };

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "device" => {
                    let device = value.trim();
                    if !device.is_empty() {
                        params.device = Some(device.to_string());
                    }
                }
                // Either repeated `history=` params or one JSON array.
                "history" if value.trim_start().starts_with('[') => {
                    let entries: Vec<String> = serde_json::from_str(&value)
                        .map_err(|err| {
                            AppError::bad_request(format!("invalid history: {err}"))
                        })?;
                    params.history.extend(entries);
                }
                "history" => params.history.push(value.into_owned()),
                _ => params.overrides.push((key.into_owned(), value.into_owned())),
            }
        }
        Ok(params)
    }

    fn device(&self) -> String {
        self.device
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    fn ledger(&self, max: usize) -> HistoryLedger {
        HistoryLedger::from_wire(self.history.iter().cloned(), max)
    }

    fn override_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Display parameters identifying the prefetch queue. Unknown keys such
    /// as cache busters are left out. The user is part of the cache key on
    /// its own.
    fn view_query(&self) -> CanonicalQuery {
        CanonicalQuery::from_pairs(
            self.override_pairs()
                .filter(|(key, _)| *key != "user" && is_override_key(key)),
        )
    }
}

/// `GET /asset/new`
pub async fn next_asset(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> AppResult<Json<AssetResponse>> {
    let params = RequestParams::parse(raw.as_deref())?;

    let mut display = state.display.as_ref().clone();
    display.apply_overrides(params.override_pairs())?;

    let device = params.device();
    let request = ViewRequest {
        view_query: params.view_query(),
        device: device.clone(),
        user: display.user.clone(),
        settings: display.to_view_settings(Utc::now().date_naive()),
        prefetch: params.device.is_some(),
    };

    let mut history = params.ledger(state.history_max);
    let view = state.orchestrator.next_view(&request, &mut history).await?;

    Ok(Json(AssetResponse {
        device,
        view,
        history: history.into_wire(),
    }))
}

/// `GET /asset/previous`; `204 No Content` when there is nothing to go
/// back to.
pub async fn previous_asset(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> AppResult<Response> {
    let params = RequestParams::parse(raw.as_deref())?;
    let device = params.device();
    let mut history = params.ledger(state.history_max);

    match state.orchestrator.previous_view(&device, &mut history).await? {
        Some(view) => Ok(Json(AssetResponse {
            device,
            view,
            history: history.into_wire(),
        })
        .into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
