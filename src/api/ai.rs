use axum::{extract::State, routing::get, Router};

use chrono::Utc;

use super::Json;

use crate::auth::AdminUser;
use crate::error::AppResult;
use crate::services::insights::{self, InsightsReport};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/insights", get(get_insights))
}

async fn get_insights(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<InsightsReport>> {
    Ok(Json(insights::generate(&s, Utc::now().date_naive()).await?))
}
