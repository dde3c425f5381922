use axum::{extract::State, routing::post, Router};

use super::{Json, Path};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::integrations::{EmailPayload, EmailReceipt};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send_email))
        .route("/customers/:id", post(email_customer))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendEmailRequest {
    #[validate(email)]
    pub to: String,
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub text_body: String,
    pub html_body: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerEmailRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub message: String,
}

async fn send_email(State(s): State<AppState>, _: AdminUser, Json(r): Json<SendEmailRequest>) -> AppResult<Json<EmailReceipt>> {
    r.validate()?;
    let payload = EmailPayload { to: r.to, subject: r.subject, text_body: r.text_body, html_body: r.html_body };
    let receipt = s.integrations.mailer.send_email(&payload).await?;
    tracing::info!(message_id = %receipt.message_id, mocked = receipt.mocked, "email sent");
    Ok(Json(receipt))
}

async fn email_customer(
    State(s): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<CustomerEmailRequest>,
) -> AppResult<Json<EmailReceipt>> {
    r.validate()?;
    let customer = db::customers::find(&s.db, id).await?.ok_or_else(|| AppError::not_found("Customer"))?;
    let payload = EmailPayload {
        to: customer.email.clone(),
        subject: r.subject,
        text_body: format!("Hello {},\n\n{}", customer.first_name, r.message),
        html_body: None,
    };
    let receipt = s.integrations.mailer.send_email(&payload).await?;
    tracing::info!(customer_id = %id, sent_by = %admin.id, message_id = %receipt.message_id, "customer email sent");
    Ok(Json(receipt))
}
