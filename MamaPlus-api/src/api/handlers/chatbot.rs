use axum::Json;
use tracing::instrument;

use mama_plus_domain::services::chatbot::{reply, ChatMessageRequest, ChatMessageResponse};

use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;

/// Answer a message sent to the prenatal assistant
#[utoipa::path(
    post,
    path = "/api/chatbot/messages",
    request_body = ChatMessageRequest,
    responses(
        (status = 200, description = "Assistant answer", body = ChatMessageResponse),
        (status = 400, description = "Empty message", body = ErrorResponse),
    ),
    tag = "Chatbot"
)]
#[instrument(skip(request))]
pub async fn post_message(ApiJson(request): ApiJson<ChatMessageRequest>) -> ApiResult<Json<ChatMessageResponse>> {
    Ok(Json(reply(request)?))
}
