use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{debug, info};

use docdesk_db::models::MessageFilter;
use docdesk_types::api::{
    ApiResponse, BroadcastData, BroadcastRequest, ListQuery, MessageData, MessageListData,
    Pagination, SendMessageRequest,
};
use docdesk_types::models::{MessageType, Role};

use crate::access::{Caller, MessageAction, check_message};
use crate::error::ApiError;
use crate::state::{AppState, run_blocking};
use crate::views::{self, Parties};
use crate::validate;

const INBOX_PAGE_SIZE: u32 = 20;
const ADMIN_PAGE_SIZE: u32 = 50;

type ListResult = Result<Json<ApiResponse<MessageListData>>, ApiError>;

/// POST /api/messages/send
pub async fn send_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = validate::subject(&req.subject)?;
    let content = validate::content(&req.content)?;

    let receiver_id = req.receiver_id;
    let receiver = run_blocking(&state, "Failed to send message", move |db| {
        db.get_user_by_id(receiver_id)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Receiver not found".into()))?;

    if !caller.is_admin() && receiver.role != Role::Admin.as_str() {
        return Err(ApiError::Forbidden(
            "Users can only send messages to administrators".into(),
        ));
    }

    let message_type = MessageType::for_sender(caller.role);
    let sender_id = caller.id;
    let priority = req.priority;
    let row = run_blocking(&state, "Failed to send message", move |db| {
        let id = db.insert_message(
            sender_id,
            receiver_id,
            &subject,
            &content,
            message_type,
            priority,
        )?;
        db.get_message(id)?
            .ok_or_else(|| anyhow::anyhow!("message {id} vanished after insert"))
    })
    .await?;

    info!(
        "Message {} sent from {} to {} ({})",
        row.id, sender_id, receiver_id, message_type
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Message sent successfully",
            MessageData {
                message: views::message(row, Parties::Both),
            },
        )),
    ))
}

pub async fn inbox(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ApiError>,
) -> ListResult {
    let window = query.window(INBOX_PAGE_SIZE);
    let unread_only = query.unread_only.unwrap_or(false);
    let (rows, total) = run_blocking(&state, "Failed to load inbox", move |db| {
        db.list_inbox(caller.id, unread_only, window.limit, window.offset)
    })
    .await?;

    Ok(Json(ApiResponse::data(MessageListData {
        messages: rows.into_iter().map(|r| views::message(r, Parties::Sender)).collect(),
        pagination: Pagination::new(window, total),
    })))
}

pub async fn sent(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ApiError>,
) -> ListResult {
    let window = query.window(INBOX_PAGE_SIZE);
    let (rows, total) = run_blocking(&state, "Failed to load sent messages", move |db| {
        db.list_sent(caller.id, window.limit, window.offset)
    })
    .await?;

    Ok(Json(ApiResponse::data(MessageListData {
        messages: rows.into_iter().map(|r| views::message(r, Parties::Receiver)).collect(),
        pagination: Pagination::new(window, total),
    })))
}

/// Viewing as the receiver marks an unread message read.
pub async fn get_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(message_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_blocking(&state, "Failed to load message", move |db| db.get_message(message_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;
    check_message(&caller, &row, MessageAction::View)?;

    let row = if row.receiver_id == caller.id && !row.is_read {
        run_blocking(&state, "Failed to load message", move |db| {
            if db.mark_message_read(message_id)? {
                debug!("Message {} read by receiver", message_id);
            }
            db.get_message(message_id)
        })
        .await?
        .ok_or_else(|| ApiError::NotFound("Message not found".into()))?
    } else {
        row
    };

    Ok(Json(ApiResponse::data(MessageData {
        message: views::message(row, Parties::Both),
    })))
}

/// Idempotent; `read_at` keeps the first stamp.
pub async fn mark_as_read(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(message_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_blocking(&state, "Failed to update message", move |db| db.get_message(message_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;
    check_message(&caller, &row, MessageAction::MarkRead)?;

    let row = run_blocking(&state, "Failed to update message", move |db| {
        db.mark_message_read(message_id)?;
        db.get_message(message_id)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;

    Ok(Json(ApiResponse::with_message(
        "Message marked as read",
        MessageData {
            message: views::message(row, Parties::Both),
        },
    )))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(message_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_blocking(&state, "Failed to delete message", move |db| db.get_message(message_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;
    check_message(&caller, &row, MessageAction::Delete)?;

    run_blocking(&state, "Failed to delete message", move |db| {
        db.delete_message(message_id)
    })
    .await?;
    info!("User {} deleted message {}", caller.id, message_id);

    Ok(Json(ApiResponse::<()>::message("Message deleted successfully")))
}

pub async fn all_messages(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ApiError>,
) -> ListResult {
    let window = query.window(ADMIN_PAGE_SIZE);
    let unread_only = query.unread_only.unwrap_or(false);
    let priority = query.priority;
    let (rows, total) = run_blocking(&state, "Failed to load messages", move |db| {
        let filter = MessageFilter {
            unread_only,
            priority: priority.map(|p| p.as_str()),
        };
        db.list_messages(filter, window.limit, window.offset)
    })
    .await?;

    Ok(Json(ApiResponse::data(MessageListData {
        messages: rows.into_iter().map(|r| views::message(r, Parties::Both)).collect(),
        pagination: Pagination::new(window, total),
    })))
}

/// POST /api/messages/admin/broadcast: one row per `user` account.
pub async fn broadcast(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Json(req), _): WithRejection<Json<BroadcastRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = validate::subject(&req.subject)?;
    let content = validate::content(&req.content)?;

    let sender_id = caller.id;
    let priority = req.priority;
    let recipients = run_blocking(&state, "Failed to send broadcast", move |db| {
        db.insert_broadcast(sender_id, &subject, &content, priority)
    })
    .await?;

    info!("Admin {} broadcast to {} users", sender_id, recipients);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            format!("Broadcast message sent to {recipients} users"),
            BroadcastData {
                recipients_count: recipients,
            },
        )),
    ))
}
