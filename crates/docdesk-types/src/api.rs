use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Document, Message, Priority, Role, User, UserSummary};

// -- JWT Claims --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

// -- Envelope --

/// `{success, message, data | error}` wrapper used by every JSON response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthData {
    pub user: UserSummary,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminAuthData {
    pub admin: UserSummary,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileData {
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersData<T> {
    pub users: Vec<T>,
}

// -- Documents --

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentData {
    pub document: Document,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentsData {
    pub documents: Vec<Document>,
}

/// Admin lookup of one account's documents, by id or by email.
#[derive(Debug, Default, Deserialize)]
pub struct UserDocumentsRequest {
    #[serde(rename = "userId", default, deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDocumentsData {
    pub user: UserSummary,
    pub documents: Vec<Document>,
}

/// Accepts `3`, `"3"`, `""` and `null`; form inputs often post ids as strings.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(id)) => Ok(Some(id)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid user id `{s}`"))),
    }
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageData {
    pub message: Message,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageListData {
    pub messages: Vec<Message>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastData {
    pub recipients_count: usize,
}

/// Query string for the paged message listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub unread_only: Option<bool>,
    pub priority: Option<Priority>,
}

pub const MAX_PAGE_SIZE: u32 = 100;

/// Resolved page window: 1-based page, clamped limit and the row offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
    pub offset: u32,
}

impl ListQuery {
    pub fn window(&self, default_limit: u32) -> PageWindow {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
        PageWindow {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_messages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(window: PageWindow, total: u64) -> Self {
        let limit = u64::from(window.limit);
        Self {
            current_page: window.page,
            total_pages: total.div_ceil(limit),
            total_messages: total,
            has_next: u64::from(window.page) * limit < total,
            has_prev: window.page > 1,
        }
    }
}
