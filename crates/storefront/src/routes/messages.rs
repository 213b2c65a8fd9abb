//! Messaging route handlers.
//!
//! Two-pane inbox: a searchable conversation list on the left and the
//! selected thread on the right. The open thread refreshes itself through
//! a polled HTMX fragment, so replies appear without a page reload.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use soko_safi_core::types::UserId;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::market::{Conversation, MarketError, Message};
use crate::middleware::{RequireUser, clear_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Conversation list row display data.
#[derive(Clone)]
pub struct ConversationView {
    pub partner_id: UserId,
    pub partner_name: String,
    pub last_message: String,
    pub time: String,
    pub unread: bool,
}

impl From<&Conversation> for ConversationView {
    fn from(conversation: &Conversation) -> Self {
        Self {
            partner_id: conversation.partner_id,
            partner_name: conversation.partner_name.clone(),
            last_message: conversation.last_message.clone(),
            time: conversation.timestamp.format("%b %e, %H:%M").to_string(),
            unread: conversation.unread,
        }
    }
}

/// A single chat bubble.
#[derive(Clone)]
pub struct MessageView {
    pub content: String,
    pub time: String,
    /// Sent by the signed-in user, rendered on the right side.
    pub mine: bool,
}

/// Open thread display data.
#[derive(Clone)]
pub struct ThreadView {
    pub partner_id: UserId,
    pub partner_name: String,
    pub messages: Vec<MessageView>,
}

/// Build the thread view, resolving the partner's display name from the
/// conversation list or, failing that, from the messages themselves.
fn build_thread_view(
    user: &CurrentUser,
    partner_id: UserId,
    conversations: &[Conversation],
    messages: &[Message],
) -> ThreadView {
    let partner_name = conversations
        .iter()
        .find(|c| c.partner_id == partner_id)
        .map(|c| c.partner_name.clone())
        .or_else(|| {
            messages.first().and_then(|m| {
                if m.sender_id == user.id {
                    m.recipient_name.clone()
                } else {
                    m.sender_name.clone()
                }
            })
        })
        .unwrap_or_else(|| format!("User {partner_id}"));

    ThreadView {
        partner_id,
        partner_name,
        messages: messages
            .iter()
            .map(|m| MessageView {
                content: m.content.clone(),
                time: m.timestamp.format("%H:%M").to_string(),
                mine: m.sender_id == user.id,
            })
            .collect(),
    }
}

/// Keep conversations whose partner name contains the query text.
fn filter_conversations(conversations: &mut Vec<Conversation>, query: &str) {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return;
    }
    conversations.retain(|c| c.partner_name.to_lowercase().contains(&query));
}

// =============================================================================
// Form and Query Types
// =============================================================================

/// Conversation list search parameters.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub q: String,
}

/// Send message form data.
#[derive(Debug, Deserialize)]
pub struct SendMessageForm {
    pub content: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Messages page template, with or without an open thread.
#[derive(Template, WebTemplate)]
#[template(path = "messages/index.html")]
pub struct MessagesTemplate {
    pub user: Option<CurrentUser>,
    pub conversations: Vec<ConversationView>,
    pub selected: Option<ThreadView>,
    pub q: String,
}

/// Thread fragment template (for HTMX polling).
#[derive(Template, WebTemplate)]
#[template(path = "partials/message_thread.html")]
pub struct ThreadTemplate {
    pub thread: ThreadView,
}

/// Fetch and filter the conversation list.
async fn load_conversations(
    state: &AppState,
    user: &CurrentUser,
    query: &str,
) -> std::result::Result<Vec<Conversation>, MarketError> {
    let mut conversations = state.market().conversations(&user.api_token).await?;
    filter_conversations(&mut conversations, query);
    Ok(conversations)
}

// =============================================================================
// Routes
// =============================================================================

/// Display the inbox without a selected thread.
#[instrument(skip(state, session, user))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Query(query): Query<MessagesQuery>,
) -> Result<Response> {
    let conversations = match load_conversations(&state, &user, &query.q).await {
        Ok(conversations) => conversations,
        Err(MarketError::Unauthorized) => {
            if let Err(e) = clear_current_user(&session).await {
                tracing::error!("Failed to clear expired session: {e}");
            }
            return Ok(Redirect::to("/auth/login").into_response());
        }
        Err(e) => return Err(e.into()),
    };

    Ok(MessagesTemplate {
        user: Some(user),
        conversations: conversations.iter().map(ConversationView::from).collect(),
        selected: None,
        q: query.q,
    }
    .into_response())
}

/// Display the inbox with one conversation open.
///
/// Opening a thread marks its incoming messages read on the backend.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(partner_id): Path<UserId>,
    Query(query): Query<MessagesQuery>,
) -> Result<Response> {
    let conversations = match load_conversations(&state, &user, &query.q).await {
        Ok(conversations) => conversations,
        Err(MarketError::Unauthorized) => {
            if let Err(e) = clear_current_user(&session).await {
                tracing::error!("Failed to clear expired session: {e}");
            }
            return Ok(Redirect::to("/auth/login").into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let messages = state.market().thread(&user.api_token, partner_id).await?;
    let thread = build_thread_view(&user, partner_id, &conversations, &messages);

    Ok(MessagesTemplate {
        user: Some(user),
        conversations: conversations.iter().map(ConversationView::from).collect(),
        selected: Some(thread),
        q: query.q,
    }
    .into_response())
}

/// Refresh the open thread (HTMX, polled).
#[instrument(skip(state, user))]
pub async fn thread(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(partner_id): Path<UserId>,
) -> Response {
    match state.market().thread(&user.api_token, partner_id).await {
        Ok(messages) => ThreadTemplate {
            thread: build_thread_view(&user, partner_id, &[], &messages),
        }
        .into_response(),
        Err(e) => {
            tracing::warn!("Failed to refresh thread with {partner_id}: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Html("<p class=\"error\">Failed to load messages.</p>"),
            )
                .into_response()
        }
    }
}

/// Send a message and return the refreshed thread (HTMX).
///
/// Blank messages are ignored and simply re-render the thread.
#[instrument(skip(state, user, form))]
pub async fn send(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(partner_id): Path<UserId>,
    Form(form): Form<SendMessageForm>,
) -> Response {
    let content = form.content.trim();

    if !content.is_empty() {
        if let Err(e) = state
            .market()
            .send_message(&user.api_token, partner_id, content)
            .await
        {
            tracing::warn!("Failed to send message to {partner_id}: {e}");
        }
    }

    match state.market().thread(&user.api_token, partner_id).await {
        Ok(messages) => ThreadTemplate {
            thread: build_thread_view(&user, partner_id, &[], &messages),
        }
        .into_response(),
        Err(e) => {
            tracing::warn!("Failed to reload thread with {partner_id}: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Html("<p class=\"error\">Failed to load messages.</p>"),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use soko_safi_core::types::MessageId;

    use crate::market::ApiToken;
    use soko_safi_core::types::Role;

    use super::*;

    fn current_user(id: i32) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            username: "wanjiku".to_string(),
            email: None,
            role: Role::Customer,
            api_token: ApiToken::new("session=abc".to_string()),
        }
    }

    fn message(id: i32, sender: i32, recipient: i32, content: &str) -> Message {
        Message {
            id: MessageId::new(id),
            content: content.to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 7)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
            sender_id: UserId::new(sender),
            recipient_id: UserId::new(recipient),
            read: false,
            sender_name: Some(format!("user{sender}")),
            recipient_name: Some(format!("user{recipient}")),
        }
    }

    fn conversation(partner: i32, name: &str) -> Conversation {
        Conversation {
            partner_id: UserId::new(partner),
            partner_name: name.to_string(),
            last_message: "hello".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 7)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
            unread: false,
        }
    }

    #[test]
    fn test_thread_view_marks_own_messages() {
        let user = current_user(5);
        let messages = vec![message(1, 5, 9, "habari"), message(2, 9, 5, "mzuri sana")];
        let view = build_thread_view(&user, UserId::new(9), &[], &messages);

        assert!(view.messages[0].mine);
        assert!(!view.messages[1].mine);
        assert_eq!(view.messages[0].time, "09:15");
    }

    #[test]
    fn test_thread_partner_name_from_conversations() {
        let user = current_user(5);
        let conversations = vec![conversation(9, "mama_mboga")];
        let view = build_thread_view(&user, UserId::new(9), &conversations, &[]);
        assert_eq!(view.partner_name, "mama_mboga");
    }

    #[test]
    fn test_thread_partner_name_from_messages() {
        let user = current_user(5);
        let messages = vec![message(1, 5, 9, "habari")];
        let view = build_thread_view(&user, UserId::new(9), &[], &messages);
        assert_eq!(view.partner_name, "user9");
    }

    #[test]
    fn test_thread_partner_name_fallback() {
        let user = current_user(5);
        let view = build_thread_view(&user, UserId::new(9), &[], &[]);
        assert_eq!(view.partner_name, "User 9");
    }

    #[test]
    fn test_filter_conversations_by_partner_name() {
        let mut conversations = vec![
            conversation(1, "mama_mboga"),
            conversation(2, "craft_duka"),
        ];
        filter_conversations(&mut conversations, "MAMA");
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].partner_name, "mama_mboga");
    }
}
