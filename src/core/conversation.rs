//! Messaging engine - two-party conversations and the messages inside them.
//!
//! Participants are always stored lower id first, so a pair maps to one row per
//! context no matter who starts the conversation. The unique index created in
//! [`crate::config::database`] backs that up when two creators race.

use crate::{
    core::{EngineContext, notify::Notice, status::MessageType, store::begin_locked},
    entities::{Conversation, Message, User, conversation, message},
    errors::{Error, Result},
};
use sea_orm::{
    Condition, ConnectionTrait, QueryOrder, QuerySelect, Set,
    prelude::*,
    sea_query::{Expr, NullOrdering, OnConflict},
};
use serde_json::json;
use tracing::{debug, info};

/// What a conversation is about. Part of its identity: the same two users can hold one
/// direct conversation plus one per product, order or service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationContext {
    /// No linked entity
    Direct,
    /// Inquiry about a product
    Product(i64),
    /// Discussion of an order
    Order(i64),
    /// Inquiry about a service
    Service(i64),
}

impl ConversationContext {
    /// Column value for the context type.
    #[must_use]
    pub const fn context_type(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Product(_) => "product_inquiry",
            Self::Order(_) => "order_related",
            Self::Service(_) => "service_inquiry",
        }
    }

    /// Stable key stored in the unique index.
    #[must_use]
    pub fn key(self) -> String {
        match self {
            Self::Direct => "direct".to_string(),
            Self::Product(id) => format!("product:{id}"),
            Self::Order(id) => format!("order:{id}"),
            Self::Service(id) => format!("service:{id}"),
        }
    }

    /// Title given to a new conversation.
    #[must_use]
    pub fn title(self) -> String {
        match self {
            Self::Direct => "Direct conversation".to_string(),
            Self::Product(_) => "Product inquiry".to_string(),
            Self::Order(id) => format!("About order #{id}"),
            Self::Service(_) => "Service inquiry".to_string(),
        }
    }
}

/// Sender-supplied part of a message.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    /// Message text; must not be blank
    pub content: String,
    /// Text, image or file
    pub message_type: MessageType,
    /// Attachment URLs
    pub attachments: Vec<String>,
    /// Message being replied to, in the same conversation
    pub reply_to_message_id: Option<i64>,
}

/// Orders two user ids lower first.
#[must_use]
pub const fn canonical_pair(user_a: i64, user_b: i64) -> (i64, i64) {
    if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    One,
    Two,
}

impl Slot {
    fn of(conversation: &conversation::Model, user_id: i64) -> Option<Self> {
        if user_id == conversation.participant_one_id {
            Some(Self::One)
        } else if user_id == conversation.participant_two_id {
            Some(Self::Two)
        } else {
            None
        }
    }

    const fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    const fn unread_column(self) -> conversation::Column {
        match self {
            Self::One => conversation::Column::ParticipantOneUnread,
            Self::Two => conversation::Column::ParticipantTwoUnread,
        }
    }

    const fn archived_column(self) -> conversation::Column {
        match self {
            Self::One => conversation::Column::ArchivedByOne,
            Self::Two => conversation::Column::ArchivedByTwo,
        }
    }

    const fn has_archived(self, conversation: &conversation::Model) -> bool {
        match self {
            Self::One => conversation.archived_by_one,
            Self::Two => conversation.archived_by_two,
        }
    }

    const fn user_id(self, conversation: &conversation::Model) -> i64 {
        match self {
            Self::One => conversation.participant_one_id,
            Self::Two => conversation.participant_two_id,
        }
    }

    const fn has_blocked(self, conversation: &conversation::Model) -> bool {
        match self {
            Self::One => conversation.blocked_by_one,
            Self::Two => conversation.blocked_by_two,
        }
    }
}

/// Cuts `content` to at most `max_chars` characters, appending `...` when shortened.
#[must_use]
pub fn message_preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

async fn lock_conversation<C: ConnectionTrait>(
    txn: &C,
    conversation_id: i64,
) -> Result<conversation::Model> {
    Conversation::find_by_id(conversation_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| Error::not_found("conversation", conversation_id))
}

async fn find_for_pair<C: ConnectionTrait>(
    txn: &C,
    pair: (i64, i64),
    context_key: &str,
) -> Result<Option<conversation::Model>> {
    Conversation::find()
        .filter(conversation::Column::ParticipantOneId.eq(pair.0))
        .filter(conversation::Column::ParticipantTwoId.eq(pair.1))
        .filter(conversation::Column::ContextKey.eq(context_key))
        .one(txn)
        .await
        .map_err(Into::into)
}

/// Returns the conversation between two users in `context`, creating it if needed.
///
/// `user_a` is the one opening it: an existing conversation they archived comes back
/// into their inbox. Safe to call concurrently from both sides: the insert yields to an
/// existing row and the row is read back, so both callers get the same conversation.
///
/// # Errors
/// `Validation` if both ids are the same user, `NotFound` if either user is missing.
pub async fn get_or_create_conversation(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    user_a: i64,
    user_b: i64,
    context: ConversationContext,
) -> Result<conversation::Model> {
    if user_a == user_b {
        return Err(Error::validation("Cannot start a conversation with yourself"));
    }
    let pair = canonical_pair(user_a, user_b);
    let context_key = context.key();

    let txn = begin_locked(db).await?;

    for user_id in [pair.0, pair.1] {
        User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| Error::not_found("user", user_id))?;
    }

    if let Some(existing) = find_for_pair(&txn, pair, &context_key).await? {
        let opener = if user_a == pair.0 { Slot::One } else { Slot::Two };
        if !opener.has_archived(&existing) {
            txn.commit().await?;
            return Ok(existing);
        }
        let mut active: conversation::ActiveModel = existing.into();
        active.set(opener.archived_column(), false.into());
        let restored = active.update(&txn).await?;
        txn.commit().await?;
        debug!(conversation_id = restored.id, user_id = user_a, "Conversation unarchived");
        return Ok(restored);
    }

    let (product_id, order_id, service_id) = match context {
        ConversationContext::Direct => (None, None, None),
        ConversationContext::Product(id) => (Some(id), None, None),
        ConversationContext::Order(id) => (None, Some(id), None),
        ConversationContext::Service(id) => (None, None, Some(id)),
    };
    let row = conversation::ActiveModel {
        participant_one_id: Set(pair.0),
        participant_two_id: Set(pair.1),
        context_type: Set(context.context_type().to_string()),
        context_key: Set(context_key.clone()),
        product_id: Set(product_id),
        order_id: Set(order_id),
        service_id: Set(service_id),
        title: Set(context.title()),
        last_message_at: Set(None),
        last_message_preview: Set(None),
        participant_one_unread: Set(0),
        participant_two_unread: Set(0),
        blocked_by_one: Set(false),
        blocked_by_two: Set(false),
        archived_by_one: Set(false),
        archived_by_two: Set(false),
        created_at: Set(ctx.clock.now()),
        ..Default::default()
    };
    let inserted = Conversation::insert(row)
        .on_conflict(
            OnConflict::columns([
                conversation::Column::ParticipantOneId,
                conversation::Column::ParticipantTwoId,
                conversation::Column::ContextKey,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;
    if inserted == 0 {
        debug!(?pair, context_key = %context_key, "Conversation created concurrently, reusing it");
    }

    let conversation = find_for_pair(&txn, pair, &context_key)
        .await?
        .ok_or_else(|| Error::conflict("Conversation vanished while being created"))?;

    txn.commit().await?;

    info!(
        conversation_id = conversation.id,
        context_key = %context_key,
        "Conversation ready"
    );
    Ok(conversation)
}

/// Stores a message and updates the conversation it belongs to.
///
/// The preview, last-message time and the recipient's unread counter change in the
/// same transaction as the insert; the sender's counter never changes. A new message
/// brings an archived conversation back into both inboxes.
///
/// # Errors
/// - `Validation` for blank content, a sender outside the conversation, a sender
///   blocked by the recipient, or a reply target from another conversation
/// - `NotFound` if the conversation is missing
pub async fn send_message(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    conversation_id: i64,
    sender_id: i64,
    new_message: NewMessage,
) -> Result<message::Model> {
    if new_message.content.trim().is_empty() {
        return Err(Error::validation("Message content cannot be empty"));
    }

    let txn = begin_locked(db).await?;

    let conversation = lock_conversation(&txn, conversation_id).await?;
    let sender = Slot::of(&conversation, sender_id)
        .ok_or_else(|| Error::validation("You are not a participant in this conversation"))?;
    let recipient = sender.other();
    if recipient.has_blocked(&conversation) {
        return Err(Error::validation("This conversation is blocked"));
    }

    if let Some(reply_to) = new_message.reply_to_message_id {
        let target = Message::find_by_id(reply_to).one(&txn).await?;
        if target.is_none_or(|m| m.conversation_id != conversation_id) {
            return Err(Error::validation(format!(
                "Message {reply_to} is not part of this conversation"
            )));
        }
    }

    let now = ctx.clock.now();
    let preview = message_preview(&new_message.content, ctx.config.messaging.preview_length);
    let message = message::ActiveModel {
        conversation_id: Set(conversation_id),
        sender_id: Set(sender_id),
        content: Set(new_message.content),
        message_type: Set(new_message.message_type.as_str().to_string()),
        attachments: Set(json!(new_message.attachments)),
        reply_to_message_id: Set(new_message.reply_to_message_id),
        is_read: Set(false),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let unread = recipient.unread_column();
    Conversation::update_many()
        .col_expr(conversation::Column::LastMessageAt, Expr::value(now))
        .col_expr(conversation::Column::LastMessagePreview, Expr::value(preview))
        .col_expr(unread, Expr::col(unread).add(1))
        .col_expr(conversation::Column::ArchivedByOne, Expr::value(false))
        .col_expr(conversation::Column::ArchivedByTwo, Expr::value(false))
        .filter(conversation::Column::Id.eq(conversation_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    let recipient_id = recipient.user_id(&conversation);
    debug!(conversation_id, message_id = message.id, recipient_id, "Message sent");
    ctx.notify_all(&[Notice::new_message(recipient_id, conversation_id, message.id)])
        .await;

    Ok(message)
}

/// Marks everything the other participant sent as read and clears the reader's counter.
///
/// Returns the number of messages that changed.
pub async fn mark_conversation_read(
    db: &DatabaseConnection,
    conversation_id: i64,
    reader_id: i64,
) -> Result<u64> {
    let txn = begin_locked(db).await?;

    let conversation = lock_conversation(&txn, conversation_id).await?;
    let reader = Slot::of(&conversation, reader_id)
        .ok_or_else(|| Error::validation("You are not a participant in this conversation"))?;

    let marked = Message::update_many()
        .col_expr(message::Column::IsRead, Expr::value(true))
        .filter(message::Column::ConversationId.eq(conversation_id))
        .filter(message::Column::SenderId.ne(reader_id))
        .filter(message::Column::IsRead.eq(false))
        .exec(&txn)
        .await?
        .rows_affected;

    Conversation::update_many()
        .col_expr(reader.unread_column(), Expr::value(0))
        .filter(conversation::Column::Id.eq(conversation_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(marked)
}

/// Sets or clears `user_id`'s block on the other participant.
pub async fn set_conversation_blocked(
    db: &DatabaseConnection,
    conversation_id: i64,
    user_id: i64,
    blocked: bool,
) -> Result<conversation::Model> {
    let txn = begin_locked(db).await?;

    let conversation = lock_conversation(&txn, conversation_id).await?;
    let slot = Slot::of(&conversation, user_id)
        .ok_or_else(|| Error::validation("You are not a participant in this conversation"))?;

    let mut active: conversation::ActiveModel = conversation.into();
    match slot {
        Slot::One => active.blocked_by_one = Set(blocked),
        Slot::Two => active.blocked_by_two = Set(blocked),
    }
    let conversation = active.update(&txn).await?;

    txn.commit().await?;
    info!(conversation_id, user_id, blocked, "Conversation block updated");
    Ok(conversation)
}

/// Messages of a conversation, oldest first.
pub async fn get_messages(
    db: &DatabaseConnection,
    conversation_id: i64,
) -> Result<Vec<message::Model>> {
    Message::find()
        .filter(message::Column::ConversationId.eq(conversation_id))
        .order_by_asc(message::Column::CreatedAt)
        .order_by_asc(message::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The user's inbox: conversations they have not archived, most recently active first.
pub async fn get_conversations_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<conversation::Model>> {
    Conversation::find()
        .filter(
            Condition::any()
                .add(
                    Condition::all()
                        .add(conversation::Column::ParticipantOneId.eq(user_id))
                        .add(conversation::Column::ArchivedByOne.eq(false)),
                )
                .add(
                    Condition::all()
                        .add(conversation::Column::ParticipantTwoId.eq(user_id))
                        .add(conversation::Column::ArchivedByTwo.eq(false)),
                ),
        )
        .order_by_with_nulls(
            conversation::Column::LastMessageAt,
            sea_orm::Order::Desc,
            NullOrdering::Last,
        )
        .order_by_desc(conversation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
