//! Chat membership, messages and unviewed-message bookkeeping.

use chrono::{DateTime, Utc};

use onetable_core::entities::{Chat, ChatMember, ChatMessage, Entity, User, View};
use onetable_core::keys::{self, ItemRef};
use onetable_core::storage::{RepositoryError, Result};

use super::{Coordinator, TransactionBuilder};
use crate::pagination::collect_all;
use crate::repositories::{
    ChatMemberRepository, ChatMessageRepository, ChatRepository, UserRepository,
};
use crate::table::Decrement;

impl Coordinator {
    /// Creates a chat together with its first members.
    ///
    /// Bumps every member's `chatCount`; all members must exist. Members
    /// that do not fit in the creating transaction are added afterwards in
    /// chunks, each member also bumping the chat's `userCount`, so the count
    /// matches the stored members if a chunk fails.
    #[tracing::instrument(skip(self, chat), fields(chat_id = %chat.chat_id))]
    pub async fn create_chat(&self, mut chat: Chat, member_user_ids: &[&str]) -> Result<Chat> {
        let per_member = 2;
        let capacity = self.table.max_transact_items().saturating_sub(1) / per_member;
        let (inline, deferred) = member_user_ids.split_at(member_user_ids.len().min(capacity));
        chat.user_count = inline.len() as i64;

        let mut tx = TransactionBuilder::new();
        tx.push_or(ChatRepository::add_op(&chat)?, chat.already_exists());
        for user_id in inline {
            let member = ChatMember::new(&chat.chat_id, *user_id).with_joined_at(chat.created_at);
            tx.push_or(ChatMemberRepository::add_op(&member)?, member.already_exists());
            tx.push_or(
                UserRepository::increment_count_op(user_id, User::CHAT_COUNT),
                User::not_found(&keys::user_key(user_id)),
            );
        }
        tx.commit(&self.table).await?;

        if !deferred.is_empty() {
            tracing::debug!(count = deferred.len(), "adding remaining members in chunks");
            let mut groups = Vec::with_capacity(deferred.len());
            for user_id in deferred {
                let member = ChatMember::new(&chat.chat_id, *user_id).with_joined_at(chat.created_at);
                groups.push(vec![
                    ChatMemberRepository::add_op(&member)?,
                    UserRepository::increment_count_op(user_id, User::CHAT_COUNT),
                    ChatRepository::increment_count_op(&chat.chat_id, Chat::USER_COUNT),
                ]);
            }
            self.chunked_writer().write_groups(groups).await?;
            chat.user_count = member_user_ids.len() as i64;
        }

        tracing::info!(members = member_user_ids.len(), "chat created");
        Ok(chat)
    }

    /// Adds a user to a chat.
    #[tracing::instrument(skip(self))]
    pub async fn join_chat(&self, chat_id: &str, user_id: &str) -> Result<ChatMember> {
        let member = ChatMember::new(chat_id, user_id);

        let mut tx = TransactionBuilder::new();
        tx.push_or(ChatMemberRepository::add_op(&member)?, member.already_exists())
            .push_or(
                ChatRepository::increment_count_op(chat_id, Chat::USER_COUNT),
                Chat::not_found(&keys::chat_key(chat_id)),
            )
            .push_or(
                UserRepository::increment_count_op(user_id, User::CHAT_COUNT),
                User::not_found(&keys::user_key(user_id)),
            );
        tx.commit(&self.table).await?;

        Ok(member)
    }

    /// Removes a user from a chat.
    #[tracing::instrument(skip(self))]
    pub async fn leave_chat(&self, chat_id: &str, user_id: &str) -> Result<ChatMember> {
        let key = keys::chat_member_key(chat_id, user_id);
        let member = self
            .chat_members()
            .get_consistent(chat_id, user_id)
            .await?
            .ok_or_else(|| ChatMember::not_found(&key))?;

        let mut tx = TransactionBuilder::new();
        tx.push_or(
            ChatMemberRepository::delete_existing_op(chat_id, user_id),
            ChatMember::not_found(&key),
        )
        .push_or(
            ChatRepository::decrement_count_op(chat_id, Chat::USER_COUNT),
            RepositoryError::CounterUnderflow {
                key: keys::chat_key(chat_id).to_string(),
                field: Chat::USER_COUNT.to_string(),
            },
        )
        .push_or(
            UserRepository::decrement_count_op(user_id, User::CHAT_COUNT),
            RepositoryError::CounterUnderflow {
                key: keys::user_key(user_id).to_string(),
                field: User::CHAT_COUNT.to_string(),
            },
        );
        tx.commit(&self.table).await?;

        if member.unviewed() > 0 {
            self.release_unviewed_chat(user_id).await;
        }
        Ok(member)
    }

    /// Posts a message to a chat.
    ///
    /// In one transaction: creates the message, bumps the chat's
    /// `messagesCount` and activity time, moves the sender's activity time
    /// and adds one unviewed message to every other member. The sender must
    /// be a member. Members whose counter goes from zero to one are counted
    /// in their user's `chatsWithUnviewedMessagesCount` afterwards; that
    /// counter is approximate.
    #[tracing::instrument(skip(self, message), fields(chat_id = %message.chat_id, user_id = %message.user_id))]
    pub async fn add_chat_message(&self, message: ChatMessage) -> Result<ChatMessage> {
        let members = collect_all(self.chat_members().generate_by_chat(&message.chat_id)).await?;
        let at = message.created_at;

        let mut tx = TransactionBuilder::new();
        tx.push_or(ChatMessageRepository::add_op(&message)?, message.already_exists())
            .push_or(
                ChatRepository::record_message_op(&message.chat_id, at),
                Chat::not_found(&keys::chat_key(&message.chat_id)),
            )
            .push_or(
                ChatMemberRepository::touch_activity_op(&message.chat_id, &message.user_id, at),
                ChatMember::not_found(&keys::chat_member_key(&message.chat_id, &message.user_id)),
            );

        let others: Vec<&ChatMember> = members
            .iter()
            .filter(|member| member.user_id != message.user_id)
            .collect();
        let capacity = self.table.max_transact_items().saturating_sub(tx.len());
        let (inline, deferred) = others.split_at(others.len().min(capacity));

        for member in inline {
            tx.push(ChatMemberRepository::record_unviewed_message_op(
                &member.chat_id,
                &member.user_id,
                at,
            ));
        }
        tx.commit(&self.table).await?;

        if !deferred.is_empty() {
            tracing::debug!(count = deferred.len(), "updating remaining members outside the transaction");
            let ops = deferred
                .iter()
                .map(|member| {
                    ChatMemberRepository::record_unviewed_message_op(&member.chat_id, &member.user_id, at)
                })
                .collect();
            self.chunked_writer().write(ops).await?;
        }

        for member in others.iter().filter(|member| member.unviewed() == 0) {
            if let Err(err) = self
                .users()
                .increment_count(&member.user_id, User::CHATS_WITH_UNVIEWED_MESSAGES_COUNT)
                .await
            {
                tracing::warn!(user_id = %member.user_id, error = %err, "failed to count chat with unviewed messages");
            }
        }

        Ok(message)
    }

    /// Records that a user viewed a chat, then brings the member's unviewed
    /// counter in line with the view.
    #[tracing::instrument(skip(self))]
    pub async fn record_chat_view(
        &self,
        chat_id: &str,
        user_id: &str,
        view_count: i64,
        viewed_at: DateTime<Utc>,
    ) -> Result<View> {
        let (view, _) = self
            .views()
            .record_view(&ItemRef::chat(chat_id), user_id, view_count, viewed_at)
            .await?;
        self.sync_messages_unviewed_count(chat_id, user_id).await?;
        Ok(view)
    }

    /// Clears a member's unviewed counter when their last view of the chat
    /// is at or after the member's last message activity.
    ///
    /// The clear is conditioned on the activity time that was compared, so a
    /// message arriving in between keeps its count. Returns whether the
    /// counter was cleared.
    #[tracing::instrument(skip(self))]
    pub async fn sync_messages_unviewed_count(&self, chat_id: &str, user_id: &str) -> Result<bool> {
        let key = keys::chat_member_key(chat_id, user_id);
        let member = self
            .chat_members()
            .get_consistent(chat_id, user_id)
            .await?
            .ok_or_else(|| ChatMember::not_found(&key))?;

        let Some(view) = self
            .views()
            .get_consistent(&ItemRef::chat(chat_id), user_id)
            .await?
        else {
            return Ok(false);
        };

        if view.last_viewed_at < member.last_message_activity_at || member.messages_unviewed_count == Some(0) {
            return Ok(false);
        }

        let cleared = self
            .chat_members()
            .clear_messages_unviewed_count_at(chat_id, user_id, member.last_message_activity_at)
            .await?;

        match cleared {
            Some(_) => {
                if member.unviewed() > 0 {
                    self.release_unviewed_chat(user_id).await;
                }
                Ok(true)
            }
            None => {
                tracing::debug!("new message arrived during sync, keeping unviewed count");
                Ok(false)
            }
        }
    }

    /// Takes one chat off the user's approximate unviewed-chats counter.
    async fn release_unviewed_chat(&self, user_id: &str) {
        match self
            .users()
            .decrement_count(user_id, User::CHATS_WITH_UNVIEWED_MESSAGES_COUNT, true)
            .await
        {
            Ok(Decrement::Applied(_)) | Ok(Decrement::Skipped) => {}
            Err(err) => {
                tracing::warn!(user_id, error = %err, "failed to update unviewed chats count");
            }
        }
    }
}
