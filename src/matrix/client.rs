//! Matrix client wrapper for bot messaging and synchronization.
//!
//! This module provides a high-level [`MatrixClient`] interface that wraps the
//! Matrix SDK client and handles session restoration, message sending, room
//! naming and role lookups.

use std::path::Path;

use log::{debug, error, info, warn};
use matrix_sdk::{
    Client, Room, SessionMeta, SessionTokens,
    authentication::matrix::MatrixSession,
    ruma::{
        OwnedUserId, RoomId, UserId,
        events::room::{message::RoomMessageEventContent, power_levels::UserPowerLevel},
    },
};

use crate::{
    commands::{
        ChatSession, Reply, RoleSet, authorization::roles_for_power_level, format_help_markdown,
    },
    matrix::{
        SessionCredentials,
        sync::{MatrixSync, RoomMessage},
    },
};

/// Display name set on the bot account.
const DISPLAY_NAME: &str = "Minecraft Query Bot";

/// High-level Matrix client for bot messaging operations.
///
/// Manages a Matrix SDK client with synchronization capabilities and implements
/// [`ChatSession`] for the command dispatcher.
pub struct MatrixClient {
    /// Synchronization service for handling real-time events
    matrix_sync: MatrixSync,
    /// Underlying Matrix SDK client
    client: Client,
}

impl MatrixClient {
    /// Restores a Matrix session from an existing access token.
    ///
    /// The homeserver is discovered from the server name of the user id, the
    /// client state lives in a SQLite store at `store_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The user id is malformed
    /// - The homeserver cannot be discovered or the store cannot be opened
    /// - The session is rejected
    pub async fn new(
        credentials: &SessionCredentials,
        store_path: impl AsRef<Path>,
    ) -> Result<Self, anyhow::Error> {
        info!("restoring matrix session for {}", credentials.user_id);

        let user_id: OwnedUserId = credentials.user_id.clone().try_into()?;
        let client = Client::builder()
            .server_name(user_id.server_name())
            .sqlite_store(store_path.as_ref(), None)
            .build()
            .await?;

        let session = MatrixSession {
            meta: SessionMeta {
                user_id,
                device_id: credentials.device_id.as_str().into(),
            },
            tokens: SessionTokens {
                access_token: credentials.access_token.clone(),
                refresh_token: None,
            },
        };
        client.restore_session(session).await?;

        if let Err(e) = client.account().set_display_name(Some(DISPLAY_NAME)).await {
            warn!("failed to set display name: {:?}", e);
        }

        info!("matrix session restored successfully");

        let matrix_sync = MatrixSync::new(&client);
        Ok(MatrixClient {
            matrix_sync,
            client,
        })
    }

    /// Runs one synchronization session.
    ///
    /// `on_ready` fires once the initial sync completed, `on_message` for every
    /// text message received afterwards.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the sync loop.
    pub async fn sync<F, G>(&self, on_message: F, on_ready: G) -> Result<(), anyhow::Error>
    where
        F: Fn(RoomMessage) + Send + Sync + 'static,
        G: Fn() + Send + Sync + 'static,
    {
        let result = self.matrix_sync.sync(on_message, on_ready).await;
        if let Err(e) = &result {
            error!("matrix sync ended with error: {:?}", e);
        }
        result
    }

    /// Computes the role names of `sender_id` in `room_id` from its power level.
    ///
    /// Unknown rooms, malformed ids and unreadable power levels give the roles
    /// of a level 0 member.
    pub async fn roles_for(&self, room_id: &str, sender_id: &str, manager_level: i64) -> RoleSet {
        let level = match self.power_level(room_id, sender_id).await {
            Ok(level) => level,
            Err(e) => {
                warn!("failed to read power level of {} in {}: {}", sender_id, room_id, e);
                0
            }
        };

        debug!("{} has power level {} in {}", sender_id, level, room_id);
        roles_for_power_level(level, manager_level)
    }

    async fn power_level(&self, room_id: &str, sender_id: &str) -> Result<i64, anyhow::Error> {
        let room = self.room(room_id)?;
        let user_id = UserId::parse(sender_id)?;
        let power_levels = room.power_levels().await?;

        Ok(power_level_value(power_levels.for_user(&user_id)))
    }

    /// Finds the id of the joined room called `name`.
    pub fn room_id_for_channel(&self, name: &str) -> Option<String> {
        self.client
            .joined_rooms()
            .into_iter()
            .find(|room| channel_name(room) == name)
            .map(|room| room.room_id().to_string())
    }

    fn room(&self, room_id: &str) -> Result<Room, anyhow::Error> {
        let room_id = RoomId::parse(room_id)?;
        self.client
            .get_room(&room_id)
            .ok_or_else(|| anyhow::anyhow!("unknown room {}", room_id))
    }

    /// Internal helper to send message content to a room.
    async fn send(&self, room_id: &str, content: RoomMessageEventContent) {
        let room = match self.room(room_id) {
            Ok(room) => room,
            Err(e) => {
                error!("failed to send message: {}", e);
                return;
            }
        };

        if let Err(e) = room.send(content).await {
            error!("failed to send message: {:?}", e);
        }
    }
}

impl ChatSession for MatrixClient {
    /// Sends the reply as Markdown, help documents are rendered first.
    async fn send_reply(&self, channel_id: &str, reply: &Reply) {
        let body = match reply {
            Reply::Text(text) => text.to_owned(),
            Reply::Help(document) => format_help_markdown(document),
        };

        self.send(channel_id, RoomMessageEventContent::text_markdown(body))
            .await;
    }

    async fn channel_names(&self) -> Vec<String> {
        self.client
            .joined_rooms()
            .iter()
            .map(channel_name)
            .collect()
    }
}

/// Name of a room as typed in `mc!set-channel`.
pub(crate) fn channel_name(room: &Room) -> String {
    let alias = room.canonical_alias();
    pick_channel_name(
        alias.as_ref().map(|alias| alias.alias()),
        room.name(),
        room.room_id().as_str(),
    )
}

/// The canonical alias localpart, else the `m.room.name`, else the room id.
///
/// Aliases never contain spaces, display names often do and could not be
/// passed as a single command argument.
fn pick_channel_name(alias_localpart: Option<&str>, name: Option<String>, room_id: &str) -> String {
    alias_localpart
        .filter(|alias| !alias.is_empty())
        .map(str::to_owned)
        .or_else(|| name.filter(|name| !name.is_empty()))
        .unwrap_or_else(|| room_id.to_owned())
}

/// Room creators have an infinite power level.
fn power_level_value(level: UserPowerLevel) -> i64 {
    match level {
        UserPowerLevel::Int(level) => i64::from(level),
        _ => i64::MAX,
    }
}
