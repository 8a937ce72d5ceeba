//! Matrix client synchronization and event handling.
//!
//! This module provides the [`MatrixSync`] struct for managing the Matrix client's
//! synchronization loop and handling real-time events from the homeserver.
//!
//! # Overview
//!
//! The [`MatrixSync::sync`] method:
//! 1. Registers the auto-join handler for invitations
//! 2. Performs an initial sync to catch up on offline events (especially invites)
//! 3. Registers the message handler, so only messages received afterwards are handled
//! 4. Fires the ready hook, exactly once per run
//! 5. Enters the continuous sync loop

use std::sync::Arc;

use anyhow::Result;
use log::{error, info, warn};
use matrix_sdk::{
    Client, Room, RoomState,
    config::SyncSettings,
    ruma::{
        api::client::filter::FilterDefinition,
        events::room::{
            member::StrippedRoomMemberEvent,
            message::{MessageType, OriginalSyncRoomMessageEvent},
        },
    },
};
use tokio::time::{Duration, sleep};

use crate::matrix::client::channel_name;

/// Delay before retrying a failed initial sync.
const INITIAL_SYNC_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A text message received in a joined room.
#[derive(Debug, Clone)]
pub struct RoomMessage {
    /// The message text content
    pub body: String,
    /// The room where the message was sent
    pub room_id: String,
    /// Display name of the room, see [`channel_name`]
    pub channel_name: String,
    /// The user who sent the message
    pub sender_id: String,
    /// The unique event identifier
    pub event_id: String,
}

/// Manages Matrix client synchronization and event processing.
pub struct MatrixSync {
    /// The matrix client
    client: Client,
}

impl MatrixSync {
    /// Creates a new MatrixSync instance.
    ///
    /// This does not start the synchronization process; call [`MatrixSync::sync`]
    /// to begin syncing.
    pub fn new(client: &Client) -> Self {
        MatrixSync {
            client: client.to_owned(),
        }
    }

    /// Runs one synchronization session until it fails.
    ///
    /// Each call is a new connection, `on_ready` fires once per call after the
    /// initial sync.
    ///
    /// # Arguments
    ///
    /// * `on_message` - Callback invoked for each text message in a joined room
    /// * `on_ready` - Callback invoked once the initial sync completed
    ///
    /// # Errors
    ///
    /// Returns an error when the sync loop stops, the handlers registered by
    /// this run are removed first.
    pub async fn sync<F, G>(&self, on_message: F, on_ready: G) -> Result<()>
    where
        F: Fn(RoomMessage) + Send + Sync + 'static,
        G: Fn() + Send + Sync + 'static,
    {
        info!("start syncing");

        // Auto join rooms when invited
        let join_handle = self.client.add_event_handler(auto_join_rooms);

        // Enable room members lazy-loading
        // See <https://spec.matrix.org/v1.6/client-server-api/#lazy-loading-room-members>.
        let filter = FilterDefinition::with_lazy_loading();
        let mut sync_settings = SyncSettings::default().filter(filter.into());

        // First sync to only get the state and invitations received while offline
        let response = loop {
            match self.client.sync_once(sync_settings.clone()).await {
                Ok(response) => break response,
                Err(error) => {
                    error!("an error occurred during initial sync: {error}");
                    error!("trying again in {}s", INITIAL_SYNC_RETRY_DELAY.as_secs());
                    sleep(INITIAL_SYNC_RETRY_DELAY).await;
                }
            }
        };

        // Listen to incoming room messages. Because we are listening after the sync_once, we only get new messages.
        let on_message = Arc::new(on_message);
        let message_handle = self.client.add_event_handler({
            let on_message = Arc::clone(&on_message);
            move |event: OriginalSyncRoomMessageEvent, room: Room, client: Client| {
                let on_message = Arc::clone(&on_message);
                async move { on_room_message(event, room, client, on_message.as_ref()).await }
            }
        });

        on_ready();

        // Since we called `sync_once` before we entered our sync loop we must pass
        // that sync token to `sync`
        sync_settings = sync_settings.token(response.next_batch);
        let result = self.client.sync(sync_settings).await;

        self.client.remove_event_handler(message_handle);
        self.client.remove_event_handler(join_handle);

        result?;
        Ok(())
    }
}

/// Automatically joins rooms when the bot receives an invitation.
///
/// # References
///
/// See <https://github.com/matrix-org/synapse/issues/4345> for the Synapse issue
/// that necessitates the retry logic.
async fn auto_join_rooms(room_member: StrippedRoomMemberEvent, client: Client, room: Room) {
    let Some(user_id) = client.user_id() else {
        warn!("could not get user id from client");
        return;
    };

    // Ignore if the invite is not for us
    if room_member.state_key != user_id {
        return;
    }

    tokio::spawn(async move {
        info!("auto joining room {}", room.room_id());
        let mut delay = 2;

        while let Err(err) = room.join().await {
            // retry autojoin due to synapse sending invites, before the
            // invited user can join for more information see
            // https://github.com/matrix-org/synapse/issues/4345
            error!(
                "failed to join room {} ({err:?}), retrying in {delay}s",
                room.room_id()
            );

            sleep(Duration::from_secs(delay)).await;
            delay *= 2;

            if delay > 3600 {
                error!("can't join room {} ({err:?})", room.room_id());
                return;
            }
        }
        info!("successfully joined room {}", room.room_id());
    });
}

/// Forwards text messages of joined rooms to `on_message`.
///
/// Messages sent by the bot itself and non-text messages are skipped.
async fn on_room_message<F>(
    event: OriginalSyncRoomMessageEvent,
    room: Room,
    client: Client,
    on_message: &F,
) where
    F: Fn(RoomMessage) + Send + Sync + 'static,
{
    // Ignore messages from non-joined rooms
    if room.state() != RoomState::Joined {
        return;
    }

    if client.user_id() == Some(&*event.sender) {
        return;
    }

    let MessageType::Text(text_content) = event.content.msgtype else {
        return;
    };

    on_message(RoomMessage {
        body: text_content.body,
        room_id: room.room_id().to_string(),
        channel_name: channel_name(&room),
        sender_id: event.sender.to_string(),
        event_id: event.event_id.to_string(),
    });
}
