//! Bot module wiring Matrix to the command dispatcher.
//!
//! This module provides the main [`Bot`] implementation that connects a Matrix
//! client with the command dispatcher, the Minecraft status client and the
//! configuration store.
//!
//! # Overview
//!
//! Room members type `mc!` commands to query a Minecraft server, start it when
//! it crashed, or restrict the bot to one room. Each message is handled in its
//! own task, a slow server query never delays other messages.
//!
//! # Command Processing Flow
//!
//! ```text
//! Matrix Message → Prefix check → Roles from power level → Dispatcher → Reply
//! ```
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use tokio::sync::Mutex;
//! # use mcqbot::bot::Bot;
//! # use mcqbot::config::ConfigStore;
//! # async fn run() -> Result<(), anyhow::Error> {
//! let store = ConfigStore::load("config.json").await?;
//!
//! // Create and start the bot
//! let bot = Bot::new(Arc::new(Mutex::new(store)), "./data").await?;
//! bot.start().await; // Runs until `mc!exit`
//! # Ok(())
//! # }
//! ```

use std::{path::Path, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{sync::Mutex, time};

use crate::{
    commands::{COMMAND_PREFIX, Dispatcher, InboundMessage, Outcome, ReadyNotice},
    config::ConfigStore,
    launcher::{DEFAULT_START_SCRIPT, StartScript},
    matrix::{MatrixClient, RoomMessage, SessionCredentials},
    status::MinecraftStatusClient,
};

/// Delay before a new sync session after the previous one failed.
const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Main bot structure.
///
/// # Thread Safety
///
/// All shared state is wrapped in `Arc` for sharing across the per-message
/// tasks. The configuration store is the only mutable state, behind a `Mutex`.
pub struct Bot {
    /// Matrix client for sending and receiving messages
    matrix_client: Arc<MatrixClient>,
    /// Command dispatcher, stateless apart from the shared store
    dispatcher: Arc<Dispatcher<MinecraftStatusClient>>,
    /// Shared configuration store
    config_store: Arc<Mutex<ConfigStore>>,
}

impl Bot {
    /// Creates a new Bot instance and restores the Matrix session.
    ///
    /// # Arguments
    ///
    /// * `config_store` - Loaded and complete configuration
    /// * `data_path` - Directory holding the Matrix store, under `session/`
    ///
    /// # Errors
    ///
    /// Returns an error if the Matrix session cannot be restored.
    pub async fn new(
        config_store: Arc<Mutex<ConfigStore>>,
        data_path: impl AsRef<Path>,
    ) -> Result<Self, anyhow::Error> {
        let credentials = {
            let store = config_store.lock().await;
            SessionCredentials {
                user_id: store.get_user_id().to_owned(),
                device_id: store.get_device_id().to_owned(),
                access_token: store.get_token().to_owned(),
            }
        };

        let matrix_client =
            Arc::new(MatrixClient::new(&credentials, data_path.as_ref().join("session")).await?);

        let dispatcher = Arc::new(Dispatcher::new(
            MinecraftStatusClient::new(),
            Arc::clone(&config_store),
            StartScript::new(DEFAULT_START_SCRIPT),
        ));

        Ok(Bot {
            matrix_client,
            dispatcher,
            config_store,
        })
    }

    /// Starts the bot.
    ///
    /// Runs sync sessions forever, a failed session is restarted after
    /// [`RECONNECT_DELAY`]. The process only ends through `mc!exit`.
    pub async fn start(self) {
        loop {
            let on_message = {
                let matrix_client = Arc::clone(&self.matrix_client);
                let dispatcher = Arc::clone(&self.dispatcher);
                let config_store = Arc::clone(&self.config_store);
                move |message: RoomMessage| {
                    Self::handle_matrix_message(
                        message,
                        Arc::clone(&matrix_client),
                        Arc::clone(&dispatcher),
                        Arc::clone(&config_store),
                    )
                }
            };

            // Each sync run is a new connection with its own notice guard
            let ready_notice = Arc::new(ReadyNotice::new());
            let on_ready = {
                let matrix_client = Arc::clone(&self.matrix_client);
                let config_store = Arc::clone(&self.config_store);
                move || {
                    Self::announce_ready(
                        Arc::clone(&matrix_client),
                        Arc::clone(&config_store),
                        Arc::clone(&ready_notice),
                    )
                }
            };

            if self.matrix_client.sync(on_message, on_ready).await.is_err() {
                warn!("reconnecting in {}s", RECONNECT_DELAY.as_secs());
                time::sleep(RECONNECT_DELAY).await;
            }
        }
    }

    /// Sends the initialization notice to the restricted room, if any.
    fn announce_ready(
        matrix_client: Arc<MatrixClient>,
        config_store: Arc<Mutex<ConfigStore>>,
        ready_notice: Arc<ReadyNotice>,
    ) {
        tokio::spawn(async move {
            let channel = config_store
                .lock()
                .await
                .get_restricted_channel()
                .to_owned();

            ready_notice
                .announce(matrix_client.as_ref(), &channel, |name| {
                    matrix_client.room_id_for_channel(name)
                })
                .await;
        });
    }

    /// Handles an incoming Matrix message in its own task.
    ///
    /// Messages without the command prefix return before the power level
    /// lookup. An [`Outcome::Exit`] ends the process once the acknowledgement
    /// was sent.
    fn handle_matrix_message(
        message: RoomMessage,
        matrix_client: Arc<MatrixClient>,
        dispatcher: Arc<Dispatcher<MinecraftStatusClient>>,
        config_store: Arc<Mutex<ConfigStore>>,
    ) {
        if !message.body.starts_with(COMMAND_PREFIX) {
            return;
        }

        debug!("handling event {} in {}", message.event_id, message.room_id);

        tokio::spawn(async move {
            let manager_level = config_store.lock().await.get_manager_level();
            let roles = matrix_client
                .roles_for(&message.room_id, &message.sender_id, manager_level)
                .await;

            let inbound = InboundMessage {
                body: message.body,
                channel_id: message.room_id,
                channel_name: message.channel_name,
                sender: message.sender_id,
                roles,
            };

            if dispatcher.dispatch(&inbound, matrix_client.as_ref()).await == Outcome::Exit {
                info!("exit requested by {}", inbound.sender);
                std::process::exit(0);
            }
        });
    }
}
