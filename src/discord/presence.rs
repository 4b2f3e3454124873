//! Discord Rich Presence integration using discord-sdk

use std::time::Duration;

use async_trait::async_trait;
use discord_sdk::{
    activity::{ActivityBuilder, Assets},
    wheel::{UserState, Wheel},
    Discord, Subscriptions,
};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use crate::presence::{PresenceError, PresenceSink, RichPresence};

/// Upper bound on a single activity request once it has been sent to Discord
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// discord-sdk only stops its I/O task from inside a live connection, so a
/// disconnect while Discord is unreachable never completes on its own
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `shutdown` waits for the background task before aborting it
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Asset key of the large image uploaded to the Discord application
const LARGE_IMAGE_KEY: &str = "player_logo";

type Reply = oneshot::Sender<Result<(), PresenceError>>;

enum DiscordCommand {
    Update(RichPresence, Reply),
    Clear(Reply),
}

impl DiscordCommand {
    fn into_parts(self) -> (Option<RichPresence>, Reply) {
        match self {
            Self::Update(presence, reply) => (Some(presence), reply),
            Self::Clear(reply) => (None, reply),
        }
    }
}

fn build_activity(presence: &RichPresence) -> ActivityBuilder {
    let mut activity = ActivityBuilder::new()
        .details(presence.top_line.clone())
        .state(presence.bottom_line.clone())
        .assets(Assets::default().large(LARGE_IMAGE_KEY, None::<&str>));

    if let Some(timestamps) = presence.timestamps {
        activity = activity
            .start_timestamp(timestamps.start)
            .end_timestamp(timestamps.end);
    }

    activity
}

/// Commands are only forwarded while the wheel reports a live user session
fn ensure_connected(state: &UserState) -> Result<(), PresenceError> {
    match state {
        UserState::Connected(_) => Ok(()),
        UserState::Disconnected(_) => Err(PresenceError::Disconnected),
    }
}

fn log_user_state(state: &UserState) {
    match state {
        UserState::Connected(user) => tracing::info!(
            "Discord Rich Presence connected as {}#{}",
            user.username,
            user.discriminator.unwrap_or(0)
        ),
        UserState::Disconnected(err) => {
            tracing::warn!("Discord Rich Presence disconnected: {:?}", err)
        }
    }
}

/// Push `presence`, or clear the activity when it is `None`
async fn send_activity(
    discord: &Discord,
    presence: Option<&RichPresence>,
) -> Result<(), PresenceError> {
    let sent = match presence {
        Some(presence) => {
            tokio::time::timeout(
                COMMAND_TIMEOUT,
                discord.update_activity(build_activity(presence)),
            )
            .await
        }
        None => tokio::time::timeout(COMMAND_TIMEOUT, discord.clear_activity()).await,
    };

    match sent {
        Ok(result) => result.map(|_| ()).map_err(PresenceError::from),
        Err(_) => {
            tracing::warn!("Discord did not answer within {:?}", COMMAND_TIMEOUT);
            Err(PresenceError::Disconnected)
        }
    }
}

/// Serve presence commands until the sender side is closed.
///
/// The SDK reconnects on its own with backoff; `user` follows that, so a
/// command sent while Discord is away is answered with `Disconnected` at once
/// and the next one after a reconnect goes through.
async fn serve_commands(
    discord: &Discord,
    mut user: watch::Receiver<UserState>,
    mut commands: mpsc::UnboundedReceiver<DiscordCommand>,
) {
    let mut watching = true;

    loop {
        tokio::select! {
            changed = user.changed(), if watching => {
                match changed {
                    Ok(()) => log_user_state(&user.borrow_and_update()),
                    Err(_) => watching = false,
                }
            }
            command = commands.recv() => {
                let Some(command) = command else { break };
                let (presence, reply) = command.into_parts();

                let connected = ensure_connected(&user.borrow());
                let result = match connected {
                    Ok(()) => send_activity(discord, presence.as_ref()).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
        }
    }
}

/// Background task that owns the Discord connection for the lifetime of the sink
async fn run_discord_task(
    application_id: i64,
    commands: mpsc::UnboundedReceiver<DiscordCommand>,
) {
    let (wheel, handler) = Wheel::new(Box::new(|err| {
        tracing::warn!("Discord error: {:?}", err);
    }));

    // Dropping `commands` on this path makes every later send fail fast
    let discord = match Discord::new(application_id, Subscriptions::ACTIVITY, Box::new(handler))
    {
        Ok(discord) => discord,
        Err(e) => {
            tracing::warn!("Discord not available: {:?}", e);
            return;
        }
    };

    tracing::info!("Waiting for Discord on application {}", application_id);
    serve_commands(&discord, wheel.user().0, commands).await;

    if tokio::time::timeout(DISCONNECT_TIMEOUT, discord.disconnect())
        .await
        .is_err()
    {
        tracing::debug!("Discord disconnect did not finish, leaving it to process exit");
    }
    tracing::info!("Discord Rich Presence closed");
}

/// Presence sink backed by a background Discord connection
pub struct DiscordPresence {
    commands: Mutex<Option<mpsc::UnboundedSender<DiscordCommand>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DiscordPresence {
    /// Connect to the local Discord client as `application_id`.
    ///
    /// The connection is made and remade in the background. While Discord is
    /// not connected every command fails with [`PresenceError::Disconnected`]
    /// without waiting; once it comes up, commands are forwarded again.
    pub fn init(application_id: i64) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_discord_task(application_id, commands_rx));
        Self::from_parts(commands_tx, task)
    }

    fn from_parts(commands: mpsc::UnboundedSender<DiscordCommand>, task: JoinHandle<()>) -> Self {
        Self {
            commands: Mutex::new(Some(commands)),
            task: Mutex::new(Some(task)),
        }
    }

    async fn send(
        &self,
        command: impl FnOnce(Reply) -> DiscordCommand,
    ) -> Result<(), PresenceError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        {
            let commands = self.commands.lock().await;
            let sender = commands.as_ref().ok_or(PresenceError::Disconnected)?;
            sender
                .send(command(reply_tx))
                .map_err(|_| PresenceError::Disconnected)?;
        }

        reply_rx.await.map_err(|_| PresenceError::Disconnected)?
    }
}

#[async_trait]
impl PresenceSink for DiscordPresence {
    fn name(&self) -> &'static str {
        "Discord"
    }

    async fn update_presence(&self, presence: &RichPresence) -> Result<(), PresenceError> {
        let presence = presence.clone();
        self.send(|reply| DiscordCommand::Update(presence, reply)).await
    }

    async fn clear_presence(&self) -> Result<(), PresenceError> {
        self.send(DiscordCommand::Clear).await
    }

    async fn shutdown(&self) {
        // Closing the channel ends the command loop
        self.commands.lock().await.take();

        let Some(mut task) = self.task.lock().await.take() else {
            return;
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Discord task ended abnormally: {}", e),
            Err(_) => {
                tracing::warn!("Discord task did not stop in {:?}, aborting", SHUTDOWN_TIMEOUT);
                task.abort();
            }
        }
    }
}
