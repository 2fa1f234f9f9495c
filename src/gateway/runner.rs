use tokio::sync::oneshot;
use twilight_gateway::{CloseFrame, Event, EventTypeFlags, StreamExt};

use super::snapshot::Snapshot;
use super::{Bot, ShardInfo};

#[tracing::instrument(skip(bot, shutdown_rx))]
pub async fn runner(mut bot: Bot, mut shutdown_rx: oneshot::Receiver<()>) -> anyhow::Result<()> {
    let shard_info_sender = bot.shard_info_tx.clone();

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                tracing::info!("Gateway runner received shutdown signal. Exiting event loop.");
                break;
            }

            item = bot.shard.next_event(EventTypeFlags::all()) => {
                let event = match item {
                    None => {
                        tracing::info!("Shard event stream ended. Runner will exit.");
                        break;
                    }
                    Some(Ok(event)) => event,
                    Some(Err(source)) => {
                        tracing::warn!(?source, "Error receiving event from shard");
                        continue;
                    }
                };

                if let Event::GatewayClose(frame) = &event {
                    match shutdown_rx.try_recv() {
                        Ok(()) | Err(oneshot::error::TryRecvError::Closed) => {
                            tracing::info!(
                                ?frame,
                                "Gateway connection closed during planned shutdown."
                            );
                        }
                        Err(oneshot::error::TryRecvError::Empty) => {
                            tracing::warn!(
                                ?frame,
                                "Gateway connection closed unexpectedly. \
                                 The runner will exit as this is non-resumable."
                            );
                        }
                    }
                    break;
                }

                if let Event::GatewayHeartbeatAck = &event {
                    match bot.shard.latency().average() {
                        Some(duration) => {
                            let shard_info = ShardInfo {
                                latency_ms: Some(duration.as_millis()),
                            };
                            if let Err(e) = shard_info_sender.send(shard_info).await {
                                tracing::warn!(error = %e, "Failed to send shard info");
                            }
                        }
                        None => tracing::debug!(
                            shard = bot.shard.id().number(),
                            "No average latency yet after heartbeat ack"
                        ),
                    }
                }

                let state = bot.state.clone();
                tokio::spawn(async move {
                    state.songbird.process(&event).await;
                    // Handlers see the cache after the event, so keep what it replaces.
                    let snapshot = Snapshot::take(&state.cache, &event);
                    state.cache.update(&event);

                    if let Err(e) = super::process(event, snapshot, state).await {
                        tracing::error!(error = ?e, "Error processing event");
                    }
                });
            }
        }
    }

    tracing::info!("Gateway runner loop ended. Closing shard...");
    bot.shard.close(CloseFrame::NORMAL);

    Ok(())
}
