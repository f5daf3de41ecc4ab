use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions};
use lapin::types::FieldTable;
use tracing::{error, info, warn};

use crate::infrastructure::queue::rabbitmq::{RabbitMqService, TRANSCODE_QUEUE};
use crate::modules::video::events::TranscodeJob;

/// Consume `transcoding_tasks` and hand each job to the local worker pool.
///
/// A delivery is acked once the pool has accepted it. Payloads that do not
/// parse are rejected without requeue.
pub async fn start_transcoder_consumer(
    queue: RabbitMqService,
    pool_tx: async_channel::Sender<TranscodeJob>,
) -> anyhow::Result<()> {
    info!("🎥 Starting transcoder consumer...");

    let channel = queue.channel();
    let mut consumer = {
        let channel = channel.lock().await;
        RabbitMqService::declare_queue(&channel, TRANSCODE_QUEUE).await?;
        channel
            .basic_consume(
                TRANSCODE_QUEUE,
                "transcoder_worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create consumer: {}", e))?
    };

    info!("🎥 Transcoder consumer listening on '{}'", TRANSCODE_QUEUE);

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("RabbitMQ delivery error: {}", e);
                continue;
            }
        };

        let job = match serde_json::from_slice::<TranscodeJob>(&delivery.data) {
            Ok(job) => job,
            Err(e) => {
                warn!("❌ Dropping malformed transcoding job: {}", e);
                let reject = BasicNackOptions {
                    requeue: false,
                    ..BasicNackOptions::default()
                };
                if let Err(e) = delivery.nack(reject).await {
                    error!("Failed to nack message: {}", e);
                }
                continue;
            }
        };

        let video_id = job.video_id;
        if pool_tx.send(job).await.is_err() {
            // Pool is gone; leave the message for another consumer.
            warn!(video_id = %video_id, "Worker pool closed, stopping consumer");
            let requeue = BasicNackOptions {
                requeue: true,
                ..BasicNackOptions::default()
            };
            let _ = delivery.nack(requeue).await;
            break;
        }

        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!(video_id = %video_id, "Failed to ack message: {}", e);
        }
    }

    Ok(())
}
