use super::{GarageOrchestrator, ShutdownReason};
use crate::error::{EventBusError, GarageError, Result};
use crate::events::{EventFilter, EventReceiver, GarageEvent};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

type SharedSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl GarageOrchestrator {
    /// Run until a signal or a `ShutdownRequested` event arrives, then shut
    /// down gracefully and return the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("Garage controller is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| GarageError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| GarageError::system("Shutdown receiver already taken"))?;

        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        self.setup_signal_handlers(Arc::clone(&shutdown_sender));
        self.watch_shutdown_requests(shutdown_sender);

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| GarageError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("Garage controller shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, shutdown_sender: SharedSender) {
        let token = self.cancellation_token.clone();

        // SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let sender = Arc::clone(&shutdown_sender);
            let token = token.clone();
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };

                tokio::select! {
                    _ = token.cancelled() => {}
                    Some(()) = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                        send_shutdown(&sender, ShutdownReason::Signal("SIGTERM".to_string()))
                            .await;
                    }
                }
            });
        }

        // SIGINT (Ctrl+C)
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                Ok(()) = signal::ctrl_c() => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    send_shutdown(&shutdown_sender, ShutdownReason::Signal("SIGINT".to_string()))
                        .await;
                }
            }
        });
    }

    /// Turn `ShutdownRequested` events (from the console or elsewhere) into
    /// a shutdown
    fn watch_shutdown_requests(&self, shutdown_sender: SharedSender) {
        let mut receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "orchestrator".to_string(),
        );
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = receiver.recv() => match event {
                        Ok(GarageEvent::ShutdownRequested { reason, .. }) => {
                            send_shutdown(&shutdown_sender, ShutdownReason::UserRequest(reason))
                                .await;
                            break;
                        }
                        Ok(_) => {}
                        Err(EventBusError::Lagged { .. }) => {}
                        Err(_) => break,
                    },
                }
            }
        });
    }
}

async fn send_shutdown(sender: &SharedSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}
