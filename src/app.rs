//! Runs the controller and the audio reconciliation side by side

use crate::audio::Reconciler;
use crate::controller::{DeviceTransport, MidiController};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::warn;

/// Drive the device receive loop and the audio reconciliation until `shutdown`
/// completes.
///
/// The receive loop runs on a `LocalSet` since MIDI port handles need not be
/// `Send`. The reconciler resubscribes by itself when the audio server goes
/// away, so losing the audio server never stops the controller.
pub async fn run_app<T, F>(
    controller: MidiController<T>,
    reconnect_rx: mpsc::UnboundedReceiver<()>,
    reconciler: Reconciler,
    shutdown: F,
) where
    T: DeviceTransport + 'static,
    F: Future<Output = ()>,
{
    let local = LocalSet::new();
    local
        .run_until(async move {
            let receiver = tokio::task::spawn_local(controller.receive(reconnect_rx));
            let reconciliation = tokio::spawn(reconciler.run());

            tokio::select! {
                result = receiver => match result {
                    Ok(()) => warn!("Receive loop stopped"),
                    Err(e) => warn!("Receive loop panicked: {}", e),
                },
                _ = shutdown => {}
            }

            reconciliation.abort();
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{SinkInputMirror, SinkMirror};
    use crate::controller::DispatchTable;
    use crate::midi::DeviceEvent;
    use crate::testing::{FakeAudioServer, FakeTransport, ValueRecorder};
    use parking_lot::Mutex;
    use regex::Regex;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_controller_outlives_audio_subscription() {
        let transport = FakeTransport::with_inputs(&["LPD8"]);
        let queue = transport.queue.clone();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut table = DispatchTable::new();
        table.bind_control_change(11, Arc::new(ValueRecorder(seen.clone())));
        let mut controller = MidiController::new(Regex::new("LPD8").unwrap(), transport, table);
        assert!(controller.connect());

        let server = Arc::new(FakeAudioServer::default());
        let reconciler = Reconciler::new(
            server.clone(),
            Arc::new(SinkMirror::new("sinks")),
            Arc::new(SinkInputMirror::new("sink inputs")),
        )
        .with_resubscribe_delay(Duration::from_millis(200));
        let (_reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();

        let scenario = {
            let server = server.clone();
            async move {
                while server.subscriptions() == 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                // The sound server goes away, then a knob is turned
                server.close_subscription();
                tokio::time::sleep(Duration::from_millis(500)).await;
                queue.lock().push(DeviceEvent::control_change(11, 99));
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        };

        run_app(controller, reconnect_rx, reconciler, scenario).await;

        assert_eq!(*seen.lock(), vec![99]);
        assert_eq!(server.subscriptions(), 2);
    }
}
