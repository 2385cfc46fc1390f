//! Keeps the audio mirrors in line with the audio server

use super::mirror::{SinkInputMirror, SinkMirror};
use super::{AudioServer, Facility, ServerEvent, ServerEventKind};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Wait before subscribing again once the audio server went away
pub const DEFAULT_RESUBSCRIBE_DELAY: Duration = Duration::from_secs(2);

/// Background refresher for the sink and sink input mirrors
pub struct Reconciler {
    server: Arc<dyn AudioServer>,
    sinks: Arc<SinkMirror>,
    sink_inputs: Arc<SinkInputMirror>,
    resubscribe_delay: Duration,
}

impl Reconciler {
    pub fn new(
        server: Arc<dyn AudioServer>,
        sinks: Arc<SinkMirror>,
        sink_inputs: Arc<SinkInputMirror>,
    ) -> Self {
        Self { server, sinks, sink_inputs, resubscribe_delay: DEFAULT_RESUBSCRIBE_DELAY }
    }

    pub fn with_resubscribe_delay(mut self, delay: Duration) -> Self {
        self.resubscribe_delay = delay;
        self
    }

    pub async fn refresh_sinks(&self) -> Result<()> {
        let sinks = self.server.list_sinks().await?;
        self.sinks.refresh(sinks).await;
        Ok(())
    }

    /// Re-list streams; change observers run before this returns
    pub async fn refresh_sink_inputs(&self) -> Result<()> {
        let inputs = self.server.list_sink_inputs().await?;
        self.sink_inputs.refresh(inputs).await;
        Ok(())
    }

    /// React to one server event; returns whether a mirror was refreshed
    pub async fn handle_event(&self, event: &ServerEvent) -> Result<bool> {
        if event.kind == ServerEventKind::Change {
            trace!("Ignoring {}", event);
            return Ok(false);
        }

        match event.facility {
            Facility::SinkInput => {
                debug!("Stream {}, refreshing streams", event);
                self.refresh_sink_inputs().await?;
                Ok(true)
            }
            Facility::Sink => {
                debug!("Sink {}, refreshing sinks", event);
                self.refresh_sinks().await?;
                Ok(true)
            }
            Facility::Other(_) => Ok(false),
        }
    }

    /// Subscribe, refresh both mirrors, then follow the event stream until it ends.
    ///
    /// The subscription is opened before the full refresh, so nothing created
    /// in between goes unnoticed.
    pub async fn follow(&self) -> Result<()> {
        let mut events = self.server.subscribe().await?;

        if let Err(e) = self.refresh_sink_inputs().await {
            warn!("Initial stream refresh failed: {:#}", e);
        }
        if let Err(e) = self.refresh_sinks().await {
            warn!("Initial sink refresh failed: {:#}", e);
        }
        info!(
            "🔈 Audio mirrors ready: {} sink(s), {} stream(s)",
            self.sinks.get().len(),
            self.sink_inputs.get().len()
        );

        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle_event(&event).await {
                warn!("Failed to handle audio event '{}': {:#}", event, e);
            }
        }
        Ok(())
    }

    /// Follow the audio server forever, subscribing again after every loss
    pub async fn run(self) {
        loop {
            match self.follow().await {
                Ok(()) => warn!("Audio server subscription closed"),
                Err(e) => warn!("Audio server subscription failed: {:#}", e),
            }
            debug!("Subscribing again in {:?}", self.resubscribe_delay);
            tokio::time::sleep(self.resubscribe_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{StreamControl, StreamMatcher};
    use crate::testing::{sink, sink_input, AudioCall, FakeAudioServer};
    use crate::audio::SinkState;
    use regex::Regex;

    fn event(facility: Facility, kind: ServerEventKind) -> ServerEvent {
        ServerEvent { facility, kind, index: 1 }
    }

    fn fixture() -> (Reconciler, Arc<FakeAudioServer>, Arc<SinkMirror>, Arc<SinkInputMirror>) {
        let server = Arc::new(FakeAudioServer::default());
        let sinks = Arc::new(SinkMirror::new("sinks"));
        let inputs = Arc::new(SinkInputMirror::new("sink inputs"));
        (
            Reconciler::new(server.clone(), sinks.clone(), inputs.clone()),
            server,
            sinks,
            inputs,
        )
    }

    #[tokio::test]
    async fn test_events_refresh_matching_mirror() {
        let (reconciler, server, sinks, inputs) = fixture();
        server.set_sinks(vec![sink(1, "HDMI", SinkState::Idle)]);
        server.set_sink_inputs(vec![sink_input(5, Some("mpv"), None)]);

        assert!(reconciler
            .handle_event(&event(Facility::Sink, ServerEventKind::New))
            .await
            .unwrap());
        assert_eq!(sinks.get().len(), 1);
        assert!(inputs.get().is_empty());

        assert!(reconciler
            .handle_event(&event(Facility::SinkInput, ServerEventKind::Remove))
            .await
            .unwrap());
        assert_eq!(inputs.get().len(), 1);
    }

    #[tokio::test]
    async fn test_other_events_are_ignored() {
        let (reconciler, server, sinks, _) = fixture();
        server.set_sinks(vec![sink(1, "HDMI", SinkState::Idle)]);

        assert!(!reconciler
            .handle_event(&event(Facility::Sink, ServerEventKind::Change))
            .await
            .unwrap());
        assert!(!reconciler
            .handle_event(&event(Facility::Other("client".into()), ServerEventKind::New))
            .await
            .unwrap());
        assert!(sinks.get().is_empty());
    }

    #[tokio::test]
    async fn test_subscribes_before_initial_refresh() {
        let (reconciler, server, _, _) = fixture();

        let task = tokio::spawn(async move { reconciler.follow().await });
        while server.queries().len() < 3 {
            tokio::task::yield_now().await;
        }
        task.abort();

        assert_eq!(server.queries(), vec!["subscribe", "list sink-inputs", "list sinks"]);
    }

    #[tokio::test]
    async fn test_run_replays_remembered_volume_on_new_stream() {
        let (reconciler, server, _, inputs) = fixture();
        let control = Arc::new(StreamControl::new(
            inputs.clone(),
            StreamMatcher::new(Some(Regex::new("spotify").unwrap()), None).unwrap(),
            server.clone(),
        ));
        inputs.register_on_change(control.clone());

        server.set_sink_inputs(vec![sink_input(7, Some("spotify"), None)]);
        let task = tokio::spawn(reconciler.run());

        // Wait for the initial refresh
        while inputs.get().is_empty() {
            tokio::task::yield_now().await;
        }
        control.set_volume(0.4).await.unwrap();
        server.clear_calls();

        // The player restarts with a new stream index
        server.set_sink_inputs(vec![sink_input(8, Some("spotify"), None)]);
        server
            .event_sender()
            .send(event(Facility::SinkInput, ServerEventKind::New))
            .unwrap();
        while server.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        task.abort();

        assert_eq!(server.calls(), vec![AudioCall::SinkInputVolume(8, vec![0.4, 0.4])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_resubscribes_after_server_restart() {
        let (reconciler, server, sinks, _) = fixture();
        let task = tokio::spawn(reconciler.with_resubscribe_delay(Duration::from_millis(200)).run());

        while server.subscriptions() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(sinks.get().is_empty());

        // The sound server restarts with a new sink
        server.set_sinks(vec![sink(4, "HDMI", SinkState::Running)]);
        server.close_subscription();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(!task.is_finished());
        assert_eq!(server.subscriptions(), 2);
        assert_eq!(sinks.get().len(), 1);
        task.abort();
    }
}
