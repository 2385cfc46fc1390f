//! Named controls over application streams (sink inputs)

use super::mirror::{ChangeObserver, SinkInputMirror};
use super::sinks::SinkGroup;
use super::{clamp_volume, uniform_volume, AudioServer, SinkInput, SinkInputView, View};
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Selects streams by application name and/or media name
#[derive(Debug, Clone)]
pub struct StreamMatcher {
    app: Option<Regex>,
    media: Option<Regex>,
}

impl StreamMatcher {
    /// At least one pattern is required
    pub fn new(app: Option<Regex>, media: Option<Regex>) -> Result<Self> {
        if app.is_none() && media.is_none() {
            bail!("A stream matcher needs an application or a media pattern");
        }
        Ok(Self { app, media })
    }

    /// A given pattern must find its property; an absent pattern matches anything
    pub fn matches(&self, input: &SinkInput) -> bool {
        fn check(pattern: &Option<Regex>, value: Option<&str>) -> bool {
            match pattern {
                None => true,
                Some(pattern) => value.is_some_and(|v| pattern.is_match(v)),
            }
        }
        check(&self.app, input.app_name()) && check(&self.media, input.media_name())
    }
}

impl fmt::Display for StreamMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.app, &self.media) {
            (Some(app), Some(media)) => write!(f, "app /{}/ media /{}/", app, media),
            (Some(app), None) => write!(f, "app /{}/", app),
            (None, Some(media)) => write!(f, "media /{}/", media),
            (None, None) => write!(f, "any stream"),
        }
    }
}

/// Volume and routing control for the streams of one application
///
/// The last volume requested through [`StreamControl::set_volume`] is
/// remembered and applied again whenever the stream mirror changes, so a
/// restarted application gets its volume back.
pub struct StreamControl {
    matcher: StreamMatcher,
    view: SinkInputView,
    server: Arc<dyn AudioServer>,
    remembered: Mutex<Option<f64>>,
}

impl StreamControl {
    pub fn new(
        mirror: Arc<SinkInputMirror>,
        matcher: StreamMatcher,
        server: Arc<dyn AudioServer>,
    ) -> Self {
        let predicate = matcher.clone();
        let view = View::new(mirror, matcher.to_string(), move |input: &SinkInput| {
            predicate.matches(input)
        });
        Self {
            matcher,
            view,
            server,
            remembered: Mutex::new(None),
        }
    }

    pub fn matcher(&self) -> &StreamMatcher {
        &self.matcher
    }

    pub fn description(&self) -> &str {
        self.view.description()
    }

    /// Streams currently matching
    pub fn matching(&self) -> Vec<SinkInput> {
        self.view.get()
    }

    pub fn remembered_volume(&self) -> Option<f64> {
        *self.remembered.lock()
    }

    /// Set and remember the volume of every matching stream
    pub async fn set_volume(&self, volume: f64) -> Result<usize> {
        let volume = clamp_volume(volume);
        *self.remembered.lock() = Some(volume);
        self.apply_volume(volume).await
    }

    async fn apply_volume(&self, volume: f64) -> Result<usize> {
        let inputs = self.matching();
        if inputs.is_empty() {
            warn!("No stream to set volume on ({})", self.description());
            return Ok(0);
        }

        for input in &inputs {
            debug!("Stream #{} volume -> {:.2}", input.index, volume);
            self.server
                .set_sink_input_volume(input.index, &uniform_volume(volume, input.channels()))
                .await?;
        }
        Ok(inputs.len())
    }

    /// Move every matching stream to the single sink selected by `target`.
    ///
    /// Returns `false` without moving anything when `target` does not resolve
    /// to exactly one sink.
    pub async fn move_to(&self, target: &SinkGroup) -> Result<bool> {
        let sink = match target.index() {
            Ok(index) => index,
            Err(e) => {
                warn!("Cannot move {}: {}", self.description(), e);
                return Ok(false);
            }
        };

        let inputs = self.matching();
        if inputs.is_empty() {
            warn!("No stream to move ({})", self.description());
        }
        for input in &inputs {
            debug!("Moving stream #{} to sink #{}", input.index, sink);
            self.server.move_sink_input(input.index, sink).await?;
        }
        Ok(true)
    }
}

#[async_trait]
impl ChangeObserver for StreamControl {
    async fn snapshot_changed(&self) {
        let Some(volume) = self.remembered_volume() else {
            return;
        };
        match self.apply_volume(volume).await {
            Ok(0) => {}
            Ok(n) => debug!("Re-applied volume {:.2} to {} stream(s) of {}", volume, n, self.description()),
            Err(e) => warn!("Failed to re-apply volume to {}: {:#}", self.description(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Sink, SinkMirror, SinkState};
    use crate::testing::{sink, sink_input, AudioCall, FakeAudioServer, LogCapture};

    fn regex(pattern: &str) -> Option<Regex> {
        Some(Regex::new(pattern).unwrap())
    }

    #[test]
    fn test_matcher_requires_a_pattern() {
        assert!(StreamMatcher::new(None, None).is_err());
    }

    #[test]
    fn test_matcher_semantics() {
        let app_only = StreamMatcher::new(regex("^Firefox$"), None).unwrap();
        assert!(app_only.matches(&sink_input(1, Some("Firefox"), None)));
        assert!(!app_only.matches(&sink_input(2, Some("Chromium"), Some("Firefox"))));

        let both = StreamMatcher::new(regex("Firefox"), regex("YouTube")).unwrap();
        assert!(both.matches(&sink_input(3, Some("Firefox"), Some("YouTube - Song"))));
        assert!(!both.matches(&sink_input(4, Some("Firefox"), None)));

        let media_only = StreamMatcher::new(None, regex("Spotify")).unwrap();
        assert!(media_only.matches(&sink_input(5, None, Some("Spotify"))));
        assert!(!media_only.matches(&sink_input(6, Some("Spotify"), None)));
    }

    #[tokio::test]
    async fn test_set_volume_remembers_and_applies() {
        let mirror = Arc::new(SinkInputMirror::new("sink inputs"));
        mirror
            .refresh(vec![
                sink_input(10, Some("Firefox"), None),
                sink_input(11, Some("mpv"), None),
            ])
            .await;
        let server = Arc::new(FakeAudioServer::default());
        let control = StreamControl::new(
            mirror,
            StreamMatcher::new(regex("Firefox"), None).unwrap(),
            server.clone(),
        );

        assert_eq!(control.remembered_volume(), None);
        assert_eq!(control.set_volume(0.4).await.unwrap(), 1);
        assert_eq!(control.remembered_volume(), Some(0.4));
        assert_eq!(server.calls(), vec![AudioCall::SinkInputVolume(10, vec![0.4, 0.4])]);
    }

    #[tokio::test]
    async fn test_no_matching_stream_is_a_warning() {
        let mirror = Arc::new(SinkInputMirror::new("sink inputs"));
        mirror.refresh(vec![sink_input(11, Some("mpv"), None)]).await;
        let server = Arc::new(FakeAudioServer::default());
        let control = StreamControl::new(
            mirror,
            StreamMatcher::new(regex("Firefox"), None).unwrap(),
            server.clone(),
        );
        let logs = LogCapture::default();
        let _guard = logs.install();

        assert_eq!(control.set_volume(0.7).await.unwrap(), 0);
        assert_eq!(control.remembered_volume(), Some(0.7));
        assert!(server.calls().is_empty());
        assert!(logs.contents().contains("WARN"), "{}", logs.contents());
        assert!(logs.contents().contains("No stream to set volume on"));
    }

    #[tokio::test]
    async fn test_change_without_remembered_volume_does_nothing() {
        let mirror = Arc::new(SinkInputMirror::new("sink inputs"));
        let server = Arc::new(FakeAudioServer::default());
        let control = Arc::new(StreamControl::new(
            mirror.clone(),
            StreamMatcher::new(regex("Firefox"), None).unwrap(),
            server.clone(),
        ));
        mirror.register_on_change(control.clone());

        mirror.refresh(vec![sink_input(10, Some("Firefox"), None)]).await;
        assert!(server.calls().is_empty());
    }

    #[tokio::test]
    async fn test_move_requires_single_target() {
        let inputs = Arc::new(SinkInputMirror::new("sink inputs"));
        inputs.refresh(vec![sink_input(10, Some("Firefox"), None)]).await;
        let sinks = Arc::new(SinkMirror::new("sinks"));
        sinks
            .refresh(vec![
                sink(1, "USB Headset", SinkState::Running),
                sink(2, "USB Speakers", SinkState::Running),
            ])
            .await;

        let server = Arc::new(FakeAudioServer::default());
        let control = StreamControl::new(
            inputs,
            StreamMatcher::new(regex("Firefox"), None).unwrap(),
            server.clone(),
        );

        let ambiguous = SinkGroup::new(
            View::new(sinks.clone(), "USB", |s: &Sink| s.description.contains("USB")),
            server.clone(),
        );
        assert!(!control.move_to(&ambiguous).await.unwrap());
        assert!(server.calls().is_empty());

        let headset = SinkGroup::new(
            View::new(sinks, "headset", |s: &Sink| s.description.contains("Headset")),
            server.clone(),
        );
        assert!(control.move_to(&headset).await.unwrap());
        assert_eq!(server.calls(), vec![AudioCall::MoveSinkInput { input: 10, sink: 1 }]);
    }
}
