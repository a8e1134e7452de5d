//! Text-to-speech for reminders and assistant replies.
//!
//! Playback is best-effort: synthesis runs on a detached thread, and any
//! failure is logged and dropped.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use base64::Engine;

use super::types::{GenerateRequest, LlmClient};
use super::{AiError, TTS_MODEL, TTS_VOICE};

/// Output device for synthesized speech (raw PCM bytes).
pub trait SpeechPlayer: Send + Sync {
    fn play(&self, pcm: &[u8]) -> std::io::Result<()>;
}

/// Writes the latest utterance to a file for an external player to pick up.
pub struct PcmFileSink {
    path: PathBuf,
}

impl PcmFileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SpeechPlayer for PcmFileSink {
    fn play(&self, pcm: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, pcm)
    }
}

pub fn try_synthesize_speech(client: &dyn LlmClient, text: &str) -> Result<Vec<u8>, AiError> {
    let mut request = GenerateRequest::prompt(TTS_MODEL, text);
    request.speech_voice = Some(TTS_VOICE.to_string());
    let response = client.generate(&request)?;
    let encoded = response
        .inline_audio
        .ok_or_else(|| AiError::MalformedResponse("No audio in speech response".into()))?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| AiError::ResponseParsing(e.to_string()))
}

/// Audio bytes for `text`, or `None` on any failure.
pub fn synthesize_speech(client: &dyn LlmClient, text: &str) -> Option<Vec<u8>> {
    if text.trim().is_empty() {
        return None;
    }
    match try_synthesize_speech(client, text) {
        Ok(audio) => Some(audio),
        Err(e) => {
            tracing::debug!(error = %e, "Speech synthesis skipped");
            None
        }
    }
}

/// Synthesize and play on a background thread. The caller never waits.
pub fn speak_in_background(
    client: Arc<dyn LlmClient + Send + Sync>,
    player: Arc<dyn SpeechPlayer>,
    text: String,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let Some(audio) = synthesize_speech(client.as_ref(), &text) else {
            return;
        };
        if let Err(e) = player.play(&audio) {
            tracing::debug!(error = %e, "Speech playback failed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::client::MockLlmClient;
    use crate::intelligence::types::GenerateResponse;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPlayer {
        played: Mutex<Vec<Vec<u8>>>,
    }

    impl SpeechPlayer for RecordingPlayer {
        fn play(&self, pcm: &[u8]) -> std::io::Result<()> {
            self.played.lock().unwrap().push(pcm.to_vec());
            Ok(())
        }
    }

    fn audio_response(data: &str) -> GenerateResponse {
        GenerateResponse {
            inline_audio: Some(data.into()),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_inline_audio() {
        let mock = MockLlmClient::with_response(audio_response("AAEC"));
        assert_eq!(synthesize_speech(&mock, "Hello"), Some(vec![0, 1, 2]));

        let request = &mock.requests()[0];
        assert_eq!(request.model, TTS_MODEL);
        assert_eq!(request.speech_voice.as_deref(), Some(TTS_VOICE));
    }

    #[test]
    fn failures_are_silent() {
        assert!(synthesize_speech(&MockLlmClient::failing("x"), "Hello").is_none());
        assert!(synthesize_speech(&MockLlmClient::new("text only"), "Hello").is_none());
        assert!(synthesize_speech(&MockLlmClient::with_response(audio_response("!!")), "Hi").is_none());
    }

    #[test]
    fn blank_text_skips_service() {
        let mock = MockLlmClient::new("");
        assert!(synthesize_speech(&mock, "  ").is_none());
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn background_playback_reaches_player() {
        let client: Arc<dyn LlmClient + Send + Sync> =
            Arc::new(MockLlmClient::with_response(audio_response("AAEC")));
        let player = Arc::new(RecordingPlayer::default());
        speak_in_background(client, player.clone(), "Time for Aspirin".into())
            .join()
            .unwrap();
        assert_eq!(player.played.lock().unwrap().as_slice(), &[vec![0u8, 1, 2]]);
    }

    #[test]
    fn file_sink_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = PcmFileSink::new(dir.path().join("out").join("speech.pcm"));
        sink.play(&[9, 8, 7]).unwrap();
        assert_eq!(std::fs::read(dir.path().join("out/speech.pcm")).unwrap(), vec![9, 8, 7]);
    }
}
