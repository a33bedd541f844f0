//! Collaborator interfaces (§6): the telephony provider, the speech
//! provider, and the media transport. This crate only consumes these — the
//! concrete provider implementations are out of scope.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, SpeechError, TelephonyError};

/// One placed-call handle returned by the telephony provider.
#[derive(Debug, Clone)]
pub struct PlacedCall {
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct CallDetails {
    pub status: Option<String>,
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDetails {
    pub url: Option<String>,
    pub duration: Option<i64>,
}

/// Operations consumed from the telephony provider, per §6.
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    async fn place_call(
        &self,
        to: &str,
        from: &str,
        webhook_url: &str,
        metadata: Value,
        phone_number_id: Option<&str>,
    ) -> std::result::Result<PlacedCall, TelephonyError>;

    async fn get_call_details(&self, id: &str) -> std::result::Result<CallDetails, TelephonyError>;

    async fn get_recording_details(&self, id: &str) -> std::result::Result<RecordingDetails, TelephonyError>;
}

/// A request to submit buffered audio for asynchronous transcription.
#[derive(Debug, Clone)]
pub struct SttSubmission {
    pub call_id: String,
    pub webhook_url: String,
    pub output_languages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SttSubmitResponse {
    pub request_id: String,
}

/// Operations consumed from the speech provider, per §6.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Submit a WAV blob (16kHz mono 16-bit PCM) for transcription. Callers
    /// apply a 10s hard timeout via `tokio::time::timeout`.
    async fn submit_speech_to_text_async(
        &self,
        audio_wav: Vec<u8>,
        request: SttSubmission,
    ) -> std::result::Result<SttSubmitResponse, SpeechError>;

    /// Open a streaming TTS request. `on_chunk` is invoked with each audio
    /// frame as it arrives; `on_done` once the stream completes.
    async fn stream_speech_real_time(
        &self,
        text: &str,
        voice_agent_id: &str,
        output_format: OutputFormat,
    ) -> std::result::Result<Box<dyn TtsStream>, SpeechError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    MuLaw8k,
    ALaw8k,
    Pcm16k,
}

/// A handle to an in-flight TTS stream. `next_chunk` yields `None` once the
/// stream is exhausted; `close` is idempotent.
#[async_trait]
pub trait TtsStream: Send {
    async fn next_chunk(&mut self) -> Option<Vec<u8>>;
    async fn close(&mut self);
}

/// One inbound or outbound media frame over the telephony media transport.
#[derive(Debug, Clone)]
pub struct MediaFrame {
    pub track: MediaTrack,
    pub chunk: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaTrack {
    Inbound,
    Outbound,
}

/// Bidirectional framed channel carrying audio payloads, per §6.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn send(&self, frame: MediaFrame) -> Result<()>;
    fn is_open(&self) -> bool;
    async fn close(&self);
}

/// One turn of a session's rolling conversation context.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: ConversationRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationRole {
    User,
    Assistant,
}

/// The conversational-response generator the Audio Bridge Session drives
/// after each STT result (§4.2). Not part of the speech provider proper —
/// modeled separately since it reasons over the rolling context rather than
/// just transcribing or synthesizing audio.
#[async_trait]
pub trait ConversationModel: Send + Sync {
    async fn generate_conversational_response(
        &self,
        text: &str,
        voice_agent_id: &str,
        context: &[ConversationTurn],
    ) -> std::result::Result<String, SpeechError>;
}
