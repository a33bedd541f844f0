//! One instance per active `callSid`. See module docs in `audio::mod` for
//! the ownership model.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::codec::{self, ConversionStep, MediaFormat, SourceCodec};
use crate::ratelimit::RateLimiter;
use crate::telephony::{
    ConversationModel, ConversationRole, ConversationTurn, MediaFrame, MediaTrack, MediaTransport, OutputFormat,
    SpeechProvider, SttSubmission,
};

const DEFAULT_CHUNK_CAP: usize = 500;
const DEFAULT_BYTE_CAP: usize = 1024 * 1024;
const SUBMIT_CHECK_INTERVAL: Duration = Duration::from_secs(1);
const STT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_CONTEXT_TURNS: usize = 20;
const PENDING_REQUEST_CAP: usize = 100;

static DECODE_ERROR_LIMITER: RateLimiter = RateLimiter::new(5, 500);

/// The `{min_interval, max_interval, min_chunks, optimal_chunks}` tuple that
/// governs when buffered audio is submitted for transcription, tuned from
/// observed success rate and latency every 10 submissions (§4.2).
#[derive(Debug, Clone)]
pub struct AdaptiveThresholds {
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub min_chunks: usize,
    pub optimal_chunks: usize,
    pub audio_chunk_max_size: usize,
    success_count: u64,
    failure_count: u64,
    avg_response_ms: f64,
}

impl Default for AdaptiveThresholds {
    fn default() -> Self {
        Self {
            min_interval_ms: 2000,
            max_interval_ms: 5000,
            min_chunks: 10,
            optimal_chunks: 25,
            audio_chunk_max_size: DEFAULT_BYTE_CAP,
            success_count: 0,
            failure_count: 0,
            avg_response_ms: 0.0,
        }
    }
}

impl AdaptiveThresholds {
    fn record_success(&mut self, latency_ms: u64) {
        self.success_count += 1;
        let n = self.success_count as f64;
        self.avg_response_ms += (latency_ms as f64 - self.avg_response_ms) / n;
        self.maybe_adjust();
    }

    fn record_failure(&mut self) {
        self.failure_count += 1;
        self.maybe_adjust();
    }

    fn total(&self) -> u64 {
        self.success_count + self.failure_count
    }

    fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            1.0
        } else {
            self.success_count as f64 / self.total() as f64
        }
    }

    /// Runs every 10 submissions, per §4.2.
    fn maybe_adjust(&mut self) {
        if self.total() % 10 != 0 {
            return;
        }
        let rate = self.success_rate();
        if rate > 0.95 {
            if self.avg_response_ms < 1000.0 {
                self.min_interval_ms = self.min_interval_ms.saturating_sub(200).max(1000);
                self.optimal_chunks = self.optimal_chunks.saturating_sub(2).max(15);
            } else {
                self.min_interval_ms = (self.min_interval_ms + 200).min(3000);
            }
        } else if rate < 0.80 {
            self.min_interval_ms = (self.min_interval_ms + 500).min(4000);
            self.optimal_chunks = (self.optimal_chunks + 5).min(40);
        }
    }
}

struct PendingSttRequest {
    request_id: String,
    started_at: DateTime<Utc>,
}

/// Command fed to a session's owning task, one per event source in §4.2:
/// inbound media frames, STT result notifications, and a close signal.
pub enum SessionCommand {
    InboundMedia {
        track: MediaTrack,
        payload_b64: String,
        format: Option<InboundFormatDescriptor>,
    },
    SttResult {
        text: String,
        is_final: bool,
    },
    Close,
}

#[derive(Debug, Clone, Copy)]
pub struct InboundFormatDescriptor {
    pub codec: SourceCodec,
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
}

/// A lightweight handle used by the STT Correlator and the call layer to
/// feed commands into a running session without touching its internals.
#[derive(Clone)]
pub struct SessionHandle {
    pub call_sid: String,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) {
        // The receiver only disappears once the session has closed itself;
        // a send after that point is a harmless no-op for a dying call leg.
        let _ = self.tx.send(command);
    }
}

/// Owns all per-call state. Never shared: one task drives one instance.
pub struct AudioBridgeSession {
    call_sid: String,
    active: bool,

    source_format: Option<MediaFormat>,
    conversion_path: Option<Vec<ConversionStep>>,

    buffer: VecDeque<Vec<u8>>,
    bytes_buffered: usize,
    chunk_cap: usize,

    thresholds: AdaptiveThresholds,
    submission_in_progress: bool,
    last_submission_at: DateTime<Utc>,
    last_submit_check_at: DateTime<Utc>,
    pending_requests: VecDeque<PendingSttRequest>,

    context: VecDeque<ConversationTurn>,
    voice_agent_id: String,
    response_in_flight: bool,
    queued_inputs: VecDeque<String>,

    outbound_chunk_counter: u64,

    speech: Option<Arc<dyn SpeechProvider>>,
    conversation: Option<Arc<dyn ConversationModel>>,
    transport: Arc<dyn MediaTransport>,
    stt_webhook_url: Option<String>,
}

impl AudioBridgeSession {
    /// Spawns the owning task and returns a handle to it. `speech`/`conversation`
    /// being `None` means STT/TTS stays disabled for this session (missing
    /// credentials or webhook URL is never a hard call abort, per §4.2).
    pub fn spawn(
        call_sid: impl Into<String>,
        voice_agent_id: impl Into<String>,
        transport: Arc<dyn MediaTransport>,
        speech: Option<Arc<dyn SpeechProvider>>,
        conversation: Option<Arc<dyn ConversationModel>>,
        stt_webhook_url: Option<String>,
    ) -> (SessionHandle, tokio::task::JoinHandle<()>) {
        let call_sid = call_sid.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle { call_sid: call_sid.clone(), tx };

        let session = AudioBridgeSession {
            call_sid,
            active: true,
            source_format: None,
            conversion_path: None,
            buffer: VecDeque::new(),
            bytes_buffered: 0,
            chunk_cap: DEFAULT_CHUNK_CAP,
            thresholds: AdaptiveThresholds::default(),
            submission_in_progress: false,
            last_submission_at: Utc::now(),
            last_submit_check_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_else(Utc::now),
            pending_requests: VecDeque::new(),
            context: VecDeque::new(),
            voice_agent_id: voice_agent_id.into(),
            response_in_flight: false,
            queued_inputs: VecDeque::new(),
            outbound_chunk_counter: 0,
            speech,
            conversation,
            transport,
            stt_webhook_url,
        };

        let join = tokio::spawn(session.run(rx));
        (handle, join)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                SessionCommand::InboundMedia { track, payload_b64, format } => {
                    self.handle_inbound_media(track, payload_b64, format).await;
                }
                SessionCommand::SttResult { text, is_final } => {
                    if is_final {
                        self.handle_stt_result(text).await;
                    }
                }
                SessionCommand::Close => {
                    self.close().await;
                    break;
                }
            }
        }
    }

    async fn handle_inbound_media(
        &mut self,
        track: MediaTrack,
        payload_b64: String,
        format: Option<InboundFormatDescriptor>,
    ) {
        if !self.active || track != MediaTrack::Inbound || payload_b64.is_empty() {
            return;
        }

        let raw = match base64::engine::general_purpose::STANDARD.decode(&payload_b64) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return,
            Err(err) => {
                if DECODE_ERROR_LIMITER.should_log() {
                    tracing::warn!(call_sid = %self.call_sid, error = %err, "failed to decode base64 media payload");
                }
                return;
            }
        };

        if self.source_format.is_none() {
            if let Some(descriptor) = format {
                let source = MediaFormat {
                    codec: descriptor.codec,
                    sample_rate: descriptor.sample_rate,
                    channels: descriptor.channels,
                    bit_depth: descriptor.bit_depth,
                };
                self.conversion_path = Some(codec::conversion_path(source));
                self.source_format = Some(source);
            } else {
                self.source_format = Some(MediaFormat::TARGET);
                self.conversion_path = Some(Vec::new());
            }
        }

        let path = self.conversion_path.clone().unwrap_or_default();
        let pcm = codec::apply_conversion_path(&path, &raw);

        self.push_chunk(pcm);

        let now = Utc::now();
        if (now - self.last_submit_check_at).num_milliseconds() >= SUBMIT_CHECK_INTERVAL.as_millis() as i64 {
            self.last_submit_check_at = now;
            self.maybe_submit().await;
        }
    }

    fn push_chunk(&mut self, chunk: Vec<u8>) {
        self.bytes_buffered += chunk.len();
        self.buffer.push_back(chunk);
        while self.buffer.len() > self.chunk_cap {
            if let Some(dropped) = self.buffer.pop_front() {
                self.bytes_buffered = self.bytes_buffered.saturating_sub(dropped.len());
            }
        }
    }

    /// Submit policy (§4.2): submit when any of the three conditions hold,
    /// guarded by `submission_in_progress` so only one submission is ever
    /// in flight per session.
    async fn maybe_submit(&mut self) {
        if self.submission_in_progress || self.buffer.is_empty() {
            return;
        }

        let now = Utc::now();
        let elapsed_ms = (now - self.last_submission_at).num_milliseconds().max(0) as u64;

        let best_quality = self.buffer.len() >= self.thresholds.optimal_chunks
            && elapsed_ms >= self.thresholds.min_interval_ms;
        let stale = elapsed_ms >= self.thresholds.max_interval_ms;
        let overflow = self.bytes_buffered >= self.thresholds.audio_chunk_max_size;

        if !(best_quality || stale || overflow) {
            return;
        }

        let Some(speech) = self.speech.clone() else {
            return;
        };
        let Some(webhook_url) = self.stt_webhook_url.clone() else {
            return;
        };

        self.submission_in_progress = true;
        let scratch: Vec<u8> = self.buffer.drain(..).flatten().collect();
        self.bytes_buffered = 0;

        let blob = wrap_wav(&scratch, 16_000, 1, 16);
        let request = SttSubmission {
            call_id: self.call_sid.clone(),
            webhook_url,
            output_languages: vec!["en".to_string()],
        };

        let started_at = Utc::now();
        let outcome = tokio::time::timeout(STT_SUBMIT_TIMEOUT, speech.submit_speech_to_text_async(blob, request)).await;

        self.submission_in_progress = false;
        self.last_submission_at = Utc::now();

        match outcome {
            Ok(Ok(response)) => {
                let latency_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
                self.thresholds.record_success(latency_ms);
                self.pending_requests.push_back(PendingSttRequest { request_id: response.request_id, started_at });
                while self.pending_requests.len() > PENDING_REQUEST_CAP {
                    // Oldest-half-drop: trims a full half rather than one at
                    // a time once the cap is hit, matching §4.2.
                    let half = PENDING_REQUEST_CAP / 2;
                    for _ in 0..half {
                        self.pending_requests.pop_front();
                    }
                }
            }
            Ok(Err(err)) => {
                self.thresholds.record_failure();
                tracing::warn!(call_sid = %self.call_sid, error = %err, "stt submission failed");
            }
            Err(_) => {
                self.thresholds.record_failure();
                tracing::warn!(call_sid = %self.call_sid, "stt submission timed out");
            }
        }
    }

    /// Handling an STT result (§4.2). Delivered as a single logical event by
    /// the correlator; this session only ever sees final results.
    async fn handle_stt_result(&mut self, text: String) {
        if text.is_empty() {
            tracing::debug!(call_sid = %self.call_sid, "empty stt result, dropping");
            return;
        }

        self.context.push_back(ConversationTurn { role: ConversationRole::User, content: text.clone() });
        self.truncate_context();

        if self.response_in_flight {
            self.queued_inputs.push_back(text);
            return;
        }

        self.generate_and_speak(text).await;

        while let Some(next) = self.queued_inputs.pop_front() {
            self.generate_and_speak(next).await;
        }
    }

    async fn generate_and_speak(&mut self, text: String) {
        let Some(conversation) = self.conversation.clone() else {
            return;
        };

        self.response_in_flight = true;
        let context_snapshot: Vec<ConversationTurn> = self.context.iter().cloned().collect();
        let result = conversation
            .generate_conversational_response(&text, &self.voice_agent_id, &context_snapshot)
            .await;
        self.response_in_flight = false;

        match result {
            Ok(reply) => {
                self.context.push_back(ConversationTurn { role: ConversationRole::Assistant, content: reply.clone() });
                self.truncate_context();
                self.stream_tts(reply).await;
            }
            Err(err) => {
                tracing::warn!(call_sid = %self.call_sid, error = %err, "conversation model failed");
            }
        }
    }

    fn truncate_context(&mut self) {
        while self.context.len() > MAX_CONTEXT_TURNS {
            self.context.pop_front();
        }
    }

    /// TTS streaming (§4.2): output format matches the inbound leg, never
    /// MP3 to an active call.
    async fn stream_tts(&mut self, text: String) {
        let Some(speech) = self.speech.clone() else {
            return;
        };
        if !self.transport.is_open() {
            return;
        }

        let output_format = match self.source_format.map(|f| f.codec) {
            Some(SourceCodec::MuLaw) => OutputFormat::MuLaw8k,
            Some(SourceCodec::ALaw) => OutputFormat::ALaw8k,
            _ => OutputFormat::Pcm16k,
        };

        let stream = match speech.stream_speech_real_time(&text, &self.voice_agent_id, output_format).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(call_sid = %self.call_sid, error = %err, "failed to open tts stream");
                return;
            }
        };

        self.pump_tts_stream(stream).await;
    }

    async fn pump_tts_stream(&mut self, mut stream: Box<dyn crate::telephony::TtsStream>) {
        while let Some(frame) = stream.next_chunk().await {
            if !self.transport.is_open() {
                break;
            }
            self.outbound_chunk_counter += 1;
            let media_frame = MediaFrame {
                track: MediaTrack::Outbound,
                chunk: self.outbound_chunk_counter,
                payload: frame,
            };
            if let Err(err) = self.transport.send(media_frame).await {
                tracing::warn!(call_sid = %self.call_sid, error = %err, "failed to send outbound media frame");
                break;
            }
        }
        stream.close().await;
    }

    /// Close (§4.2): idempotent, never returns an error — a session that
    /// fails to tear down cleanly still must stop accepting commands.
    async fn close(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.transport.close().await;
    }
}

/// Wrap raw little-endian PCM in a minimal 44-byte canonical WAV header.
fn wrap_wav(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_len = pcm.len() as u32;

    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_reports_correct_lengths() {
        let pcm = vec![0u8; 320];
        let wav = wrap_wav(&pcm, 16_000, 1, 16);
        assert_eq!(wav.len(), 44 + pcm.len());
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }

    #[test]
    fn adaptive_thresholds_tighten_on_high_success_low_latency() {
        let mut thresholds = AdaptiveThresholds::default();
        for _ in 0..10 {
            thresholds.record_success(500);
        }
        assert_eq!(thresholds.min_interval_ms, 1800);
        assert_eq!(thresholds.optimal_chunks, 23);
    }

    #[test]
    fn adaptive_thresholds_loosen_on_low_success_rate() {
        let mut thresholds = AdaptiveThresholds::default();
        for _ in 0..2 {
            thresholds.record_success(500);
        }
        for _ in 0..8 {
            thresholds.record_failure();
        }
        assert_eq!(thresholds.min_interval_ms, 2500);
        assert_eq!(thresholds.optimal_chunks, 30);
    }
}
