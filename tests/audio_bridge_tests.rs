//! Integration tests exercising the Audio Bridge Session (C2) and STT
//! Correlator (C3) together, against fake speech/conversation/transport
//! providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use campaign_dialer::audio::session::InboundFormatDescriptor;
use campaign_dialer::audio::{AudioBridgeSession, SessionCommand, SttCorrelator};
use campaign_dialer::codec::SourceCodec;
use campaign_dialer::error::{Result, SpeechError};
use campaign_dialer::telephony::{
    ConversationModel, ConversationTurn, MediaFrame, MediaTrack, MediaTransport, OutputFormat, SpeechProvider,
    SttSubmission, SttSubmitResponse, TtsStream,
};

#[derive(Default)]
struct FakeSpeechProvider {
    submit_count: AtomicUsize,
    submitted_lengths: Mutex<Vec<usize>>,
    stream_count: AtomicUsize,
}

#[async_trait]
impl SpeechProvider for FakeSpeechProvider {
    async fn submit_speech_to_text_async(
        &self,
        audio_wav: Vec<u8>,
        _request: SttSubmission,
    ) -> std::result::Result<SttSubmitResponse, SpeechError> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        self.submitted_lengths.lock().push(audio_wav.len());
        Ok(SttSubmitResponse { request_id: "req-1".to_string() })
    }

    async fn stream_speech_real_time(
        &self,
        _text: &str,
        _voice_agent_id: &str,
        _output_format: OutputFormat,
    ) -> std::result::Result<Box<dyn TtsStream>, SpeechError> {
        self.stream_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTtsStream { chunks: vec![vec![1, 2, 3], vec![4, 5, 6]] }))
    }
}

struct FakeTtsStream {
    chunks: Vec<Vec<u8>>,
}

#[async_trait]
impl TtsStream for FakeTtsStream {
    async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        if self.chunks.is_empty() {
            None
        } else {
            Some(self.chunks.remove(0))
        }
    }

    async fn close(&mut self) {}
}

#[derive(Default)]
struct FakeConversationModel {
    call_count: AtomicUsize,
}

#[async_trait]
impl ConversationModel for FakeConversationModel {
    async fn generate_conversational_response(
        &self,
        _text: &str,
        _voice_agent_id: &str,
        _context: &[ConversationTurn],
    ) -> std::result::Result<String, SpeechError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok("hello back".to_string())
    }
}

#[derive(Default)]
struct RecordingTransport {
    frames: Mutex<Vec<MediaFrame>>,
}

#[async_trait]
impl MediaTransport for RecordingTransport {
    async fn send(&self, frame: MediaFrame) -> Result<()> {
        self.frames.lock().push(frame);
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }

    async fn close(&self) {}
}

fn ulaw_chunk(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

/// Scenario 4 (§8): buffered audio is submitted exactly once, the moment it
/// crosses both `optimal_chunks` (25) and the minimum 2000ms interval.
#[tokio::test]
async fn audio_submits_once_it_crosses_optimal_chunks_and_min_interval() {
    let speech = Arc::new(FakeSpeechProvider::default());
    let transport = Arc::new(RecordingTransport::default());

    let (handle, _join) = AudioBridgeSession::spawn(
        "CA1",
        "agent-1",
        transport,
        Some(speech.clone() as Arc<dyn SpeechProvider>),
        None,
        Some("http://example.invalid/stt".to_string()),
    );

    let first_format = Some(InboundFormatDescriptor { codec: SourceCodec::MuLaw, sample_rate: 8_000, channels: 1, bit_depth: 8 });
    handle.send(SessionCommand::InboundMedia {
        track: MediaTrack::Inbound,
        payload_b64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, ulaw_chunk(160)),
        format: first_format,
    });

    // 24 more chunks land inside the same sub-second window as the first
    // check, so none of them can re-trigger `maybe_submit` yet.
    for _ in 0..24 {
        handle.send(SessionCommand::InboundMedia {
            track: MediaTrack::Inbound,
            payload_b64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, ulaw_chunk(160)),
            format: None,
        });
    }

    tokio::time::sleep(std::time::Duration::from_millis(2_100)).await;

    // One more chunk both crosses optimal_chunks (26 buffered) and lands
    // past the 2000ms floor measured from session spawn.
    handle.send(SessionCommand::InboundMedia {
        track: MediaTrack::Inbound,
        payload_b64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, ulaw_chunk(160)),
        format: None,
    });

    let mut submit_count = 0;
    for _ in 0..50 {
        submit_count = speech.submit_count.load(Ordering::SeqCst);
        if submit_count > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(submit_count, 1, "expected exactly one stt submission");

    let lengths = speech.submitted_lengths.lock();
    assert_eq!(lengths.len(), 1);
    // 26 chunks of 160 mu-law bytes each decode+resample to 640 PCM bytes,
    // wrapped in a 44-byte WAV header.
    assert_eq!(lengths[0], 44 + 26 * 640);
}

/// Scenario 5 (§8): an STT webhook produces one assistant turn, one TTS
/// stream, and outbound frames on the transport; redelivery is a no-op.
#[tokio::test]
async fn stt_webhook_drives_one_turn_and_is_deduped_on_redelivery() {
    let speech = Arc::new(FakeSpeechProvider::default());
    let conversation = Arc::new(FakeConversationModel::default());
    let transport = Arc::new(RecordingTransport::default());

    let (handle, _join) = AudioBridgeSession::spawn(
        "CA1",
        "agent-1",
        transport.clone(),
        Some(speech.clone() as Arc<dyn SpeechProvider>),
        Some(conversation.clone() as Arc<dyn ConversationModel>),
        Some("http://example.invalid/stt".to_string()),
    );

    let correlator = SttCorrelator::new();
    correlator.register(handle);

    let callback = campaign_dialer::audio::correlator::SttCallback {
        request_id: "req-1".to_string(),
        call_id: "CA1".to_string(),
        text: "hello".to_string(),
        language: "en".to_string(),
        is_final: true,
    };

    assert!(correlator.handle_callback(callback.clone()));

    let mut turns = 0;
    for _ in 0..50 {
        turns = conversation.call_count.load(Ordering::SeqCst);
        if turns > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(turns, 1);
    assert_eq!(speech.stream_count.load(Ordering::SeqCst), 1);

    let mut frames = 0;
    for _ in 0..50 {
        frames = transport.frames.lock().len();
        if frames > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(frames, 2, "expected both fake tts chunks to reach the transport");

    // Redelivery of the same request_id is deduped at the correlator and
    // never reaches the session.
    assert!(!correlator.handle_callback(callback));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(conversation.call_count.load(Ordering::SeqCst), 1);
}
