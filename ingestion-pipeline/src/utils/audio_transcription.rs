use async_openai::types::{AudioResponseFormat, CreateTranscriptionRequestArgs};
use common::error::AppError;

const AUDIO_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Transcribes an audio file via Whisper. Not in spec's explicit content-type list; kept as a
/// harmless extractor variant inherited from the teacher (§4.D).
pub async fn transcribe_audio_file(
    file_path: &str,
    openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
) -> Result<String, AppError> {
    let request = CreateTranscriptionRequestArgs::default()
        .file(file_path)
        .model(AUDIO_TRANSCRIPTION_MODEL)
        .response_format(AudioResponseFormat::Json)
        .build()?;

    let response = openai_client
        .audio()
        .transcribe(request)
        .await
        .map_err(|e| AppError::Processing(format!("audio transcription failed: {e}")))?;
    Ok(response.text)
}
