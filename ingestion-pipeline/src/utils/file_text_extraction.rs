use dom_smoothie::{Article, Readability, TextMode};
use std::{
    env,
    io::{Error as IoError, ErrorKind},
    path::PathBuf,
};
use uuid::Uuid;

use common::{error::AppError, utils::config::AppConfig};

use super::{
    audio_transcription::transcribe_audio_file, docx_extraction::extract_docx_text,
    image_parsing::extract_text_from_image, pdf_ingestion::extract_pdf_content,
};

struct TempPathGuard {
    path: PathBuf,
}

impl TempPathGuard {
    fn as_path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for TempPathGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn materialize_temp_file(bytes: &[u8], extension: &str) -> Result<TempPathGuard, AppError> {
    let mut path = env::temp_dir();
    path.push(format!("ingest-{}.{extension}", Uuid::new_v4()));
    tokio::fs::write(&path, bytes).await?;
    Ok(TempPathGuard { path })
}

/// Dispatches text extraction by content type (§4.D stage 1). Image and audio extraction are
/// ambient capability inherited from the teacher, not part of spec's content-type list, but kept
/// behind the same dispatch since they're harmless extractor variants.
pub async fn extract_text_from_bytes(
    content_type: &str,
    bytes: &[u8],
    openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    config: &AppConfig,
) -> Result<String, AppError> {
    match content_type {
        "text/plain" | "text/markdown" | "text/csv" | "application/octet-stream"
        | "text/x-rust" | "text/x-python" | "application/json" => String::from_utf8(bytes.to_vec())
            .map_err(|err| AppError::Io(IoError::new(ErrorKind::InvalidData, err))),

        "text/html" => {
            let html = String::from_utf8(bytes.to_vec())
                .map_err(|err| AppError::Io(IoError::new(ErrorKind::InvalidData, err)))?;
            let dom_config = dom_smoothie::Config {
                text_mode: TextMode::Formatted,
                ..Default::default()
            };
            let mut readability = Readability::new(html, None, Some(dom_config))?;
            let Article { text_content, .. } = readability.parse()?;
            Ok(text_content.into())
        }

        "application/pdf" => {
            let temp_guard = materialize_temp_file(bytes, "pdf").await?;
            extract_pdf_content(temp_guard.as_path(), openai_client, &config.pdf_ingest_mode).await
        }

        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            extract_docx_text(bytes)
        }

        "image/png" | "image/jpeg" => extract_text_from_image(bytes, openai_client).await,

        "audio/mpeg" | "audio/mp3" | "audio/wav" | "audio/x-wav" | "audio/webm" | "audio/mp4"
        | "audio/ogg" | "audio/flac" => {
            let extension = content_type.rsplit('/').next().unwrap_or("bin");
            let temp_guard = materialize_temp_file(bytes, extension).await?;
            let path_str = temp_guard.as_path().to_str().ok_or_else(|| {
                AppError::Processing("encountered a non-UTF8 path while reading audio".into())
            })?;
            transcribe_audio_file(path_str, openai_client).await
        }

        other => Err(AppError::InputInvalid(format!(
            "unsupported content type: {other}"
        ))),
    }
}
