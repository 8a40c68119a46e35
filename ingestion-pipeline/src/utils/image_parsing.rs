use async_openai::types::{
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::error::AppError;

const IMAGE_DESCRIPTION_MODEL: &str = "gpt-4o-mini";
const IMAGE_DESCRIPTION_PROMPT: &str =
    "Transcribe all visible text in this image verbatim, then describe any non-text content briefly.";

/// Describes/transcribes an image via a vision-capable chat model. Not in spec's explicit
/// content-type list; kept as a harmless extractor variant inherited from the teacher (§4.D).
pub async fn extract_text_from_image(
    image_bytes: &[u8],
    client: &async_openai::Client<async_openai::config::OpenAIConfig>,
) -> Result<String, AppError> {
    let base64_image = STANDARD.encode(image_bytes);
    let image_url = format!("data:image/png;base64,{}", base64_image);

    let request = CreateChatCompletionRequestArgs::default()
        .model(IMAGE_DESCRIPTION_MODEL)
        .messages([ChatCompletionRequestUserMessageArgs::default()
            .content(vec![
                ChatCompletionRequestMessageContentPartTextArgs::default()
                    .text(IMAGE_DESCRIPTION_PROMPT)
                    .build()?
                    .into(),
                ChatCompletionRequestMessageContentPartImageArgs::default()
                    .image_url(
                        ImageUrlArgs::default()
                            .url(image_url)
                            .detail(ImageDetail::High)
                            .build()?,
                    )
                    .build()?
                    .into(),
            ])
            .build()?
            .into()])
        .build()?;

    let response = client.chat().create(request).await?;

    let description = response
        .choices
        .first()
        .and_then(|c| c.message.content.as_ref())
        .cloned()
        .unwrap_or_else(|| "No description found.".to_string());

    Ok(description)
}
