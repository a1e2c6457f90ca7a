use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::cache::{SpeechCache, SpeechCacheKey};
use crate::elevenlabs::ElevenLabsClient;

/// Writes speech for `text` to `file_path`, reusing cached audio when the
/// same text was already synthesized with the same voice.
pub async fn speak(
    client: &ElevenLabsClient,
    cache: Option<&SpeechCache>,
    voice_id: &str,
    text: &str,
    file_path: &Path,
) -> Result<()> {
    let key = SpeechCacheKey::new(voice_id, text);

    if let Some(cache) = cache {
        if let Some(audio) = cache.get(&key).await {
            debug!("Using cached speech for {}", file_path.display());
            return tokio::fs::write(file_path, audio)
                .await
                .context("Failed to write cached speech");
        }
    }

    client.synthesize(text, voice_id, file_path).await?;

    if let Some(cache) = cache {
        let audio = tokio::fs::read(file_path)
            .await
            .context("Failed to read back synthesized speech")?;
        cache.insert(key, audio).await;
    }

    Ok(())
}
