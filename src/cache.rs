use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpeechCacheKey {
    pub speech_hash: String,
}

impl SpeechCacheKey {
    pub fn new(voice_id: &str, text: &str) -> Self {
        Self {
            speech_hash: compute_speech_hash(voice_id, text),
        }
    }
}

/// Synthesized audio kept on disk so repeated replies are not re-billed.
pub struct SpeechCache {
    cache_dir: PathBuf,
}

impl SpeechCache {
    pub async fn new() -> Result<Self> {
        Self::at(get_cache_directory()?).await
    }

    pub async fn at(cache_dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&cache_dir)
            .await
            .context("Failed to create cache directory")?;

        Ok(Self { cache_dir })
    }

    pub async fn get(&self, key: &SpeechCacheKey) -> Option<Vec<u8>> {
        cacache::read(&self.cache_dir, &key.speech_hash).await.ok()
    }

    pub async fn insert(&self, key: SpeechCacheKey, audio: Vec<u8>) {
        if let Err(err) = cacache::write(&self.cache_dir, &key.speech_hash, audio).await {
            debug!("Failed to cache synthesized speech: {err}");
        }
    }
}

fn get_cache_directory() -> Result<PathBuf> {
    let cache_base = dirs::cache_dir().context("Failed to determine cache directory")?;
    Ok(cache_base.join(env!("CARGO_CRATE_NAME")))
}

fn compute_speech_hash(voice_id: &str, text: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(voice_id.as_bytes());
    hasher.update([0]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_depends_on_voice_and_text() {
        let key = SpeechCacheKey::new("voice-a", "Hello there");
        assert_eq!(key, SpeechCacheKey::new("voice-a", "Hello there"));
        assert_ne!(key, SpeechCacheKey::new("voice-b", "Hello there"));
        assert_ne!(key, SpeechCacheKey::new("voice-a", "Hello there!"));
        assert_eq!(key.speech_hash.len(), 64);
    }

    #[test]
    fn voice_and_text_do_not_run_together() {
        assert_ne!(
            SpeechCacheKey::new("ab", "c"),
            SpeechCacheKey::new("a", "bc")
        );
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SpeechCache::at(dir.path().join("speech")).await.unwrap();
        let key = SpeechCacheKey::new("voice", "text");

        assert!(cache.get(&key).await.is_none());
        cache.insert(key.clone(), b"ID3".to_vec()).await;
        assert_eq!(cache.get(&key).await.unwrap(), b"ID3");
    }
}
