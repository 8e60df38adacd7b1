//! Disk cache for fetched transcripts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use super::TranscriptSource;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::transcript::Transcript;
use crate::video_id::VideoId;

/// Cached transcript for one video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptCache {
    /// Unix seconds when the entry was written
    pub timestamp: u64,
    pub video_id: String,
    pub segment_count: usize,
    pub transcript: Transcript,
}

/// Summary returned by `stats`
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub valid_files: usize,
    pub expired_files: usize,
    pub total_segments: usize,
}

/// One row of `list_cached`
#[derive(Debug, Clone, Serialize)]
pub struct CachedTranscriptInfo {
    pub video_id: String,
    pub title: Option<String>,
    pub segment_count: usize,
    pub age_hours: u64,
    pub is_valid: bool,
}

/// Manages the on-disk transcript cache
#[derive(Debug, Clone)]
pub struct TranscriptCacheManager {
    cache_dir: PathBuf,
    cache_ttl_hours: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl TranscriptCacheManager {
    pub fn new(cache_dir: PathBuf, cache_ttl_hours: u64) -> Self {
        Self {
            cache_dir,
            cache_ttl_hours,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.dir.clone(), config.ttl_hours)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        info!("📁 Transcript cache directory initialized: {}", self.cache_dir.display());
        Ok(())
    }

    fn cache_path(&self, video_id: &VideoId) -> PathBuf {
        self.cache_dir.join(format!("{}.json", video_id.as_str()))
    }

    /// Load a cached transcript if present and not expired
    pub async fn load_cached(&self, video_id: &VideoId) -> Option<Transcript> {
        let cache_path = self.cache_path(video_id);
        let content = match tokio::fs::read_to_string(&cache_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Cache miss for {}", video_id);
                return None;
            }
            Err(e) => {
                warn!("Failed to read cache file {}: {}", cache_path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<TranscriptCache>(&content) {
            Ok(cache) if self.is_cache_valid(&cache) => {
                info!("📚 Cache hit: {} segments for {}", cache.segment_count, video_id);
                Some(cache.transcript)
            }
            Ok(_) => {
                info!("⏰ Cache expired for {}", video_id);
                let _ = tokio::fs::remove_file(&cache_path).await;
                None
            }
            Err(e) => {
                warn!("Failed to parse cache file {}: {}", cache_path.display(), e);
                None
            }
        }
    }

    /// Store an available transcript; unavailable ones are never cached
    pub async fn save(&self, transcript: &Transcript) -> Result<bool> {
        if !transcript.available {
            return Ok(false);
        }
        let video_id = VideoId::parse(&transcript.video_id)?;

        let cache = TranscriptCache {
            timestamp: now_secs(),
            video_id: transcript.video_id.clone(),
            segment_count: transcript.len(),
            transcript: transcript.clone(),
        };

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let json_content = serde_json::to_string_pretty(&cache)?;
        tokio::fs::write(self.cache_path(&video_id), json_content).await?;
        info!("💾 Cached {} segments for {}", cache.segment_count, video_id);
        Ok(true)
    }

    fn is_cache_valid(&self, cache: &TranscriptCache) -> bool {
        let age_hours = now_secs().saturating_sub(cache.timestamp) / 3600;
        age_hours < self.cache_ttl_hours
    }

    /// Read every parseable cache file in the directory
    async fn entries(&self) -> Result<Vec<(PathBuf, TranscriptCache)>> {
        let mut found = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            match serde_json::from_str::<TranscriptCache>(&content) {
                Ok(cache) => found.push((path, cache)),
                Err(e) => debug!("Skipping unreadable cache file {}: {}", path.display(), e),
            }
        }
        Ok(found)
    }

    /// Remove expired entries, returning how many were deleted
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let mut cleaned_count = 0;
        for (path, cache) in self.entries().await? {
            if !self.is_cache_valid(&cache) && tokio::fs::remove_file(&path).await.is_ok() {
                cleaned_count += 1;
                debug!("🗑️ Removed expired cache: {}", path.display());
            }
        }

        if cleaned_count > 0 {
            info!("🧹 Cleaned up {} expired cache files", cleaned_count);
        }
        Ok(cleaned_count)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for (_, cache) in self.entries().await? {
            stats.total_files += 1;
            if self.is_cache_valid(&cache) {
                stats.valid_files += 1;
                stats.total_segments += cache.segment_count;
            } else {
                stats.expired_files += 1;
            }
        }
        Ok(stats)
    }

    pub async fn invalidate(&self, video_id: &VideoId) -> Result<bool> {
        match tokio::fs::remove_file(self.cache_path(video_id)).await {
            Ok(()) => {
                info!("🗑️ Invalidated cache for {}", video_id);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every cache file, returning how many were deleted
    pub async fn clear_all(&self) -> Result<usize> {
        let mut cleared_count = 0;
        for (path, _) in self.entries().await? {
            if tokio::fs::remove_file(&path).await.is_ok() {
                cleared_count += 1;
            }
        }

        if cleared_count > 0 {
            info!("🧹 Cleared {} cache files", cleared_count);
        }
        Ok(cleared_count)
    }

    pub async fn list_cached(&self) -> Result<Vec<CachedTranscriptInfo>> {
        let now = now_secs();
        let mut list: Vec<CachedTranscriptInfo> = self
            .entries()
            .await?
            .into_iter()
            .map(|(_, cache)| CachedTranscriptInfo {
                is_valid: self.is_cache_valid(&cache),
                age_hours: now.saturating_sub(cache.timestamp) / 3600,
                title: cache.transcript.title.clone(),
                segment_count: cache.segment_count,
                video_id: cache.video_id,
            })
            .collect();

        list.sort_by(|a, b| a.video_id.cmp(&b.video_id));
        Ok(list)
    }
}

/// Wraps a source with the disk cache
///
/// `load` serves from cache when possible; `reload` always goes to the inner
/// source and refreshes the cache.
pub struct CachedTranscriptSource<S> {
    inner: S,
    cache: TranscriptCacheManager,
}

impl<S: TranscriptSource> CachedTranscriptSource<S> {
    pub fn new(inner: S, cache: TranscriptCacheManager) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &TranscriptCacheManager {
        &self.cache
    }

    async fn fetch_and_store(&self, video_id: &VideoId) -> Result<Transcript> {
        let transcript = self.inner.load(video_id).await?;
        if let Err(e) = self.cache.save(&transcript).await {
            warn!("Failed to cache transcript for {}: {}", video_id, e);
        }
        Ok(transcript)
    }
}

#[async_trait]
impl<S: TranscriptSource> TranscriptSource for CachedTranscriptSource<S> {
    async fn load(&self, video_id: &VideoId) -> Result<Transcript> {
        if let Some(transcript) = self.cache.load_cached(video_id).await {
            return Ok(transcript);
        }
        self.fetch_and_store(video_id).await
    }

    async fn reload(&self, video_id: &VideoId) -> Result<Transcript> {
        debug!("Bypassing cache for {}", video_id);
        self.fetch_and_store(video_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Segment;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const VIDEO: &str = "dQw4w9WgXcQ";

    fn sample() -> Transcript {
        Transcript::from_segments(
            VIDEO,
            vec![Segment::new(0.0, 5.0, "a"), Segment::new(5.0, 5.0, "b")],
        )
    }

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranscriptSource for CountingSource {
        async fn load(&self, video_id: &VideoId) -> Result<Transcript> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut transcript = sample();
            transcript.video_id = video_id.to_string();
            Ok(transcript)
        }
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let manager = TranscriptCacheManager::new(dir.path().to_path_buf(), 24);
        manager.initialize().await.unwrap();

        let id = VideoId::parse(VIDEO).unwrap();
        assert!(manager.load_cached(&id).await.is_none());
        assert!(manager.save(&sample()).await.unwrap());

        let loaded = manager.load_cached(&id).await.unwrap();
        assert_eq!(loaded, sample());

        let stats = manager.stats().await.unwrap();
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.valid_files, 1);
        assert_eq!(stats.total_segments, 2);
    }

    #[tokio::test]
    async fn test_unavailable_transcripts_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let manager = TranscriptCacheManager::new(dir.path().to_path_buf(), 24);
        let saved = manager
            .save(&Transcript::unavailable(VIDEO, "No captions"))
            .await
            .unwrap();
        assert!(!saved);
        assert_eq!(manager.stats().await.unwrap().total_files, 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let dir = TempDir::new().unwrap();
        let manager = TranscriptCacheManager::new(dir.path().to_path_buf(), 0);
        manager.save(&sample()).await.unwrap();

        let stats = manager.stats().await.unwrap();
        assert_eq!(stats.expired_files, 1);
        assert_eq!(manager.cleanup_expired().await.unwrap(), 1);
        assert_eq!(manager.stats().await.unwrap().total_files, 0);
    }

    #[tokio::test]
    async fn test_cached_source_bypasses_cache_on_reload() {
        let dir = TempDir::new().unwrap();
        let manager = TranscriptCacheManager::new(dir.path().to_path_buf(), 24);
        let source = CachedTranscriptSource::new(
            CountingSource {
                calls: AtomicUsize::new(0),
            },
            manager.clone(),
        );

        let id = VideoId::parse(VIDEO).unwrap();
        source.load(&id).await.unwrap();
        source.load(&id).await.unwrap();
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 1);

        source.reload(&id).await.unwrap();
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 2);

        assert!(manager.invalidate(&id).await.unwrap());
        assert!(!manager.invalidate(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_directory_reports_empty_stats() {
        let dir = TempDir::new().unwrap();
        let manager = TranscriptCacheManager::new(dir.path().join("missing"), 24);
        assert_eq!(manager.stats().await.unwrap().total_files, 0);
        assert_eq!(manager.clear_all().await.unwrap(), 0);
        assert!(manager.list_cached().await.unwrap().is_empty());
    }
}
