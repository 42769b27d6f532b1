use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const DEFAULT_MODEL_NAME: &str = "bert_base_cb_loss_final";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not present in {0}")]
    NotPresent(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid manifest: {0}")]
    InvalidManifest(#[from] serde_json::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Where to fetch the model artifacts from and what they must hash to.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactManifest {
    pub model_url: String,
    pub tokenizer_url: String,
    pub model_sha256: String,
    pub tokenizer_sha256: String,
}

impl ArtifactManifest {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// A directory holding one exported classifier: `model.onnx` and `tokenizer.json`.
#[derive(Clone)]
pub struct ModelStore {
    model_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelStore {
    /// Creates a store for the default model under the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir().join(DEFAULT_MODEL_NAME))
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("MOODLENS_CACHE") {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("moodlens").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("moodlens").join("models");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("moodlens").join("models")
    }

    /// Opens a store at `model_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(model_dir: P) -> io::Result<Self> {
        let model_dir = model_dir.as_ref().to_path_buf();
        fs::create_dir_all(&model_dir)?;
        Ok(Self {
            model_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn get_model_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_FILE)
    }

    pub fn get_tokenizer_path(&self) -> PathBuf {
        self.model_dir.join(TOKENIZER_FILE)
    }

    pub fn is_present(&self) -> bool {
        let model_path = self.get_model_path();
        let tokenizer_path = self.get_tokenizer_path();
        log::debug!("Model path: {:?} (exists: {})", model_path, model_path.exists());
        log::debug!("Tokenizer path: {:?} (exists: {})", tokenizer_path, tokenizer_path.exists());
        model_path.exists() && tokenizer_path.exists()
    }

    /// Fails with `NotPresent` unless both artifact files exist.
    pub fn ensure_present(&self) -> Result<(), ModelError> {
        if self.is_present() {
            Ok(())
        } else {
            Err(ModelError::NotPresent(self.model_dir.display().to_string()))
        }
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        log::info!("Verifying file: {:?}", path);
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::debug!("Calculated hash: {}", hash);
        log::debug!("Expected hash:   {}", expected_hash);
        Ok(hash.eq_ignore_ascii_case(expected_hash))
    }

    /// Checks both files against the manifest digests. Missing files verify as `false`.
    pub fn verify(&self, manifest: &ArtifactManifest) -> Result<bool, ModelError> {
        let model_path = self.get_model_path();
        let tokenizer_path = self.get_tokenizer_path();

        if !model_path.exists() || !tokenizer_path.exists() {
            log::info!("One or both artifact files do not exist in {:?}", self.model_dir);
            return Ok(false);
        }

        let model_ok = self.verify_file(&model_path, &manifest.model_sha256)?;
        let tokenizer_ok = self.verify_file(&tokenizer_path, &manifest.tokenizer_sha256)?;

        log::info!("Verification results:");
        log::info!("  Model hash verification: {}", model_ok);
        log::info!("  Tokenizer hash verification: {}", tokenizer_ok);

        Ok(model_ok && tokenizer_ok)
    }

    /// Makes sure both artifacts exist and match the manifest, downloading
    /// whichever file is missing or corrupt.
    pub async fn fetch(&self, manifest: &ArtifactManifest) -> Result<(), ModelError> {
        let _lock = self.download_lock.lock().await;
        fs::create_dir_all(&self.model_dir)?;

        let model_result = self
            .ensure_file(&manifest.model_url, &self.get_model_path(), &manifest.model_sha256, "model")
            .await;
        let tokenizer_result = match model_result {
            Ok(()) => {
                self.ensure_file(
                    &manifest.tokenizer_url,
                    &self.get_tokenizer_path(),
                    &manifest.tokenizer_sha256,
                    "tokenizer",
                )
                .await
            }
            Err(e) => Err(e),
        };

        match tokenizer_result {
            Ok(()) => {
                log::info!("Model and tokenizer ready in {:?}", self.model_dir);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to fetch model artifacts: {}", e);
                // Cleanup on failure
                let _ = self.remove();
                Err(e)
            }
        }
    }

    async fn ensure_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: &str,
        file_type: &str,
    ) -> Result<(), ModelError> {
        if path.exists() {
            if self.verify_file(path, expected_hash)? {
                log::info!("Existing {} file verified successfully", file_type);
                return Ok(());
            }
            log::warn!("{} file verification failed, redownloading", file_type);
        }
        self.download_and_verify_file(url, path, expected_hash, file_type).await
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: &str,
        file_type: &str,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let response = reqwest::get(url).await?.error_for_status()?;
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        let hash = sha256_hex(&bytes);
        if !hash.eq_ignore_ascii_case(expected_hash) {
            log::error!("{} hash mismatch: expected {}, got {}", file_type, expected_hash, hash);
            return Err(ModelError::HashMismatch {
                file_type: file_type.to_string(),
                expected: expected_hash.to_string(),
                actual: hash,
            });
        }

        fs::write(path, &bytes)?;

        if !self.verify_file(path, expected_hash)? {
            return Err(ModelError::VerificationFailed);
        }

        log::info!("{} file downloaded and verified successfully", file_type);
        Ok(())
    }

    /// Deletes both artifact files if they exist.
    pub fn remove(&self) -> Result<(), ModelError> {
        let model_path = self.get_model_path();
        let tokenizer_path = self.get_tokenizer_path();

        if model_path.exists() {
            fs::remove_file(&model_path)?;
        }
        if tokenizer_path.exists() {
            fs::remove_file(&tokenizer_path)?;
        }
        Ok(())
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
