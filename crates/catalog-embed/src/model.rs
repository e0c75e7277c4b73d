use anyhow::{anyhow, ensure, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use catalog_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

pub const BGE_M3_DIM: usize = 1024;
const DEFAULT_MAX_LEN: usize = 256;

/// BGE-M3 (XLM-RoBERTa) sentence embeddings: masked mean pooling + L2 norm.
pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl EmbeddingModel {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading BGE-M3 model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?,
        )?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)
            .with_context(|| format!("reading weights {}", weights_path.display()))?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!("BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device, max_len: DEFAULT_MAX_LEN })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &self.device)?;
        let hidden_states = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden_states, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        ensure!(emb.len() == BGE_M3_DIM, "expected {BGE_M3_DIM}-dim embedding, got {}", emb.len());
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 {
            warn!(ms = elapsed.as_millis() as u64, "slow embedding");
        } else {
            debug!(ms = elapsed.as_millis() as u64, "embedded text");
        }
        Ok(emb)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize {
        BGE_M3_DIM
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

/// Locate the BGE-M3 model directory: `APP_MODEL_DIR`, `MODEL_DIR`, then the
/// conventional `../models/bge-m3` and `models/bge-m3`.
pub fn resolve_model_dir() -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() {
                debug!(var, dir = %p.display(), "using model dir from env");
                return Ok(p);
            }
        }
    }
    for candidate in ["../models/bge-m3", "models/bge-m3"] {
        let p = Path::new(candidate);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
