//! Hybrid text + image fusion network
//!
//! The network encodes the tokenized text with DistilBERT (first-token
//! hidden state) and the page image with a ResNet-18 whose final layer
//! projects to [`IMAGE_FEATURE_DIM`] features. Both vectors are concatenated
//! and passed through a two-layer head:
//!
//! ```text
//! [CLS text | image] → Linear(text + 256, 256) → ReLU → Linear(256, N)
//! ```
//!
//! Weight names follow the persisted state dict: `text_model.*`,
//! `vision_model.*`, `fc_fusion.0.*` and `fc_fusion.3.*`.

use crate::encoder::EncodedInput;
use candle_core::{Device, IndexOp, Module, Tensor};
use candle_nn::{Func, Linear, VarBuilder};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use candle_transformers::models::resnet;
use doclass_core::{Error, Result};

/// Width of the image branch output
pub const IMAGE_FEATURE_DIM: usize = 256;

/// Width of the hidden fusion layer
pub const FUSION_HIDDEN_DIM: usize = 256;

/// Anything that maps encoded input to one logit per category
pub trait FusionScorer: Send + Sync {
    /// Raw logits in label index order
    fn score(&self, input: &EncodedInput) -> Result<Vec<f32>>;

    /// Number of logits produced
    fn num_classes(&self) -> usize;

    /// Get the scorer name
    fn name(&self) -> &str;
}

/// DistilBERT + ResNet-18 late-fusion classifier
pub struct HybridModel {
    text_model: DistilBertModel,
    vision_model: Func<'static>,
    fusion_hidden: Linear,
    fusion_out: Linear,
    device: Device,
    num_classes: usize,
}

impl HybridModel {
    /// Build the network from a var builder rooted at the state dict
    ///
    /// `text_dim` is the DistilBERT hidden width (`dim` in its config).
    pub fn load(
        vb: VarBuilder<'static>,
        text_config: &DistilBertConfig,
        text_dim: usize,
        num_classes: usize,
    ) -> Result<Self> {
        let device = vb.device().clone();

        let text_model = DistilBertModel::load(vb.pp("text_model"), text_config)
            .map_err(|e| Error::model_load(format!("Failed to load text encoder: {}", e)))?;

        let vision_model = resnet::resnet18(IMAGE_FEATURE_DIM, vb.pp("vision_model"))
            .map_err(|e| Error::model_load(format!("Failed to load image encoder: {}", e)))?;

        let fusion = vb.pp("fc_fusion");
        let fusion_hidden =
            candle_nn::linear(text_dim + IMAGE_FEATURE_DIM, FUSION_HIDDEN_DIM, fusion.pp("0"))
                .map_err(|e| Error::model_load(format!("Failed to load fusion layer: {}", e)))?;
        let fusion_out = candle_nn::linear(FUSION_HIDDEN_DIM, num_classes, fusion.pp("3"))
            .map_err(|e| Error::model_load(format!("Failed to load output layer: {}", e)))?;

        Ok(Self {
            text_model,
            vision_model,
            fusion_hidden,
            fusion_out,
            device,
            num_classes,
        })
    }

    fn forward(&self, input: &EncodedInput) -> candle_core::Result<Tensor> {
        let input_ids = input.input_ids.to_device(&self.device)?;
        // DistilBERT expects 1 at positions to mask out
        let padding_mask = input.attention_mask.eq(0u32)?.to_device(&self.device)?;

        let hidden_states = self.text_model.forward(&input_ids, &padding_mask)?;
        let text_features = hidden_states.i((.., 0, ..))?.contiguous()?;

        let image = input.image.to_device(&self.device)?;
        let image_features = self.vision_model.forward(&image)?;

        let fused = Tensor::cat(&[&text_features, &image_features], 1)?;
        let hidden = self.fusion_hidden.forward(&fused)?.relu()?;
        self.fusion_out.forward(&hidden)
    }
}

impl FusionScorer for HybridModel {
    fn score(&self, input: &EncodedInput) -> Result<Vec<f32>> {
        let logits = self
            .forward(input)
            .map_err(|e| Error::inference(format!("Model forward pass failed: {}", e)))?;

        logits
            .squeeze(0)
            .and_then(|t| t.to_device(&Device::Cpu))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| Error::inference(format!("Failed to read logits: {}", e)))
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn name(&self) -> &str {
        "hybrid-distilbert-resnet18"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    fn tiny_text_config() -> DistilBertConfig {
        serde_json::from_str(
            r#"{
                "vocab_size": 16,
                "dim": 32,
                "n_layers": 1,
                "n_heads": 2,
                "hidden_dim": 64,
                "activation": "gelu",
                "max_position_embeddings": 32,
                "initializer_range": 0.02,
                "pad_token_id": 0,
                "model_type": "distilbert"
            }"#,
        )
        .unwrap()
    }

    fn tiny_input() -> EncodedInput {
        let ids: Vec<u32> = vec![2, 4, 5, 3, 0, 0, 0, 0];
        let mask: Vec<u32> = vec![1, 1, 1, 1, 0, 0, 0, 0];
        EncodedInput {
            input_ids: Tensor::new(ids.as_slice(), &Device::Cpu).unwrap().unsqueeze(0).unwrap(),
            attention_mask: Tensor::new(mask.as_slice(), &Device::Cpu)
                .unwrap()
                .unsqueeze(0)
                .unwrap(),
            image: Tensor::ones((1, 3, 64, 64), DType::F32, &Device::Cpu).unwrap(),
        }
    }

    #[test]
    fn test_zero_weights_give_one_logit_per_class() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = HybridModel::load(vb, &tiny_text_config(), 32, 4).unwrap();

        let logits = model.score(&tiny_input()).unwrap();

        assert_eq!(model.num_classes(), 4);
        assert_eq!(logits.len(), 4);
        assert!(logits.iter().all(|l| l.is_finite()));
    }
}
