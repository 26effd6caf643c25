//! Feature encoding: text → token tensors, page image → image tensor

use candle_core::{DType, Device, Tensor};
use doclass_core::{Error, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Model input derived from one document
///
/// Shapes: `input_ids` and `attention_mask` are `[1, max_length]` (u32),
/// `image` is `[1, 3, size, size]` (f32 in `[0, 1]`). All tensors live on the
/// CPU; the scorer moves them to its device.
#[derive(Debug, Clone)]
pub struct EncodedInput {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub image: Tensor,
}

/// Deterministic tokenizer + image transform
pub struct FeatureEncoder {
    tokenizer: Tokenizer,
    max_length: usize,
    image_size: u32,
}

impl FeatureEncoder {
    /// Create an encoder that pads and truncates to exactly `max_length`
    pub fn new(mut tokenizer: Tokenizer, max_length: usize, image_size: u32) -> Result<Self> {
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| Error::config(format!("Invalid truncation settings: {}", e)))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(max_length),
            pad_id,
            pad_token: "[PAD]".to_string(),
            ..Default::default()
        }));

        Ok(Self {
            tokenizer,
            max_length,
            image_size,
        })
    }

    /// Encode text and image into model input
    pub fn encode(&self, text: &str, image: &RgbImage) -> Result<EncodedInput> {
        let (input_ids, attention_mask) = self.encode_text(text)?;
        let image = self.encode_image(image)?;

        Ok(EncodedInput {
            input_ids,
            attention_mask,
            image,
        })
    }

    /// Tokenize with special tokens into `[1, max_length]` ids and mask
    pub fn encode_text(&self, text: &str) -> Result<(Tensor, Tensor)> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::inference(format!("Tokenization failed: {}", e)))?;

        let ids = encoding.get_ids();
        let mask = encoding.get_attention_mask();
        if ids.len() != self.max_length || mask.len() != self.max_length {
            return Err(Error::inference(format!(
                "Tokenizer produced {} ids for a fixed length of {}",
                ids.len(),
                self.max_length
            )));
        }

        let input_ids = Tensor::new(ids, &Device::Cpu)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| Error::inference(format!("Failed to create input tensor: {}", e)))?;

        let attention_mask = Tensor::new(mask, &Device::Cpu)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| Error::inference(format!("Failed to create attention mask: {}", e)))?;

        Ok((input_ids, attention_mask))
    }

    /// Resize to `image_size`² and convert to a `[1, 3, H, W]` tensor in `[0, 1]`
    pub fn encode_image(&self, image: &RgbImage) -> Result<Tensor> {
        let size = self.image_size;
        let resized = imageops::resize(image, size, size, FilterType::Triangle);

        let tensor = Tensor::from_vec(
            resized.into_raw(),
            (size as usize, size as usize, 3),
            &Device::Cpu,
        )
        .and_then(|t| t.permute((2, 0, 1)))
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t / 255.0)
        .and_then(|t| t.unsqueeze(0))
        .map_err(|e| Error::inference(format!("Failed to create image tensor: {}", e)))?;

        Ok(tensor)
    }
}
