//! Turns preview bytes into the base64 payload display clients embed.

use async_trait::async_trait;
use kiosk_model::Asset;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Longest edge of the foreground image, in pixels.
    pub max_dimension: u32,
    /// Gaussian sigma applied to the background image.
    pub blur_sigma: f32,
    pub jpeg_quality: u8,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_dimension: 1920,
            blur_sigma: 8.0,
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub mime: String,
    pub image_base64: String,
    pub blurred_base64: String,
}

#[async_trait]
pub trait Renderer: Send + Sync + std::fmt::Debug {
    async fn render(
        &self,
        asset: &Asset,
        bytes: Vec<u8>,
        settings: &RenderSettings,
    ) -> Result<RenderedImage>;
}

#[cfg(feature = "render")]
pub use image_renderer::ImageRenderer;

#[cfg(feature = "render")]
mod image_renderer {
    use async_trait::async_trait;
    use base64::{Engine, engine::general_purpose::STANDARD};
    use image::{DynamicImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
    use kiosk_model::Asset;
    use tracing::debug;

    use super::{RenderSettings, RenderedImage, Renderer};
    use crate::error::{KioskError, Result};

    /// Edge length of the background before blurring; clients stretch it.
    const BACKGROUND_EDGE: u32 = 64;

    /// CPU renderer built on the `image` crate. Decoding and encoding run on
    /// the blocking pool.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ImageRenderer;

    impl ImageRenderer {
        fn render_blocking(
            bytes: &[u8],
            settings: RenderSettings,
        ) -> Result<RenderedImage> {
            let decoded = image::load_from_memory(bytes)
                .map_err(|e| KioskError::Render(format!("decode: {e}")))?;

            let edge = settings.max_dimension.max(1);
            let foreground = if decoded.width() > edge || decoded.height() > edge {
                decoded.resize(edge, edge, FilterType::Triangle)
            } else {
                decoded.clone()
            };
            let background = decoded
                .thumbnail(BACKGROUND_EDGE, BACKGROUND_EDGE)
                .blur(settings.blur_sigma);

            Ok(RenderedImage {
                mime: "image/jpeg".to_string(),
                image_base64: encode_jpeg(&foreground, settings.jpeg_quality)?,
                blurred_base64: encode_jpeg(&background, settings.jpeg_quality)?,
            })
        }
    }

    fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<String> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
            .map_err(|e| KioskError::Render(format!("encode: {e}")))?;
        Ok(STANDARD.encode(buf))
    }

    #[async_trait]
    impl Renderer for ImageRenderer {
        async fn render(
            &self,
            asset: &Asset,
            bytes: Vec<u8>,
            settings: &RenderSettings,
        ) -> Result<RenderedImage> {
            let settings = *settings;
            let size = bytes.len();
            let rendered =
                tokio::task::spawn_blocking(move || Self::render_blocking(&bytes, settings))
                    .await
                    .map_err(|err| {
                        KioskError::Render(format!("render task failed: {err}"))
                    })??;
            debug!(asset = %asset.id, size, "rendered asset");
            Ok(rendered)
        }
    }

}
