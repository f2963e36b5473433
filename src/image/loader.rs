use crate::image::preprocessing::ColorImage;
use crate::utils::error::FashionError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;

/// 上传图像大小上限
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;
/// 单边像素上限
pub const MAX_IMAGE_SIDE: u32 = 8192;

pub struct ImageLoader;

impl ImageLoader {
    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str) -> Result<DynamicImage> {
        // 移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = if base64_data.starts_with("data:") {
            base64_data.split(',').nth(1).unwrap_or(base64_data)
        } else {
            base64_data
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;
        Self::from_bytes(&image_bytes)
    }

    /// 从字节加载图像
    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(FashionError::FileTooLarge(bytes.len(), MAX_IMAGE_BYTES));
        }

        let format = Self::detect_format(bytes)
            .ok_or_else(|| FashionError::UnsupportedFormat("unrecognized image data".to_string()))?;
        if !Self::is_supported_format(format) {
            return Err(FashionError::UnsupportedFormat(format!("{:?}", format)));
        }

        let image = image::load_from_memory_with_format(bytes, format)?;
        Ok(image)
    }

    /// 从文件路径加载图像
    pub fn from_path(path: &Path) -> Result<DynamicImage> {
        let size = std::fs::metadata(path)?.len();
        if size > MAX_IMAGE_BYTES as u64 {
            return Err(FashionError::FileTooLarge(
                usize::try_from(size).unwrap_or(usize::MAX),
                MAX_IMAGE_BYTES,
            ));
        }

        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp | ImageFormat::Tiff | ImageFormat::WebP
        )
    }

    /// 验证图像尺寸
    pub fn validate_dimensions(image: &DynamicImage) -> Result<()> {
        let (width, height) = image.dimensions();

        if width == 0 || height == 0 {
            return Err(FashionError::InvalidImage(format!(
                "Image has zero area: {}x{}",
                width, height
            )));
        }

        if width > MAX_IMAGE_SIDE || height > MAX_IMAGE_SIDE {
            return Err(FashionError::InvalidInput(format!(
                "Image too large: {}x{}, maximum {}x{}",
                width, height, MAX_IMAGE_SIDE, MAX_IMAGE_SIDE
            )));
        }

        Ok(())
    }

    /// 验证尺寸并转换为RGBA帧
    pub fn to_color_image(image: DynamicImage) -> Result<ColorImage> {
        Self::validate_dimensions(&image)?;
        Ok(image.into_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::{Cursor, Write};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn decodes_plain_and_data_url_base64() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(3, 2));

        let image = ImageLoader::from_base64(&encoded).unwrap();
        assert_eq!(image.dimensions(), (3, 2));

        let data_url = format!("data:image/png;base64,{}", encoded);
        let frame = ImageLoader::to_color_image(ImageLoader::from_base64(&data_url).unwrap()).unwrap();
        assert_eq!(frame.get_pixel(1, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            ImageLoader::from_base64("!!not base64!!"),
            Err(FashionError::Base64(_))
        ));
        assert!(matches!(
            ImageLoader::from_bytes(b"plain text, not an image"),
            Err(FashionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn path_loading_applies_format_checks() {
        let mut png = tempfile::NamedTempFile::new().unwrap();
        png.write_all(&png_bytes(4, 5)).unwrap();
        let image = ImageLoader::from_path(png.path()).unwrap();
        assert_eq!(image.dimensions(), (4, 5));

        // GIF能被解码器识别，但不在支持列表内
        let mut gif = tempfile::NamedTempFile::new().unwrap();
        gif.write_all(b"GIF89a\x01\x00\x01\x00\x00\x00\x00;").unwrap();
        assert!(matches!(
            ImageLoader::from_path(gif.path()),
            Err(FashionError::UnsupportedFormat(_))
        ));

        assert!(matches!(
            ImageLoader::from_path(Path::new("/nonexistent/shirt.png")),
            Err(FashionError::Io(_))
        ));
    }

    #[test]
    fn rejects_oversized_dimensions() {
        let image = DynamicImage::new_rgba8(MAX_IMAGE_SIDE + 1, 1);
        assert!(matches!(
            ImageLoader::to_color_image(image),
            Err(FashionError::InvalidInput(_))
        ));
    }
}
