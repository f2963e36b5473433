use crate::utils::error::FashionError;
use crate::Result;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use ndarray::Array3;

/// 模型输入宽度
pub const MODEL_INPUT_WIDTH: u32 = 28;
/// 模型输入高度
pub const MODEL_INPUT_HEIGHT: u32 = 28;

// 饱和度为0的颜色矩阵系数
const SATURATION_ZERO_WEIGHTS: [f32; 3] = [0.213, 0.715, 0.072];

/// 相机采集的彩色图像（RGBA8）
pub type ColorImage = RgbaImage;

/// 去色后的图像，每个像素 R == G == B
#[derive(Debug, Clone, PartialEq)]
pub struct GrayscaleImage(RgbaImage);

impl GrayscaleImage {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.0
    }
}

/// 最近邻缩放后的灰度图像
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledImage(RgbaImage);

impl ScaledImage {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.0
    }
}

/// 归一化后的模型输入，形状 (1, H, W)，按行优先排列
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Vec<f32>,
    height: usize,
    width: usize,
}

impl NormalizedTensor {
    /// 张量形状 (1, H, W)
    pub fn shape(&self) -> (usize, usize, usize) {
        (1, self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 从头读取的数值切片
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// 转换为ORT可用的ndarray
    pub fn to_array(&self) -> Result<Array3<f32>> {
        Array3::from_shape_vec(self.shape(), self.data.clone())
            .map_err(|e| FashionError::Internal(format!("Tensor shape error: {}", e)))
    }

    /// 全零张量，用于模型健康检查
    pub fn blank(width: u32, height: u32) -> Self {
        let (width, height) = (width as usize, height as usize);
        Self {
            data: vec![0.0; width * height],
            height,
            width,
        }
    }

    /// 将张量还原为灰度图，便于检查模型实际看到的输入
    pub fn to_preview_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let value = self.data[y as usize * self.width + x as usize];
            Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }
}

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// 完整预处理流水线：去色 -> 缩放 -> 归一化
    pub fn preprocess(
        image: &ColorImage,
        target_width: u32,
        target_height: u32,
    ) -> Result<NormalizedTensor> {
        let gray = Self::to_grayscale(image)?;
        let scaled = Self::scale(&gray, target_width, target_height)?;
        Self::normalize(&scaled)
    }

    /// 按模型默认输入尺寸预处理
    pub fn preprocess_for_model(image: &ColorImage) -> Result<NormalizedTensor> {
        Self::preprocess(image, MODEL_INPUT_WIDTH, MODEL_INPUT_HEIGHT)
    }

    /// 去色（饱和度置零），保留alpha通道
    pub fn to_grayscale(image: &ColorImage) -> Result<GrayscaleImage> {
        Self::ensure_non_empty(image.width(), image.height())?;

        let mut gray = RgbaImage::new(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            let value = SATURATION_ZERO_WEIGHTS[0] * r as f32
                + SATURATION_ZERO_WEIGHTS[1] * g as f32
                + SATURATION_ZERO_WEIGHTS[2] * b as f32;
            let value = value.round().clamp(0.0, 255.0) as u8;
            gray.put_pixel(x, y, Rgba([value, value, value, a]));
        }

        Ok(GrayscaleImage(gray))
    }

    /// 最近邻缩放，每个输出像素取自唯一的源像素（像素中心采样）
    pub fn scale(
        image: &GrayscaleImage,
        target_width: u32,
        target_height: u32,
    ) -> Result<ScaledImage> {
        Self::ensure_non_empty(image.width(), image.height())?;
        if target_width == 0 || target_height == 0 {
            return Err(FashionError::InvalidImage(format!(
                "Invalid target size: {}x{}",
                target_width, target_height
            )));
        }

        let source = image.as_rgba();
        let (src_w, src_h) = (source.width() as u64, source.height() as u64);
        let (dst_w, dst_h) = (target_width as u64, target_height as u64);

        let scaled = RgbaImage::from_fn(target_width, target_height, |x, y| {
            let src_x = ((2 * x as u64 + 1) * src_w / (2 * dst_w)).min(src_w - 1);
            let src_y = ((2 * y as u64 + 1) * src_h / (2 * dst_h)).min(src_h - 1);
            *source.get_pixel(src_x as u32, src_y as u32)
        });

        Ok(ScaledImage(scaled))
    }

    /// 归一化：三通道平均值除以255（不是加权亮度公式）
    pub fn normalize(image: &ScaledImage) -> Result<NormalizedTensor> {
        Self::ensure_non_empty(image.width(), image.height())?;

        let data: Vec<f32> = image
            .as_rgba()
            .pixels()
            .map(|pixel| {
                let [r, g, b, _] = pixel.0;
                (r as f32 + b as f32 + g as f32) / 3.0 / 255.0
            })
            .collect();

        Ok(NormalizedTensor {
            data,
            height: image.height() as usize,
            width: image.width() as usize,
        })
    }

    fn ensure_non_empty(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(FashionError::InvalidImage(format!(
                "Image has zero area: {}x{}",
                width, height
            )));
        }
        Ok(())
    }
}
