use crate::image::ColorImage;

/// 帧来源（相机等），没有可用帧时返回 None
pub trait FrameSource {
    fn capture(&mut self) -> Option<ColorImage>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Option<ColorImage>,
{
    fn capture(&mut self) -> Option<ColorImage> {
        self()
    }
}

/// 只提供一帧的静态来源（文件、上传图像）
#[derive(Debug, Clone, Default)]
pub struct StillFrame(Option<ColorImage>);

impl StillFrame {
    pub fn new(frame: ColorImage) -> Self {
        Self(Some(frame))
    }

    pub fn empty() -> Self {
        Self(None)
    }
}

impl FrameSource for StillFrame {
    fn capture(&mut self) -> Option<ColorImage> {
        self.0.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn still_frame_yields_once() {
        let mut source = StillFrame::new(RgbaImage::new(2, 2));
        assert!(source.capture().is_some());
        assert!(source.capture().is_none());
        assert!(StillFrame::empty().capture().is_none());
    }

    #[test]
    fn closures_are_frame_sources() {
        let mut calls = 0;
        let mut source = || -> Option<ColorImage> {
            calls += 1;
            None
        };
        assert!(source.capture().is_none());
        drop(source);
        assert_eq!(calls, 1);
    }
}
