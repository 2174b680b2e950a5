use std::path::Path;

/// Extensions treated as still images; everything else is handed to the
/// video pipeline.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn classify(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext {
            Some(ref e) if IMAGE_EXTENSIONS.contains(&e.as_str()) => MediaKind::Image,
            _ => MediaKind::Video,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_image_extensions_classify_as_image() {
        for name in ["a.jpg", "a.jpeg", "a.png", "a.bmp", "a.gif", "a.webp"] {
            assert_eq!(MediaKind::classify(Path::new(name)), MediaKind::Image);
        }
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(MediaKind::classify(Path::new("slate.PNG")), MediaKind::Image);
        assert_eq!(MediaKind::classify(Path::new("photo.JpEg")), MediaKind::Image);
    }

    #[test]
    fn test_everything_else_classifies_as_video() {
        assert_eq!(MediaKind::classify(Path::new("clip.mp4")), MediaKind::Video);
        assert_eq!(MediaKind::classify(Path::new("clip.mkv")), MediaKind::Video);
        assert_eq!(MediaKind::classify(Path::new("noextension")), MediaKind::Video);
        assert_eq!(MediaKind::classify(Path::new("weird.tiff")), MediaKind::Video);
    }
}
