//! Downloader API response parsing
//!
//! The provider does not document a fixed response shape. Each shape observed
//! so far is one [`ResponseShape`] variant, checked in a fixed priority order.

use super::error::{ResolveError, NOT_FOUND_TEXT};
use super::resolver::ResolvedMedia;
use super::MediaKind;
use crate::utils::truncate_str;
use serde_json::Value;

/// Title used when the provider sends none
pub const DEFAULT_TITLE: &str = "Video";

const PHOTO_TYPES: &[&str] = &["image", "photo", "picture"];
const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic"];

/// One downloadable item as described by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// Direct media URL
    pub url: String,
    /// Provider media type (`video`, `image`, ...)
    pub media_type: Option<String>,
    /// Provider file extension
    pub extension: Option<String>,
    /// Per-item title
    pub title: Option<String>,
}

impl MediaItem {
    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            url: str_field(value, "url")?.to_string(),
            media_type: str_field(value, "type").map(str::to_ascii_lowercase),
            extension: str_field(value, "extension").map(str::to_ascii_lowercase),
            title: str_field(value, "title").map(ToString::to_string),
        })
    }

    /// Classify the item as photo or video
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        if let Some(t) = self.media_type.as_deref() {
            return if PHOTO_TYPES.contains(&t) {
                MediaKind::Photo
            } else {
                MediaKind::Video
            };
        }

        let extension = self.extension.clone().or_else(|| {
            url::Url::parse(&self.url).ok().and_then(|u| {
                u.path()
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_ascii_lowercase())
            })
        });

        match extension {
            Some(ext) if PHOTO_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Photo,
            _ => MediaKind::Video,
        }
    }
}

/// Known downloader API response shapes, in priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"error": true|"...", "message": "..."}`
    ProviderError {
        /// Message to show the user
        message: String,
    },
    /// `{"url": "...", "title": "..."}`
    Direct {
        /// The media item built from top-level fields
        item: MediaItem,
        /// Top-level title
        title: Option<String>,
    },
    /// `{"medias": [{"url": "...", "type": "video"}], "title": "..."}`
    Medias {
        /// First element of `medias`
        item: MediaItem,
        /// Top-level title
        title: Option<String>,
    },
    /// `{"links": [{"url": "..."}], "title": "..."}`
    Links {
        /// First element of `links`
        item: MediaItem,
        /// Top-level title
        title: Option<String>,
    },
}

impl ResponseShape {
    /// Match a response body against the known shapes.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Unrecognized` if no shape matches.
    pub fn parse(body: &Value) -> Result<Self, ResolveError> {
        if declares_error(body) {
            let message = str_field(body, "message")
                .or_else(|| str_field(body, "error"))
                .unwrap_or(NOT_FOUND_TEXT);
            return Ok(Self::ProviderError {
                message: message.to_string(),
            });
        }

        let title = str_field(body, "title").map(ToString::to_string);

        if let Some(item) = MediaItem::from_value(body) {
            return Ok(Self::Direct { item, title });
        }
        if let Some(item) = first_item(body, "medias") {
            return Ok(Self::Medias { item, title });
        }
        if let Some(item) = first_item(body, "links") {
            return Ok(Self::Links { item, title });
        }
        if let Some(message) = str_field(body, "message") {
            return Ok(Self::ProviderError {
                message: message.to_string(),
            });
        }

        Err(ResolveError::Unrecognized(truncate_str(body.to_string(), 300)))
    }

    /// Turn the matched shape into a resolved media description.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Provider` for the error shape.
    pub fn into_resolved(self) -> Result<ResolvedMedia, ResolveError> {
        let (item, title) = match self {
            Self::ProviderError { message } => return Err(ResolveError::Provider(message)),
            Self::Direct { item, title }
            | Self::Medias { item, title }
            | Self::Links { item, title } => (item, title),
        };

        let kind = item.kind();
        let title = title
            .or_else(|| item.title.clone())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        Ok(ResolvedMedia {
            media_url: item.url,
            title,
            kind,
        })
    }
}

fn declares_error(body: &Value) -> bool {
    match body.get("error") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => !s.trim().is_empty(),
        _ => false,
    }
}

fn first_item(body: &Value, key: &str) -> Option<MediaItem> {
    body.get(key)?
        .as_array()?
        .first()
        .and_then(MediaItem::from_value)
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(body: &Value) -> Result<ResolvedMedia, ResolveError> {
        ResponseShape::parse(body)?.into_resolved()
    }

    #[test]
    fn test_top_level_url_wins_over_medias() -> Result<(), ResolveError> {
        let body = json!({
            "url": "https://cdn.example.com/top.mp4",
            "medias": [{"url": "https://cdn.example.com/first.mp4"}]
        });

        assert!(matches!(
            ResponseShape::parse(&body)?,
            ResponseShape::Direct { .. }
        ));
        assert_eq!(resolve(&body)?.media_url, "https://cdn.example.com/top.mp4");
        Ok(())
    }

    #[test]
    fn test_medias_wins_over_links() -> Result<(), ResolveError> {
        let body = json!({
            "medias": [{"url": "https://cdn.example.com/m.mp4"}],
            "links": [{"url": "https://cdn.example.com/l.mp4"}]
        });
        assert_eq!(resolve(&body)?.media_url, "https://cdn.example.com/m.mp4");
        Ok(())
    }

    #[test]
    fn test_links_shape() -> Result<(), ResolveError> {
        let body = json!({"links": [{"url": "https://cdn.example.com/l.mp4"}], "title": "Dog"});
        let resolved = resolve(&body)?;
        assert_eq!(resolved.media_url, "https://cdn.example.com/l.mp4");
        assert_eq!(resolved.title, "Dog");
        Ok(())
    }

    #[test]
    fn test_empty_medias_falls_through_to_links() -> Result<(), ResolveError> {
        let body = json!({"medias": [], "links": [{"url": "https://cdn.example.com/l.mp4"}]});
        assert!(matches!(
            ResponseShape::parse(&body)?,
            ResponseShape::Links { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_declared_error_surfaces_message() {
        let body = json!({"error": true, "message": "private"});
        let err = resolve(&body).err();
        assert!(matches!(err, Some(ResolveError::Provider(ref m)) if m == "private"));
    }

    #[test]
    fn test_error_string_without_message() {
        let body = json!({"error": "rate limited"});
        let err = resolve(&body).err();
        assert!(matches!(err, Some(ResolveError::Provider(ref m)) if m == "rate limited"));
    }

    #[test]
    fn test_false_error_flag_is_ignored() -> Result<(), ResolveError> {
        let body = json!({"error": false, "url": "https://cdn.example.com/v.mp4"});
        assert_eq!(resolve(&body)?.media_url, "https://cdn.example.com/v.mp4");
        Ok(())
    }

    #[test]
    fn test_message_without_media_is_provider_error() {
        let body = json!({"message": "Unsupported platform"});
        assert!(matches!(
            resolve(&body).err(),
            Some(ResolveError::Provider(ref m)) if m == "Unsupported platform"
        ));
    }

    #[test]
    fn test_unknown_shape_is_unrecognized() {
        let body = json!({"data": {"video": "https://cdn.example.com/v.mp4"}});
        assert!(matches!(
            resolve(&body).err(),
            Some(ResolveError::Unrecognized(_))
        ));
    }

    #[test]
    fn test_title_fallbacks() -> Result<(), ResolveError> {
        let item_title = json!({"medias": [{"url": "https://c/v.mp4", "title": "Item"}]});
        assert_eq!(resolve(&item_title)?.title, "Item");

        let none = json!({"medias": [{"url": "https://c/v.mp4"}]});
        assert_eq!(resolve(&none)?.title, DEFAULT_TITLE);
        Ok(())
    }

    #[test]
    fn test_kind_classification() -> Result<(), ResolveError> {
        let typed = json!({"medias": [{"url": "https://c/x", "type": "image"}]});
        assert_eq!(resolve(&typed)?.kind, MediaKind::Photo);

        let by_extension = json!({"url": "https://c/pic.JPEG?sig=1"});
        assert_eq!(resolve(&by_extension)?.kind, MediaKind::Photo);

        let video_type = json!({"medias": [{"url": "https://c/pic.jpg", "type": "video"}]});
        assert_eq!(resolve(&video_type)?.kind, MediaKind::Video);

        let unknown = json!({"url": "https://c/stream"});
        assert_eq!(resolve(&unknown)?.kind, MediaKind::Video);
        Ok(())
    }
}
