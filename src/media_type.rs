use crate::error::Error;

pub const MIME_JSON: &str = "application/json";
pub const MIME_XML: &str = "application/xml";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_HTML: &str = "text/html";
pub const MIME_FORM: &str = "application/x-www-form-urlencoded";
pub const MIME_MULTIPART: &str = "multipart/form-data";

/// Wire format a request body is encoded into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TargetEncoding {
    Json,
    Form,
    Multipart,
    Text,
    Xml,
    #[default]
    Unset,
}

/// Short type names accepted by `force_type`, each bound to a canonical
/// content type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaType {
    Json,
    Xml,
    Text,
    Html,
    Form,
    FormData,
    Urlencoded,
    Multipart,
}

impl MediaType {
    pub const ALL: [MediaType; 8] = [
        MediaType::Json,
        MediaType::Xml,
        MediaType::Text,
        MediaType::Html,
        MediaType::Form,
        MediaType::FormData,
        MediaType::Urlencoded,
        MediaType::Multipart,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|media_type| media_type.name() == name)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Text => "text",
            Self::Html => "html",
            Self::Form => "form",
            Self::FormData => "form-data",
            Self::Urlencoded => "urlencoded",
            Self::Multipart => "multipart",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => MIME_JSON,
            Self::Xml => MIME_XML,
            Self::Text => MIME_TEXT,
            Self::Html => MIME_HTML,
            Self::Form | Self::FormData | Self::Urlencoded => MIME_FORM,
            Self::Multipart => MIME_MULTIPART,
        }
    }

    /// `html` is registered but has no body encoder.
    pub const fn encoding(self) -> Option<TargetEncoding> {
        match self {
            Self::Json => Some(TargetEncoding::Json),
            Self::Xml => Some(TargetEncoding::Xml),
            Self::Text => Some(TargetEncoding::Text),
            Self::Html => None,
            Self::Form | Self::FormData | Self::Urlencoded => Some(TargetEncoding::Form),
            Self::Multipart => Some(TargetEncoding::Multipart),
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|media_type| media_type.content_type() == content_type)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Picks the body encoding: a forced type wins, then an outgoing
/// `Content-Type` header equal to a registered content type, then `previous`.
pub fn resolve(
    forced: Option<MediaType>,
    content_type_header: Option<&str>,
    previous: TargetEncoding,
) -> crate::Result<TargetEncoding> {
    let selected = forced.or_else(|| content_type_header.and_then(MediaType::from_content_type));
    let Some(media_type) = selected else {
        return Ok(previous);
    };
    media_type
        .encoding()
        .ok_or_else(|| Error::UnresolvedEncoding {
            media_type: media_type.name().to_owned(),
        })
}
