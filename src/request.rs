//! Typed generation requests, one payload per job kind.
//!
//! Requests are checked against the service's accepted shapes before any
//! network call; reframe requests also resolve their canvas placement here so
//! geometry errors surface synchronously.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

use crate::config::LimitsConfig;
use crate::error::Result;
use crate::humanize::ByteSize;
use crate::placement::{CanvasPlacement, PlacementOverrides};

pub use crate::placement::AspectRatio;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("unknown {field} '{value}'")]
    UnknownValue { field: &'static str, value: String },

    #[error("{kind} requires a non-empty prompt")]
    EmptyPrompt { kind: JobKind },

    #[error("{field} must be an http(s) URL, got '{url}'")]
    InvalidUrl { field: &'static str, url: String },

    #[error("{field} is not reachable by the service ({media}); publish it first")]
    UnpublishedMedia {
        field: &'static str,
        media: MediaSource,
    },

    #[error("{kind} media is {size}, above the {limit} ceiling")]
    MediaTooLarge {
        kind: JobKind,
        size: ByteSize,
        limit: ByteSize,
    },

    #[error("model {model} does not support {kind}")]
    UnsupportedModel { kind: JobKind, model: VideoModel },

    #[error("model {model} does not support aspect ratio {ratio}")]
    UnsupportedAspectRatio { model: VideoModel, ratio: AspectRatio },

    #[error("reference weight must be within 0.0..=1.0, got {0}")]
    InvalidWeight(f32),
}

/// Declares a closed vocabulary whose wire spelling is also its CLI spelling
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = RequestError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s.trim())
                    .ok_or_else(|| RequestError::UnknownValue {
                        field: stringify!($name),
                        value: s.to_string(),
                    })
            }
        }
    };
}

wire_enum!(
    /// The five operations the orchestrator drives
    JobKind {
        GenerateImage => "generate-image",
        GenerateVideo => "generate-video",
        ReframeImage => "reframe-image",
        ReframeVideo => "reframe-video",
        ModifyVideo => "modify-video",
    }
);

wire_enum!(ImageModel {
    Photon1 => "photon-1",
    PhotonFlash1 => "photon-flash-1",
});

wire_enum!(VideoModel {
    Ray2 => "ray-2",
    RayFlash2 => "ray-flash-2",
    Ray16 => "ray-1-6",
});

wire_enum!(Resolution {
    P540 => "540p",
    P720 => "720p",
    P1080 => "1080p",
    K4 => "4k",
});

wire_enum!(VideoDuration {
    Seconds5 => "5s",
    Seconds9 => "9s",
});

wire_enum!(
    /// Video modification strength, from subtle (adhere) to dramatic (reimagine)
    ModifyMode {
        Adhere1 => "adhere_1",
        Adhere2 => "adhere_2",
        Adhere3 => "adhere_3",
        Flex1 => "flex_1",
        Flex2 => "flex_2",
        Flex3 => "flex_3",
        Reimagine1 => "reimagine_1",
        Reimagine2 => "reimagine_2",
        Reimagine3 => "reimagine_3",
    }
);

impl Default for ImageModel {
    fn default() -> Self {
        ImageModel::Photon1
    }
}

impl Default for VideoModel {
    fn default() -> Self {
        VideoModel::Ray2
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::P720
    }
}

impl Default for VideoDuration {
    fn default() -> Self {
        VideoDuration::Seconds5
    }
}

impl Default for ModifyMode {
    fn default() -> Self {
        ModifyMode::Flex1
    }
}

/// Broad media family; selects poll budgets and size ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFamily {
    Image,
    Video,
}

impl JobKind {
    pub fn family(&self) -> MediaFamily {
        match self {
            JobKind::GenerateImage | JobKind::ReframeImage => MediaFamily::Image,
            JobKind::GenerateVideo | JobKind::ReframeVideo | JobKind::ModifyVideo => {
                MediaFamily::Video
            }
        }
    }
}

impl VideoModel {
    /// ray-1-6 predates resolution/duration control and the extended ratios
    pub fn is_ray2_family(&self) -> bool {
        matches!(self, VideoModel::Ray2 | VideoModel::RayFlash2)
    }

    pub fn supports(&self, ratio: AspectRatio) -> bool {
        self.is_ray2_family()
            || matches!(
                ratio,
                AspectRatio::Square | AspectRatio::Portrait9x16 | AspectRatio::Landscape16x9
            )
    }
}

/// Where an input image or video comes from.
///
/// The service fetches inputs by URL, so anything it cannot reach (raw bytes,
/// loopback URLs) has to be published first; see [`crate::publish`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaSource {
    Url(String),
    Bytes { data: Bytes, content_type: String },
}

impl MediaSource {
    pub fn bytes(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        MediaSource::Bytes {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            MediaSource::Url(url) => Some(url),
            MediaSource::Bytes { .. } => None,
        }
    }

    /// True for URLs whose host only resolves on this machine
    pub fn is_loopback(&self) -> bool {
        self.as_url().is_some_and(is_loopback_url)
    }

    /// True when the service could not fetch this source as given
    pub fn needs_publishing(&self) -> bool {
        matches!(self, MediaSource::Bytes { .. }) || self.is_loopback()
    }

    /// Size of in-memory data; unknown for URLs
    pub fn byte_len(&self) -> Option<u64> {
        match self {
            MediaSource::Bytes { data, .. } => Some(data.len() as u64),
            MediaSource::Url(_) => None,
        }
    }
}

impl From<&str> for MediaSource {
    fn from(url: &str) -> Self {
        MediaSource::Url(url.to_string())
    }
}

impl From<String> for MediaSource {
    fn from(url: String) -> Self {
        MediaSource::Url(url)
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Url(url) => f.write_str(url),
            MediaSource::Bytes { data, content_type } => {
                write!(f, "<{} of {content_type}>", ByteSize(data.len() as u64))
            }
        }
    }
}

fn is_loopback_url(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host.to_ascii_lowercase().ends_with(".localhost")
        || host
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback() || ip.is_unspecified())
}

/// Input media, optionally with its known size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub source: MediaSource,
    pub size_bytes: Option<u64>,
}

impl MediaRef {
    pub fn new(source: impl Into<MediaSource>) -> Self {
        Self {
            source: source.into(),
            size_bytes: None,
        }
    }

    /// In-memory media; its size is known up front
    pub fn bytes(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        let source = MediaSource::bytes(data, content_type);
        Self {
            size_bytes: source.byte_len(),
            source,
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn size(&self) -> Option<u64> {
        self.size_bytes.or_else(|| self.source.byte_len())
    }
}

/// Optional conditioning image for image generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageReference {
    ImageReference { source: MediaSource, weight: f32 },
    StyleReference { source: MediaSource, weight: f32 },
    CharacterReference { source: MediaSource },
    ModifyImage { source: MediaSource, weight: f32 },
}

impl ImageReference {
    pub fn image(source: impl Into<MediaSource>) -> Self {
        ImageReference::ImageReference {
            source: source.into(),
            weight: 0.85,
        }
    }

    pub fn style(source: impl Into<MediaSource>) -> Self {
        ImageReference::StyleReference {
            source: source.into(),
            weight: 0.8,
        }
    }

    pub fn character(source: impl Into<MediaSource>) -> Self {
        ImageReference::CharacterReference {
            source: source.into(),
        }
    }

    pub fn modify(source: impl Into<MediaSource>) -> Self {
        ImageReference::ModifyImage {
            source: source.into(),
            weight: 1.0,
        }
    }

    pub fn source(&self) -> &MediaSource {
        match self {
            ImageReference::ImageReference { source, .. }
            | ImageReference::StyleReference { source, .. }
            | ImageReference::CharacterReference { source }
            | ImageReference::ModifyImage { source, .. } => source,
        }
    }

    pub fn source_mut(&mut self) -> &mut MediaSource {
        match self {
            ImageReference::ImageReference { source, .. }
            | ImageReference::StyleReference { source, .. }
            | ImageReference::CharacterReference { source }
            | ImageReference::ModifyImage { source, .. } => source,
        }
    }

    pub fn weight(&self) -> Option<f32> {
        match self {
            ImageReference::ImageReference { weight, .. }
            | ImageReference::StyleReference { weight, .. }
            | ImageReference::ModifyImage { weight, .. } => Some(*weight),
            ImageReference::CharacterReference { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
pub struct ImageGeneration {
    #[builder(into)]
    pub prompt: String,
    #[builder(default)]
    pub model: ImageModel,
    #[builder(default)]
    pub aspect_ratio: AspectRatio,
    pub reference: Option<ImageReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct VideoGeneration {
    #[builder(into)]
    pub prompt: String,
    #[builder(default)]
    pub model: VideoModel,
    #[builder(default)]
    pub aspect_ratio: AspectRatio,
    #[builder(default)]
    pub resolution: Resolution,
    #[builder(default)]
    pub duration: VideoDuration,
    #[builder(default)]
    pub looped: bool,
    #[builder(into)]
    pub start_frame: Option<MediaSource>,
    #[builder(into)]
    pub end_frame: Option<MediaSource>,
    #[builder(default)]
    pub concepts: Vec<String>,
}

/// Reframe an existing image or video onto a new aspect ratio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Reframe<M> {
    pub media: MediaRef,
    pub model: M,
    #[builder(default)]
    pub aspect_ratio: AspectRatio,
    #[builder(into)]
    pub prompt: Option<String>,
    pub source_width: u32,
    pub source_height: u32,
    #[builder(default)]
    pub overrides: PlacementOverrides,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct VideoModify {
    pub media: MediaRef,
    #[builder(into)]
    pub prompt: String,
    #[builder(default)]
    pub model: VideoModel,
    #[builder(default)]
    pub mode: ModifyMode,
    #[builder(into)]
    pub first_frame: Option<MediaSource>,
}

/// One request per job kind; the orchestrator treats all of them uniformly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GenerationRequest {
    GenerateImage(ImageGeneration),
    GenerateVideo(VideoGeneration),
    ReframeImage(Reframe<ImageModel>),
    ReframeVideo(Reframe<VideoModel>),
    ModifyVideo(VideoModify),
}

impl GenerationRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            GenerationRequest::GenerateImage(_) => JobKind::GenerateImage,
            GenerationRequest::GenerateVideo(_) => JobKind::GenerateVideo,
            GenerationRequest::ReframeImage(_) => JobKind::ReframeImage,
            GenerationRequest::ReframeVideo(_) => JobKind::ReframeVideo,
            GenerationRequest::ModifyVideo(_) => JobKind::ModifyVideo,
        }
    }

    /// Every input media slot of the request, named by field
    pub fn sources_mut(&mut self) -> Vec<(&'static str, &mut MediaSource)> {
        let mut sources = Vec::new();
        match self {
            GenerationRequest::GenerateImage(r) => {
                if let Some(reference) = &mut r.reference {
                    sources.push(("reference", reference.source_mut()));
                }
            }
            GenerationRequest::GenerateVideo(r) => {
                if let Some(frame) = &mut r.start_frame {
                    sources.push(("start_frame", frame));
                }
                if let Some(frame) = &mut r.end_frame {
                    sources.push(("end_frame", frame));
                }
            }
            GenerationRequest::ReframeImage(r) => sources.push(("media", &mut r.media.source)),
            GenerationRequest::ReframeVideo(r) => sources.push(("media", &mut r.media.source)),
            GenerationRequest::ModifyVideo(r) => {
                sources.push(("media", &mut r.media.source));
                if let Some(frame) = &mut r.first_frame {
                    sources.push(("first_frame", frame));
                }
            }
        }
        sources
    }
}

/// A request that passed shape validation, with its resolved placement
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub request: GenerationRequest,
    pub placement: Option<CanvasPlacement>,
}

impl ValidatedRequest {
    pub fn kind(&self) -> JobKind {
        self.request.kind()
    }

    /// Validate `request` and resolve reframe geometry.
    ///
    /// Fails with a validation or placement error; never touches the network.
    pub fn prepare(request: GenerationRequest, limits: &LimitsConfig) -> Result<Self> {
        let kind = request.kind();
        let placement = match &request {
            GenerationRequest::GenerateImage(r) => {
                require_prompt(kind, &r.prompt)?;
                if let Some(reference) = &r.reference {
                    require_source("reference", reference.source())?;
                    if let Some(weight) = reference.weight() {
                        require_weight(weight)?;
                    }
                }
                None
            }
            GenerationRequest::GenerateVideo(r) => {
                require_prompt(kind, &r.prompt)?;
                if !r.model.supports(r.aspect_ratio) {
                    return Err(RequestError::UnsupportedAspectRatio {
                        model: r.model,
                        ratio: r.aspect_ratio,
                    }
                    .into());
                }
                for (field, frame) in [("start_frame", &r.start_frame), ("end_frame", &r.end_frame)] {
                    if let Some(source) = frame {
                        require_source(field, source)?;
                    }
                }
                None
            }
            GenerationRequest::ReframeImage(r) => {
                require_media(kind, &r.media, limits.image_max_bytes)?;
                Some(reframe_placement(r)?)
            }
            GenerationRequest::ReframeVideo(r) => {
                require_ray2(kind, r.model)?;
                require_media(kind, &r.media, limits.video_max_bytes)?;
                Some(reframe_placement(r)?)
            }
            GenerationRequest::ModifyVideo(r) => {
                require_prompt(kind, &r.prompt)?;
                require_ray2(kind, r.model)?;
                require_media(kind, &r.media, limits.video_max_bytes)?;
                if let Some(source) = &r.first_frame {
                    require_source("first_frame", source)?;
                }
                None
            }
        };

        Ok(Self { request, placement })
    }
}

fn reframe_placement<M>(r: &Reframe<M>) -> Result<CanvasPlacement> {
    Ok(CanvasPlacement::compute(
        r.source_width,
        r.source_height,
        r.aspect_ratio,
        &r.overrides,
    )?)
}

fn require_prompt(kind: JobKind, prompt: &str) -> std::result::Result<(), RequestError> {
    if prompt.trim().is_empty() {
        return Err(RequestError::EmptyPrompt { kind });
    }
    Ok(())
}

/// Inputs must be public http(s) URLs by the time they are submitted
fn require_source(field: &'static str, source: &MediaSource) -> std::result::Result<(), RequestError> {
    let Some(url) = source.as_url() else {
        return Err(RequestError::UnpublishedMedia {
            field,
            media: source.clone(),
        });
    };
    let scheme_ok = reqwest::Url::parse(url)
        .is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https"));
    if !scheme_ok {
        return Err(RequestError::InvalidUrl {
            field,
            url: url.to_string(),
        });
    }
    if source.is_loopback() {
        return Err(RequestError::UnpublishedMedia {
            field,
            media: source.clone(),
        });
    }
    Ok(())
}

fn require_weight(weight: f32) -> std::result::Result<(), RequestError> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(RequestError::InvalidWeight(weight));
    }
    Ok(())
}

fn require_ray2(kind: JobKind, model: VideoModel) -> std::result::Result<(), RequestError> {
    if !model.is_ray2_family() {
        return Err(RequestError::UnsupportedModel { kind, model });
    }
    Ok(())
}

fn require_media(
    kind: JobKind,
    media: &MediaRef,
    limit: ByteSize,
) -> std::result::Result<(), RequestError> {
    require_source("media", &media.source)?;
    match media.size() {
        Some(size) if size > limit.as_u64() => Err(RequestError::MediaTooLarge {
            kind,
            size: ByteSize(size),
            limit,
        }),
        _ => Ok(()),
    }
}
