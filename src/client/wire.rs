//! Request bodies and response shapes exchanged with the generation service.

use serde::{Deserialize, Serialize};

use crate::placement::CanvasPlacement;
use crate::request::{
    AspectRatio, GenerationRequest, ImageModel, ImageReference, JobKind, MediaSource, ModifyMode,
    Reframe, Resolution, ValidatedRequest, VideoDuration, VideoModel,
};

/// Path (relative to the base URL) that accepts submissions of `kind`
pub fn submit_path(kind: JobKind) -> &'static str {
    match kind {
        JobKind::GenerateImage => "generations/image",
        JobKind::GenerateVideo => "generations",
        JobKind::ReframeImage => "generations/image/reframe",
        JobKind::ReframeVideo => "generations/video/reframe",
        JobKind::ModifyVideo => "generations/video/modify",
    }
}

pub const CONCEPTS_PATH: &str = "generations/concepts/list";
pub const CAMERA_MOTIONS_PATH: &str = "generations/camera_motion/list";

pub fn status_path(generation_id: &str) -> String {
    format!("generations/{generation_id}")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Created {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlRef {
    pub url: String,
}

/// Validation guarantees every source is a public URL by now
fn url_of(source: &MediaSource) -> String {
    source.as_url().unwrap_or_default().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedRef {
    pub url: String,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterRef {
    pub identity0: Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageBody {
    pub prompt: String,
    pub model: ImageModel,
    pub aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<Vec<WeightedRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_ref: Option<Vec<WeightedRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_ref: Option<CharacterRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modify_image_ref: Option<WeightedRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyframe {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyframes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame0: Option<Keyframe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame1: Option<Keyframe>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Concept {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoBody {
    pub prompt: String,
    pub model: VideoModel,
    pub aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<VideoDuration>,
    #[serde(rename = "loop", skip_serializing_if = "std::ops::Not::not")]
    pub looped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyframes: Option<Keyframes>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub concepts: Vec<Concept>,
}

/// Placement fields; absent fields are derived by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PlacementFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_position_x: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_position_y: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_end: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_end: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resized_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resized_height: Option<u32>,
}

impl From<&CanvasPlacement> for PlacementFields {
    fn from(p: &CanvasPlacement) -> Self {
        Self {
            grid_position_x: Some(p.grid_position_x),
            grid_position_y: Some(p.grid_position_y),
            x_start: Some(p.crop_bounds.x_start),
            x_end: Some(p.crop_bounds.x_end),
            y_start: Some(p.crop_bounds.y_start),
            y_end: Some(p.crop_bounds.y_end),
            resized_width: Some(p.resized_width),
            resized_height: Some(p.resized_height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReframeBody<M> {
    pub generation_type: &'static str,
    pub media: UrlRef,
    pub model: M,
    pub aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub placement: PlacementFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifyBody {
    pub generation_type: &'static str,
    pub media: UrlRef,
    pub prompt: String,
    pub model: VideoModel,
    pub mode: ModifyMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_frame: Option<UrlRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubmitBody {
    Image(ImageBody),
    Video(VideoBody),
    ReframeImage(ReframeBody<ImageModel>),
    ReframeVideo(ReframeBody<VideoModel>),
    Modify(ModifyBody),
}

impl From<&ValidatedRequest> for SubmitBody {
    fn from(validated: &ValidatedRequest) -> Self {
        match &validated.request {
            GenerationRequest::GenerateImage(r) => {
                let mut body = ImageBody {
                    prompt: r.prompt.trim().to_string(),
                    model: r.model,
                    aspect_ratio: r.aspect_ratio,
                    image_ref: None,
                    style_ref: None,
                    character_ref: None,
                    modify_image_ref: None,
                };
                match &r.reference {
                    Some(ImageReference::ImageReference { source, weight }) => {
                        body.image_ref = Some(vec![WeightedRef {
                            url: url_of(source),
                            weight: *weight,
                        }]);
                    }
                    Some(ImageReference::StyleReference { source, weight }) => {
                        body.style_ref = Some(vec![WeightedRef {
                            url: url_of(source),
                            weight: *weight,
                        }]);
                    }
                    Some(ImageReference::CharacterReference { source }) => {
                        body.character_ref = Some(CharacterRef {
                            identity0: Identity {
                                images: vec![url_of(source)],
                            },
                        });
                    }
                    Some(ImageReference::ModifyImage { source, weight }) => {
                        body.modify_image_ref = Some(WeightedRef {
                            url: url_of(source),
                            weight: *weight,
                        });
                    }
                    None => {}
                }
                SubmitBody::Image(body)
            }
            GenerationRequest::GenerateVideo(r) => {
                let ray2 = r.model.is_ray2_family();
                let frame = |source: &Option<MediaSource>| {
                    source.as_ref().map(|source| Keyframe {
                        kind: "image",
                        url: url_of(source),
                    })
                };
                let keyframes = (r.start_frame.is_some() || r.end_frame.is_some()).then(|| {
                    Keyframes {
                        frame0: frame(&r.start_frame),
                        frame1: frame(&r.end_frame),
                    }
                });
                SubmitBody::Video(VideoBody {
                    prompt: r.prompt.trim().to_string(),
                    model: r.model,
                    aspect_ratio: r.aspect_ratio,
                    resolution: ray2.then_some(r.resolution),
                    duration: ray2.then_some(r.duration),
                    looped: r.looped,
                    keyframes,
                    concepts: r
                        .concepts
                        .iter()
                        .map(|key| Concept { key: key.clone() })
                        .collect(),
                })
            }
            GenerationRequest::ReframeImage(r) => {
                SubmitBody::ReframeImage(reframe_body("reframe_image", r, validated.placement.as_ref()))
            }
            GenerationRequest::ReframeVideo(r) => {
                SubmitBody::ReframeVideo(reframe_body("reframe_video", r, validated.placement.as_ref()))
            }
            GenerationRequest::ModifyVideo(r) => SubmitBody::Modify(ModifyBody {
                generation_type: "modify_video",
                media: UrlRef {
                    url: url_of(&r.media.source),
                },
                prompt: r.prompt.trim().to_string(),
                model: r.model,
                mode: r.mode,
                first_frame: r.first_frame.as_ref().map(|source| UrlRef {
                    url: url_of(source),
                }),
            }),
        }
    }
}

/// Geometry is sent only when the caller overrode something; otherwise the
/// service derives the same centred fit on its own.
fn reframe_body<M: Copy>(
    generation_type: &'static str,
    r: &Reframe<M>,
    placement: Option<&CanvasPlacement>,
) -> ReframeBody<M> {
    let placement = match placement {
        Some(p) if !r.overrides.is_empty() => PlacementFields::from(p),
        _ => PlacementFields::default(),
    };
    ReframeBody {
        generation_type,
        media: UrlRef {
            url: url_of(&r.media.source),
        },
        model: r.model,
        aspect_ratio: r.aspect_ratio,
        prompt: r
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        placement,
    }
}
