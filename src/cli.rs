use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use lumaflow::placement::PlacementOverrides;
use lumaflow::request::{
    AspectRatio, ImageGeneration, ImageModel, ImageReference, MediaRef, ModifyMode, Reframe,
    Resolution, VideoDuration, VideoGeneration, VideoModel, VideoModify,
};

#[derive(Parser, Debug)]
#[command(name = "lumaflow")]
#[command(about = "Drive Luma generation jobs from the command line", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $LUMAFLOW_CONFIG or config/lumaflow.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an image from a prompt
    GenerateImage(GenerateImageArgs),
    /// Generate a video from a prompt and optional keyframes
    GenerateVideo(GenerateVideoArgs),
    /// Reframe an image onto a new aspect ratio
    ReframeImage(ReframeImageArgs),
    /// Reframe a video onto a new aspect ratio
    ReframeVideo(ReframeVideoArgs),
    /// Restyle a video with a prompt
    ModifyVideo(ModifyVideoArgs),
    /// List concepts usable in video generation
    ListConcepts,
    /// List camera motion phrases usable in prompts
    ListCameraMotions,
    /// Compute reframe geometry locally without calling the service
    Placement(PlacementArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ReferenceKind {
    Image,
    Style,
    Character,
    Modify,
}

#[derive(Args, Debug)]
pub struct GenerateImageArgs {
    #[arg(long)]
    pub prompt: String,

    #[arg(long, default_value = "photon-1")]
    pub model: ImageModel,

    #[arg(long, default_value = "16:9")]
    pub aspect_ratio: AspectRatio,

    /// Kind of reference image to condition on
    #[arg(long, requires = "reference_url")]
    pub reference: Option<ReferenceKind>,

    #[arg(long, requires = "reference")]
    pub reference_url: Option<String>,

    /// Override the default weight for image, style and modify references
    #[arg(long, requires = "reference")]
    pub reference_weight: Option<f32>,
}

impl GenerateImageArgs {
    pub fn into_request(self) -> ImageGeneration {
        let reference = match (self.reference, self.reference_url) {
            (Some(kind), Some(url)) => {
                let reference = match kind {
                    ReferenceKind::Image => ImageReference::image(url),
                    ReferenceKind::Style => ImageReference::style(url),
                    ReferenceKind::Character => ImageReference::character(url),
                    ReferenceKind::Modify => ImageReference::modify(url),
                };
                Some(with_weight(reference, self.reference_weight))
            }
            _ => None,
        };

        ImageGeneration::builder()
            .prompt(self.prompt)
            .model(self.model)
            .aspect_ratio(self.aspect_ratio)
            .maybe_reference(reference)
            .build()
    }
}

fn with_weight(reference: ImageReference, weight: Option<f32>) -> ImageReference {
    let Some(weight) = weight else {
        return reference;
    };
    match reference {
        ImageReference::ImageReference { source, .. } => {
            ImageReference::ImageReference { source, weight }
        }
        ImageReference::StyleReference { source, .. } => {
            ImageReference::StyleReference { source, weight }
        }
        ImageReference::ModifyImage { source, .. } => ImageReference::ModifyImage { source, weight },
        character @ ImageReference::CharacterReference { .. } => character,
    }
}

#[derive(Args, Debug)]
pub struct GenerateVideoArgs {
    #[arg(long)]
    pub prompt: String,

    #[arg(long, default_value = "ray-2")]
    pub model: VideoModel,

    #[arg(long, default_value = "16:9")]
    pub aspect_ratio: AspectRatio,

    #[arg(long, default_value = "720p")]
    pub resolution: Resolution,

    #[arg(long, default_value = "5s")]
    pub duration: VideoDuration,

    #[arg(long = "loop")]
    pub looped: bool,

    /// Image URL for the first frame
    #[arg(long)]
    pub start_frame: Option<String>,

    /// Image URL for the last frame
    #[arg(long)]
    pub end_frame: Option<String>,

    /// Concept key (repeatable)
    #[arg(long = "concept")]
    pub concepts: Vec<String>,
}

impl GenerateVideoArgs {
    pub fn into_request(self) -> VideoGeneration {
        VideoGeneration::builder()
            .prompt(self.prompt)
            .model(self.model)
            .aspect_ratio(self.aspect_ratio)
            .resolution(self.resolution)
            .duration(self.duration)
            .looped(self.looped)
            .maybe_start_frame(self.start_frame)
            .maybe_end_frame(self.end_frame)
            .concepts(self.concepts)
            .build()
    }
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct OverrideArgs {
    #[arg(long)]
    pub resized_width: Option<u32>,
    #[arg(long)]
    pub resized_height: Option<u32>,
    #[arg(long, allow_negative_numbers = true)]
    pub grid_position_x: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    pub grid_position_y: Option<i64>,
    #[arg(long)]
    pub x_start: Option<u32>,
    #[arg(long)]
    pub x_end: Option<u32>,
    #[arg(long)]
    pub y_start: Option<u32>,
    #[arg(long)]
    pub y_end: Option<u32>,
}

impl From<OverrideArgs> for PlacementOverrides {
    fn from(args: OverrideArgs) -> Self {
        PlacementOverrides {
            resized_width: args.resized_width,
            resized_height: args.resized_height,
            grid_position_x: args.grid_position_x,
            grid_position_y: args.grid_position_y,
            x_start: args.x_start,
            x_end: args.x_end,
            y_start: args.y_start,
            y_end: args.y_end,
        }
    }
}

#[derive(Args, Debug)]
pub struct ReframeSource {
    /// Public URL of the source media
    #[arg(long)]
    pub media_url: String,

    /// Source size in bytes, checked against the configured ceiling
    #[arg(long)]
    pub media_size: Option<u64>,

    #[arg(long, default_value = "16:9")]
    pub aspect_ratio: AspectRatio,

    #[arg(long)]
    pub prompt: Option<String>,

    #[arg(long)]
    pub source_width: u32,

    #[arg(long)]
    pub source_height: u32,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

impl ReframeSource {
    pub fn into_request<M>(self, model: M) -> Reframe<M> {
        Reframe::builder()
            .media(media(self.media_url, self.media_size))
            .model(model)
            .aspect_ratio(self.aspect_ratio)
            .maybe_prompt(self.prompt)
            .source_width(self.source_width)
            .source_height(self.source_height)
            .overrides(self.overrides.into())
            .build()
    }
}

#[derive(Args, Debug)]
pub struct ReframeImageArgs {
    #[arg(long, default_value = "photon-1")]
    pub model: ImageModel,

    #[command(flatten)]
    pub source: ReframeSource,
}

#[derive(Args, Debug)]
pub struct ReframeVideoArgs {
    #[arg(long, default_value = "ray-2")]
    pub model: VideoModel,

    #[command(flatten)]
    pub source: ReframeSource,
}

#[derive(Args, Debug)]
pub struct ModifyVideoArgs {
    #[arg(long)]
    pub media_url: String,

    #[arg(long)]
    pub media_size: Option<u64>,

    #[arg(long)]
    pub prompt: String,

    #[arg(long, default_value = "ray-2")]
    pub model: VideoModel,

    #[arg(long, default_value = "flex_1")]
    pub mode: ModifyMode,

    /// Image URL to pin the first frame
    #[arg(long)]
    pub first_frame: Option<String>,
}

impl ModifyVideoArgs {
    pub fn into_request(self) -> VideoModify {
        VideoModify::builder()
            .media(media(self.media_url, self.media_size))
            .prompt(self.prompt)
            .model(self.model)
            .mode(self.mode)
            .maybe_first_frame(self.first_frame)
            .build()
    }
}

#[derive(Args, Debug)]
pub struct PlacementArgs {
    #[arg(long)]
    pub source_width: u32,

    #[arg(long)]
    pub source_height: u32,

    #[arg(long, default_value = "16:9")]
    pub aspect_ratio: AspectRatio,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

fn media(url: String, size: Option<u64>) -> MediaRef {
    let media = MediaRef::new(url);
    match size {
        Some(size) => media.with_size(size),
        None => media,
    }
}
