use std::sync::Arc;

use log::{debug, info, warn};

use super::{
    raster, BoxLayout, ImageFormat, JobState, LayoutEngine, LayoutOptions, MarkupRequest,
    OutputTarget, Rasterizer, RenderFailure, RenderOutcome, RenderStage, ResvgRasterizer,
    TemplateRequest, MAX_DIMENSION,
};
use crate::element::ElementNode;
use crate::fonts::{FontRequest, FontResolver};
use crate::sink::{FileSink, OutputSink};
use crate::templates::{FieldViolation, TemplateRegistry, ValidationErrors, ViolationKind};
use crate::{markup, Error, RenderConfig, Result, Size};

type StageResult<T> = std::result::Result<T, RenderFailure>;

/// Drives requests through validation, font resolution, layout,
/// rasterization and delivery.
///
/// Cloning is cheap; every collaborator is shared. Per-request data (tree,
/// fonts, bytes) never outlives its request.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<TemplateRegistry>,
    fonts: Arc<dyn FontResolver>,
    layout: Arc<dyn LayoutEngine>,
    rasterizer: Arc<dyn Rasterizer>,
    file_sink: Arc<dyn OutputSink>,
    blob_sink: Option<Arc<dyn OutputSink>>,
    markup_size: Size,
}

impl Orchestrator {
    /// Built-in layout, resvg rasterization and filesystem delivery. Blob
    /// delivery is off until [`Self::with_blob_sink`].
    pub fn new(registry: Arc<TemplateRegistry>, fonts: Arc<dyn FontResolver>) -> Self {
        Self {
            registry,
            fonts,
            layout: Arc::new(BoxLayout::new()),
            rasterizer: Arc::new(ResvgRasterizer::new()),
            file_sink: Arc::new(FileSink::new()),
            blob_sink: None,
            markup_size: RenderConfig::default().markup_size,
        }
    }

    /// Wire everything from configuration: the font backend it selects, system
    /// fonts for unshaped text and a blob sink when a token is present.
    pub fn from_config(config: RenderConfig) -> Result<Self> {
        let fonts = crate::new_font_resolver(&config)?;
        let mut orchestrator = Self::new(Arc::new(TemplateRegistry::builtin()), fonts)
            .with_rasterizer(Arc::new(ResvgRasterizer::with_system_fonts()))
            .with_markup_size(config.markup_size);
        if let Some(sink) = blob_sink(&config)? {
            orchestrator = orchestrator.with_blob_sink(sink);
        }
        Ok(orchestrator)
    }

    pub fn with_layout(mut self, layout: Arc<dyn LayoutEngine>) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_file_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.file_sink = sink;
        self
    }

    pub fn with_blob_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.blob_sink = Some(sink);
        self
    }

    pub fn with_markup_size(mut self, size: Size) -> Self {
        self.markup_size = size;
        self
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn has_blob_sink(&self) -> bool {
        self.blob_sink.is_some()
    }

    /// Render a registered template. Size overrides beat the template's
    /// declared size; caller fonts replace the template's when non-empty.
    pub async fn render_template(&self, request: TemplateRequest) -> StageResult<RenderOutcome> {
        let mut job = Job::new(format!("template {}", request.template.trim()));

        let definition = self
            .registry
            .lookup(&request.template)
            .map_err(|e| job.fail(RenderStage::Validate, e))?;
        let size = Size::new(
            request.width.unwrap_or(definition.size.width),
            request.height.unwrap_or(definition.size.height),
        );
        let fonts = request
            .fonts
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| definition.fonts.clone());

        let tree = check_output(size, request.quality)
            .and_then(|()| self.registry.validate_and_generate(&request.template, &request.params))
            .map_err(|e| job.fail(RenderStage::Validate, e))?;
        job.advance(JobState::Validated);

        self.execute(job, tree, fonts, size, request.target, request.format, request.quality)
            .await
    }

    /// Render raw markup. Missing dimensions fall back to the configured
    /// markup size; fonts default to Inter 400 and 700.
    pub async fn render_markup(&self, request: MarkupRequest) -> StageResult<RenderOutcome> {
        let mut job = Job::new("markup".to_string());

        let size = Size::new(
            request.width.unwrap_or(self.markup_size.width),
            request.height.unwrap_or(self.markup_size.height),
        );
        let fonts = request
            .fonts
            .filter(|f| !f.is_empty())
            .unwrap_or_else(default_markup_fonts);
        check_output(size, request.quality).map_err(|e| job.fail(RenderStage::Validate, e))?;
        let tree = markup::parse(&request.markup);
        job.advance(JobState::Validated);

        self.execute(job, tree, fonts, size, request.target, request.format, request.quality)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        mut job: Job,
        tree: ElementNode,
        fonts: Vec<FontRequest>,
        size: Size,
        target: OutputTarget,
        format: ImageFormat,
        quality: u8,
    ) -> StageResult<RenderOutcome> {
        let assets = self
            .fonts
            .resolve(&fonts)
            .await
            .map_err(|e| job.fail(RenderStage::ResolveFonts, e))?;
        job.advance(JobState::FontsResolved);

        let layout = Arc::clone(&self.layout);
        let options = LayoutOptions {
            width: size.width,
            height: size.height,
            fonts: assets,
        };
        let svg = blocking(move || layout.layout(&tree, &options))
            .await
            .map_err(|e| job.fail(RenderStage::Layout, e))?;
        job.advance(JobState::LaidOut);

        let rasterizer = Arc::clone(&self.rasterizer);
        let width = size.width;
        let bytes = blocking(move || {
            let png = rasterizer.rasterize(&svg, width)?;
            raster::encode(png, format, quality)
        })
        .await
        .map_err(|e| job.fail(RenderStage::Rasterize, e))?;
        job.advance(JobState::Rasterized);

        let len = bytes.len();
        let location = self
            .deliver(bytes, &target, format)
            .await
            .map_err(|e| job.fail(RenderStage::Deliver, e))?;
        job.advance(JobState::Delivered);
        info!("{} delivered to {} ({} bytes, {})", job.label, location, len, format);

        Ok(RenderOutcome {
            location,
            size,
            format,
            bytes: len,
        })
    }

    async fn deliver(&self, bytes: Vec<u8>, target: &OutputTarget, format: ImageFormat) -> Result<String> {
        match target {
            OutputTarget::Path(path) => {
                self.file_sink.put(bytes, &path.to_string_lossy()).await
            }
            OutputTarget::Blob(name) => {
                let sink = self.blob_sink.as_ref().ok_or_else(|| {
                    Error::DeliveryError(
                        "blob storage is not configured (set BLOB_READ_WRITE_TOKEN)".to_string(),
                    )
                })?;
                sink.put(bytes, &with_extension(name, format)).await
            }
        }
    }
}

/// Per-request bookkeeping for state transitions
struct Job {
    label: String,
    state: JobState,
}

impl Job {
    fn new(label: String) -> Self {
        debug!("{}: {:?}", label, JobState::Received);
        Self {
            label,
            state: JobState::Received,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug!("{}: {:?} -> {:?}", self.label, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, stage: RenderStage, error: Error) -> RenderFailure {
        warn!("{}: {} failed after {:?}: {}", self.label, stage, self.state, error);
        self.state = JobState::Failed(stage);
        RenderFailure::new(stage, error)
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::RenderError(format!("render task aborted: {}", e)))?
}

fn check_output(size: Size, quality: u8) -> Result<()> {
    let mut violations = Vec::new();
    for (field, value) in [("width", size.width), ("height", size.height)] {
        if value == 0 {
            violations.push(FieldViolation {
                field: field.to_string(),
                kind: ViolationKind::BelowMinimum { min: 1.0 },
            });
        } else if value > MAX_DIMENSION {
            violations.push(FieldViolation {
                field: field.to_string(),
                kind: ViolationKind::AboveMaximum {
                    max: f64::from(MAX_DIMENSION),
                },
            });
        }
    }
    if !(1..=100).contains(&quality) {
        violations.push(FieldViolation {
            field: "quality".to_string(),
            kind: if quality == 0 {
                ViolationKind::BelowMinimum { min: 1.0 }
            } else {
                ViolationKind::AboveMaximum { max: 100.0 }
            },
        });
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { violations }.into())
    }
}

fn default_markup_fonts() -> Vec<FontRequest> {
    vec![FontRequest::normal("Inter", 400), FontRequest::normal("Inter", 700)]
}

/// Image extensions a blob name may already carry
const IMAGE_EXTENSIONS: &[&str] = &["png", "webp", "jpg", "jpeg", "gif"];

/// Give `name` the format's extension: kept when it already matches, swapped
/// when it names another image type, appended otherwise.
fn with_extension(name: &str, format: ImageFormat) -> String {
    let file_start = name.rfind('/').map_or(0, |i| i + 1);
    if let Some(dot) = name[file_start..].rfind('.').map(|i| file_start + i) {
        let ext = &name[dot + 1..];
        if ext.eq_ignore_ascii_case(format.extension()) {
            return name.to_string();
        }
        if IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            return format!("{}.{}", &name[..dot], format.extension());
        }
    }
    format!("{}.{}", name, format.extension())
}

#[cfg(feature = "remote")]
fn blob_sink(config: &RenderConfig) -> Result<Option<Arc<dyn OutputSink>>> {
    Ok(match &config.blob_token {
        Some(token) => Some(Arc::new(crate::sink::BlobSink::new(
            &config.blob_api_url,
            token,
            &config.user_agent,
        )?)),
        None => None,
    })
}

#[cfg(not(feature = "remote"))]
fn blob_sink(_config: &RenderConfig) -> Result<Option<Arc<dyn OutputSink>>> {
    Ok(None)
}
