use std::fs::File;
use std::io::{BufReader, Read};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use gltf::mesh::Mode;

use super::locator::SourceLocator;
use super::model::{ImportedModel, MeshBounds, MeshSummary};
use super::step::{ImportStep, StepContext, StepPoll};
use crate::coordinator::StepFactory;

pub const DEFAULT_READ_CHUNK_BYTES: usize = 256 * 1024;

pub struct OpenedSource {
    pub reader: Box<dyn Read>,
    pub len: Option<u64>,
}

/// Turns a locator into a byte stream. Platform readers (content URIs, archives) plug in here.
pub trait SourceOpener {
    fn open(&self, locator: &SourceLocator) -> Result<OpenedSource>;
}

/// Opens plain paths and `file://` URIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileOpener;

impl SourceOpener for FileOpener {
    fn open(&self, locator: &SourceLocator) -> Result<OpenedSource> {
        let path = locator.as_path().ok_or_else(|| {
            anyhow!("No reader available for '{}' URIs ({locator})", locator.scheme().unwrap_or("unknown"))
        })?;
        let file = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let len = file.metadata().ok().map(|meta| meta.len());
        Ok(OpenedSource { reader: Box::new(BufReader::new(file)), len })
    }
}

/// Waits without blocking the host; each poll only checks the clock.
pub struct DelayStep {
    delay: Duration,
    started: Option<Instant>,
}

impl DelayStep {
    pub fn new(delay: Duration) -> Self {
        Self { delay, started: None }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl ImportStep for DelayStep {
    fn label(&self) -> &str {
        "delay"
    }

    fn poll(&mut self, ctx: &mut StepContext<'_>) -> StepPoll {
        let started = *self.started.get_or_insert_with(Instant::now);
        let elapsed = started.elapsed();
        if elapsed >= self.delay {
            ctx.report(1.0, format!("Waited {} ms", self.delay.as_millis()));
            return StepPoll::Done;
        }
        let fraction = elapsed.as_secs_f32() / self.delay.as_secs_f32();
        let remaining = self.delay - elapsed;
        ctx.report(fraction, format!("Starting in {} ms", remaining.as_millis()));
        StepPoll::Pending
    }
}

pub struct ReadSourceStep {
    opener: Rc<dyn SourceOpener>,
    chunk_bytes: usize,
    reader: Option<Box<dyn Read>>,
    expected_len: Option<u64>,
    buffer: Vec<u8>,
}

impl ReadSourceStep {
    pub fn new(opener: Rc<dyn SourceOpener>, chunk_bytes: usize) -> Self {
        Self { opener, chunk_bytes: chunk_bytes.max(1), reader: None, expected_len: None, buffer: Vec::new() }
    }

    fn read_chunk(&mut self, locator: &SourceLocator) -> Result<bool> {
        if self.reader.is_none() {
            let opened = self.opener.open(locator)?;
            self.expected_len = opened.len;
            if let Some(len) = opened.len {
                self.buffer.reserve(usize::try_from(len).unwrap_or(0));
            }
            self.reader = Some(opened.reader);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(true);
        };
        let read = reader
            .by_ref()
            .take(self.chunk_bytes as u64)
            .read_to_end(&mut self.buffer)
            .with_context(|| format!("Failed to read {locator}"))?;
        let reached_len = self.expected_len.is_some_and(|len| self.buffer.len() as u64 >= len);
        Ok(read == 0 || reached_len)
    }
}

impl ImportStep for ReadSourceStep {
    fn label(&self) -> &str {
        "read source"
    }

    fn poll(&mut self, ctx: &mut StepContext<'_>) -> StepPoll {
        let locator = ctx.locator();
        match self.read_chunk(locator) {
            Ok(true) => {
                self.reader = None;
                let bytes = std::mem::take(&mut self.buffer);
                ctx.report(1.0, format!("Read {} bytes from {}", bytes.len(), locator.display_name()));
                ctx.payload().bytes = Some(bytes);
                StepPoll::Done
            }
            Ok(false) => {
                let read = self.buffer.len();
                let fraction = match self.expected_len {
                    Some(len) if len > 0 => read as f32 / len as f32,
                    _ => 0.0,
                };
                ctx.report(fraction, format!("Reading {} ({} KiB)", locator.display_name(), read / 1024));
                StepPoll::Pending
            }
            Err(err) => StepPoll::Failed(err),
        }
    }

    fn abandon(&mut self) {
        self.reader = None;
        self.buffer = Vec::new();
    }
}

#[derive(Debug, Default)]
pub struct ParseDocumentStep;

impl ImportStep for ParseDocumentStep {
    fn label(&self) -> &str {
        "parse document"
    }

    fn poll(&mut self, ctx: &mut StepContext<'_>) -> StepPoll {
        let locator = ctx.locator();
        let result = (|| -> Result<()> {
            let payload = ctx.payload();
            let bytes = payload.bytes.take().ok_or_else(|| anyhow!("No source bytes read for {locator}"))?;
            let gltf = gltf::Gltf::from_slice(&bytes)
                .with_context(|| format!("Failed to parse glTF from {locator}"))?;
            payload.document = Some(gltf.document);
            payload.blob = gltf.blob;
            Ok(())
        })();
        StepPoll::from_result(result)
    }
}

#[derive(Debug, Default)]
pub struct LoadBuffersStep;

impl ImportStep for LoadBuffersStep {
    fn label(&self) -> &str {
        "load buffers"
    }

    fn poll(&mut self, ctx: &mut StepContext<'_>) -> StepPoll {
        let locator = ctx.locator();
        let base = locator.base_dir();
        let result = (|| -> Result<usize> {
            let payload = ctx.payload();
            let blob = payload.blob.take();
            let document = payload.document.as_ref().ok_or_else(|| anyhow!("No glTF document for {locator}"))?;
            let buffers = gltf::import_buffers(document, base.as_deref(), blob)
                .with_context(|| format!("Failed to load buffers for {locator}"))?;
            let count = buffers.len();
            payload.buffers = buffers;
            Ok(count)
        })();
        match result {
            Ok(count) => {
                ctx.report(1.0, format!("Loaded {count} buffers"));
                StepPoll::Done
            }
            Err(err) => StepPoll::Failed(err),
        }
    }
}

/// Summarizes one glTF mesh per quantum.
#[derive(Debug, Default)]
pub struct BuildMeshesStep {
    next_mesh: usize,
    meshes: Vec<MeshSummary>,
}

impl BuildMeshesStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns (meshes built so far, total meshes).
    fn build_next(&mut self, ctx: &mut StepContext<'_>) -> Result<(usize, usize)> {
        let locator = ctx.locator();
        let payload = ctx.payload();
        let document = payload.document.as_ref().ok_or_else(|| anyhow!("No glTF document for {locator}"))?;
        let total = document.meshes().count();
        if total == 0 {
            return Err(anyhow!("No meshes found in {locator}"));
        }
        if let Some(mesh) = document.meshes().nth(self.next_mesh) {
            let summary = summarize_mesh(&mesh, &payload.buffers)
                .with_context(|| format!("Failed to read mesh {} in {locator}", self.next_mesh))?;
            self.meshes.push(summary);
        }
        self.next_mesh += 1;
        if self.next_mesh >= total {
            let materials = document.materials().count();
            let meshes = std::mem::take(&mut self.meshes);
            payload.model = Some(ImportedModel::new(locator.to_string(), meshes, materials));
        }
        Ok((self.next_mesh, total))
    }
}

impl ImportStep for BuildMeshesStep {
    fn label(&self) -> &str {
        "build meshes"
    }

    fn poll(&mut self, ctx: &mut StepContext<'_>) -> StepPoll {
        match self.build_next(ctx) {
            Ok((built, total)) if built >= total => {
                ctx.report(1.0, format!("Built {total} meshes"));
                StepPoll::Done
            }
            Ok((built, total)) => {
                ctx.report(built as f32 / total as f32, format!("Building mesh {}/{}", built + 1, total));
                StepPoll::Pending
            }
            Err(err) => StepPoll::Failed(err),
        }
    }

    fn abandon(&mut self) {
        self.meshes.clear();
    }
}

fn summarize_mesh(mesh: &gltf::Mesh<'_>, buffers: &[gltf::buffer::Data]) -> Result<MeshSummary> {
    let mut primitives = 0;
    let mut vertices = 0;
    let mut triangles = 0;
    let mut bounds: Option<MeshBounds> = None;
    for primitive in mesh.primitives() {
        if primitive.mode() != Mode::Triangles {
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let positions: Vec<Vec3> = reader
            .read_positions()
            .ok_or_else(|| anyhow!("POSITION attribute missing in primitive {}", primitive.index()))?
            .map(Vec3::from_array)
            .collect();
        if positions.is_empty() {
            continue;
        }
        let index_count = reader.read_indices().map(|it| it.into_u32().count()).unwrap_or(positions.len());
        primitives += 1;
        vertices += positions.len();
        triangles += index_count / 3;
        if let Some(primitive_bounds) = MeshBounds::from_points(&positions) {
            bounds = Some(match bounds {
                Some(existing) => existing.union(&primitive_bounds),
                None => primitive_bounds,
            });
        }
    }
    Ok(MeshSummary { name: mesh.name().map(str::to_string), primitives, vertices, triangles, bounds })
}

/// Default step factory: read, parse, resolve buffers, summarize meshes.
#[derive(Clone)]
pub struct GltfPipeline {
    opener: Rc<dyn SourceOpener>,
    read_chunk_bytes: usize,
}

impl GltfPipeline {
    pub fn new(opener: Rc<dyn SourceOpener>, read_chunk_bytes: usize) -> Self {
        Self { opener, read_chunk_bytes }
    }

    pub fn with_chunk_bytes(read_chunk_bytes: usize) -> Self {
        Self::new(Rc::new(FileOpener), read_chunk_bytes)
    }
}

impl Default for GltfPipeline {
    fn default() -> Self {
        Self::with_chunk_bytes(DEFAULT_READ_CHUNK_BYTES)
    }
}

impl StepFactory for GltfPipeline {
    fn build(&self, _locator: &SourceLocator) -> Vec<Box<dyn ImportStep>> {
        vec![
            Box::new(ReadSourceStep::new(Rc::clone(&self.opener), self.read_chunk_bytes)),
            Box::new(ParseDocumentStep),
            Box::new(LoadBuffersStep),
            Box::new(BuildMeshesStep::new()),
        ]
    }
}
