use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, channel},
        Arc, RwLock,
    },
    time::Duration,
};

use anyhow::Context;
use id_arena::{Arena, Id};
use naga::{
    back::wgsl::WriterFlags,
    valid::{Capabilities, ValidationFlags},
};
use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, NagaModuleDescriptor, ShaderDefValue, ShaderLanguage,
};
use notify_debouncer_mini::{
    new_debouncer_opt, notify::*, DebounceEventResult, DebouncedEventKind, Debouncer,
};
use pollster::block_on;
use wgpu::{naga, PollType};

/// Builds a pipeline from composed WGSL. The closure owns the layouts and
/// state it needs, so a reload only has to re-run it with new source.
pub type PipelineFactory =
    Box<dyn Sync + Send + Fn(&wgpu::Device, &str) -> anyhow::Result<wgpu::RenderPipeline>>;

/// A shader source file plus the defs injected when composing it. Defs are
/// the conditional-compilation contract: the same file yields different
/// pipelines per feature set.
#[derive(Debug, Clone)]
pub struct ShaderDefinition {
    pub name: &'static str,
    pub path: &'static str,
    pub defs: Vec<(&'static str, bool)>,
}

impl ShaderDefinition {
    fn shader_defs(&self) -> HashMap<String, ShaderDefValue> {
        self.defs
            .iter()
            .map(|(name, value)| (name.to_string(), ShaderDefValue::Bool(*value)))
            .collect()
    }
}

struct ShaderEntry {
    slot: RenderPipelineId,
    def: ShaderDefinition,
    factory: PipelineFactory,
}

pub type RenderPipelineId = Id<PipelineSlot>;

/// Cache slot for one compiled pipeline. Empty when compilation has failed
/// so far; renderables with an empty slot are skipped, not drawn.
#[derive(Default)]
pub struct PipelineSlot(Option<wgpu::RenderPipeline>);

/// Compiles shader files into pipeline cache slots and keeps them fresh.
///
/// Sources live under an injected shader directory, with composable modules
/// in its `shared/` subdirectory. With `watch()` enabled, a debounced file
/// watcher recompiles changed shaders on its own thread and hands finished
/// pipelines over a channel; `process_reloads` installs them between frames.
pub struct ShaderLibrary {
    device: wgpu::Device,
    shader_dir: PathBuf,
    entries: Arc<RwLock<Arena<ShaderEntry>>>,
    slots: Arena<PipelineSlot>,
    composer: Arc<RwLock<Composer>>,
    sender: mpsc::Sender<(&'static str, RenderPipelineId, wgpu::RenderPipeline)>,
    receiver: mpsc::Receiver<(&'static str, RenderPipelineId, wgpu::RenderPipeline)>,
    _debouncer: Option<Debouncer<RecommendedWatcher>>,
}

impl ShaderLibrary {
    pub fn new(device: wgpu::Device, shader_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let shader_dir = shader_dir.into();
        let composer = create_composer(&shader_dir)?;
        let (sender, receiver) = channel();

        Ok(Self {
            device,
            shader_dir,
            entries: Arc::new(RwLock::new(Arena::new())),
            slots: Arena::new(),
            composer: Arc::new(RwLock::new(composer)),
            sender,
            receiver,
            _debouncer: None,
        })
    }

    /// Registers a shader and compiles it immediately. A failed compile
    /// leaves the slot empty and is logged; the slot fills once a reload or
    /// `recompile` succeeds.
    pub fn add_shader(
        &mut self,
        def: ShaderDefinition,
        factory: PipelineFactory,
    ) -> RenderPipelineId {
        let slot = self.slots.alloc(PipelineSlot::default());

        match compile_file(
            &self.device,
            &self.shader_dir,
            &def,
            &factory,
            self.composer.clone(),
        ) {
            Ok(pipeline) => {
                self.slots[slot].0 = Some(pipeline);
            }
            Err(error) => {
                log::error!("failed to compile shader {}: {error:?}", def.name);
            }
        }

        self.entries
            .write()
            .unwrap()
            .alloc(ShaderEntry { slot, def, factory });

        slot
    }

    /// Explicitly recompiles every shader mapped to `slot`.
    pub fn recompile(&mut self, slot: RenderPipelineId) {
        let entries = self.entries.read().unwrap();
        for (_, entry) in entries.iter().filter(|(_, entry)| entry.slot == slot) {
            match compile_file(
                &self.device,
                &self.shader_dir,
                &entry.def,
                &entry.factory,
                self.composer.clone(),
            ) {
                Ok(pipeline) => self.slots[slot].0 = Some(pipeline),
                Err(error) => {
                    log::error!("failed to recompile shader {}: {error:?}", entry.def.name);
                }
            }
        }
    }

    /// Starts watching the shader directory; changed files are recompiled on
    /// the watcher thread and delivered through `process_reloads`.
    pub fn watch(&mut self) -> anyhow::Result<()> {
        if self._debouncer.is_some() {
            return Ok(());
        }

        let device = self.device.clone();
        let entries = self.entries.clone();
        let composer = self.composer.clone();
        let sender = self.sender.clone();
        let shader_dir = self.shader_dir.clone();

        let mut debouncer = new_debouncer_opt(
            notify_debouncer_mini::Config::default().with_timeout(Duration::from_millis(100)),
            move |res: DebounceEventResult| match res {
                Ok(events) => {
                    for event in events {
                        if event.kind != DebouncedEventKind::Any {
                            continue;
                        }

                        let entries = entries.read().unwrap();
                        for (_, entry) in entries
                            .iter()
                            .filter(|(_, entry)| event.path.ends_with(entry.def.path))
                        {
                            match compile_file(
                                &device,
                                &shader_dir,
                                &entry.def,
                                &entry.factory,
                                composer.clone(),
                            ) {
                                Ok(pipeline) => {
                                    let _ = sender.send((entry.def.name, entry.slot, pipeline));
                                }
                                Err(error) => {
                                    log::error!(
                                        "failed to reload shader {}: {error:?}",
                                        entry.def.name
                                    );
                                }
                            }
                        }
                    }
                }
                Err(error) => log::error!("error debouncing shader changes: {error}"),
            },
        )?;

        let watch_dir = self
            .shader_dir
            .canonicalize()
            .context("shader directory does not exist")?;
        debouncer
            .watcher()
            .watch(&watch_dir, RecursiveMode::Recursive)?;
        self._debouncer = Some(debouncer);

        Ok(())
    }

    /// Installs pipelines the watcher finished since the last frame.
    pub fn process_reloads(&mut self) {
        while let Ok((name, slot, pipeline)) = self.receiver.try_recv() {
            log::info!("shader reloaded: {name}");
            self.slots[slot].0 = Some(pipeline);
        }
    }

    pub fn pipeline(&self, slot: RenderPipelineId) -> Option<&wgpu::RenderPipeline> {
        self.slots.get(slot).and_then(|slot| slot.0.as_ref())
    }
}

fn compile_file(
    device: &wgpu::Device,
    shader_dir: &Path,
    def: &ShaderDefinition,
    factory: &PipelineFactory,
    composer: Arc<RwLock<Composer>>,
) -> anyhow::Result<wgpu::RenderPipeline> {
    let path = shader_dir.join(def.path);
    let shader_code = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read shader file {}", path.display()))?;

    let file_path = path.to_string_lossy().to_string();

    let mut composer = composer.write().unwrap();

    let module = composer
        .make_naga_module(NagaModuleDescriptor {
            file_path: &file_path,
            source: &shader_code,
            shader_defs: def.shader_defs(),
            ..Default::default()
        })
        .context("failed to compose shader module")?;

    // wgpu runs the validator internally, so validation flags stay empty.
    let validation_flags = ValidationFlags::empty();
    let info = naga::valid::Validator::new(validation_flags, Capabilities::all())
        .validate(&module)
        .context("failed to validate composed module")?;

    let shader_code = naga::back::wgsl::write_string(&module, &info, WriterFlags::empty())
        .context("failed to write composed module back to WGSL")?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline = factory(device, &shader_code);

    device
        .poll(PollType::Wait)
        .context("failed to poll device after shader compilation")?;

    let error = block_on(device.pop_error_scope());

    if let Some(error) = error {
        return Err(anyhow::anyhow!(
            "shader compilation failed for {}: {}",
            def.name,
            error
        ));
    }

    pipeline
}

fn create_composer(shader_dir: &Path) -> anyhow::Result<Composer> {
    let mut composer = Composer::default();
    let shared_dir = shader_dir.join("shared");

    let Ok(shared_files) = std::fs::read_dir(&shared_dir) else {
        return Ok(composer);
    };

    for entry in shared_files {
        let path = entry?.path();

        if !path.is_file() || path.extension().is_none_or(|ext| ext != "wgsl") {
            continue;
        }

        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read shared module {}", path.display()))?;

        let file_path = path.to_string_lossy().to_string();

        composer
            .add_composable_module(ComposableModuleDescriptor {
                source: &source,
                file_path: &file_path,
                language: ShaderLanguage::Wgsl,
                ..Default::default()
            })
            .with_context(|| format!("failed to add shared shader module {file_path}"))?;
    }

    Ok(composer)
}
