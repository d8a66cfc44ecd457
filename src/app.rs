// src/app.rs

use std::sync::Arc;

use winit::{
    event::{DeviceEvent, WindowEvent},
    window::{CursorGrabMode, Window},
};

use crate::ui::{build_ui, StatusInfo};
use worldgate::config::PortalConfig;
use worldgate::demo_scene::AsyncWorldLoader;
use worldgate::engine_lib::agent::Agent;
use worldgate::engine_lib::anchor::WorldId;
use worldgate::engine_lib::camera::Camera;
use worldgate::engine_lib::controller::PlayerController;
use worldgate::engine_lib::player::PlayerBody;
use worldgate::engine_lib::portal_system::PortalSystem;
use worldgate::engine_lib::trigger::TriggerOutcome;
use worldgate::engine_lib::world::World;
use worldgate::engine_lib::world_switch::{LoadMode, PersistentArena, WorldLoaded, WorldLoader, WorldSwitchCoordinator};
use worldgate::rendering_lib::gpu_targets::GpuTargets;
use worldgate::rendering_lib::render_target::RenderTargetDescriptor;
use worldgate::rendering_lib::renderer::{PassTarget, Renderer, SurfaceDraw};

const MAIN_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const SKY_COLOR: wgpu::Color = wgpu::Color { r: 0.05, g: 0.05, b: 0.1, a: 1.0 };
const GATE_COLOR: [f32; 4] = [0.6, 0.2, 0.9, 1.0];

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Main Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: MAIN_DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Active world with the geometry of every additively loaded world merged in.
struct LoadedScene {
    world: World,
    parallel: Vec<WorldId>,
}

pub struct PortalApp {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    depth_view: wgpu::TextureView,
    renderer: Renderer,
    targets: GpuTargets,
    portals: PortalSystem,
    arena: PersistentArena,
    loader: AsyncWorldLoader,
    scene: Option<LoadedScene>,
    player: Option<PlayerBody>,
    camera: Camera,
    controller: PlayerController,
    last_trigger: TriggerOutcome,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    is_focused: bool,
}

impl PortalApp {
    pub async fn new(window: Arc<Window>, portal_config: PortalConfig) -> Self {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone()).expect("Couldn't create surface");
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("No suitable GPU adapter");
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: None,
                },
                None,
            )
            .await
            .expect("Couldn't open GPU device");
        let device = Arc::new(device);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps.formats.iter().copied()
            .find(|f| f.is_srgb()).unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, config.width, config.height);

        let targets = GpuTargets::new(device.clone());
        let renderer = Renderer::new(&device, targets.sample_layout());

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(), egui::ViewportId::ROOT, &window,
            Some(window.scale_factor() as f32),
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        // Rigs without a configured target render at screen size.
        let mut rig_config = portal_config.rig.clone();
        rig_config
            .target
            .get_or_insert_with(|| RenderTargetDescriptor::for_screen(config.width, config.height));
        let portals = PortalSystem::new(portal_config.trigger.clone(), rig_config, portal_config.spawner.clone());

        let mut loader = AsyncWorldLoader::new(
            tokio::runtime::Handle::current(),
            portal_config.trigger.clone(),
            portal_config.spawner.world_offset,
        );
        loader.load_world(portal_config.coordinator.startup_world, LoadMode::Single);
        let mut arena = PersistentArena::new();
        arena.adopt(WorldSwitchCoordinator::init(portal_config.coordinator.clone(), &mut loader));

        let camera = Camera::new(75.0, 0.1, 200.0);

        let initial_focus = window.has_focus();
        let mut initial_grab = false;
        if initial_focus {
            if window.set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_e| window.set_cursor_grab(CursorGrabMode::Locked))
                .is_ok() {
                window.set_cursor_visible(false);
                initial_grab = true;
            } else {
                log::warn!("Could not grab cursor on init.");
            }
        }
        let controller = PlayerController::new(initial_grab, 0.002);

        Self {
            surface, device, queue, config, size, depth_view,
            renderer, targets, portals, arena, loader,
            scene: None,
            player: None,
            camera, controller,
            last_trigger: TriggerOutcome::Outside,
            egui_ctx, egui_state, egui_renderer,
            is_focused: initial_focus,
        }
    }

    pub fn get_size(&self) -> winit::dpi::PhysicalSize<u32> { self.size }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, new_size.width, new_size.height);
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.is_focused = focused;
    }

    /// Releases every rig target and stops the coordinator.
    pub fn shutdown(&mut self) {
        self.portals.clear(&mut self.targets);
        self.arena.shutdown();
    }

    fn enter_world(&mut self, world: World) {
        if let Err(err) = self.portals.install_world(&world, &mut self.targets) {
            log::warn!("Portals of world '{}' not installed: {}", world.name, err);
        }
        // The previous world's agent is gone; the new one pulls its pose from the coordinator.
        self.player = Some(PlayerBody::spawn(world.spawn));
        self.scene = Some(LoadedScene { world, parallel: Vec::new() });
    }

    fn on_world_loaded(&mut self, loaded: WorldLoaded) {
        let Some(world) = self.loader.take_world(loaded.world) else {
            log::warn!("World {} reported loaded but nothing was built", loaded.world);
            return;
        };
        match loaded.mode {
            LoadMode::Single => self.enter_world(world),
            LoadMode::Additive => match self.scene.as_mut() {
                Some(scene) => {
                    scene.world.merge_geometry(&world);
                    scene.parallel.push(loaded.world);
                }
                None => log::warn!("Additive world {} arrived before an active world", loaded.world),
            },
        }

        let Some(coordinator) = self.arena.coordinator_mut() else {
            return;
        };
        coordinator.on_world_loaded(loaded, &mut self.loader);
        if loaded.mode == LoadMode::Single {
            if let Some(player) = self.player.as_mut() {
                coordinator.apply_saved_pose(player);
            }
            coordinator.sync_viewer_mask(&mut self.camera);
        }
    }

    pub fn update(&mut self, dt: f32) {
        while let Some(loaded) = self.loader.poll_loaded() {
            self.on_world_loaded(loaded);
        }

        let (Some(scene), Some(player)) = (self.scene.as_ref(), self.player.as_mut()) else {
            return;
        };

        // 1. Locomotion.
        self.controller.apply_to_player(player, dt, &scene.world);
        if self.controller.take_spawn_request() {
            if let Err(err) = self.portals.spawn_pair(&player.pose(), &mut self.targets) {
                log::warn!("Portal pair not spawned: {}", err);
            }
        }

        // 2. Traversal.
        let outcome = self.portals.run_triggers(&mut *player, self.arena.coordinator_mut(), &mut self.loader);
        if outcome != TriggerOutcome::Outside {
            self.last_trigger = outcome;
        }

        // Viewer pose is final from here on.
        self.camera.pose = player.eye_pose();
    }

    fn status(&self) -> StatusInfo {
        let coordinator = self.arena.coordinator();
        StatusInfo {
            current_world: coordinator.map(|c| c.current_world()),
            pending_load: coordinator.and_then(|c| c.pending_load()),
            saved_pose: coordinator.and_then(|c| c.state().last_saved_pose),
            parallel_worlds: self.scene.as_ref().map(|s| s.parallel.clone()).unwrap_or_default(),
            active_pair: self.portals.spawner().active_pair(),
            live_targets: self.targets.live_count(),
            last_trigger: self.last_trigger,
            grounded: self.player.as_ref().is_some_and(|p| p.is_grounded()),
        }
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let output_texture = self.surface.get_current_texture()?;
        let view = output_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Main Command Encoder"),
        });

        // 3. Rig cameras follow the finalized viewer.
        let rig_renders = self.portals.sync_rigs(Some(&self.camera));

        let quads = self.scene.as_ref().map(|s| s.world.quads.as_slice()).unwrap_or_default();
        for render in &rig_renders {
            let Some(target) = self.targets.get(render.target) else {
                continue;
            };
            if render.first_frame {
                log::debug!("First frame for rig on {}", render.anchor);
            }
            let pass = PassTarget {
                label: "Portal Rig Pass",
                color: &target.color_view,
                color_format: target.descriptor.format.to_wgpu(),
                depth: target.depth_view().zip(target.descriptor.depth_format()),
                width: target.descriptor.width,
                height: target.descriptor.height,
            };
            self.renderer.render_pass(&self.device, &mut encoder, &pass, &render.camera, quads, &[], SKY_COLOR);
        }

        // 4. Viewer pass with the portal surfaces.
        let surfaces = self.portals.surfaces();
        let draws: Vec<SurfaceDraw> = surfaces
            .iter()
            .map(|surface| SurfaceDraw {
                corners: surface.corners,
                texture: surface
                    .target
                    .and_then(|handle| self.targets.get(handle))
                    .map(|target| &target.sample_bind_group),
                screen_mapped: surface.screen_mapped,
                fallback_color: GATE_COLOR,
            })
            .collect();
        let main_pass = PassTarget {
            label: "Scene Render Pass",
            color: &view,
            color_format: self.config.format,
            depth: Some((&self.depth_view, MAIN_DEPTH_FORMAT)),
            width: self.config.width,
            height: self.config.height,
        };
        self.renderer.render_pass(&self.device, &mut encoder, &main_pass, &self.camera, quads, &draws, SKY_COLOR);

        let status = self.status();
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| { build_ui(ctx, &status); });
        self.egui_state.handle_platform_output(window, full_output.platform_output);
        let tris = self.egui_ctx.tessellate(full_output.shapes, self.egui_ctx.pixels_per_point());
        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };
        self.egui_renderer.update_buffers(&self.device, &self.queue, &mut encoder, &tris, &screen_descriptor);
        {
            let mut gui_render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("GUI Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view, resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None, occlusion_query_set: None, timestamp_writes: None,
            });
            self.egui_renderer.render(&mut gui_render_pass, &tris, &screen_descriptor);
        }
        for tex_id in &full_output.textures_delta.free { self.egui_renderer.free_texture(tex_id); }

        self.queue.submit(std::iter::once(encoder.finish()));
        output_texture.present();
        Ok(())
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        if self.egui_state.on_window_event(window, event).consumed { return true; }
        if self.controller.handle_window_event(event, window) { return true; }
        match event {
            WindowEvent::Focused(focused) => { self.is_focused = *focused; false }
            _ => false,
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent, _window: &Window) {
        self.controller.handle_device_event(event);
    }
}
