use anyhow::Result;
use glam::Vec2;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use strata_engine::batch::{Batch, BatchConfig, Mesh, MeshBatch, RenderBatch};
use strata_engine::core::{App, AppControl, FrameCtx};
use strata_engine::device::GpuInit;
use strata_engine::gfx::{Backend, Context, FrameBuffer, Texture, TextureRegion, WgpuBackend};
use strata_engine::logging::{init_logging, LoggingConfig};
use strata_engine::math::{OrthographicCamera, Transform};
use strata_engine::paint::Color;
use strata_engine::window::{Runtime, RuntimeConfig};

const CHECKER_SIZE: u32 = 8;
const PANEL_SIZE: u32 = 256;

/// Device resources, created on the first frame once a context exists.
struct Scene {
    batch: RenderBatch,
    meshes: MeshBatch,
    checker: Texture,
    hexagon: Mesh,
    /// Offscreen target the hexagons are drawn into.
    panel: FrameBuffer,
}

impl Scene {
    fn new<B: Backend>(gfx: &mut Context<B>) -> Result<Self> {
        let batch = RenderBatch::new(gfx, BatchConfig::default())?;
        let meshes = MeshBatch::new(gfx)?;
        let checker = Texture::from_rgba8(gfx, CHECKER_SIZE, CHECKER_SIZE, &checker_pixels())?;
        let panel = FrameBuffer::new(gfx, PANEL_SIZE, PANEL_SIZE)?;
        Ok(Self { batch, meshes, checker, hexagon: hexagon(), panel })
    }

    fn draw<B: Backend>(&mut self, gfx: &mut Context<B>, camera: &OrthographicCamera, t: f32) -> Result<()> {
        let panel_camera = OrthographicCamera::screen(1200.0, 1200.0);

        self.panel.clear(gfx, Color::rgb(0.15, 0.15, 0.2))?;
        let meshes = &mut self.meshes;
        meshes.set_projection_matrix(panel_camera.projection());
        meshes.set_view_matrix(panel_camera.view());
        meshes.begin()?;
        for i in 0..5 {
            self.hexagon.transform = Transform::from_translation(Vec2::new(-480.0 + i as f32 * 240.0, 0.0))
                .with_scale(Vec2::splat(60.0 + 20.0 * (t + i as f32).sin()))
                .with_rotation(t * 0.5 * (i + 1) as f32);
            meshes.mesh(&self.hexagon)?;
        }
        meshes.end(gfx)?;
        self.panel.unbind(gfx);

        let batch = &mut self.batch;
        batch.set_projection_matrix(camera.projection());
        batch.set_view_matrix(camera.view());

        batch.begin()?;

        batch.set_color(Color::rgb(0.25, 0.25, 0.3));
        for i in -10..=10 {
            let x = i as f32 * 40.0;
            batch.line(Vec2::new(x, -400.0), Vec2::new(x, 400.0))?;
            batch.line(Vec2::new(-400.0, x), Vec2::new(400.0, x))?;
        }

        batch.set_color(Color::WHITE);
        batch.texture_sized(&self.checker, -360.0, 40.0, 160.0, 160.0)?;
        let quarter = TextureRegion::from_pixels(&self.checker, 0, 0, 4, 4);
        batch.texture_region(&quarter, -180.0, 40.0, 160.0, 160.0)?;

        // Overlaps the textured quads; drawn later, so it stays in front.
        batch.set_color(Color::new(0.9, 0.3, 0.2, 0.8));
        batch.quad_rect(-280.0, 0.0, 200.0, 100.0)?;

        let spin = Transform::from_translation(Vec2::new(200.0, 120.0))
            .with_scale(Vec2::splat(90.0))
            .with_rotation(t);
        let corners = [Vec2::new(0.0, 1.0), Vec2::new(-0.87, -0.5), Vec2::new(0.87, -0.5)];
        let [a, b, c] = corners.map(|p| spin.apply(p));
        batch.set_color(Color::YELLOW);
        batch.textured_triangle(&TextureRegion::full(&self.checker), a, b, c)?;

        batch.set_color(Color::WHITE);
        batch.texture_sized(self.panel.texture(), 40.0, -360.0, 320.0, 320.0)?;

        let stats = batch.end(gfx)?;
        log::trace!("render batch: {stats:?}");

        Ok(())
    }

    fn dispose<B: Backend>(self, gfx: &mut Context<B>) {
        self.batch.dispose(gfx);
        self.meshes.dispose(gfx);
        self.checker.dispose(gfx);
        self.panel.dispose(gfx);
    }
}

#[derive(Default)]
struct Demo {
    scene: Option<Scene>,
    camera: OrthographicCamera,
}

impl App for Demo {
    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                AppControl::Exit
            }
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let (width, height) = ctx.window.physical_size();
        self.camera.set_viewport(width, height);
        let t = ctx.time.elapsed;

        let (scene, camera) = (&mut self.scene, &self.camera);
        let result = ctx.render(Color::rgb(0.08, 0.08, 0.1), |gfx| {
            let ready = match scene.take() {
                Some(ready) => ready,
                None => Scene::new(gfx)?,
            };
            scene.insert(ready).draw(gfx, camera, t)
        });

        match result {
            Ok(()) => AppControl::Continue,
            Err(err) => {
                log::error!("frame failed: {err:#}");
                AppControl::Exit
            }
        }
    }

    fn on_window_closing(&mut self, _window_id: WindowId, gfx: &mut Context<WgpuBackend>) {
        if let Some(scene) = self.scene.take() {
            scene.dispose(gfx);
        }
    }
}

fn checker_pixels() -> Vec<u8> {
    (0..CHECKER_SIZE * CHECKER_SIZE)
        .flat_map(|i| {
            let (x, y) = (i % CHECKER_SIZE, i / CHECKER_SIZE);
            if (x + y) % 2 == 0 { [240, 240, 240, 255] } else { [40, 120, 200, 255] }
        })
        .collect()
}

/// Unit hexagon as a triangle fan: `[x, y, r, g, b, a]` per vertex.
fn hexagon() -> Mesh {
    let mut vertices = vec![0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
    for i in 0..6 {
        let angle = i as f32 * std::f32::consts::TAU / 6.0;
        let hue = i as f32 / 6.0;
        vertices.extend_from_slice(&[angle.cos(), angle.sin(), hue, 0.4, 1.0 - hue, 1.0]);
    }
    let indices = (0..6u32).flat_map(|i| [0, 1 + i, 1 + (i + 1) % 6]).collect();
    Mesh::indexed(vertices, indices)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "strata demo".to_string(),
        ..RuntimeConfig::default()
    };
    Runtime::run(config, GpuInit::default(), Demo::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_engine::gfx::HeadlessBackend;

    #[test]
    fn scene_frame_then_dispose_leaves_nothing_alive() {
        let mut gfx = Context::new(HeadlessBackend::new());
        let mut scene = Scene::new(&mut gfx).unwrap();
        let camera = OrthographicCamera::screen(800.0, 600.0);

        scene.draw(&mut gfx, &camera, 0.5).unwrap();
        // One mesh draw into the panel, then lines, quads and triangles.
        let draws = gfx.backend().draws();
        assert_eq!(draws.len(), 4);
        assert_eq!(draws[0].framebuffer, Some(scene.panel.id()));
        assert!(draws[1..].iter().all(|d| d.framebuffer.is_none()));

        scene.dispose(&mut gfx);
        let backend = gfx.backend();
        assert_eq!(backend.live_buffers(), 0);
        assert_eq!(backend.live_vertex_arrays(), 0);
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_programs(), 0);
        assert!(gfx.check_error().is_ok());
    }
}
