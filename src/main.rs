//! Headless demo: a planet and its moon orbiting a sun
//!
//! The scene is loaded from a JSON descriptor, driven for a few seconds of
//! simulated time at a fixed 60 Hz step, and the recorded draw calls are
//! summarized at the end. Set `RUST_LOG=debug` to follow the lifecycle.

use grove::core::descriptor::from_json_str;
use grove::prelude::*;
use serde::{Deserialize, Serialize};

const FRAME_MS: f64 = 1000.0 / 60.0;
const FRAMES: u32 = 180;

const SCENE: &str = r##"{
    "systems": [
        { "type": "InputManager" },
        { "type": "ComponentManager" },
        { "type": "Renderer", "width": 320, "height": 240 }
    ],
    "root": {
        "entities": [{
            "id": "sun",
            "components": [
                { "type": "Transform", "position": [160, 120] },
                { "type": "Shape", "fill": "#ffcc33", "path": "m -8 -8 l 8 -8 l 8 8 l -8 8" }
            ],
            "entities": [
                { "prefab": { "type": "OriginGraph", "size": 30 } },
                {
                    "id": "planet",
                    "components": [
                        { "type": "Transform" },
                        { "type": "Orbiter", "distance": 80, "speed": 0.5 },
                        { "type": "Shape", "fill": "#3366ff", "path": "m -4 -4 l 4 -4 l 4 4 l -4 4" }
                    ],
                    "entities": [{
                        "id": "moon",
                        "components": [
                            { "type": "Transform" },
                            { "type": "Orbiter", "distance": 15, "speed": 2 },
                            { "type": "Shape", "fill": "#cccccc", "path": "m -1 -1 l 1 -1 l 1 1 l -1 1" }
                        ]
                    }]
                }
            ]
        }]
    }
}"##;

/// Moves its entity along a circle around the parent's origin.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Orbiter {
    /// Radius in canvas units
    distance: f32,
    /// Revolutions per second
    speed: f32,
    #[serde(skip)]
    angle: f32,
    #[serde(skip)]
    transform: Option<ComponentRef<Transform>>,
}

impl Component for Orbiter {
    fn dependencies(deps: &mut Dependencies<Self>) {
        deps.sibling::<Transform>("transform", |orbiter, transform| {
            orbiter.transform = transform;
        });
    }

    fn init(&mut self, ctx: &ComponentContext) -> grove::core::Result<()> {
        log::debug!("`{}` orbits at distance {}", ctx.entity().id(), self.distance);
        self.angle = 0.0;
        Ok(())
    }

    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }
}

impl Updatable for Orbiter {
    fn update(&mut self, _ctx: &ComponentContext, delta: f64) -> grove::core::Result<()> {
        let Some(transform) = &self.transform else {
            return Ok(());
        };
        self.angle += self.speed * std::f32::consts::TAU * (delta / 1000.0) as f32;
        let mut transform = transform.try_borrow_mut()?;
        transform.position = Vec2::from_angle(self.angle) * self.distance;
        transform.rotation = self.angle.to_degrees();
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut registry = Registry::with_defaults();
    registry.register_component::<Orbiter>()?;

    let descriptor: ApplicationDescriptor = from_json_str(SCENE)?;
    let app = Application::from_descriptor(&registry, &descriptor, ApplicationConfig::default())?;
    app.start()?;

    for frame in 1..=FRAMES {
        app.tick(f64::from(frame) * FRAME_MS)?;
    }

    if let Some(moon) = app.root().and_then(|root| root.find_entity("sun/planet/moon")) {
        let transform = moon.require_component::<Transform>()?;
        let global = transform.global_transform();
        log::info!(
            "moon at ({:.1}, {:.1}) after {} frames",
            global.position.x,
            global.position.y,
            FRAMES
        );
    }

    let renderer = app.require_system::<Renderer>()?;
    if let Some(buffer) = renderer.borrow().canvas().as_command_buffer() {
        log::info!(
            "{} draw calls in the last of {} frames",
            buffer.commands().len(),
            buffer.frames()
        );
    }
    log::info!("{}", app.frame_stats().format_stats());

    app.stop();
    Ok(())
}
