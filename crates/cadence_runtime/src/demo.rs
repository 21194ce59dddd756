// demo.rs - Bouncing particle ring
//
// Particles move at constant velocity inside the NDC square and bounce off
// its edges. Each keeps a short trail whose color decays toward the
// background; a bounce flashes the trail and plays a sound.

use cadence_asset::ResourceHandle;
use cadence_audio::Sound;
use cadence_core::component_kinds;
use cadence_core::ecs::{ComponentRegistry, EcsError, Entity, EntityStore};
use cadence_core::math::{Color, Vec2};
use cadence_core::runloop::{LoopControl, Simulation};
use cadence_core::surface::{Drawable, Event, Surface};
use cadence_core::HashKey;
use cadence_metrics::{time_scope, SystemProfiler};
use cadence_services::{Action, InputBindings};
use std::f32::consts::PI;
use std::sync::Arc;

pub const DEFAULT_PARTICLES: usize = 100;

const BACKGROUND: Color = Color::rgb(0.1, 0.1, 0.1);
const PARTICLE_HALF_EXTENT: f32 = 0.02;
const TRAIL_LENGTH: usize = 6;
/// Fraction of the remaining distance to the background covered per tick.
const TRAIL_DECAY: f32 = 0.08;
const BOUNCE_FLASH: Color = Color::WHITE;

component_kinds! {
    pub enum Kind {
        Position = 0,
        Velocity = 1,
        Tint = 2,
        Trail = 3,
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tint(pub Color);

/// Recent positions, newest first, plus the trail's current color.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trail {
    pub points: Vec<Vec2>,
    pub color: Color,
}

impl Trail {
    fn record(&mut self, point: Vec2) {
        self.points.insert(0, point);
        self.points.truncate(TRAIL_LENGTH);
    }

    /// Position before the most recent update.
    fn previous(&self) -> Option<Vec2> {
        self.points.first().copied()
    }
}

pub fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry
        .register::<Position>(Kind::Position, Kind::Position.name())
        .register::<Velocity>(Kind::Velocity, Kind::Velocity.name())
        .register::<Tint>(Kind::Tint, Kind::Tint.name())
        .register::<Trail>(Kind::Trail, Kind::Trail.name());
    registry
}

pub struct ParticleDemo {
    store: EntityStore,
    bindings: InputBindings,
    particles: usize,
    bounce_sound: Option<ResourceHandle<Sound>>,
    pending_bounces: u32,
    toggle_vsync: bool,
    profiler: SystemProfiler,
}

impl ParticleDemo {
    pub fn new(
        registry: Arc<ComponentRegistry>,
        bindings: InputBindings,
        particles: usize,
        bounce_sound: Option<ResourceHandle<Sound>>,
    ) -> Result<Self, EcsError> {
        let mut demo = Self {
            store: EntityStore::new(registry),
            bindings,
            particles,
            bounce_sound,
            pending_bounces: 0,
            toggle_vsync: false,
            profiler: SystemProfiler::new(),
        };
        demo.spawn_ring()?;
        Ok(demo)
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn profiler(&self) -> &SystemProfiler {
        &self.profiler
    }

    /// Key over all particle positions, for comparing runs.
    pub fn positions_hash(&self) -> Result<HashKey, EcsError> {
        self.store.content_hash::<Position>()
    }

    /// True once after the vsync action fired.
    pub fn take_vsync_toggle(&mut self) -> bool {
        std::mem::take(&mut self.toggle_vsync)
    }

    pub fn reset(&mut self) -> Result<(), EcsError> {
        self.store.clear();
        self.pending_bounces = 0;
        self.spawn_ring()?;
        tracing::info!(particles = self.particles, "simulation reset");
        Ok(())
    }

    fn spawn_ring(&mut self) -> Result<(), EcsError> {
        let count = self.particles.max(1) as f32;
        for i in 0..self.particles {
            let t = i as f32 / count;
            let angle = t * 2.0 * PI;
            let radius = 0.5 + t * 0.3;
            let tint = Color::rgb(t, 1.0 - t, 0.5);

            let entity = self.store.create();
            self.store.attach(
                entity,
                Position {
                    x: angle.cos() * radius,
                    y: angle.sin() * radius,
                },
            )?;
            self.store.attach(
                entity,
                Velocity {
                    x: (angle + PI / 2.0).cos() * 0.2,
                    y: (angle + PI / 2.0).sin() * 0.2,
                },
            )?;
            self.store.attach(entity, Tint(tint))?;
            self.store.attach(
                entity,
                Trail {
                    points: Vec::with_capacity(TRAIL_LENGTH),
                    color: tint,
                },
            )?;
        }
        tracing::debug!(particles = self.particles, "particle ring spawned");
        Ok(())
    }

    fn step(&mut self, dt: f32) -> Result<(), EcsError> {
        self.store
            .join_mut::<Trail, Position, _>(|_, trail, position| {
                trail.record(position.to_vec2())
            })?;

        let mut bounced: Vec<(Entity, bool, bool)> = Vec::new();
        self.store
            .join_mut::<Position, Velocity, _>(|entity, position, velocity| {
                let mut x = position.x + velocity.x * dt;
                let mut y = position.y + velocity.y * dt;
                let bounce_x = !(-1.0..=1.0).contains(&x);
                let bounce_y = !(-1.0..=1.0).contains(&y);
                if bounce_x {
                    x = x.clamp(-1.0, 1.0);
                }
                if bounce_y {
                    y = y.clamp(-1.0, 1.0);
                }
                *position = Position { x, y };
                if bounce_x || bounce_y {
                    bounced.push((entity, bounce_x, bounce_y));
                }
            })?;

        for &(entity, bounce_x, bounce_y) in &bounced {
            if let Some(velocity) = self.store.get_mut::<Velocity>(entity)? {
                if bounce_x {
                    velocity.x = -velocity.x;
                }
                if bounce_y {
                    velocity.y = -velocity.y;
                }
            }
            if let Some(trail) = self.store.get_mut::<Trail>(entity)? {
                trail.color = BOUNCE_FLASH;
            }
        }
        self.pending_bounces += bounced.len() as u32;

        for (_, trail) in self.store.iter_mut::<Trail>()? {
            trail.color.decay(BACKGROUND, TRAIL_DECAY);
        }
        Ok(())
    }

    fn draw<S: Surface + ?Sized>(&self, surface: &mut S, alpha: f32) -> Result<(), EcsError> {
        surface.submit(Drawable::Clear(BACKGROUND));

        for (_, trail) in self.store.iter::<Trail>()? {
            let len = trail.points.len().max(1) as f32;
            for (age, point) in trail.points.iter().enumerate().skip(1) {
                let mut color = trail.color;
                color.decay(BACKGROUND, age as f32 / len);
                surface.submit(Drawable::Rect {
                    center: *point,
                    half_extent: Vec2::splat(PARTICLE_HALF_EXTENT * 0.5),
                    color,
                });
            }
        }

        for (entity, position) in self.store.iter::<Position>()? {
            let current = position.to_vec2();
            let previous = self
                .store
                .get::<Trail>(entity)?
                .and_then(Trail::previous)
                .unwrap_or(current);
            let color = self
                .store
                .get::<Tint>(entity)?
                .map_or(Color::WHITE, |tint| tint.0);
            surface.submit(Drawable::Rect {
                center: previous.lerp(current, alpha),
                half_extent: Vec2::splat(PARTICLE_HALF_EXTENT),
                color,
            });
        }
        Ok(())
    }
}

impl<S> Simulation<S> for ParticleDemo
where
    S: Surface<Sound = ResourceHandle<Sound>> + ?Sized,
{
    fn handle_event(&mut self, event: &Event, control: &mut LoopControl) {
        let Event::KeyPressed(key) = event else {
            return;
        };
        let Some(action) = self.bindings.action_for(*key) else {
            return;
        };
        tracing::debug!(%key, %action, "input action");
        match action {
            Action::Quit => control.request_stop(),
            Action::TogglePause => control.toggle_pause(),
            Action::Step => control.step(),
            Action::SpeedUp => control.set_time_scale(control.time_scale() * 2.0),
            Action::SlowDown => control.set_time_scale(control.time_scale() / 2.0),
            Action::ToggleVsync => self.toggle_vsync = true,
            Action::Reset => {
                if let Err(err) = self.reset() {
                    tracing::error!(error = %err, "reset failed");
                }
            }
        }
    }

    fn update(&mut self, dt: f64) {
        let mut profiler = std::mem::take(&mut self.profiler);
        let result = time_scope!(profiler, "update", { self.step(dt as f32) });
        self.profiler = profiler;
        if let Err(err) = result {
            tracing::error!(error = %err, "particle update failed");
        }
    }

    fn render(&mut self, surface: &mut S, alpha: f64) {
        let mut profiler = std::mem::take(&mut self.profiler);
        let result = time_scope!(profiler, "render", { self.draw(surface, alpha as f32) });
        self.profiler = profiler;
        if let Err(err) = result {
            tracing::error!(error = %err, "particle render failed");
        }

        if self.pending_bounces > 0 {
            if let Some(sound) = &self.bounce_sound {
                surface.play_sound(sound);
            }
            self.pending_bounces = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::runloop::SimulationLoop;
    use cadence_core::surface::{HeadlessSurface, Key};
    use cadence_core::time::FixedTimestep;
    use std::time::Duration;

    type TestSurface = HeadlessSurface<ResourceHandle<Sound>>;

    fn demo(particles: usize) -> ParticleDemo {
        ParticleDemo::new(
            Arc::new(registry()),
            InputBindings::default(),
            particles,
            None,
        )
        .unwrap()
    }

    fn run_ticks(demo: &mut ParticleDemo, ticks: u32) {
        for _ in 0..ticks {
            <ParticleDemo as Simulation<TestSurface>>::update(demo, 1.0 / 60.0);
        }
    }

    #[test]
    fn spawns_ring_with_all_components() {
        let demo = demo(12);
        assert_eq!(demo.store().len(), 12);
        let first = demo.store().entities().next().unwrap();
        assert_eq!(
            demo.store().component_names(first).unwrap(),
            ["Position", "Velocity", "Tint", "Trail"]
        );
    }

    #[test]
    fn identical_runs_hash_identically() {
        let mut a = demo(50);
        let mut b = demo(50);
        run_ticks(&mut a, 300);
        run_ticks(&mut b, 300);
        assert_eq!(a.positions_hash().unwrap(), b.positions_hash().unwrap());

        run_ticks(&mut b, 1);
        assert_ne!(a.positions_hash().unwrap(), b.positions_hash().unwrap());
    }

    #[test]
    fn particles_stay_inside_bounds() {
        let mut demo = demo(20);
        run_ticks(&mut demo, 2_000);
        for (_, p) in demo.store().iter::<Position>().unwrap() {
            assert!((-1.0..=1.0).contains(&p.x) && (-1.0..=1.0).contains(&p.y));
        }
    }

    #[test]
    fn renders_particles_and_trails() {
        let mut demo = demo(4);
        let mut surface = TestSurface::new();
        let mut sim_loop = SimulationLoop::new(FixedTimestep::from_duration(
            Duration::from_millis(10),
            5,
        ));
        sim_loop.start();

        sim_loop.frame(&mut surface, &mut demo, Duration::from_millis(35));
        let draws = surface.draws();
        assert_eq!(draws[0], Drawable::Clear(BACKGROUND));
        // 4 particles, each with 3 recorded points of which 2 are drawn as trail.
        assert_eq!(draws.len(), 1 + 4 * 2 + 4);
    }

    #[test]
    fn reset_key_respawns() {
        let mut demo = demo(8);
        run_ticks(&mut demo, 10);
        let moved = demo.positions_hash().unwrap();

        let mut surface = TestSurface::new();
        let mut sim_loop = SimulationLoop::new(FixedTimestep::default());
        sim_loop.start();
        surface.push_event(Event::KeyPressed(Key::Char('r')));
        surface.push_event(Event::KeyPressed(Key::Char('v')));
        sim_loop.frame(&mut surface, &mut demo, Duration::ZERO);

        let positions = |demo: &ParticleDemo| -> Vec<Position> {
            demo.store().iter::<Position>().unwrap().map(|(_, p)| *p).collect()
        };
        assert_eq!(demo.store().len(), 8);
        assert_ne!(demo.positions_hash().unwrap(), moved);
        assert_eq!(positions(&demo), positions(&self::demo(8)));
        assert!(demo.take_vsync_toggle());
        assert!(!demo.take_vsync_toggle());
    }

    #[test]
    fn bounce_plays_sound_once_per_frame() {
        let cache = cadence_asset::ResourceCache::new();
        let sound = cache
            .acquire(HashKey::of_str("bounce"), || {
                Ok::<_, std::convert::Infallible>(Sound::silence(8000))
            })
            .unwrap();
        let registry = Arc::new(registry());
        let mut demo =
            ParticleDemo::new(registry, InputBindings::default(), 0, Some(sound)).unwrap();

        // One particle heading straight into the right wall.
        let entity = demo.store.create();
        demo.store.attach(entity, Position { x: 0.99, y: 0.0 }).unwrap();
        demo.store.attach(entity, Velocity { x: 1.0, y: 0.0 }).unwrap();

        let mut surface = TestSurface::new();
        let mut sim_loop = SimulationLoop::new(FixedTimestep::from_duration(
            Duration::from_millis(100),
            5,
        ));
        sim_loop.start();
        sim_loop.frame(&mut surface, &mut demo, Duration::from_millis(100));

        assert_eq!(surface.sounds_played().len(), 1);
        let velocity = demo.store.get::<Velocity>(entity).unwrap().unwrap();
        assert_eq!(velocity.x, -1.0);
    }
}
