// spatial.rs - Positional sound sources

//! Positional sound sources.
//!
//! A `SpatialSoundSource` wraps a `SoundSource` and recomputes its
//! attenuation and panning once per simulation tick from the device's
//! listeners. Distance attenuation follows a power curve between the near
//! and far distance. An optional cone around the emitter's forward axis
//! (+Z) attenuates listeners behind the emitter with the same curve.

use std::ops::Deref;
use std::sync::Arc;

use glam::{Quat, Vec3};
use parking_lot::Mutex;

use crate::sound::mixer::mix::AudioDevice;
use crate::sound::mixer::source::{SoundFinished, SoundSource};

pub const DEFAULT_NEAR_DISTANCE: f32 = 0.0;
pub const DEFAULT_FAR_DISTANCE: f32 = 100.0;
pub const DEFAULT_ROLLOFF: f32 = 2.0;
pub const MIN_ROLLOFF: f32 = 0.1;
/// Full circle; an inner angle of 360 disables the cone
pub const DEFAULT_ANGLE: f32 = 360.0;

/// Identifier of the scene an emitter or listener belongs to
pub type SceneId = u32;

/// World position and orientation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Transform { position, rotation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Transform {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// `point` in this transform's local space, ignoring scale
    fn relative(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }
}

/// A point of hearing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundListener {
    pub transform: Transform,
    /// `None` hears every scene
    pub scene: Option<SceneId>,
    pub enabled: bool,
}

impl SoundListener {
    pub fn new(transform: Transform) -> Self {
        SoundListener {
            transform,
            scene: None,
            enabled: true,
        }
    }

    pub fn in_scene(mut self, scene: SceneId) -> Self {
        self.scene = Some(scene);
        self
    }

    fn hears(&self, scene: Option<SceneId>) -> bool {
        self.enabled && (self.scene.is_none() || self.scene == scene)
    }
}

impl Default for SoundListener {
    fn default() -> Self {
        SoundListener::new(Transform::default())
    }
}

#[derive(Debug, Clone, Copy)]
struct Emitter {
    near_distance: f32,
    far_distance: f32,
    rolloff_factor: f32,
    inner_angle: f32,
    outer_angle: f32,
    transform: Option<Transform>,
    scene: Option<SceneId>,
}

impl Default for Emitter {
    fn default() -> Self {
        Emitter {
            near_distance: DEFAULT_NEAR_DISTANCE,
            far_distance: DEFAULT_FAR_DISTANCE,
            rolloff_factor: DEFAULT_ROLLOFF,
            inner_angle: DEFAULT_ANGLE,
            outer_angle: DEFAULT_ANGLE,
            transform: None,
            scene: None,
        }
    }
}

/// `1 - (value - start) / interval` clamped to the interval, raised to `rolloff`
fn rolloff_curve(value: f32, start: f32, interval: f32, rolloff: f32) -> f32 {
    (1.0 - (value - start).clamp(0.0, interval) / interval).powf(rolloff)
}

impl Emitter {
    fn distance_attenuation(&self, distance: f32) -> f32 {
        let interval = self.far_distance - self.near_distance;
        if interval > 0.0 {
            rolloff_curve(distance, self.near_distance, interval, self.rolloff_factor)
        } else if distance <= self.near_distance {
            1.0
        } else {
            0.0
        }
    }

    fn has_cone(&self) -> bool {
        self.inner_angle < DEFAULT_ANGLE && self.outer_angle > 0.0
    }

    /// Cone attenuation for a listener at `listener_position`
    fn angle_attenuation(&self, transform: &Transform, listener_position: Vec3) -> f32 {
        let direction = transform.relative(listener_position).normalize_or_zero();
        let dot = Vec3::Z.dot(direction).clamp(-1.0, 1.0);
        let angle = dot.acos().to_degrees() * 2.0;
        let interval = (self.outer_angle - self.inner_angle).max(0.0);

        if interval > 0.0 {
            if angle > self.inner_angle {
                rolloff_curve(angle, self.inner_angle, interval, self.rolloff_factor)
            } else {
                1.0
            }
        } else if angle <= self.inner_angle {
            1.0
        } else {
            0.0
        }
    }

    /// Attenuation and panning heard by `listeners`. Panning is `None`
    /// without a transform.
    fn calculate(&self, listeners: &[SoundListener]) -> (f32, Option<f32>) {
        let Some(transform) = self.transform else {
            return (0.0, None);
        };

        let mut attenuation = 0.0f32;
        let mut weighted_pan = 0.0f32;
        let mut total_weight = 0.0f32;

        for listener in listeners.iter().filter(|l| l.hears(self.scene)) {
            let listener_position = listener.transform.position;
            let relative = listener.transform.relative(transform.position);
            let mut heard = self.distance_attenuation(relative.length());

            weighted_pan += relative.normalize_or_zero().x * heard;
            total_weight += heard;

            if self.has_cone() {
                heard *= self.angle_attenuation(&transform, listener_position);
            }

            attenuation = attenuation.max(heard);
        }

        let panning = if total_weight > 0.0 {
            weighted_pan / total_weight
        } else {
            0.0
        };

        (attenuation, Some(panning))
    }
}

/// A sound source attenuated and panned by its position relative to the
/// device's listeners
pub struct SpatialSoundSource {
    source: Arc<SoundSource>,
    emitter: Mutex<Emitter>,
}

impl SpatialSoundSource {
    /// Create a positional source. It stays silent until the first
    /// `calculate_attenuation`.
    pub fn new(device: &Arc<AudioDevice>) -> Self {
        SpatialSoundSource {
            source: SoundSource::with_attenuation(device, 0.0),
            emitter: Mutex::new(Emitter::default()),
        }
    }

    pub fn source(&self) -> &Arc<SoundSource> {
        &self.source
    }

    fn set(&self, f: impl FnOnce(&mut Emitter)) {
        f(&mut self.emitter.lock());
        self.source.mark_network_update();
    }

    pub fn set_distance_attenuation(&self, near: f32, far: f32, rolloff: f32) {
        self.set(|e| {
            e.near_distance = near.max(0.0);
            e.far_distance = far.max(0.0);
            e.rolloff_factor = rolloff.max(MIN_ROLLOFF);
        });
    }

    pub fn set_angle_attenuation(&self, inner: f32, outer: f32) {
        self.set(|e| {
            e.inner_angle = inner.clamp(0.0, DEFAULT_ANGLE);
            e.outer_angle = outer.clamp(0.0, DEFAULT_ANGLE);
        });
    }

    pub fn set_near_distance(&self, distance: f32) {
        self.set(|e| e.near_distance = distance.max(0.0));
    }

    pub fn set_far_distance(&self, distance: f32) {
        self.set(|e| e.far_distance = distance.max(0.0));
    }

    pub fn set_inner_angle(&self, angle: f32) {
        self.set(|e| e.inner_angle = angle.clamp(0.0, DEFAULT_ANGLE));
    }

    pub fn set_outer_angle(&self, angle: f32) {
        self.set(|e| e.outer_angle = angle.clamp(0.0, DEFAULT_ANGLE));
    }

    pub fn set_rolloff_factor(&self, factor: f32) {
        self.set(|e| e.rolloff_factor = factor.max(MIN_ROLLOFF));
    }

    /// Place the emitter. `None` silences it on the next calculation.
    pub fn set_transform(&self, transform: Option<Transform>) {
        self.emitter.lock().transform = transform;
    }

    pub fn set_scene(&self, scene: Option<SceneId>) {
        self.emitter.lock().scene = scene;
    }

    pub fn near_distance(&self) -> f32 {
        self.emitter.lock().near_distance
    }

    pub fn far_distance(&self) -> f32 {
        self.emitter.lock().far_distance
    }

    pub fn rolloff_factor(&self) -> f32 {
        self.emitter.lock().rolloff_factor
    }

    pub fn inner_angle(&self) -> f32 {
        self.emitter.lock().inner_angle
    }

    pub fn outer_angle(&self) -> f32 {
        self.emitter.lock().outer_angle
    }

    pub fn transform(&self) -> Option<Transform> {
        self.emitter.lock().transform
    }

    /// Recompute attenuation and panning from the device's listeners
    pub fn calculate_attenuation(&self) {
        let emitter = *self.emitter.lock();
        let listeners = self.source.device().listeners();
        let (attenuation, panning) = emitter.calculate(&listeners);
        self.source.store_spatial(attenuation, panning);
    }

    /// Per-tick update: spatial calculation, then the source update
    pub fn update(&self, time_step: f32) -> Option<SoundFinished> {
        self.calculate_attenuation();
        self.source.update(time_step)
    }
}

impl Deref for SpatialSoundSource {
    type Target = SoundSource;

    fn deref(&self) -> &SoundSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioOptions;
    use rstest::rstest;
    use std::f32::consts::FRAC_PI_2;

    fn spatial_at(position: Vec3) -> (Arc<AudioDevice>, SpatialSoundSource) {
        let device = AudioDevice::new(AudioOptions::headless());
        let source = SpatialSoundSource::new(&device);
        source.set_transform(Some(Transform::from_position(position)));
        (device, source)
    }

    fn listener_at(position: Vec3) -> SoundListener {
        SoundListener::new(Transform::from_position(position))
    }

    #[test]
    fn test_defaults() {
        let device = AudioDevice::new(AudioOptions::headless());
        let source = SpatialSoundSource::new(&device);
        assert_eq!(source.near_distance(), 0.0);
        assert_eq!(source.far_distance(), 100.0);
        assert_eq!(source.rolloff_factor(), 2.0);
        assert_eq!(source.inner_angle(), 360.0);
        assert_eq!(source.outer_angle(), 360.0);
        assert_eq!(source.attenuation(), 0.0);
        assert!(source.transform().is_none());
    }

    #[test]
    fn test_setter_clamps() {
        let device = AudioDevice::new(AudioOptions::headless());
        let source = SpatialSoundSource::new(&device);
        source.take_network_update();

        source.set_distance_attenuation(-1.0, -2.0, 0.0);
        assert_eq!(source.near_distance(), 0.0);
        assert_eq!(source.far_distance(), 0.0);
        assert_eq!(source.rolloff_factor(), MIN_ROLLOFF);
        assert!(source.take_network_update());

        source.set_angle_attenuation(-10.0, 500.0);
        assert_eq!(source.inner_angle(), 0.0);
        assert_eq!(source.outer_angle(), 360.0);
        assert!(source.take_network_update());

        source.set_rolloff_factor(-3.0);
        assert_eq!(source.rolloff_factor(), MIN_ROLLOFF);
    }

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(50.0, 0.25)]
    #[case(100.0, 0.0)]
    #[case(250.0, 0.0)]
    fn test_distance_curve(#[case] distance: f32, #[case] expected: f32) {
        let (device, source) = spatial_at(Vec3::new(0.0, 0.0, distance));
        device.add_listener(listener_at(Vec3::ZERO));
        source.calculate_attenuation();
        assert!((source.attenuation() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_zero_interval_is_binary() {
        let (device, source) = spatial_at(Vec3::new(0.0, 0.0, 5.0));
        source.set_distance_attenuation(5.0, 5.0, 1.0);
        device.add_listener(listener_at(Vec3::ZERO));
        source.calculate_attenuation();
        assert_eq!(source.attenuation(), 1.0);

        source.set_transform(Some(Transform::from_position(Vec3::new(0.0, 0.0, 5.5))));
        source.calculate_attenuation();
        assert_eq!(source.attenuation(), 0.0);
    }

    #[test]
    fn test_no_transform_is_silent_and_keeps_panning() {
        let device = AudioDevice::new(AudioOptions::headless());
        let source = SpatialSoundSource::new(&device);
        device.add_listener(listener_at(Vec3::ZERO));
        source.store_spatial(1.0, Some(0.5));

        source.calculate_attenuation();
        assert_eq!(source.attenuation(), 0.0);
        assert_eq!(source.panning(), 0.5);
    }

    #[test]
    fn test_panning_follows_listener_side() {
        let (device, source) = spatial_at(Vec3::new(10.0, 0.0, 0.0));
        device.add_listener(listener_at(Vec3::ZERO));
        source.calculate_attenuation();
        assert!((source.panning() - 1.0).abs() < 1e-6);

        // A listener turned around hears it on the other side
        device.set_listeners(vec![SoundListener::new(Transform::new(
            Vec3::ZERO,
            Quat::from_rotation_y(std::f32::consts::PI),
        ))]);
        source.calculate_attenuation();
        assert!((source.panning() + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_loudest_listener_wins() {
        let (device, source) = spatial_at(Vec3::ZERO);
        device.add_listener(listener_at(Vec3::new(0.0, 0.0, 50.0)));
        device.add_listener(listener_at(Vec3::new(0.0, 0.0, 90.0)));
        source.calculate_attenuation();
        assert!((source.attenuation() - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_scene_filter() {
        let (device, source) = spatial_at(Vec3::ZERO);
        source.set_scene(Some(1));
        device.add_listener(listener_at(Vec3::ZERO).in_scene(2));
        source.calculate_attenuation();
        assert_eq!(source.attenuation(), 0.0);
        assert_eq!(source.panning(), 0.0);

        device.add_listener(listener_at(Vec3::ZERO).in_scene(1));
        source.calculate_attenuation();
        assert_eq!(source.attenuation(), 1.0);

        device.set_listeners(vec![listener_at(Vec3::ZERO)]);
        source.calculate_attenuation();
        assert_eq!(source.attenuation(), 1.0);
    }

    #[test]
    fn test_disabled_listener_is_ignored() {
        let (device, source) = spatial_at(Vec3::ZERO);
        let mut listener = listener_at(Vec3::ZERO);
        listener.enabled = false;
        device.add_listener(listener);
        source.calculate_attenuation();
        assert_eq!(source.attenuation(), 0.0);
    }

    #[test]
    fn test_cone_attenuation() {
        // Emitter at the origin facing +Z, cone of 90 degrees fading out at 270
        let (device, source) = spatial_at(Vec3::ZERO);
        source.set_distance_attenuation(0.0, 1000.0, 1.0);
        source.set_angle_attenuation(90.0, 270.0);

        device.set_listeners(vec![listener_at(Vec3::new(0.0, 0.0, 1.0))]);
        source.calculate_attenuation();
        assert!(source.attenuation() > 0.99);

        // 90 degrees off axis reports a 180 degree cone: halfway out
        device.set_listeners(vec![listener_at(Vec3::new(1.0, 0.0, 0.0))]);
        source.calculate_attenuation();
        assert!((source.attenuation() - 0.5 * 0.999).abs() < 1e-3);

        device.set_listeners(vec![listener_at(Vec3::new(0.0, 0.0, -1.0))]);
        source.calculate_attenuation();
        assert_eq!(source.attenuation(), 0.0);
    }

    #[test]
    fn test_cone_follows_emitter_rotation() {
        let (device, source) = spatial_at(Vec3::ZERO);
        source.set_angle_attenuation(60.0, 60.0);
        device.add_listener(listener_at(Vec3::new(1.0, 0.0, 0.0)));

        source.calculate_attenuation();
        assert_eq!(source.attenuation(), 0.0);

        // Turn the emitter's forward axis toward +X
        source.set_transform(Some(Transform::new(
            Vec3::ZERO,
            Quat::from_rotation_y(FRAC_PI_2),
        )));
        source.calculate_attenuation();
        assert!(source.attenuation() > 0.9);
    }

    #[test]
    fn test_update_recalculates() {
        let (device, source) = spatial_at(Vec3::ZERO);
        device.add_listener(listener_at(Vec3::ZERO));
        assert!(source.update(0.1).is_none());
        assert_eq!(source.attenuation(), 1.0);
    }
}
