// attenuation.rs - Distance-based volume falloff for positional sounds
//
// The audio backend under Bevy (rodio) already fades each ear of a spatial
// sink by 1 / distance², capped at 1. That curve can't be tuned per sound, so
// emitters replace it with the "inverse" distance model used by browser audio
// panners: the sink volume is divided by the engine's falloff and multiplied
// by ours, which leaves our curve as the one you actually hear.

/// Optional falloff settings of one emitter. `None` means "use the default".
///
/// Values that are zero or negative count as unset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attenuation {
    pub ref_distance: Option<f32>,
    pub rolloff: Option<f32>,
    pub max_distance: Option<f32>,
}

impl Attenuation {
    pub const DEFAULT_REF_DISTANCE: f32 = 1.0;
    pub const DEFAULT_ROLLOFF: f32 = 1.0;
    pub const DEFAULT_MAX_DISTANCE: f32 = 10_000.0;

    pub fn ref_distance(&self) -> f32 {
        positive_or(self.ref_distance, Self::DEFAULT_REF_DISTANCE)
    }

    pub fn rolloff(&self) -> f32 {
        positive_or(self.rolloff, Self::DEFAULT_ROLLOFF)
    }

    /// Never smaller than the reference distance.
    pub fn max_distance(&self) -> f32 {
        positive_or(self.max_distance, Self::DEFAULT_MAX_DISTANCE).max(self.ref_distance())
    }

    /// Linear gain multiplier (0..=1) for a listener `distance` units away.
    ///
    /// Inside the reference distance the sound plays at full volume. Past the
    /// maximum distance the gain stops decreasing.
    pub fn gain(&self, distance: f32) -> f32 {
        let reference = self.ref_distance();
        let clamped = distance.clamp(reference, self.max_distance());
        reference / (reference + self.rolloff() * (clamped - reference))
    }
}

/// Falloff the engine applies on its own, averaged over both ears.
///
/// `ear_distances` are measured in the engine's (scaled) units. An ear
/// closer than one unit is not faded at all.
pub fn engine_falloff(ear_distances: [f32; 2]) -> f32 {
    let per_ear = |distance: f32| (1.0 / (distance * distance)).min(1.0);
    (per_ear(ear_distances[0]) + per_ear(ear_distances[1])) / 2.0
}

/// Volume to give the sink so the engine's falloff cancels out and the
/// emitter is heard at `volume * attenuation.gain(distance)`.
pub fn compensated_volume(
    attenuation: &Attenuation,
    volume: f32,
    distance: f32,
    ear_distances: [f32; 2],
) -> f32 {
    volume * attenuation.gain(distance) / engine_falloff(ear_distances)
}

fn positive_or(value: Option<f32>, default: f32) -> f32 {
    value.filter(|v| *v > 0.0).unwrap_or(default)
}
