//! Audio source state map: `SoundID -> AudioRecord`.

use std::collections::HashMap;

use crate::entity::Vec3;

/// Playback state of one audio source.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRecord {
    /// File path of the loaded audio resource.
    pub path: String,
    /// 3D world-space position, used when the source is spatialized.
    pub position: Vec3,
    /// Playback volume, clamped to `[0, 1]` on write.
    pub volume: f32,
    /// Whether the source is actively playing.
    pub is_playing: bool,
    /// Whether the source loops continuously instead of one-shot playback.
    pub is_looped: bool,
    /// Whether the underlying audio resource has finished loading.
    pub is_loaded: bool,
    /// Whether this entry is a valid, live source.
    pub is_active: bool,
}

impl Default for AudioRecord {
    fn default() -> Self {
        Self {
            path: String::new(),
            position: Vec3::ZERO,
            volume: 1.0,
            is_playing: false,
            is_looped: false,
            is_loaded: false,
            is_active: true,
        }
    }
}

impl AudioRecord {
    /// Clamp `volume` into `[0, 1]` at construction/write time.
    pub fn clamped_volume(volume: f32) -> f32 {
        volume.clamp(0.0, 1.0)
    }
}

/// Mapping from `soundId` to its record. At most one active entry per
/// `soundId` — re-creating an existing id updates `path` and state in
/// place rather than duplicating.
pub type AudioMap = HashMap<u64, AudioRecord>;

/// Fields an UPDATE_SOUND command may carry; absent fields preserve the
/// record's prior values, the same discipline [`crate::entity::EntityUpdate`]
/// uses for entities. Needed because `playSound`/`setVolume`/
/// `update3DPosition` each touch one or two fields and must not clobber the
/// rest of the record (in particular `path`, which a naive full-record
/// replacement would silently wipe back to empty).
#[derive(Debug, Clone, Default)]
pub struct AudioUpdate {
    /// New 3D position, if present.
    pub position: Option<Vec3>,
    /// New volume, if present; clamped to `[0, 1]` before storage.
    pub volume: Option<f32>,
    /// New playing state, if present.
    pub is_playing: Option<bool>,
    /// New loop state, if present.
    pub is_looped: Option<bool>,
}

impl AudioUpdate {
    /// Apply the present fields onto `record`, leaving absent fields
    /// untouched.
    pub fn apply(&self, record: &mut AudioRecord) {
        if let Some(position) = self.position {
            record.position = position;
        }
        if let Some(volume) = self.volume {
            record.volume = AudioRecord::clamped_volume(volume);
        }
        if let Some(is_playing) = self.is_playing {
            record.is_playing = is_playing;
        }
        if let Some(is_looped) = self.is_looped {
            record.is_looped = is_looped;
        }
    }
}

/// Create or update an audio source in the back buffer, enforcing the "at
/// most one active playback per soundId" invariant.
pub fn create_or_update(map: &mut AudioMap, sound_id: u64, path: String) {
    map.entry(sound_id)
        .and_modify(|record| {
            record.path.clone_from(&path);
        })
        .or_insert_with(|| AudioRecord { path, ..Default::default() });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recreating_existing_id_updates_in_place() {
        let mut map = AudioMap::new();
        create_or_update(&mut map, 1, "a.ogg".to_string());
        create_or_update(&mut map, 1, "b.ogg".to_string());
        assert_eq!(map.len(), 1);
        assert_eq!(map[&1].path, "b.ogg");
    }

    #[test]
    fn volume_clamps_to_unit_interval() {
        assert_eq!(AudioRecord::clamped_volume(-1.0), 0.0);
        assert_eq!(AudioRecord::clamped_volume(2.0), 1.0);
        assert_eq!(AudioRecord::clamped_volume(0.5), 0.5);
    }

    #[test]
    fn partial_update_preserves_path_and_absent_fields() {
        let mut record = AudioRecord { path: "Data/Audio/a.ogg".to_string(), is_loaded: true, ..Default::default() };
        let update = AudioUpdate { volume: Some(2.0), is_playing: Some(true), ..Default::default() };
        update.apply(&mut record);
        assert_eq!(record.path, "Data/Audio/a.ogg");
        assert!(record.is_loaded);
        assert!(record.is_playing);
        assert_eq!(record.volume, 1.0);
    }
}
