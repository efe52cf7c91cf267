//! Clip playlist
//!
//! Ordered clips awaiting a merge. Order is timeline order: it decides
//! where each clip lands and which clips crossfade into each other.

use crate::error::{Error, Result};
use std::sync::Arc;
use uuid::Uuid;

/// Gain range offered for a clip
pub const MAX_CLIP_VOLUME: f32 = 2.0;

/// One imported clip
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub id: Uuid,
    /// Display name (usually the file name)
    pub name: String,
    /// Compressed source bytes, shared with merge snapshots
    pub bytes: Arc<[u8]>,
    /// Decoded duration in seconds, 0 until a decode has run
    pub duration_seconds: f64,
    /// Gain multiplier, [0, 2]
    pub volume: f32,
}

impl Clip {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            bytes: bytes.into(),
            duration_seconds: 0.0,
            volume: 1.0,
        }
    }

    /// Whether a decode has reported this clip's duration
    pub fn has_duration(&self) -> bool {
        self.duration_seconds > 0.0
    }
}

/// Ordered, identity-unique clip list
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    clips: Vec<Clip>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a clip, returning its new identity
    pub fn add(&mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Uuid {
        let clip = Clip::new(name, bytes);
        let id = clip.id;
        self.clips.push(clip);
        id
    }

    /// Remove a clip by identity
    pub fn remove(&mut self, id: Uuid) -> Result<Clip> {
        let index = self.index_of(id)?;
        Ok(self.clips.remove(index))
    }

    /// Move the clip at `from` so that it ends up at index `to`
    pub fn move_clip(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.clips.len();
        if from >= len || to >= len {
            return Err(Error::InvalidInput(format!(
                "Cannot move clip {} to {} in a playlist of {}",
                from, to, len
            )));
        }
        let clip = self.clips.remove(from);
        self.clips.insert(to, clip);
        Ok(())
    }

    /// Set a clip's gain, clamped to [0, 2]
    pub fn set_volume(&mut self, id: Uuid, volume: f32) -> Result<()> {
        if !volume.is_finite() {
            return Err(Error::InvalidInput(format!("Invalid volume: {}", volume)));
        }
        let clip = self.get_mut(id)?;
        clip.volume = volume.clamp(0.0, MAX_CLIP_VOLUME);
        Ok(())
    }

    /// Record a decoded duration
    pub fn set_duration(&mut self, id: Uuid, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::InvalidInput(format!("Invalid duration: {}", seconds)));
        }
        self.get_mut(id)?.duration_seconds = seconds;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut Clip> {
        self.clips
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown clip: {}", id)))
    }

    fn index_of(&self, id: Uuid) -> Result<usize> {
        self.clips
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown clip: {}", id)))
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clear(&mut self) {
        self.clips.clear();
    }

    /// Sum of known clip durations (no crossfade overlap subtracted)
    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(|c| c.duration_seconds).sum()
    }
}

impl<'a> IntoIterator for &'a Playlist {
    type Item = &'a Clip;
    type IntoIter = std::slice::Iter<'a, Clip>;

    fn into_iter(self) -> Self::IntoIter {
        self.clips.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three() -> (Playlist, Vec<Uuid>) {
        let mut playlist = Playlist::new();
        let ids = vec![
            playlist.add("a.mp3", vec![1u8]),
            playlist.add("b.mp3", vec![2u8]),
            playlist.add("c.mp3", vec![3u8]),
        ];
        (playlist, ids)
    }

    fn names(playlist: &Playlist) -> Vec<&str> {
        playlist.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_add_assigns_unique_ids() {
        let (playlist, ids) = three();
        assert_eq!(playlist.len(), 3);
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        let clip = playlist.get(ids[1]).unwrap();
        assert_eq!(clip.volume, 1.0);
        assert!(!clip.has_duration());
    }

    #[test]
    fn test_remove_keeps_order() {
        let (mut playlist, ids) = three();
        let removed = playlist.remove(ids[1]).unwrap();
        assert_eq!(removed.name, "b.mp3");
        assert_eq!(names(&playlist), vec!["a.mp3", "c.mp3"]);
        assert!(matches!(playlist.remove(ids[1]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_move_clip() {
        let (mut playlist, _) = three();
        playlist.move_clip(0, 2).unwrap();
        assert_eq!(names(&playlist), vec!["b.mp3", "c.mp3", "a.mp3"]);
        playlist.move_clip(2, 0).unwrap();
        assert_eq!(names(&playlist), vec!["a.mp3", "b.mp3", "c.mp3"]);
        assert!(playlist.move_clip(0, 3).is_err());
    }

    #[test]
    fn test_volume_is_clamped() {
        let (mut playlist, ids) = three();
        playlist.set_volume(ids[0], 5.0).unwrap();
        playlist.set_volume(ids[1], -1.0).unwrap();
        assert_eq!(playlist.get(ids[0]).unwrap().volume, 2.0);
        assert_eq!(playlist.get(ids[1]).unwrap().volume, 0.0);
        assert!(playlist.set_volume(ids[2], f32::NAN).is_err());
        assert!(playlist.set_volume(Uuid::new_v4(), 1.0).is_err());
    }

    #[test]
    fn test_durations() {
        let (mut playlist, ids) = three();
        playlist.set_duration(ids[0], 2.5).unwrap();
        playlist.set_duration(ids[2], 1.5).unwrap();
        assert_eq!(playlist.total_duration(), 4.0);
        assert!(playlist.set_duration(ids[1], -1.0).is_err());

        playlist.clear();
        assert!(playlist.is_empty());
        assert_eq!(playlist.total_duration(), 0.0);
    }
}
