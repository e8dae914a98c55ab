use rand::Rng;

/// Shortest pause between two ambient cues, in client ticks.
const MIN_CUE_INTERVAL: u64 = 20 * 30;
const MAX_CUE_INTERVAL: u64 = 20 * 120;

/// Ambient cues the client may play near a colony.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientCue {
    Chatter,
    Hammering,
    Bells,
}
const CUES: [AmbientCue; 3] = [AmbientCue::Chatter, AmbientCue::Hammering, AmbientCue::Bells];

/// Client side ambient audio scheduler.
///
/// Lazily built on the first client tick and never touches
/// authoritative state. Queued cues are drained by the audio backend.
#[derive(Debug)]
pub struct SoundManager {
    tick: u64,
    next_cue_tick: u64,
    queued: Vec<AmbientCue>,
}
impl SoundManager {
    pub fn new() -> Self {
        Self {
            tick: 0,
            next_cue_tick: rand::thread_rng().gen_range(MIN_CUE_INTERVAL..MAX_CUE_INTERVAL),
            queued: Vec::new(),
        }
    }

    pub fn tick(&mut self) {
        self.tick += 1;
        if self.tick >= self.next_cue_tick {
            let mut rng = rand::thread_rng();
            self.queued.push(CUES[rng.gen_range(0..CUES.len())]);
            self.next_cue_tick = self.tick + rng.gen_range(MIN_CUE_INTERVAL..MAX_CUE_INTERVAL);
        }
    }

    /// Cues queued since the last drain.
    pub fn drain_cues(&mut self) -> Vec<AmbientCue> {
        std::mem::take(&mut self.queued)
    }
}

impl Default for SoundManager {
    fn default() -> Self {
        Self::new()
    }
}

#[test]
fn test_cues_eventually_queued() {
    let mut sounds = SoundManager::new();
    for _ in 0..MAX_CUE_INTERVAL * 2 {
        sounds.tick();
    }
    assert!(!sounds.drain_cues().is_empty());
}
