//! sovereign_spiral
//!
//! Nine-phase per-session cognitive state machine, persisted as one
//! atomically-rewritten JSON document per session, guarded by the same
//! file-level advisory-lock discipline as the audit log (`spec.md` §5).
//!
//! NOTE: `spiral_status`/`spiral_reflect`/`spiral_inherit` are exposed here
//! with an explicit `session_id` on every call (see DESIGN.md) since this
//! crate has no notion of an implicit "current session" across calls.

use fs4::FileExt;
use serde::{Deserialize, Serialize};
use sovereign_common::{atomic_write, sanitize_segment, RootContext};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const PHASE_NAMES: [&str; 9] = [
    "INITIALIZATION",
    "FIRST_ORDER_OBSERVATION",
    "RECURSIVE_INTEGRATION",
    "COUNTER_PERSPECTIVES",
    "ACTION_SYNTHESIS",
    "EXECUTION",
    "META_REFLECTION",
    "INTEGRATION",
    "COHERENCE_CHECK",
];

pub fn phase_name(phase: u8) -> &'static str {
    PHASE_NAMES.get((phase.saturating_sub(1)) as usize).copied().unwrap_or("UNKNOWN")
}

#[derive(Debug, Error)]
pub enum SpiralError {
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
    #[error("no prior session to inherit from")]
    NoPriorSession,
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("json error")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiralState {
    pub session_id: String,
    pub phase: u8,
    pub reflection_depth: u32,
    pub transitions: Vec<String>,
    pub inherited_from: Option<String>,
    pub created_at: f64,
    pub updated_at: f64,
}

impl SpiralState {
    fn new(session_id: String) -> Self {
        let now = now_secs();
        Self {
            session_id,
            phase: 1,
            reflection_depth: 0,
            transitions: Vec::new(),
            inherited_from: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn phase_name(&self) -> &'static str {
        phase_name(self.phase)
    }
}

fn now_secs() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs_f64()
}

pub struct SpiralStore {
    root: RootContext,
}

impl SpiralStore {
    pub fn new(root: RootContext) -> Self {
        Self { root }
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf, SpiralError> {
        let safe = sanitize_segment(session_id).ok_or_else(|| SpiralError::InvalidSessionId(session_id.to_string()))?;
        Ok(self.root.spiral_dir().join(format!("{safe}.json")))
    }

    fn load(&self, session_id: &str) -> Result<SpiralState, SpiralError> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Ok(SpiralState::new(session_id.to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_locked(&self, state: &SpiralState) -> Result<(), SpiralError> {
        let path = self.session_path(&state.session_id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new().create(true).write(true).open(&lock_path)?;
        lock_file.lock_exclusive()?;
        let result = atomic_write(&path, &serde_json::to_vec_pretty(state)?);
        FileExt::unlock(&lock_file)?;
        result?;
        Ok(())
    }

    pub fn status(&self, session_id: &str) -> Result<SpiralState, SpiralError> {
        let state = self.load(session_id)?;
        if !self.session_path(session_id)?.exists() {
            self.save_locked(&state)?;
        }
        Ok(state)
    }

    /// Appends `observation` to `transitions`, increments
    /// `reflection_depth`, and advances `phase` per the rules of
    /// `spec.md` §4.8 / SPEC_FULL.md §11.
    pub fn reflect(&self, session_id: &str, observation: &str) -> Result<SpiralState, SpiralError> {
        let mut state = self.load(session_id)?;
        state.transitions.push(observation.to_string());
        state.reflection_depth += 1;

        if state.phase == 9 {
            state.phase = 7;
        } else if state.reflection_depth % 2 == 0 {
            state.phase = (state.phase + 1).min(9);
        }

        state.updated_at = now_secs();
        self.save_locked(&state)?;
        Ok(state)
    }

    /// Starts a new session whose `inherited_from` points at `from_session_id`
    /// (or the most recently updated existing session if omitted). Resets
    /// `phase` to 1 and `reflection_depth` to 0; does not copy `transitions`.
    pub fn inherit(&self, new_session_id: &str, from_session_id: Option<&str>) -> Result<SpiralState, SpiralError> {
        let source_id = match from_session_id {
            Some(id) => id.to_string(),
            None => self.most_recent_session_id()?.ok_or(SpiralError::NoPriorSession)?,
        };

        let now = now_secs();
        let state = SpiralState {
            session_id: new_session_id.to_string(),
            phase: 1,
            reflection_depth: 0,
            transitions: Vec::new(),
            inherited_from: Some(source_id),
            created_at: now,
            updated_at: now,
        };
        self.save_locked(&state)?;
        Ok(state)
    }

    fn most_recent_session_id(&self) -> Result<Option<String>, SpiralError> {
        let dir = self.root.spiral_dir();
        if !dir.exists() {
            return Ok(None);
        }
        let mut best: Option<SpiralState> = None;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let raw = std::fs::read_to_string(&path)?;
                let state: SpiralState = serde_json::from_str(&raw)?;
                if best.as_ref().map(|b| state.updated_at > b.updated_at).unwrap_or(true) {
                    best = Some(state);
                }
            }
        }
        Ok(best.map(|s| s.session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_advances_every_two_reflections() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SpiralStore::new(RootContext::new(tmp.path()));

        store.reflect("s1", "first observation").unwrap();
        let state = store.reflect("s1", "second observation").unwrap();
        assert_eq!(state.phase, 2);
        assert_eq!(state.reflection_depth, 2);
        assert_eq!(state.transitions.len(), 2);
    }

    #[test]
    fn reflecting_at_phase_nine_returns_to_seven() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SpiralStore::new(RootContext::new(tmp.path()));

        for i in 0..16 {
            store.reflect("s1", &format!("obs {i}")).unwrap();
        }
        let state = store.status("s1").unwrap();
        assert_eq!(state.phase, 9);

        let state = store.reflect("s1", "post-coherence reflection").unwrap();
        assert_eq!(state.phase, 7);
    }

    #[test]
    fn inherit_resets_phase_and_depth_but_not_transitions() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SpiralStore::new(RootContext::new(tmp.path()));

        store.reflect("A", "obs1").unwrap();
        store.reflect("A", "obs2").unwrap();
        store.reflect("A", "obs3").unwrap();

        let inherited = store.inherit("B", Some("A")).unwrap();
        assert_eq!(inherited.phase, 1);
        assert_eq!(inherited.reflection_depth, 0);
        assert!(inherited.transitions.is_empty());
        assert_eq!(inherited.inherited_from.as_deref(), Some("A"));
    }

    #[test]
    fn inherit_defaults_to_most_recent_session() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SpiralStore::new(RootContext::new(tmp.path()));

        store.reflect("A", "obs").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.reflect("C", "obs").unwrap();

        let inherited = store.inherit("B", None).unwrap();
        assert_eq!(inherited.inherited_from.as_deref(), Some("C"));
    }
}
