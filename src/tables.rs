//! Remap tables
//!
//! One owning component holds the three mapping scopes (single key,
//! global shortcut, per-application shortcut) behind per-scope locks:
//! the hook thread reads during dispatch while a control thread mutates
//! on configuration load/clear. Each shortcut scope keeps a size-sorted
//! index so lookup always tries the most specific candidate first.

use crate::shortcut::{ModifierKey, Shortcut};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Sentinel meaning "no app-specific shortcut is currently invoked".
pub const NO_ACTIVATED_APP: &str = "";

/// What a source key or shortcut maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemapTarget {
    /// A single key (possibly a sentinel such as `VK_DISABLED`).
    Key(u32),
    /// A full shortcut, including program/URI operations.
    Shortcut(Shortcut),
    /// Literal text, sent as unicode input.
    Text(String),
}

/// A shortcut target plus the per-mapping runtime state the dispatcher
/// mutates while a synthesized gesture is in flight.
#[derive(Debug, Clone)]
pub struct RemapShortcut {
    pub target: RemapTarget,
    /// Whether the dispatcher is currently inside a synthesized gesture
    /// for this mapping.
    pub is_invoked: bool,
    /// Set once the action key has been released while synthesized
    /// modifiers persist (repeat-capable gestures).
    pub action_released: bool,
    /// Which concrete Win side was physically down when a Win-both
    /// mapping was invoked. Written at invocation and cleared on reset
    /// for external readers (telemetry, editor state displays); release
    /// parity itself is carried by the concrete codes recorded in
    /// `suppressed_mods`/`synthesized_mods`.
    pub win_invoked: ModifierKey,
    /// Chorded shortcuts: the initial combination has been pressed and
    /// the second key is awaited.
    pub chord_started: bool,
    /// Concrete modifier codes this mapping released synthetically at
    /// invocation while the physical keys stayed held. Needed to re-press
    /// them when the gesture ends with some of them still down.
    pub suppressed_mods: Vec<u32>,
    /// Concrete modifier codes this mapping pressed synthetically at
    /// invocation, released (in reverse) on teardown.
    pub synthesized_mods: Vec<u32>,
}

impl RemapShortcut {
    pub fn new(target: RemapTarget) -> Self {
        Self {
            target,
            is_invoked: false,
            action_released: false,
            win_invoked: ModifierKey::Disabled,
            chord_started: false,
            suppressed_mods: Vec::new(),
            synthesized_mods: Vec::new(),
        }
    }

    /// Clears all runtime invocation state (called on full release).
    pub fn reset_invocation(&mut self) {
        self.is_invoked = false;
        self.action_released = false;
        self.win_invoked = ModifierKey::Disabled;
        self.chord_started = false;
        self.suppressed_mods.clear();
        self.synthesized_mods.clear();
    }
}

/// One shortcut scope: the mapping plus its size-sorted match index.
#[derive(Debug, Default)]
pub struct ShortcutScope {
    map: HashMap<Shortcut, RemapShortcut>,
    index: Vec<Shortcut>,
}

impl ShortcutScope {
    fn insert(&mut self, source: Shortcut, target: RemapTarget) -> bool {
        if self.map.contains_key(&source) {
            return false;
        }
        self.index.push(source.clone());
        // Largest shortcuts first; chords ahead of their base combination;
        // total order as the final tie-break for determinism.
        self.index.sort_by(|a, b| {
            b.size()
                .cmp(&a.size())
                .then_with(|| b.has_chord().cmp(&a.has_chord()))
                .then_with(|| a.cmp(b))
        });
        self.map.insert(source, RemapShortcut::new(target));
        true
    }

    /// Sources in match-priority order (most specific first).
    pub fn sorted_sources(&self) -> &[Shortcut] {
        &self.index
    }

    pub fn get(&self, source: &Shortcut) -> Option<&RemapShortcut> {
        self.map.get(source)
    }

    pub fn get_mut(&mut self, source: &Shortcut) -> Option<&mut RemapShortcut> {
        self.map.get_mut(source)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Shortcut, &RemapShortcut)> {
        self.map.iter()
    }
}

/// The synchronized remap tables. All lock discipline lives here; the
/// dispatcher and the configuration layer go through these accessors and
/// never hold a guard across a call boundary.
#[derive(Default)]
pub struct RemapTables {
    single_key: RwLock<HashMap<u32, RemapTarget>>,
    global: RwLock<ShortcutScope>,
    app_specific: RwLock<HashMap<String, ShortcutScope>>,
    /// Lowercased process name of the app whose shortcut is currently
    /// invoked, plus the concrete keys of the matched combination; reset
    /// only once every one of those keys has been released.
    activated_app: RwLock<Option<(String, Vec<u32>)>>,
}

impl RemapTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single-key remap. Duplicate sources are rejected with no
    /// mutation.
    pub fn add_single_key_remap(&self, source: u32, target: RemapTarget) -> bool {
        let mut table = self.single_key.write();
        if table.contains_key(&source) {
            tracing::warn!("Duplicate single-key remap rejected: {:#x}", source);
            return false;
        }
        table.insert(source, target);
        true
    }

    /// Adds a global (OS-level) shortcut remap. Duplicates are rejected.
    pub fn add_global_shortcut(&self, source: Shortcut, target: RemapTarget) -> bool {
        let added = self.global.write().insert(source, target);
        if !added {
            tracing::warn!("Duplicate global shortcut remap rejected");
        }
        added
    }

    /// Adds an app-specific shortcut remap, scoped by the lowercased
    /// process name. Duplicates within one app are rejected.
    pub fn add_app_specific_shortcut(
        &self,
        app: &str,
        source: Shortcut,
        target: RemapTarget,
    ) -> bool {
        let app = app.to_lowercase();
        let added = self
            .app_specific
            .write()
            .entry(app.clone())
            .or_default()
            .insert(source, target);
        if !added {
            tracing::warn!("Duplicate app-specific shortcut remap rejected for {}", app);
        }
        added
    }

    /// Wipes the single-key table (settings reload).
    pub fn clear_single_key_remaps(&self) {
        self.single_key.write().clear();
    }

    /// Wipes both shortcut scopes and the activated-app marker
    /// (settings reload).
    pub fn clear_shortcut_remaps(&self) {
        *self.global.write() = ShortcutScope::default();
        self.app_specific.write().clear();
        *self.activated_app.write() = None;
    }

    pub fn single_key_target(&self, source: u32) -> Option<RemapTarget> {
        self.single_key.read().get(&source).cloned()
    }

    pub fn single_key_count(&self) -> usize {
        self.single_key.read().len()
    }

    pub fn global_shortcut_count(&self) -> usize {
        self.global.read().len()
    }

    /// Runs `f` with mutable access to the global scope.
    pub fn with_global_scope_mut<R>(&self, f: impl FnOnce(&mut ShortcutScope) -> R) -> R {
        f(&mut self.global.write())
    }

    /// Runs `f` with mutable access to one app's scope, if present.
    pub fn with_app_scope_mut<R>(
        &self,
        app: &str,
        f: impl FnOnce(&mut ShortcutScope) -> R,
    ) -> Option<R> {
        let mut scopes = self.app_specific.write();
        scopes.get_mut(&app.to_lowercase()).map(f)
    }

    /// Snapshot accessors for serialization and telemetry.
    pub fn snapshot_single_key(&self) -> Vec<(u32, RemapTarget)> {
        self.single_key
            .read()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    pub fn snapshot_global(&self) -> Vec<(Shortcut, RemapTarget)> {
        self.global
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.target.clone()))
            .collect()
    }

    pub fn snapshot_app_specific(&self) -> Vec<(String, Shortcut, RemapTarget)> {
        self.app_specific
            .read()
            .iter()
            .flat_map(|(app, scope)| {
                scope
                    .iter()
                    .map(move |(k, v)| (app.clone(), k.clone(), v.target.clone()))
            })
            .collect()
    }

    pub fn activated_app(&self) -> String {
        self.activated_app
            .read()
            .as_ref()
            .map(|(app, _)| app.clone())
            .unwrap_or_else(|| NO_ACTIVATED_APP.to_string())
    }

    /// Marks `app` as invoked, remembering the concrete keys of the
    /// matched combination so the reset can wait for all of them.
    pub fn set_activated_app(&self, app: &str, combination: Vec<u32>) {
        *self.activated_app.write() = Some((app.to_lowercase(), combination));
    }

    /// The concrete keys of the activated combination, if any.
    pub fn activated_combination(&self) -> Option<Vec<u32>> {
        self.activated_app
            .read()
            .as_ref()
            .map(|(_, keys)| keys.clone())
    }

    pub fn reset_activated_app(&self) {
        *self.activated_app.write() = None;
    }
}
