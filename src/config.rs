//! Settings persistence
//!
//! The remap tables round-trip through a stable JSON document owned by
//! an external settings editor, stored at `~/.rebind/settings.json`.
//! Keys and shortcuts serialize as `;`-joined virtual-key-code
//! integers; the disable and Win-both sentinels are ordinary codes in
//! that encoding. Malformed entries are skipped individually with a
//! logged warning so one bad entry never aborts loading the rest, and
//! duplicate entries are rejected by the tables, which makes reloading
//! idempotent.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::keys;
use crate::shortcut::{ModifierKey, Operation, Shortcut};
use crate::tables::{RemapTables, RemapTarget};

/// Name of the OS-level signal an external collaborator raises after a
/// successful save so other processes reload their tables.
pub const SETTINGS_CHANGED_EVENT: &str = "Local\\Rebind-SettingsChangedEvent";

/// Process-local hook fired after a successful save. The collaborator
/// owning [`SETTINGS_CHANGED_EVENT`] bridges it to the OS signal.
static SETTINGS_CHANGED_HOOK: OnceLock<RwLock<Option<Box<dyn Fn() + Send + Sync>>>> =
    OnceLock::new();

fn changed_hook() -> &'static RwLock<Option<Box<dyn Fn() + Send + Sync>>> {
    SETTINGS_CHANGED_HOOK.get_or_init(|| RwLock::new(None))
}

pub fn set_settings_changed_hook(hook: Box<dyn Fn() + Send + Sync>) {
    *changed_hook().write() = Some(hook);
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid key code in '{0}'")]
    InvalidKeyCode(String),

    #[error("'{0}' is not a valid shortcut source")]
    InvalidShortcut(String),

    #[error("entry has no target")]
    MissingTarget,
}

/// Persisted settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub remap_keys: RemapKeysSection,
    pub remap_shortcuts: RemapShortcutsSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RemapKeysSection {
    pub in_process: Vec<RemapEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RemapShortcutsSection {
    pub global: Vec<RemapEntry>,
    pub app_specific: Vec<RemapEntry>,
}

/// One persisted remapping. `original_keys` is always a `;`-joined code
/// string; exactly one of the target fields is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RemapEntry {
    pub original_keys: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_remap_keys: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unicode_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_program_file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_program_args: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_app: Option<String>,
}

/// Default settings file location (`~/.rebind/settings.json`).
pub fn settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rebind")
        .join("settings.json")
}

pub fn load_settings(path: &std::path::Path) -> anyhow::Result<Settings> {
    if !path.exists() {
        tracing::info!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    let contents = fs::read_to_string(path)?;
    let settings = serde_json::from_str(&contents)?;
    Ok(settings)
}

/// Writes the settings file and fires the change-notification hook.
pub fn save_settings(path: &std::path::Path, settings: &Settings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(path, contents)?;
    tracing::info!("Settings saved to {}", path.display());
    if let Some(hook) = changed_hook().read().as_ref() {
        hook();
    }
    Ok(())
}

/// Parses `;`-joined decimal virtual-key codes.
fn parse_key_codes(codes: &str) -> Result<Vec<u32>, ConfigError> {
    codes
        .split(';')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidKeyCode(codes.to_string()))
        })
        .collect()
}

fn shortcut_from_codes(codes: &str) -> Result<Shortcut, ConfigError> {
    let shortcut = Shortcut::from_keys(&parse_key_codes(codes)?);
    if !shortcut.is_valid() {
        return Err(ConfigError::InvalidShortcut(codes.to_string()));
    }
    Ok(shortcut)
}

fn target_from_entry(entry: &RemapEntry) -> Result<RemapTarget, ConfigError> {
    if let Some(text) = &entry.unicode_text {
        return Ok(RemapTarget::Text(text.clone()));
    }
    match entry.operation_type.unwrap_or(0) {
        1 | 2 => {
            let mut shortcut = match &entry.new_remap_keys {
                Some(codes) => Shortcut::from_keys(&parse_key_codes(codes)?),
                None => Shortcut::new(),
            };
            if entry.operation_type == Some(1) {
                shortcut.operation = Operation::RunProgram;
                shortcut.program_path = entry.run_program_file_path.clone().unwrap_or_default();
                shortcut.program_args = entry.run_program_args.clone().unwrap_or_default();
            } else {
                shortcut.operation = Operation::OpenUri;
                shortcut.uri = entry.open_uri.clone().unwrap_or_default();
            }
            Ok(RemapTarget::Shortcut(shortcut))
        }
        _ => {
            let codes = entry
                .new_remap_keys
                .as_deref()
                .ok_or(ConfigError::MissingTarget)?;
            let parsed = parse_key_codes(codes)?;
            match parsed.as_slice() {
                [] => Err(ConfigError::MissingTarget),
                [single] => Ok(RemapTarget::Key(*single)),
                _ => Ok(RemapTarget::Shortcut(Shortcut::from_keys(&parsed))),
            }
        }
    }
}

fn parse_shortcut_entry(entry: &RemapEntry) -> Result<(Shortcut, RemapTarget), ConfigError> {
    let source = shortcut_from_codes(&entry.original_keys)?;
    let target = target_from_entry(entry)?;
    Ok((source, target))
}

/// Rehydrates the tables from a settings document. Existing mappings
/// are cleared first; each malformed entry is skipped with a warning.
/// Returns the number of entries skipped.
pub fn apply_settings(tables: &RemapTables, settings: &Settings) -> usize {
    tables.clear_single_key_remaps();
    tables.clear_shortcut_remaps();
    let mut skipped = 0;

    for entry in &settings.remap_keys.in_process {
        let result = parse_key_codes(&entry.original_keys)
            .and_then(|codes| match codes.as_slice() {
                [single] => Ok(*single),
                _ => Err(ConfigError::InvalidKeyCode(entry.original_keys.clone())),
            })
            .and_then(|source| target_from_entry(entry).map(|target| (source, target)));
        match result {
            Ok((source, target)) => {
                if !tables.add_single_key_remap(source, target) {
                    skipped += 1;
                }
            }
            Err(e) => {
                tracing::warn!("Skipping malformed key remap entry: {}", e);
                skipped += 1;
            }
        }
    }

    for entry in &settings.remap_shortcuts.global {
        match parse_shortcut_entry(entry) {
            Ok((source, target)) => {
                if !tables.add_global_shortcut(source, target) {
                    skipped += 1;
                }
            }
            Err(e) => {
                tracing::warn!("Skipping malformed global shortcut entry: {}", e);
                skipped += 1;
            }
        }
    }

    for entry in &settings.remap_shortcuts.app_specific {
        let app = entry.target_app.clone().unwrap_or_default();
        if app.is_empty() {
            tracing::warn!("Skipping app-specific entry with no target app");
            skipped += 1;
            continue;
        }
        match parse_shortcut_entry(entry) {
            Ok((source, target)) => {
                if !tables.add_app_specific_shortcut(&app, source, target) {
                    skipped += 1;
                }
            }
            Err(e) => {
                tracing::warn!("Skipping malformed app-specific entry: {}", e);
                skipped += 1;
            }
        }
    }

    tracing::info!(
        "Tables loaded: {} key remaps, {} global shortcuts, {} skipped",
        tables.single_key_count(),
        tables.global_shortcut_count(),
        skipped
    );
    skipped
}

/// Serializes the live tables back into the persisted shape.
pub fn export_settings(tables: &RemapTables) -> Settings {
    let mut settings = Settings::default();

    let mut single: Vec<(u32, RemapTarget)> = tables.snapshot_single_key();
    single.sort_by_key(|(source, _)| *source);
    for (source, target) in single {
        settings
            .remap_keys
            .in_process
            .push(entry_for(source.to_string(), &target, None));
    }

    let mut global = tables.snapshot_global();
    global.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (source, target) in global {
        settings
            .remap_shortcuts
            .global
            .push(entry_for(shortcut_to_codes(&source), &target, None));
    }

    let mut app_specific = tables.snapshot_app_specific();
    app_specific.sort_by(|(app_a, a, _), (app_b, b, _)| app_a.cmp(app_b).then_with(|| a.cmp(b)));
    for (app, source, target) in app_specific {
        settings
            .remap_shortcuts
            .app_specific
            .push(entry_for(shortcut_to_codes(&source), &target, Some(app)));
    }

    settings
}

fn entry_for(original_keys: String, target: &RemapTarget, target_app: Option<String>) -> RemapEntry {
    let mut entry = RemapEntry {
        original_keys,
        target_app,
        ..Default::default()
    };
    match target {
        RemapTarget::Key(vk) => entry.new_remap_keys = Some(vk.to_string()),
        RemapTarget::Text(text) => entry.unicode_text = Some(text.clone()),
        RemapTarget::Shortcut(shortcut) => match shortcut.operation {
            Operation::Remap => entry.new_remap_keys = Some(shortcut_to_codes(shortcut)),
            Operation::RunProgram => {
                entry.operation_type = Some(1);
                entry.run_program_file_path = Some(shortcut.program_path.clone());
                entry.run_program_args = Some(shortcut.program_args.clone());
            }
            Operation::OpenUri => {
                entry.operation_type = Some(2);
                entry.open_uri = Some(shortcut.uri.clone());
            }
        },
    }
    entry
}

/// `;`-joined codes in canonical order: modifiers (Win, Ctrl, Alt,
/// Shift), then the action key, then the chord key if present.
pub fn shortcut_to_codes(shortcut: &Shortcut) -> String {
    let mut codes: Vec<u32> = Vec::new();
    for family in keys::ModifierFamily::CANONICAL_ORDER {
        let code = match shortcut.modifier(family) {
            ModifierKey::Disabled => continue,
            ModifierKey::Left => family.left_vk(),
            ModifierKey::Right => family.right_vk(),
            ModifierKey::Both => match family.generic_vk() {
                Some(generic) => generic,
                None => keys::VK_WIN_BOTH,
            },
        };
        codes.push(code);
    }
    codes.extend(shortcut.action_key);
    codes.extend(shortcut.second_key);
    codes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(";")
}
