//! The data-driven transition catalog.
//!
//! Transition kinds are loaded at startup from an embedded data file into an
//! immutable lookup. Each entry carries its family, the underlying xfade
//! primitive it resolves to, its valid duration range, and a `denied` tag for
//! kinds known to render corrupt output (certain slice/blur/crop/burn
//! variants come out as solid color or directional stripes). Membership is
//! decided here, once, rather than by string checks scattered across modules.

use std::collections::HashMap;

use beatcut_common::{BeatcutError, BeatcutResult};
use serde::{Deserialize, Serialize};

/// The neutral kind substituted for denied and unresolvable identifiers.
pub const SAFE_DEFAULT: &str = "fade";

const EMBEDDED_CATALOG: &str = include_str!("../data/transitions.json");

/// Coarse grouping used to map unknown identifiers to a safe equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionFamily {
    Fade,
    Dissolve,
    Wipe,
    Slide,
    Zoom,
    Slice,
    Blur,
    Crop,
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    /// Catalog identifier.
    pub name: String,

    /// Family grouping.
    pub family: TransitionFamily,

    /// Underlying xfade primitive this kind executes as.
    pub primitive: String,

    /// Minimum sensible duration (seconds).
    pub min_secs: f64,

    /// Maximum sensible duration (seconds).
    pub max_secs: f64,

    /// Known to corrupt output; always substituted, never executed.
    pub denied: bool,
}

impl TransitionEntry {
    /// Clamp a requested duration into this kind's valid range.
    pub fn clamp_duration(&self, secs: f64) -> f64 {
        secs.clamp(self.min_secs, self.max_secs)
    }
}

/// Outcome of resolving a requested transition identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    /// Known and allowed.
    Safe(&'a TransitionEntry),
    /// Known but deny-listed (by identifier or by its resolved primitive).
    Denied(&'a TransitionEntry),
    /// Not in the catalog at all (a richer effect namespace than the
    /// executing backend can render).
    Unknown,
}

/// Immutable transition lookup, built once at startup.
#[derive(Debug, Clone)]
pub struct TransitionCatalog {
    entries: HashMap<String, TransitionEntry>,
}

impl TransitionCatalog {
    /// Load the embedded catalog, validating the invariants the planner
    /// relies on: the safe default exists and is allowed, and no allowed
    /// entry resolves to a denied primitive.
    pub fn load_embedded() -> BeatcutResult<Self> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    pub fn from_json(json: &str) -> BeatcutResult<Self> {
        let list: Vec<TransitionEntry> = serde_json::from_str(json)?;
        let entries: HashMap<String, TransitionEntry> = list
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();

        let catalog = Self { entries };

        match catalog.entries.get(SAFE_DEFAULT) {
            Some(entry) if !entry.denied => {}
            _ => {
                return Err(BeatcutError::config(
                    "transition catalog must contain an allowed 'fade' entry",
                ));
            }
        }

        for entry in catalog.entries.values() {
            if entry.denied {
                continue;
            }
            if entry.min_secs <= 0.0 || entry.max_secs < entry.min_secs {
                return Err(BeatcutError::config(format!(
                    "transition '{}' has an invalid duration range",
                    entry.name
                )));
            }
            if let Some(primitive) = catalog.entries.get(&entry.primitive) {
                if primitive.denied {
                    return Err(BeatcutError::config(format!(
                        "allowed transition '{}' resolves to denied primitive '{}'",
                        entry.name, entry.primitive
                    )));
                }
            }
        }

        Ok(catalog)
    }

    /// Resolve a requested identifier.
    pub fn resolve(&self, identifier: &str) -> Resolution<'_> {
        let id = identifier.trim().to_ascii_lowercase();
        let Some(entry) = self.entries.get(&id) else {
            return Resolution::Unknown;
        };

        if entry.denied {
            return Resolution::Denied(entry);
        }

        // An allowed alias may still point at a primitive that is itself
        // deny-listed; treat it the same as requesting the primitive.
        if let Some(primitive) = self.entries.get(&entry.primitive) {
            if primitive.denied {
                return Resolution::Denied(entry);
            }
        }

        Resolution::Safe(entry)
    }

    /// The neutral fallback entry.
    pub fn safe_default(&self) -> &TransitionEntry {
        &self.entries[SAFE_DEFAULT]
    }

    /// The safe equivalent for a family (used for unknown identifiers that
    /// still reveal their family in the name). Never returns a denied entry.
    pub fn family_fallback(&self, family: TransitionFamily) -> &TransitionEntry {
        let name = match family {
            TransitionFamily::Wipe | TransitionFamily::Slide => "wipeleft",
            TransitionFamily::Blur | TransitionFamily::Dissolve => "dissolve",
            _ => SAFE_DEFAULT,
        };
        self.entries.get(name).unwrap_or_else(|| self.safe_default())
    }

    /// Best-effort family guess for an identifier outside the catalog.
    pub fn guess_family(identifier: &str) -> Option<TransitionFamily> {
        let id = identifier.trim().to_ascii_lowercase();
        if id.contains("wipe") {
            Some(TransitionFamily::Wipe)
        } else if id.contains("slide") {
            Some(TransitionFamily::Slide)
        } else if id.contains("blur") {
            Some(TransitionFamily::Blur)
        } else if id.contains("dissolve") {
            Some(TransitionFamily::Dissolve)
        } else if id.contains("fade") {
            Some(TransitionFamily::Fade)
        } else if id.contains("zoom") {
            Some(TransitionFamily::Zoom)
        } else {
            None
        }
    }

    /// Number of entries, allowed and denied.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
