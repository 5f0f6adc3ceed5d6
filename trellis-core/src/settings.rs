//! Host settings.
//!
//! Settings deserialize from JSON with camelCase names; every field is
//! optional and falls back to its default.
//!
//! ```json
//! {
//!     "updateTimeout": null,
//!     "renderTimeout": 16,
//!     "updateModes": { "props": "deep" },
//!     "maxReRenders": 3,
//!     "duplicateNodes": "steal"
//! }
//! ```

use serde::Deserialize;

use crate::boundary::UpdateModes;
use crate::error::SettingsError;
use crate::value::CompareDepth;

/// When lifecycle calls fire relative to the physical render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleTiming {
    #[default]
    AfterRender,
    BeforeRender,
}

/// What to do when one external node is rendered at several positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicatePolicy {
    /// The later position gets a deep clone.
    #[default]
    Clone,
    /// The later position takes the node over.
    Steal,
    /// The later position renders nothing.
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostSettings {
    /// Deferral of the update phase in ms; `None` runs it inline.
    pub update_timeout: Option<u64>,
    /// Deferral of the render phase in ms; `None` runs it inline.
    pub render_timeout: Option<u64>,
    pub update_modes: UpdateModes,
    /// Depth used when diffing output-node props.
    pub dom_compare: CompareDepth,
    /// In-place re-renders allowed per boundary and update phase.
    pub max_re_renders: usize,
    pub lifecycle_timing: LifecycleTiming,
    pub duplicate_nodes: DuplicatePolicy,
    /// Nested arrays get their own key space.
    pub isolate_arrays: bool,
    /// Attribute read as the key of existing nodes during reassimilation.
    pub reassimilate_key_attribute: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            update_timeout: Some(0),
            render_timeout: Some(0),
            update_modes: UpdateModes::host_defaults(),
            dom_compare: CompareDepth::DoubleShallow,
            max_re_renders: 1,
            lifecycle_timing: LifecycleTiming::AfterRender,
            duplicate_nodes: DuplicatePolicy::Clone,
            isolate_arrays: true,
            reassimilate_key_attribute: "data-key".to_string(),
        }
    }
}

impl HostSettings {
    /// Settings that run both phases inline with every call.
    pub fn synchronous() -> Self {
        Self {
            update_timeout: None,
            render_timeout: None,
            ..Self::default()
        }
    }

    /// Parse and validate settings from JSON.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: HostSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.dom_compare == CompareDepth::Never {
            return Err(SettingsError::Invalid(
                "domCompare cannot be \"never\": output props would never be written".into(),
            ));
        }
        if self.reassimilate_key_attribute.is_empty() {
            return Err(SettingsError::Invalid("reassimilateKeyAttribute is empty".into()));
        }
        Ok(())
    }
}
