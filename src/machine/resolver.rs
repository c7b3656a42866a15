use crate::observation::ObservationLabel;
use crate::preset::{NodeIndex, Preset};

/// Maps segment labels to preset nodes
///
/// The default [`PresetLabelResolver`] uses the preset's own label map and
/// node aliases. Hosts with an external mapping service implement this trait.
#[cfg_attr(test, mockall::automock)]
pub trait LabelResolver: Send + Sync {
    /// Target node for a segment label, if any
    fn resolve(&self, preset: &Preset, label: &ObservationLabel) -> Option<NodeIndex>;

    /// Node retried when the resolved target is not reachable
    fn fallback(&self, preset: &Preset) -> Option<NodeIndex> {
        preset.fallback()
    }
}

/// Resolves through [`Preset::resolve_label`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PresetLabelResolver;

impl LabelResolver for PresetLabelResolver {
    fn resolve(&self, preset: &Preset, label: &ObservationLabel) -> Option<NodeIndex> {
        preset.resolve_label(label.as_str())
    }
}
