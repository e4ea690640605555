//! Dashboard rendering: every panel built independently for one range.

use crate::panel::{build_panel, OverrideTable, PanelDescriptor, PanelError, PanelSpec};
use crate::params::TimeRange;
use crate::reshape::ReshapeTable;

/// One panel's render result. A failed panel never affects its siblings.
#[derive(Debug, Clone)]
pub struct RenderedPanel {
    pub id: String,
    pub result: Result<PanelDescriptor, PanelError>,
}

/// A set of panels with the override and reshape tables they consult.
#[derive(Debug, Clone)]
pub struct Dashboard {
    panels: Vec<PanelSpec>,
    overrides: OverrideTable,
    reshapes: ReshapeTable,
}

impl Dashboard {
    pub fn new(panels: Vec<PanelSpec>, overrides: OverrideTable, reshapes: ReshapeTable) -> Self {
        Self {
            panels,
            overrides,
            reshapes,
        }
    }

    pub fn panel_ids(&self) -> impl Iterator<Item = &str> {
        self.panels.iter().map(|p| p.id.as_str())
    }

    /// Build every panel for `range`.
    ///
    /// `use_current` is the backend flag for this render pass. Every panel
    /// sharing an id with another is reported as invalid.
    pub fn render(&self, range: &TimeRange, use_current: bool) -> Vec<RenderedPanel> {
        self.panels
            .iter()
            .map(|spec| self.report(spec, self.build(spec, range, use_current)))
            .collect()
    }

    /// Build the panel with `id`, if any. Gives the same result as that
    /// panel's entry in [`Dashboard::render`].
    pub fn render_panel(&self, id: &str, range: &TimeRange, use_current: bool) -> Option<RenderedPanel> {
        let spec = self.panels.iter().find(|p| p.id == id)?;
        Some(self.report(spec, self.build(spec, range, use_current)))
    }

    fn is_duplicate(&self, id: &str) -> bool {
        self.panels.iter().filter(|p| p.id == id).count() > 1
    }

    fn build(
        &self,
        spec: &PanelSpec,
        range: &TimeRange,
        use_current: bool,
    ) -> Result<PanelDescriptor, PanelError> {
        if self.is_duplicate(&spec.id) {
            return Err(PanelError::InvalidPanelSpec {
                panel: spec.id.clone(),
                reason: "duplicate panel id".to_string(),
            });
        }

        build_panel(
            spec,
            range,
            use_current,
            self.overrides.get(&spec.id),
            self.reshapes.get(&spec.id),
        )
    }

    fn report(&self, spec: &PanelSpec, result: Result<PanelDescriptor, PanelError>) -> RenderedPanel {
        if let Err(e) = &result {
            tracing::warn!("Dashboard: Panel {} failed: {}", spec.id, e);
        }
        RenderedPanel {
            id: spec.id.clone(),
            result,
        }
    }
}
