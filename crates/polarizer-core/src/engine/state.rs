use std::fmt;

/// Stages of a polarization run. A run only ever moves one stage forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Loaded,
    TypesResolved,
    HydrogenCounted,
    Validated,
    ForcefieldAugmented,
    TopologyAugmented,
    Written,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Loaded,
        Stage::TypesResolved,
        Stage::HydrogenCounted,
        Stage::Validated,
        Stage::ForcefieldAugmented,
        Stage::TopologyAugmented,
        Stage::Written,
    ];

    /// The stage that follows this one, or `None` for the final stage.
    pub fn next(self) -> Option<Stage> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Loaded => "loaded",
            Stage::TypesResolved => "types-resolved",
            Stage::HydrogenCounted => "hydrogen-counted",
            Stage::Validated => "validated",
            Stage::ForcefieldAugmented => "forcefield-augmented",
            Stage::TopologyAugmented => "topology-augmented",
            Stage::Written => "written",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
