use serde::{Deserialize, Serialize};

/// Broad class of the current activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Solo,
    Group,
    HighStakesGroup,
}

/// Kind of zone the group is in, as reported by world ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    OpenWorld,
    Dungeon,
    Raid,
    Arena,
    Battleground,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Normal,
    Heroic,
    Mythic,
}

/// Snapshot of world metadata fed in once per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMetadata {
    pub zone: ZoneKind,
    pub difficulty: Difficulty,
    pub group_size: u32,
    /// Opaque identifiers of active encounter modifiers (affixes, mutators)
    pub modifiers: Vec<u32>,
    pub in_combat: bool,
}

impl WorldMetadata {
    pub fn solo() -> Self {
        Self {
            zone: ZoneKind::OpenWorld,
            difficulty: Difficulty::Normal,
            group_size: 1,
            modifiers: Vec::new(),
            in_combat: false,
        }
    }
}

/// Classification reported to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentContext {
    pub kind: ContentKind,
    /// How much arbitration overhead the activity justifies, in [0, 1]
    pub intensity: f32,
    pub group_size: u32,
    pub active_modifiers: Vec<u32>,
}

/// Optional coordination features consumers may switch off at low intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationFeature {
    InterruptRotation,
    DispelAssignment,
    ProtectionAssignment,
    CooldownRotation,
}

impl CoordinationFeature {
    /// Minimum intensity at which the feature is worth its overhead
    pub fn threshold(&self) -> f32 {
        match self {
            CoordinationFeature::InterruptRotation => 0.2,
            CoordinationFeature::DispelAssignment => 0.3,
            CoordinationFeature::ProtectionAssignment => 0.4,
            CoordinationFeature::CooldownRotation => 0.6,
        }
    }
}

impl ContentContext {
    /// Consumer policy helper: whether an optional feature should use claim arbitration
    ///
    /// At zero intensity nothing is worth coordinating and consumers can skip
    /// the claim resolver entirely.
    pub fn should_coordinate(&self, feature: CoordinationFeature) -> bool {
        self.intensity > 0.0 && self.intensity >= feature.threshold()
    }
}
