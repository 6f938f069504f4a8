use tracing::{debug, info};

use super::models::{ContentContext, ContentKind, Difficulty, WorldMetadata, ZoneKind};
use crate::config::ContextConfig;

/// Classify world metadata without any debouncing
pub fn classify(metadata: &WorldMetadata) -> ContentKind {
    if metadata.group_size <= 1 {
        return ContentKind::Solo;
    }

    let high_stakes = metadata.zone == ZoneKind::Raid
        || metadata.difficulty == Difficulty::Mythic
        || !metadata.modifiers.is_empty();

    if high_stakes {
        ContentKind::HighStakesGroup
    } else {
        ContentKind::Group
    }
}

/// Coordination intensity for a classification under the given metadata, in [0, 1]
pub fn intensity_for(kind: ContentKind, metadata: &WorldMetadata) -> f32 {
    let base = match kind {
        ContentKind::Solo => 0.0,
        ContentKind::Group => {
            let extra_members = metadata.group_size.saturating_sub(2) as f32;
            (0.35 + 0.05 * extra_members).min(0.6)
        }
        ContentKind::HighStakesGroup => {
            let mythic = if metadata.difficulty == Difficulty::Mythic {
                0.1
            } else {
                0.0
            };
            0.7 + 0.05 * metadata.modifiers.len() as f32 + mythic
        }
    };

    let scaled = if metadata.in_combat { base } else { base * 0.5 };
    scaled.clamp(0.0, 1.0)
}

/// Classifies the current activity, holding a new classification back until it is stable
///
/// The first classification is reported immediately. After that a different
/// classification must be observed on `dwell_ticks` consecutive calls before
/// it replaces the reported one, so one-tick metadata flicker never thrashes
/// consumers.
#[derive(Debug, Clone)]
pub struct ContentContextResolver {
    dwell_ticks: u32,
    reported: Option<ContentKind>,
    candidate: Option<(ContentKind, u32)>,
}

impl ContentContextResolver {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            dwell_ticks: config.dwell_ticks,
            reported: None,
            candidate: None,
        }
    }

    /// The classification currently reported, if any metadata has been seen
    pub fn current_kind(&self) -> Option<ContentKind> {
        self.reported
    }

    pub fn resolve(&mut self, metadata: &WorldMetadata) -> ContentContext {
        let observed = classify(metadata);

        let kind = match self.reported {
            None => {
                info!(kind = ?observed, "Initial content classification");
                self.reported = Some(observed);
                observed
            }
            Some(current) if current == observed => {
                self.candidate = None;
                current
            }
            Some(current) => {
                let seen = match self.candidate {
                    Some((candidate, count)) if candidate == observed => count + 1,
                    _ => 1,
                };

                if seen >= self.dwell_ticks {
                    info!(
                        from = ?current,
                        to = ?observed,
                        observations = seen,
                        "Content classification changed"
                    );
                    self.reported = Some(observed);
                    self.candidate = None;
                    observed
                } else {
                    debug!(
                        reported = ?current,
                        candidate = ?observed,
                        observations = seen,
                        "Holding classification change until it is stable"
                    );
                    self.candidate = Some((observed, seen));
                    current
                }
            }
        };

        ContentContext {
            kind,
            intensity: intensity_for(kind, metadata),
            group_size: metadata.group_size,
            active_modifiers: metadata.modifiers.clone(),
        }
    }
}

impl Default for ContentContextResolver {
    fn default() -> Self {
        Self::new(&ContextConfig::default())
    }
}
