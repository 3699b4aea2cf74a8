use std::hash::{DefaultHasher, Hash, Hasher};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Display colors assigned to events at creation time. The server picks from
/// the same palette; the client only assigns one when persisting locally.
pub const EVENT_PALETTE: [&str; 12] = [
    "#8B5CF6", // violet
    "#EC4899", // fuchsia
    "#F59E0B", // amber
    "#10B981", // emerald
    "#3B82F6", // sky blue
    "#EF4444", // red
    "#14B8A6", // teal
    "#A855F7", // light violet
    "#F97316", // deep orange
    "#06B6D4", // cyan
    "#84CC16", // lime
    "#6366F1", // indigo
];

pub const DEFAULT_COLOR: &str = EVENT_PALETTE[0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorStrategy {
    Random,
    RoundRobin,
    HashOfId,
}

/// Picks palette colors for events that reach the store without one.
#[derive(Debug, Clone)]
pub struct ColorPicker {
    strategy: ColorStrategy,
    cursor: usize,
}

impl ColorPicker {
    pub fn new(strategy: ColorStrategy) -> Self {
        Self { strategy, cursor: 0 }
    }

    pub fn pick(&mut self, event_id: i64) -> String {
        let index = match self.strategy {
            ColorStrategy::Random => rand::rng().random_range(0..EVENT_PALETTE.len()),
            ColorStrategy::RoundRobin => {
                let index = self.cursor % EVENT_PALETTE.len();
                self.cursor += 1;
                index
            }
            ColorStrategy::HashOfId => {
                let mut hasher = DefaultHasher::new();
                event_id.hash(&mut hasher);
                (hasher.finish() % EVENT_PALETTE.len() as u64) as usize
            }
        };
        EVENT_PALETTE[index].to_string()
    }
}

impl Default for ColorPicker {
    fn default() -> Self {
        Self::new(ColorStrategy::Random)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_picks_stay_in_palette() {
        let mut picker = ColorPicker::new(ColorStrategy::Random);

        for id in 0..50 {
            let color = picker.pick(id);
            assert!(EVENT_PALETTE.contains(&color.as_str()));
        }
    }

    #[test]
    fn round_robin_cycles_through_palette() {
        let mut picker = ColorPicker::new(ColorStrategy::RoundRobin);

        let first_pass: Vec<String> = (0..EVENT_PALETTE.len() as i64)
            .map(|id| picker.pick(id))
            .collect();

        assert_eq!(first_pass, EVENT_PALETTE.map(String::from).to_vec());
        assert_eq!(picker.pick(99), EVENT_PALETTE[0]);
    }

    #[test]
    fn hash_of_id_is_deterministic() {
        let mut first = ColorPicker::new(ColorStrategy::HashOfId);
        let mut second = ColorPicker::new(ColorStrategy::HashOfId);

        assert_eq!(first.pick(42), second.pick(42));
        assert!(EVENT_PALETTE.contains(&first.pick(7).as_str()));
    }

    #[test]
    fn strategy_parses_from_kebab_case() {
        let strategy: ColorStrategy = serde_json::from_str("\"round-robin\"").unwrap();
        assert_eq!(strategy, ColorStrategy::RoundRobin);
    }
}
