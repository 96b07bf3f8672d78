use ev_graph::Thickness;

use crate::pixelmap::PixelMap;

/// Cumulative-length fractions steering thickness classification.
///
/// Chains are walked longest-first; each fraction marks how much of the
/// total edge length has been passed when the matching threshold is read
/// off. `ignore` trims the outlier head before the long threshold is taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualizeValues {
    pub ignore: f32,
    pub short: f32,
    pub medium: f32,
}

impl Default for EqualizeValues {
    fn default() -> Self {
        Self {
            ignore: 0.05,
            short: 0.35,
            medium: 0.75,
        }
    }
}

/// Pixel-length thresholds derived by [`PixelMap::equalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EqualizeThresholds {
    pub short: usize,
    pub medium: usize,
    pub long: usize,
}

impl PixelMap {
    /// Reclassifies every chain's thickness from its share of the total
    /// edge length.
    ///
    /// Sorts pixel counts descending and walks the cumulative curve: the
    /// long threshold is the count where the walked fraction first reaches
    /// `ignore`, the medium threshold where it reaches `short`, the short
    /// threshold where it reaches `medium`. Chains at or above the medium
    /// threshold become [`Thickness::Thick`], those at or above the short
    /// threshold [`Thickness::Normal`], the rest [`Thickness::None`].
    pub fn equalize(&mut self, values: EqualizeValues) -> EqualizeThresholds {
        let mut counts: Vec<usize> = self.chains.values().map(|c| c.pixel_count()).collect();
        counts.sort_unstable_by(|a, b| b.cmp(a));
        let total: usize = counts.iter().sum();
        if total == 0 {
            return EqualizeThresholds::default();
        }

        let mut long = None;
        let mut medium = None;
        let mut short = None;
        let mut cum = 0usize;
        for count in counts {
            cum += count;
            let f = cum as f32 / total as f32;
            if long.is_none() && f >= values.ignore {
                long = Some(count);
            }
            if medium.is_none() && f >= values.short {
                medium = Some(count);
            }
            if short.is_none() && f >= values.medium {
                short = Some(count);
            }
        }
        let thresholds = EqualizeThresholds {
            short: short.unwrap_or(0),
            medium: medium.unwrap_or(0),
            long: long.unwrap_or(0),
        };

        let changed: Vec<_> = self
            .chains
            .iter()
            .filter_map(|(&id, chain)| {
                let t = category(chain.pixel_count(), thresholds);
                (t != chain.thickness()).then_some((id, t))
            })
            .collect();

        // Reinstalling refreshes the index footprint, which depends on the
        // rendered stroke width.
        for (id, t) in changed {
            if let Some(chain) = self.remove_chain_entry(id) {
                self.install_chain_with_id(id, chain.with_thickness(t));
            }
        }
        thresholds
    }
}

fn category(count: usize, t: EqualizeThresholds) -> Thickness {
    if count >= t.medium {
        Thickness::Thick
    } else if count >= t.short {
        Thickness::Normal
    } else {
        Thickness::None
    }
}
