use crate::error::ShapeError;
use crate::smoothing::{cosine_rolling_mean, HR_SMOOTH_WINDOW};
use crate::types::{RawRecord, ShapedDataset, ShapedRecord};

/// Filter → avledede kolonner → sortering → pulsglatting.
/// Ren funksjon av input; ingen tilstand mellom kall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityShaper {
    hr_window: usize,
}

impl Default for ActivityShaper {
    fn default() -> Self {
        Self { hr_window: HR_SMOOTH_WINDOW }
    }
}

/// Varighet (timer) for én rad, eller flagget som forklarer hvorfor den mangler.
pub fn duration_hours(distance: f64, speed: f64) -> Result<f64, ShapeError> {
    if !distance.is_finite() || distance < 0.0 {
        return Err(ShapeError::InvalidDistance);
    }
    if speed == 0.0 {
        return Err(ShapeError::ZeroSpeed);
    }
    if !speed.is_finite() || speed < 0.0 {
        return Err(ShapeError::InvalidSpeed);
    }
    Ok(distance / speed)
}

fn matches_filter(record: &RawRecord, filter: Option<&str>) -> bool {
    match filter {
        None | Some("") => true,
        Some(f) => record.activity_type == f,
    }
}

impl ActivityShaper {
    /// Vindu < 1 tolkes som 1 (ingen glatting).
    pub fn new(hr_window: usize) -> Self {
        Self { hr_window: hr_window.max(1) }
    }

    pub fn hr_window(&self) -> usize {
        self.hr_window
    }

    pub fn shape(&self, records: &[RawRecord], activity_filter: Option<&str>) -> ShapedDataset {
        let mut kept: Vec<&RawRecord> = records
            .iter()
            .filter(|r| matches_filter(r, activity_filter))
            .collect();

        // stabil sortering: like datoer beholder rekkefølgen fra kilden
        kept.sort_by_key(|r| r.date);

        let hr: Vec<Option<f64>> = kept
            .iter()
            .map(|r| r.avg_heart_rate.map(f64::from))
            .collect();
        let smoothed = cosine_rolling_mean(&hr, self.hr_window);

        let mut out = Vec::with_capacity(kept.len());
        for (r, hr_smoothed) in kept.into_iter().zip(smoothed) {
            let mut flags = Vec::new();
            let duration = match duration_hours(r.distance, r.speed) {
                Ok(d) => Some(d),
                Err(flag) => {
                    flags.push(flag);
                    None
                }
            };
            if r.avg_heart_rate.is_none() {
                flags.push(ShapeError::MissingHeartRate);
            }
            if !flags.is_empty() {
                log::warn!("record {} ({}) flagged: {:?}", r.date, r.activity_type, flags);
            }

            out.push(ShapedRecord {
                date: r.date,
                activity_type: r.activity_type.clone(),
                distance: r.distance,
                speed: r.speed,
                avg_heart_rate: r.avg_heart_rate,
                duration_hours: duration,
                hr_smoothed,
                flags,
            });
        }

        ShapedDataset::from_sorted(out)
    }
}

/// Snarvei med standard vindu (6).
pub fn shape(records: &[RawRecord], activity_filter: Option<&str>) -> ShapedDataset {
    ActivityShaper::default().shape(records, activity_filter)
}
