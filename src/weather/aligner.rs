//! Alignment of weather observations onto forecast points

use crate::models::{AlongRoute, ForecastPoint, MergedPoint, WeatherObservation};

/// Pair each forecast point with the observation at the same position.
///
/// The output always has the length and order of `points`. Missing observations
/// merge to `None` and surplus observations are ignored.
#[must_use]
pub fn merge(
    points: &[ForecastPoint],
    observations: &[Option<WeatherObservation>],
) -> Vec<MergedPoint> {
    points
        .iter()
        .enumerate()
        .map(|(index, point)| MergedPoint {
            point: point.clone(),
            weather: observations.get(index).cloned().flatten(),
        })
        .collect()
}

/// Weather for each target taken from the merged point closest in cumulative distance.
///
/// Used to carry forecast weather onto a denser point set such as the raw route points.
/// Ties resolve to the earlier merged point. `merged` must be ordered by distance, which
/// holds for anything produced by [`merge`] over sampled forecast points.
#[must_use]
pub fn align_nearest<'a, T: AlongRoute>(
    targets: &[T],
    merged: &'a [MergedPoint],
) -> Vec<Option<&'a WeatherObservation>> {
    targets
        .iter()
        .map(|target| {
            nearest_index(merged, target.distance_km())
                .and_then(|index| merged[index].weather.as_ref())
        })
        .collect()
}

/// Number of merged points carrying weather, and the total
#[must_use]
pub fn coverage(merged: &[MergedPoint]) -> (usize, usize) {
    let with_weather = merged.iter().filter(|point| point.has_weather()).count();
    (with_weather, merged.len())
}

fn nearest_index<T: AlongRoute>(sorted: &[T], distance_km: f64) -> Option<usize> {
    if sorted.is_empty() {
        return None;
    }

    let upper = sorted.partition_point(|point| point.distance_km() < distance_km);
    if upper == 0 {
        return Some(0);
    }
    if upper == sorted.len() {
        return Some(sorted.len() - 1);
    }

    let below = (distance_km - sorted[upper - 1].distance_km()).abs();
    let above = (sorted[upper].distance_km() - distance_km).abs();
    Some(if above < below { upper } else { upper - 1 })
}
