/// Dot product of two slices of the same length.
///
/// ## Example
///
/// ```
/// let ratios = [2.0, 1.0];
/// let crude = [10.0, 5.0];
///
/// let produced = refinery_rs::utils::dot_product(&ratios, &crude);
/// assert_eq!(produced, 25.0);
/// ```
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Rounds a value to `places` decimal places, resolving ties to the nearest
/// even digit. Negative `places` round to tens, hundreds and so on.
///
/// ## Example
///
/// ```
/// assert_eq!(refinery_rs::utils::round_to_places(2.5, 0), 2.0);
/// assert_eq!(refinery_rs::utils::round_to_places(-1.25, 1), -1.2);
/// ```
pub fn round_to_places(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round_ties_even() / scale
}
