/// Mean of the group; NaN for an empty group.
pub fn avg(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
