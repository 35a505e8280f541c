pub fn count(values: &[f64]) -> f64 {
    values.len() as f64
}
